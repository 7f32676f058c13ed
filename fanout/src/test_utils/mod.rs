//! Test doubles and fixtures shared by unit and integration tests.

pub mod faulty_sink;
pub mod faulty_store;
pub mod fixtures;
