//! Concurrency helpers.

pub mod deadline;
