//! Configuration for the fanout replicator.
//!
//! Holds the serde configuration structs shared by every crate in the workspace together
//! with the layered loader used by the binary.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
