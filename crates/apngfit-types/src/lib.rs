//! Shared domain types for the apngfit workspace.

pub mod config;
pub mod events;
pub mod frame;
pub mod policy;
pub mod quality;
pub mod telemetry;

mod errors;

pub use errors::{ApngFitError, Result};
