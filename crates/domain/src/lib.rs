//! `w3-domain` — shared types for the w3chat workspace.
//!
//! Holds the pieces every other crate needs without pulling in the full
//! gateway: the common error type, the TOML config model, the
//! provider-agnostic stream/tool/message types.

pub mod config;
pub mod error;
pub mod stream;
pub mod tool;

pub use config::Config;
pub use error::{Error, Result};
