//! costplan core: value types, settings and errors shared by every crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::{RemoteSettings, Settings};
pub use error::{Error, Result};
pub use types::*;
