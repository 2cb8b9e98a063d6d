//! Common utilities shared by the engine, assembly and CLI layers

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};
