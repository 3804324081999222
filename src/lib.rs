pub mod bridge;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod process;

#[cfg(test)]
pub mod test_utils;

pub use error::{BridgeError, Result};
