pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod http;
pub mod mirror;
pub mod process;
pub mod sheets;

pub use error::{MatrizError, Result};
