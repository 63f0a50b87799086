pub mod automation;
pub mod config;
pub mod console;
pub mod error;
pub mod job;
pub mod logging;
pub mod models;
pub mod scancard;

pub use error::{AppError, Result};
