pub mod config;
pub mod error;

pub use config::NvmlConfig;
pub use error::CoreError;
