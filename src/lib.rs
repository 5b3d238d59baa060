pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod scheduler;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
