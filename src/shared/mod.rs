// Shared kernel used by every module

pub mod config;          // Environment-driven configuration
pub mod errors;          // Shared error types
pub mod infrastructure;  // Shared infrastructure (database, migrations)
pub mod utils;           // Logging, retry, validation

// Re-exports for convenience
pub use config::WorkerConfig;
pub use errors::{AppError, AppResult};
pub use infrastructure::database::Database;
