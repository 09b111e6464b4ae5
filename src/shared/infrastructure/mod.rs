/// Shared infrastructure concerns
///
/// Connection pooling and schema migrations used by every module that
/// touches Postgres.
pub mod database;

pub use database::Database;
