use crate::log_info;
use crate::shared::config::DatabaseConfig;
use crate::shared::errors::AppError;
use crate::shared::utils::logger::LogContext;
use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, Pool};
use diesel::{sql_query, RunQueryDsl};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::time::Duration;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;
pub type DbConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Applies the per-statement deadline to every pooled connection
#[derive(Debug, Clone, Copy)]
struct StatementTimeout(Duration);

impl CustomizeConnection<PgConnection, r2d2::Error> for StatementTimeout {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), r2d2::Error> {
        sql_query(format!("SET statement_timeout = {}", self.0.as_millis()))
            .execute(conn)
            .map(|_| ())
            .map_err(r2d2::Error::QueryError)
    }
}

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let database_url = Self::validated_url(config)?;
        let manager = ConnectionManager::<PgConnection>::new(database_url);

        let pool = r2d2::Pool::builder()
            .max_size(config.max_pool_size.max(1))
            .min_idle(Some(1))
            // Time to wait for a connection from the pool
            .connection_timeout(config.connect_timeout)
            .idle_timeout(Some(Duration::from_secs(300)))
            .max_lifetime(Some(Duration::from_secs(1800)))
            .test_on_check_out(true)
            .connection_customizer(Box::new(StatementTimeout(config.statement_timeout)))
            .build(manager)
            .map_err(|e| {
                AppError::PersistenceFailure(format!("Failed to create connection pool: {}", e))
            })?;

        log_info!(
            "Database connection pool initialized with max_size: {}, statement_timeout: {}ms",
            pool.max_size(),
            config.statement_timeout.as_millis()
        );

        Ok(Self { pool })
    }

    fn validated_url(config: &DatabaseConfig) -> Result<String, AppError> {
        let url = config.url.trim();
        if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
            return Err(AppError::ConfigError(
                "Invalid database URL format. Must start with postgres:// or postgresql://"
                    .to_string(),
            ));
        }

        // Log connection attempt without exposing credentials
        log_info!(
            "Initializing database connection to: {}",
            url.rsplit('@').next().unwrap_or("unknown_host")
        );

        let separator = if url.contains('?') { '&' } else { '?' };
        if url.contains("connect_timeout=") {
            Ok(url.to_string())
        } else {
            Ok(format!(
                "{}{}connect_timeout={}",
                url,
                separator,
                config.connect_timeout.as_secs().max(1)
            ))
        }
    }

    /// Apply any pending schema migrations
    pub fn run_migrations(&self) -> Result<(), AppError> {
        let mut conn = self.get_connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| AppError::PersistenceFailure(format!("Failed to run migrations: {}", e)))?;

        if applied.is_empty() {
            log_info!("Database schema is up to date");
        } else {
            log_info!("Applied {} database migration(s)", applied.len());
        }
        Ok(())
    }

    pub fn get_connection(&self) -> Result<DbConnection, AppError> {
        let start = std::time::Instant::now();

        match self.pool.get() {
            Ok(conn) => {
                let duration = start.elapsed().as_millis() as u64;
                if duration > 100 {
                    LogContext::performance_metric("db_connection_acquire", duration, Some("slow"));
                }
                Ok(conn)
            }
            Err(e) => {
                LogContext::error_with_context(
                    &e,
                    "Failed to acquire database connection from pool",
                );
                Err(AppError::from(e))
            }
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}
