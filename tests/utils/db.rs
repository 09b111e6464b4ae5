/// Isolated test database that is created per test and dropped afterwards
///
/// Connects to the server behind `TEST_DATABASE_URL`. When the variable is
/// unset `TestDb::try_new` returns `None` and database tests skip themselves.
use blunder_worker_lib::shared::infrastructure::database::{DbPool, MIGRATIONS};
use diesel::r2d2::{self, ConnectionManager};
use diesel::{sql_query, Connection, PgConnection, RunQueryDsl};
use diesel_migrations::MigrationHarness;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

static TEST_DB_COUNTER: AtomicU32 = AtomicU32::new(0);

pub struct TestDb {
    server_url: String,
    name: String,
    pool: DbPool,
}

impl TestDb {
    /// Create `test_blunder_{pid}_{n}` and migrate it
    pub fn try_new() -> Option<Self> {
        dotenvy::dotenv().ok();
        let server_url = std::env::var("TEST_DATABASE_URL").ok()?;

        let name = format!(
            "test_blunder_{}_{}",
            std::process::id(),
            TEST_DB_COUNTER.fetch_add(1, Ordering::SeqCst)
        );

        let mut conn =
            PgConnection::establish(&server_url).expect("Failed to connect to test database server");
        sql_query(format!("CREATE DATABASE {}", name))
            .execute(&mut conn)
            .unwrap_or_else(|e| panic!("Failed to create test database {}: {}", name, e));

        // Swap the database name (everything after the last '/')
        let last_slash = server_url
            .rfind('/')
            .unwrap_or_else(|| panic!("Invalid TEST_DATABASE_URL format: {}", server_url));
        let isolated_url = format!("{}/{}", &server_url[..last_slash], name);

        let pool = r2d2::Pool::builder()
            .max_size(8)
            .test_on_check_out(true)
            .build(ConnectionManager::<PgConnection>::new(isolated_url))
            .expect("Failed to build test database connection pool");

        pool.get()
            .expect("Unable to connect to the test database")
            .run_pending_migrations(MIGRATIONS)
            .expect("Unable to migrate the test database");

        Some(Self {
            server_url,
            name,
            pool,
        })
    }

    pub fn pool(&self) -> DbPool {
        self.pool.clone()
    }

    /// Run raw SQL against the test database (backdating claims and the like)
    pub fn execute(&self, sql: &str) -> usize {
        let mut conn = self.pool.get().expect("Unable to connect to the test database");
        sql_query(sql)
            .execute(&mut conn)
            .unwrap_or_else(|e| panic!("SQL failed ({}): {}", e, sql))
    }

    pub fn try_execute(&self, sql: &str) -> diesel::QueryResult<usize> {
        let mut conn = self.pool.get().expect("Unable to connect to the test database");
        sql_query(sql).execute(&mut conn)
    }
}

impl Drop for TestDb {
    /// Terminates remaining connections and drops the database. A panicking
    /// test leaves it behind for debugging.
    fn drop(&mut self) {
        if thread::panicking() {
            eprintln!("TestDb leaking database '{}' due to panic", self.name);
            return;
        }

        let Ok(mut conn) = PgConnection::establish(&self.server_url) else {
            eprintln!("Failed to connect for cleanup of '{}'", self.name);
            return;
        };

        if let Err(e) = sql_query(format!(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = '{}'",
            self.name
        ))
        .execute(&mut conn)
        {
            eprintln!("Failed to terminate connections for '{}': {}", self.name, e);
        }

        if let Err(e) = sql_query(format!("DROP DATABASE IF EXISTS {}", self.name)).execute(&mut conn) {
            eprintln!("Failed to drop test database '{}': {}", self.name, e);
        }
    }
}
