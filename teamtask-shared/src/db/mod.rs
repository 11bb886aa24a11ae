/// Database layer for TeamTask
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with a startup health check
/// - `migrations`: Embedded schema migrations from the workspace `migrations/` directory
///
/// Record types and store traits live in [`crate::models`].
///
/// # Example
///
/// ```no_run
/// use teamtask_shared::db::migrations::run_migrations;
/// use teamtask_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(DatabaseConfig::new(std::env::var("DATABASE_URL")?)).await?;
///     run_migrations(&pool).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
