pub mod schema;

use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;

pub use schema::CURRENT_SCHEMA;

/// Applies the declarative schema. Every statement is IF NOT EXISTS, so
/// this is safe to run on every startup and on fresh test databases.
#[instrument(skip_all)]
pub async fn init_schema(pool: &Pool<Sqlite>) -> Result<(), AppError> {
    info!("Applying database schema");

    sqlx::raw_sql(CURRENT_SCHEMA).execute(pool).await?;

    Ok(())
}
