use anyhow::{bail, Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Open the knowledge-base database read-only.
///
/// The file must already exist; a missing database is a load failure, not
/// an empty knowledge base.
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        bail!("Knowledge base database not found: {}", db_path.display());
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .read_only(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open {}", db_path.display()))?;

    Ok(pool)
}
