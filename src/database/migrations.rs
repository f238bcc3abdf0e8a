//! # Database Migration System
//!
//! Incremental schema migrations for the `cadence_*` tables with version
//! tracking and concurrency control.
//!
//! ## Concurrency Control
//!
//! The engine is embedded: several host processes may boot at once, each
//! trying to migrate. A PostgreSQL advisory lock, held on a single pinned
//! connection, serializes them; late arrivals block until the first process
//! finishes and then see nothing outstanding.
//!
//! This system is strictly additive. It never drops or rebuilds schema, since
//! the engine's tables live inside the host application's database.
//!
//! ## Migration Discovery
//!
//! Migrations are discovered from the `migrations/` directory (overridable
//! via `CADENCE_MIGRATIONS_DIR`) using a timestamp naming convention:
//! `YYYYMMDDHHMMSS_description.sql`.

use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Advisory lock key shared by every embedded engine process.
const MIGRATION_LOCK_KEY: i64 = 8_245_013_977_312_204;

/// Represents a single database migration file.
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version timestamp (YYYYMMDDHHMMSS format)
    pub version: String,
    /// Human-readable migration name
    pub name: String,
    /// Full path to the SQL file
    pub path: PathBuf,
}

/// Manages schema migrations with concurrency safety.
pub struct DatabaseMigrations;

impl DatabaseMigrations {
    /// Run all outstanding migrations from the default directory.
    pub async fn run_all(pool: &PgPool) -> Result<(), sqlx::Error> {
        let dir = std::env::var("CADENCE_MIGRATIONS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join("migrations")
            });

        Self::run_from(pool, &dir).await
    }

    /// Run all outstanding migrations from `dir` under the advisory lock.
    pub async fn run_from(pool: &PgPool, dir: &Path) -> Result<(), sqlx::Error> {
        // Advisory locks are per-connection; pin one for the lock's lifetime.
        let mut lock_conn = pool.acquire().await?;

        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await?;

        let result = Self::apply_outstanding(pool, dir).await;

        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await?;

        result
    }

    async fn apply_outstanding(pool: &PgPool, dir: &Path) -> Result<(), sqlx::Error> {
        Self::ensure_migration_table(pool).await?;

        let migrations = Self::discover_migrations_in(dir)?;
        let applied = Self::get_applied_migrations(pool).await?;

        for migration in migrations.values() {
            if !applied.contains(&migration.version) {
                info!(
                    version = %migration.version,
                    name = %migration.name,
                    "Applying migration"
                );
                Self::run_migration(pool, &migration.path).await?;
                Self::record_migration(pool, &migration.version).await?;
            }
        }

        Ok(())
    }

    /// Discover all migration files in `dir`, ordered by version.
    fn discover_migrations_in(dir: &Path) -> Result<BTreeMap<String, Migration>, sqlx::Error> {
        if !dir.exists() {
            return Ok(BTreeMap::new());
        }

        let mut migrations = BTreeMap::new();

        for entry in fs::read_dir(dir).map_err(sqlx::Error::Io)? {
            let entry = entry.map_err(sqlx::Error::Io)?;
            let path = entry.path();

            if path.is_file() && path.extension().map(|s| s == "sql").unwrap_or(false) {
                if let Some(filename) = path.file_stem().and_then(|s| s.to_str()) {
                    if let Some((version, name)) = Self::parse_migration_filename(filename) {
                        migrations.insert(version.clone(), Migration { version, name, path });
                    }
                }
            }
        }

        Ok(migrations)
    }

    /// Parse migration filename to extract version and name
    fn parse_migration_filename(filename: &str) -> Option<(String, String)> {
        // Expected format: YYYYMMDDHHMMSS_migration_name
        if filename.len() < 15 {
            return None;
        }

        let (version_part, name_part) = filename.split_at(14);

        if !version_part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let name = if let Some(stripped) = name_part.strip_prefix('_') {
            stripped.replace('_', " ")
        } else {
            name_part.replace('_', " ")
        };

        Some((version_part.to_string(), name))
    }

    async fn ensure_migration_table(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS cadence_schema_migrations (
                version VARCHAR(14) PRIMARY KEY,
                applied_at TIMESTAMPTZ DEFAULT NOW()
            )
        "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn get_applied_migrations(
        pool: &PgPool,
    ) -> Result<std::collections::HashSet<String>, sqlx::Error> {
        let rows = sqlx::query("SELECT version FROM cadence_schema_migrations")
            .fetch_all(pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("version"))
            .collect())
    }

    async fn record_migration(pool: &PgPool, version: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO cadence_schema_migrations (version) VALUES ($1)")
            .bind(version)
            .execute(pool)
            .await?;

        Ok(())
    }

    async fn run_migration(pool: &PgPool, path: &Path) -> Result<(), sqlx::Error> {
        if !path.exists() {
            warn!(path = %path.display(), "Migration file not found, skipping");
            return Ok(());
        }

        let sql = fs::read_to_string(path).map_err(sqlx::Error::Io)?;
        sqlx::raw_sql(&sql).execute(pool).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_migration_filename() {
        let parsed = DatabaseMigrations::parse_migration_filename(
            "20250301000001_create_cadence_tables",
        );
        assert_eq!(
            parsed,
            Some((
                "20250301000001".to_string(),
                "create cadence tables".to_string()
            ))
        );

        assert_eq!(
            DatabaseMigrations::parse_migration_filename("not_a_migration"),
            None
        );
        assert_eq!(
            DatabaseMigrations::parse_migration_filename("2025_too_short"),
            None
        );
    }

    #[test]
    fn test_discovery_orders_by_version_and_skips_noise() {
        let dir = tempfile::tempdir().unwrap();

        for name in [
            "20250302000001_add_indexes.sql",
            "20250301000001_create_cadence_tables.sql",
            "README.md",
            "junk.sql",
        ] {
            let mut file = fs::File::create(dir.path().join(name)).unwrap();
            writeln!(file, "SELECT 1;").unwrap();
        }

        let migrations = DatabaseMigrations::discover_migrations_in(dir.path()).unwrap();
        let versions: Vec<&str> = migrations.keys().map(String::as_str).collect();
        assert_eq!(versions, vec!["20250301000001", "20250302000001"]);
        assert_eq!(
            migrations["20250301000001"].name,
            "create cadence tables"
        );
    }

    #[test]
    fn test_discovery_of_missing_dir_is_empty() {
        let migrations =
            DatabaseMigrations::discover_migrations_in(Path::new("/nonexistent/migrations"))
                .unwrap();
        assert!(migrations.is_empty());
    }
}
