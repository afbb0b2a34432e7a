use sqlx::migrate::{Migrate, MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Outcome of one migration pass, for operator-facing reporting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Versions this pass applied, in application order.
    pub newly_applied: Vec<i64>,
    /// Versions recorded in the migrations table after the pass.
    pub total_applied: usize,
}

pub async fn run_pending(pool: &DbPool) -> Result<MigrationReport, MigrateError> {
    let before = applied_versions(pool).await?;
    MIGRATOR.run(pool).await?;
    let after = applied_versions(pool).await?;

    let newly_applied =
        after.iter().copied().filter(|version| !before.contains(version)).collect();
    Ok(MigrationReport { newly_applied, total_applied: after.len() })
}

async fn applied_versions(pool: &DbPool) -> Result<Vec<i64>, MigrateError> {
    let mut conn = pool.acquire().await?;
    conn.ensure_migrations_table().await?;
    let applied = conn.list_applied_migrations().await?;
    Ok(applied.into_iter().map(|migration| migration.version).collect())
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR};

    async fn table_exists(pool: &sqlx::SqlitePool, name: &str) -> bool {
        sqlx::query("SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(name)
            .fetch_one(pool)
            .await
            .expect("query sqlite_master")
            .get::<i64, _>("count")
            == 1
    }

    #[tokio::test]
    async fn migrations_create_baseline_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        assert!(table_exists(&pool, "experiments").await);
        assert!(table_exists(&pool, "calls").await);
        assert!(table_exists(&pool, "human_calls").await);
    }

    #[tokio::test]
    async fn report_lists_new_versions_once() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");

        let first = run_pending(&pool).await.expect("first pass");
        assert_eq!(first.newly_applied, vec![1]);
        assert_eq!(first.total_applied, 1);

        let second = run_pending(&pool).await.expect("second pass");
        assert!(second.newly_applied.is_empty(), "a no-op pass should report nothing new");
        assert_eq!(second.total_applied, 1);
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        assert!(!table_exists(&pool, "calls").await);
        assert!(!table_exists(&pool, "experiments").await);
    }
}
