use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use crosstalk_core::domain::Experiment;

use super::{parse_timestamp, ExperimentRepository, RepositoryError};
use crate::DbPool;

pub struct SqlExperimentRepository {
    pool: DbPool,
}

impl SqlExperimentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ExperimentRepository for SqlExperimentRepository {
    async fn create(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Experiment, RepositoryError> {
        let experiment = Experiment {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO experiments (id, name, description, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&experiment.id)
        .bind(&experiment.name)
        .bind(experiment.description.as_deref())
        .bind(experiment.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(experiment)
    }

    async fn list(&self) -> Result<Vec<Experiment>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, description, created_at
             FROM experiments
             ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(experiment_from_row).collect()
    }
}

fn experiment_from_row(row: SqliteRow) -> Result<Experiment, RepositoryError> {
    Ok(Experiment {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
