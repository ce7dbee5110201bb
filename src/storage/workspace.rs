use anyhow::{Context, Result};

use super::schema::Database;
use crate::draft::DraftState;

impl Database {
    // ========================================================================
    // Workspace Operations
    // ========================================================================

    /// Load the saved draft, if any.
    ///
    /// A snapshot that no longer deserializes is discarded with a warning so
    /// a stale workspace never blocks new work.
    pub async fn load_workspace(&self) -> Result<Option<DraftState>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT state FROM workspace WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        let Some((json,)) = row else {
            return Ok(None);
        };

        match serde_json::from_str(&json) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable workspace snapshot");
                Ok(None)
            }
        }
    }

    /// Replace the saved draft.
    pub async fn save_workspace(&self, state: &DraftState) -> Result<()> {
        let json = serde_json::to_string(state).context("Failed to serialize workspace")?;
        sqlx::query(
            r#"
            INSERT INTO workspace (id, state, updated_at)
            VALUES (1, ?, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at
        "#,
        )
        .bind(&json)
        .execute(&self.pool)
        .await?;

        tracing::debug!(bytes = json.len(), "Saved workspace");
        Ok(())
    }

    pub async fn clear_workspace(&self) -> Result<()> {
        sqlx::query("DELETE FROM workspace").execute(&self.pool).await?;
        Ok(())
    }
}
