use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};

use super::schema::Database;
use crate::settings::WebsiteCredential;

#[derive(sqlx::FromRow)]
struct WebsiteRow {
    id: String,
    name: String,
    url: String,
    username: String,
    application_password: String,
}

impl WebsiteRow {
    fn into_credential(self) -> WebsiteCredential {
        WebsiteCredential {
            id: self.id,
            name: self.name,
            url: self.url,
            username: self.username,
            application_password: SecretString::from(self.application_password),
        }
    }
}

impl Database {
    // ========================================================================
    // Website Operations
    // ========================================================================

    /// All saved websites in the order they were added.
    pub async fn list_websites(&self) -> Result<Vec<WebsiteCredential>> {
        let rows = sqlx::query_as::<_, WebsiteRow>(
            r#"
            SELECT id, name, url, username, application_password
            FROM websites
            ORDER BY created_at, rowid
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(WebsiteRow::into_credential).collect())
    }

    /// Insert a website. Ids are unique; inserting an existing id is an error.
    pub async fn add_website(&self, site: &WebsiteCredential) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO websites (id, name, url, username, application_password, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(&site.id)
        .bind(&site.name)
        .bind(&site.url)
        .bind(&site.username)
        .bind(site.application_password.expose_secret())
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::info!(id = %site.id, name = %site.name, "Added website");
        Ok(())
    }

    /// Remove a website by id. Returns whether it existed.
    pub async fn remove_website(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM websites WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            tracing::info!(id = %id, "Removed website");
        }
        Ok(removed)
    }
}
