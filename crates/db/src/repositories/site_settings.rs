use async_trait::async_trait;
use atelier_core::domain::site::SiteStyle;
use chrono::Utc;
use sqlx::Row;

use super::{RepositoryError, SiteSettingsRepository};
use crate::DbPool;

/// Key/value JSON documents edited from the admin console.
pub struct SqlSiteSettingsRepository {
    pool: DbPool,
}

impl SqlSiteSettingsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get_json(&self, key: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
        let row = sqlx::query("SELECT value_json FROM site_settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            let raw: String = row.try_get("value_json")?;
            serde_json::from_str(&raw).map_err(|error| {
                RepositoryError::Decode(format!("site setting `{key}` is not valid JSON: {error}"))
            })
        })
        .transpose()
    }

    pub async fn put_json(&self, key: &str, value: &serde_json::Value) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO site_settings (key, value_json, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                value_json = excluded.value_json,
                updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SiteSettingsRepository for SqlSiteSettingsRepository {
    async fn site_style(&self) -> Result<SiteStyle, RepositoryError> {
        match self.get_json(SiteStyle::SETTINGS_KEY).await? {
            Some(value) => serde_json::from_value(value).map_err(|error| {
                RepositoryError::Decode(format!("stored site style is malformed: {error}"))
            }),
            None => Ok(SiteStyle::default()),
        }
    }

    async fn save_site_style(&self, style: &SiteStyle) -> Result<(), RepositoryError> {
        let value = serde_json::to_value(style)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        self.put_json(SiteStyle::SETTINGS_KEY, &value).await
    }
}
