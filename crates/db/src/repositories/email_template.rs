use async_trait::async_trait;
use atelier_core::domain::email::{EmailTemplate, EmailTemplateGroup, EmailTemplateId};
use sqlx::{sqlite::SqliteRow, Row};

use super::{parse_timestamp, EmailTemplateRepository, RepositoryError};
use crate::DbPool;

const TEMPLATE_COLUMNS: &str =
    "id, group_id, name, subject, html_body, active, created_at, updated_at";

pub struct SqlEmailTemplateRepository {
    pool: DbPool,
}

impl SqlEmailTemplateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmailTemplateRepository for SqlEmailTemplateRepository {
    async fn list(&self) -> Result<Vec<EmailTemplate>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM email_templates ORDER BY name, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(template_from_row).collect()
    }

    async fn find_by_id(
        &self,
        id: &EmailTemplateId,
    ) -> Result<Option<EmailTemplate>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {TEMPLATE_COLUMNS} FROM email_templates WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(template_from_row).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<EmailTemplate>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {TEMPLATE_COLUMNS} FROM email_templates WHERE name = ?"))
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        row.as_ref().map(template_from_row).transpose()
    }

    async fn save(&self, template: EmailTemplate) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO email_templates
                (id, group_id, name, subject, html_body, active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                group_id = excluded.group_id,
                name = excluded.name,
                subject = excluded.subject,
                html_body = excluded.html_body,
                active = excluded.active,
                updated_at = excluded.updated_at",
        )
        .bind(&template.id.0)
        .bind(&template.group_id)
        .bind(&template.name)
        .bind(&template.subject)
        .bind(&template.html_body)
        .bind(template.active)
        .bind(template.created_at.to_rfc3339())
        .bind(template.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &EmailTemplateId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM email_templates WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_groups(&self) -> Result<Vec<EmailTemplateGroup>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, display_order FROM email_template_groups ORDER BY display_order, name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<EmailTemplateGroup, RepositoryError> {
                Ok(EmailTemplateGroup {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    display_order: row.try_get("display_order")?,
                })
            })
            .collect()
    }

    async fn save_group(&self, group: EmailTemplateGroup) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO email_template_groups (id, name, display_order)
             VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                display_order = excluded.display_order",
        )
        .bind(&group.id)
        .bind(&group.name)
        .bind(group.display_order)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn template_from_row(row: &SqliteRow) -> Result<EmailTemplate, RepositoryError> {
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(EmailTemplate {
        id: EmailTemplateId(row.try_get("id")?),
        group_id: row.try_get("group_id")?,
        name: row.try_get("name")?,
        subject: row.try_get("subject")?,
        html_body: row.try_get("html_body")?,
        active: row.try_get("active")?,
        created_at: parse_timestamp("created_at", created_at)?,
        updated_at: parse_timestamp("updated_at", updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use atelier_core::domain::email::{EmailTemplate, EmailTemplateGroup, EmailTemplateId};

    use super::SqlEmailTemplateRepository;
    use crate::repositories::{EmailTemplateRepository, RepositoryError};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid rfc3339").with_timezone(&Utc)
    }

    fn template(id: &str, name: &str, group_id: Option<&str>) -> EmailTemplate {
        EmailTemplate {
            id: EmailTemplateId(id.to_string()),
            group_id: group_id.map(str::to_string),
            name: name.to_string(),
            subject: "Order {{ order_number }}".to_string(),
            html_body: "<p>Thank you, {{ customer_name }}.</p>".to_string(),
            active: true,
            created_at: parse_ts("2026-03-01T09:00:00Z"),
            updated_at: parse_ts("2026-03-01T09:00:00Z"),
        }
    }

    #[tokio::test]
    async fn templates_support_create_update_and_delete() {
        let repo = SqlEmailTemplateRepository::new(setup_pool().await);
        repo.save_group(EmailTemplateGroup {
            id: "orders".to_string(),
            name: "Orders".to_string(),
            display_order: 0,
        })
        .await
        .expect("save group");

        let mut confirmation = template("tpl-1", "order_confirmation", Some("orders"));
        repo.save(confirmation.clone()).await.expect("create");
        repo.save(template("tpl-2", "abandoned_cart", None)).await.expect("create second");

        confirmation.subject = "Your order {{ order_number }}".to_string();
        confirmation.updated_at = parse_ts("2026-03-02T09:00:00Z");
        repo.save(confirmation.clone()).await.expect("update");

        let names: Vec<_> =
            repo.list().await.expect("list").into_iter().map(|template| template.name).collect();
        assert_eq!(names, vec!["abandoned_cart", "order_confirmation"]);
        assert_eq!(
            repo.find_by_name("order_confirmation").await.expect("find"),
            Some(confirmation.clone())
        );

        assert!(repo.delete(&confirmation.id).await.expect("delete"));
        assert_eq!(repo.find_by_id(&confirmation.id).await.expect("find"), None);
        assert_eq!(repo.list_groups().await.expect("groups").len(), 1);
    }

    #[tokio::test]
    async fn duplicate_template_names_are_rejected() {
        let repo = SqlEmailTemplateRepository::new(setup_pool().await);
        repo.save(template("tpl-1", "welcome", None)).await.expect("create");

        let error = repo.save(template("tpl-2", "welcome", None)).await.expect_err("duplicate");
        assert!(matches!(error, RepositoryError::Database(_)));
    }
}
