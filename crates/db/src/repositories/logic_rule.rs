use async_trait::async_trait;
use atelier_core::domain::product::ProductId;
use atelier_core::domain::rule::{LogicRule, RuleAction, RuleId};
use atelier_core::sources::{RuleSource, SourceError};
use sqlx::{sqlite::SqliteRow, Row};

use super::{parse_decimal, parse_timestamp, LogicRuleRepository, RepositoryError};
use crate::DbPool;

pub struct SqlLogicRuleRepository {
    pool: DbPool,
}

impl SqlLogicRuleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch(
        &self,
        product_id: &ProductId,
        active_only: bool,
    ) -> Result<Vec<LogicRule>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, product_id, name, condition_setting_id, condition_option_id, action_type,
                    target_setting_id, target_option_ids, price_multiplier, active, created_at
             FROM customization_logic_rules
             WHERE product_id = ? AND (? = 0 OR active = 1)
             ORDER BY created_at, id",
        )
        .bind(&product_id.0)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(rule_from_row).collect()
    }
}

#[async_trait]
impl LogicRuleRepository for SqlLogicRuleRepository {
    async fn list_for_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<LogicRule>, RepositoryError> {
        self.fetch(product_id, false).await
    }

    async fn save(&self, rule: LogicRule) -> Result<(), RepositoryError> {
        let target_option_ids = serde_json::to_string(&rule.target_option_ids)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO customization_logic_rules
                (id, product_id, name, condition_setting_id, condition_option_id, action_type,
                 target_setting_id, target_option_ids, price_multiplier, active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                condition_setting_id = excluded.condition_setting_id,
                condition_option_id = excluded.condition_option_id,
                action_type = excluded.action_type,
                target_setting_id = excluded.target_setting_id,
                target_option_ids = excluded.target_option_ids,
                price_multiplier = excluded.price_multiplier,
                active = excluded.active",
        )
        .bind(&rule.id.0)
        .bind(&rule.product_id.0)
        .bind(&rule.name)
        .bind(&rule.condition_setting_id)
        .bind(&rule.condition_option_id)
        .bind(rule.action.action_type())
        .bind(&rule.target_setting_id)
        .bind(target_option_ids)
        .bind(rule.action.multiplier().map(|multiplier| multiplier.to_string()))
        .bind(rule.active)
        .bind(rule.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &RuleId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM customization_logic_rules WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RuleSource for SqlLogicRuleRepository {
    async fn active_rules(&self, product_id: &ProductId) -> Result<Vec<LogicRule>, SourceError> {
        Ok(self.fetch(product_id, true).await?)
    }
}

fn rule_from_row(row: &SqliteRow) -> Result<LogicRule, RepositoryError> {
    let id: String = row.try_get("id")?;
    let action_type: String = row.try_get("action_type")?;
    let multiplier: Option<String> = row.try_get("price_multiplier")?;
    let target_option_ids: String = row.try_get("target_option_ids")?;
    let created_at: String = row.try_get("created_at")?;

    let multiplier =
        multiplier.map(|value| parse_decimal("price_multiplier", &value)).transpose()?;
    let action = RuleAction::from_parts(&action_type, multiplier)
        .map_err(|error| RepositoryError::Decode(format!("rule `{id}`: {error}")))?;
    let target_option_ids: Vec<String> = serde_json::from_str(&target_option_ids)
        .map_err(|error| {
            RepositoryError::Decode(format!("rule `{id}` has malformed target_option_ids: {error}"))
        })?;

    Ok(LogicRule {
        product_id: ProductId(row.try_get("product_id")?),
        name: row.try_get("name")?,
        condition_setting_id: row.try_get("condition_setting_id")?,
        condition_option_id: row.try_get("condition_option_id")?,
        action,
        target_setting_id: row.try_get("target_setting_id")?,
        target_option_ids,
        active: row.try_get("active")?,
        created_at: parse_timestamp("created_at", created_at)?,
        id: RuleId(id),
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;

    use atelier_core::domain::product::{Product, ProductId, ProductType};
    use atelier_core::domain::rule::{LogicRule, RuleAction, RuleId};
    use atelier_core::sources::{RuleSource, SourceError};

    use super::SqlLogicRuleRepository;
    use crate::repositories::{LogicRuleRepository, ProductRepository, SqlProductRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        SqlProductRepository::new(pool.clone())
            .save(Product {
                id: product_id(),
                name: "Classic Necklace".to_string(),
                product_type: ProductType::Necklace,
                base_price: Decimal::new(25_000, 2),
                category_id: None,
                active: true,
            })
            .await
            .expect("save product");
        pool
    }

    fn product_id() -> ProductId {
        ProductId("necklace-classic".to_string())
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid rfc3339").with_timezone(&Utc)
    }

    fn rule(id: &str, action: RuleAction, created_at: &str) -> LogicRule {
        LogicRule {
            id: RuleId(id.to_string()),
            product_id: product_id(),
            name: id.to_string(),
            condition_setting_id: "chain_type".to_string(),
            condition_option_id: "black_leather".to_string(),
            action,
            target_setting_id: "first_stone".to_string(),
            target_option_ids: vec!["ruby".to_string(), "emerald".to_string()],
            active: true,
            created_at: parse_ts(created_at),
        }
    }

    #[tokio::test]
    async fn rules_round_trip_with_every_action_shape() {
        let repo = SqlLogicRuleRepository::new(setup_pool().await);
        let rules = vec![
            rule("r1", RuleAction::ExcludeOptions, "2026-01-01T00:00:00Z"),
            rule("r2", RuleAction::SetRequirement { required: false }, "2026-01-01T00:01:00Z"),
            rule(
                "r3",
                RuleAction::SetPriceMultiplier { multiplier: Decimal::new(125, 2) },
                "2026-01-01T00:02:00Z",
            ),
            rule("r4", RuleAction::ProposeSelection, "2026-01-01T00:03:00Z"),
        ];
        for rule in rules.iter().rev() {
            repo.save(rule.clone()).await.expect("save rule");
        }

        let loaded = repo.list_for_product(&product_id()).await.expect("list rules");
        assert_eq!(loaded, rules);
    }

    #[tokio::test]
    async fn rule_source_returns_only_active_rules() {
        let repo = SqlLogicRuleRepository::new(setup_pool().await);
        let mut inactive = rule("inactive", RuleAction::ExcludeSetting, "2026-01-01T00:00:00Z");
        inactive.active = false;
        repo.save(inactive).await.expect("save inactive");
        repo.save(rule("active", RuleAction::AutoSelect, "2026-01-01T00:05:00Z"))
            .await
            .expect("save active");

        let active = repo.active_rules(&product_id()).await.expect("active rules");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id.0, "active");

        assert!(repo.delete(&RuleId("active".to_string())).await.expect("delete"));
        assert!(!repo.delete(&RuleId("active".to_string())).await.expect("delete again"));
    }

    #[tokio::test]
    async fn unknown_action_types_surface_as_decode_errors() {
        let pool = setup_pool().await;
        sqlx::query(
            "INSERT INTO customization_logic_rules
                (id, product_id, name, condition_setting_id, condition_option_id, action_type,
                 target_setting_id, target_option_ids, active, created_at)
             VALUES ('bad', 'necklace-classic', 'bad', 'metal', 'white_gold', 'explode',
                     'metal', '[]', 1, '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("insert malformed rule");

        let repo = SqlLogicRuleRepository::new(pool);
        let error = repo.active_rules(&product_id()).await.expect_err("decode should fail");
        assert!(matches!(error, SourceError::Decode(message) if message.contains("explode")));
    }
}
