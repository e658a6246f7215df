use crate::connection::DbPool;
use crate::repositories::RepositoryError;
use sqlx::Executor;

const DEMO_PRODUCT_IDS: &[&str] = &["necklace-classic", "ring-solitaire"];
const DEMO_CATEGORY_IDS: &[&str] = &["cat-necklaces", "cat-rings"];
const DEMO_TEMPLATE_IDS: &[&str] = &["tpl-order-confirmation"];
const DEMO_TEMPLATE_GROUP_IDS: &[&str] = &["orders"];

/// Row counts the demo catalog must produce, per table.
const EXPECTED_COUNTS: &[(&str, &str, i64)] = &[
    ("products", "SELECT COUNT(1) FROM jewelry_items WHERE id IN {products}", 2),
    (
        "settings",
        "SELECT COUNT(1) FROM customization_settings WHERE product_id IN {products}",
        8,
    ),
    ("options", "SELECT COUNT(1) FROM customization_options WHERE product_id IN {products}", 19),
    (
        "active-rules",
        "SELECT COUNT(1) FROM customization_logic_rules WHERE product_id IN {products} AND active = 1",
        5,
    ),
    ("templates", "SELECT COUNT(1) FROM email_templates WHERE id IN {templates}", 1),
    ("site-style", "SELECT COUNT(1) FROM site_settings WHERE key = 'site_style'", 1),
];

/// Deterministic storefront catalog used by local development, the `seed`
/// command and integration tests.
pub struct DemoCatalog;

impl DemoCatalog {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_catalog.sql");
    pub const NECKLACE_ID: &str = "necklace-classic";
    pub const RING_ID: &str = "ring-solitaire";

    /// Loads the demo rows. Existing rows with the same keys are left alone.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult { product_ids: DEMO_PRODUCT_IDS.to_vec() })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let products = sql_array_from_ids(DEMO_PRODUCT_IDS);
        let templates = sql_array_from_ids(DEMO_TEMPLATE_IDS);

        let mut checks = Vec::with_capacity(EXPECTED_COUNTS.len());
        for (label, query, expected) in EXPECTED_COUNTS {
            let query = query.replace("{products}", &products).replace("{templates}", &templates);
            let count: i64 = sqlx::query_scalar(&query).fetch_one(pool).await?;
            checks.push((*label, count == *expected));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the demo rows. Settings, options, rules and recorded variants
    /// go with their product.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let products = sql_array_from_ids(DEMO_PRODUCT_IDS);
        let categories = sql_array_from_ids(DEMO_CATEGORY_IDS);
        let templates = sql_array_from_ids(DEMO_TEMPLATE_IDS);
        let groups = sql_array_from_ids(DEMO_TEMPLATE_GROUP_IDS);

        for statement in [
            format!("DELETE FROM customization_logic_rules WHERE product_id IN {products}"),
            format!("DELETE FROM customization_options WHERE product_id IN {products}"),
            format!("DELETE FROM customization_settings WHERE product_id IN {products}"),
            format!("DELETE FROM variant_images WHERE product_id IN {products}"),
            format!("DELETE FROM jewelry_items WHERE id IN {products}"),
            format!("DELETE FROM product_categories WHERE id IN {categories}"),
            format!("DELETE FROM email_templates WHERE id IN {templates}"),
            format!("DELETE FROM email_template_groups WHERE id IN {groups}"),
            "DELETE FROM site_settings WHERE key = 'site_style'".to_string(),
        ] {
            sqlx::query(&statement).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(", ");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub product_ids: Vec<&'static str>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
