use async_trait::async_trait;
use atelier_core::domain::product::ProductId;
use atelier_core::domain::variant::{ProductVariant, VariantOption};
use chrono::Utc;
use sqlx::Row;
use tracing::warn;

use super::{RepositoryError, VariantImageRepository};
use crate::DbPool;

/// Snapshot of the last generated variant list per product, kept for the
/// admin image-coverage report.
pub struct SqlVariantImageRepository {
    pool: DbPool,
}

impl SqlVariantImageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VariantImageRepository for SqlVariantImageRepository {
    async fn record(
        &self,
        product_id: &ProductId,
        variants: &[ProductVariant],
    ) -> Result<(), RepositoryError> {
        let recorded_at = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM variant_images WHERE product_id = ?")
            .bind(&product_id.0)
            .execute(&mut *tx)
            .await?;

        let mut collapsed = 0usize;
        for variant in variants {
            let options_json = serde_json::to_string(&variant.options)
                .map_err(|error| RepositoryError::Decode(error.to_string()))?;
            let inserted = sqlx::query(
                "INSERT INTO variant_images
                    (product_id, filename, display_name, options_json, image_path, image_exists, recorded_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(product_id, filename) DO NOTHING",
            )
            .bind(&product_id.0)
            .bind(&variant.filename)
            .bind(&variant.display_name)
            .bind(options_json)
            .bind(&variant.image_path)
            .bind(variant.exists)
            .bind(&recorded_at)
            .execute(&mut *tx)
            .await?;
            if inserted.rows_affected() == 0 {
                collapsed += 1;
                warn!(
                    event_name = "variants.snapshot.collapsed",
                    product_id = %product_id.0,
                    filename = %variant.filename,
                    display_name = %variant.display_name,
                    "variant shares a filename with an earlier variant; keeping the first"
                );
            }
        }

        tx.commit().await?;
        if collapsed > 0 {
            warn!(
                event_name = "variants.snapshot.recorded_with_collapses",
                product_id = %product_id.0,
                variant_count = variants.len(),
                collapsed,
                "variant snapshot recorded with shared filenames"
            );
        }
        Ok(())
    }

    async fn list_for_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<ProductVariant>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT filename, display_name, options_json, image_path, image_exists
             FROM variant_images
             WHERE product_id = ?
             ORDER BY rowid",
        )
        .bind(&product_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<ProductVariant, RepositoryError> {
                let filename: String = row.try_get("filename")?;
                let options_json: String = row.try_get("options_json")?;
                let options: Vec<VariantOption> =
                    serde_json::from_str(&options_json).map_err(|error| {
                        RepositoryError::Decode(format!(
                            "variant `{filename}` has malformed options: {error}"
                        ))
                    })?;
                Ok(ProductVariant {
                    options,
                    display_name: row.try_get("display_name")?,
                    filename,
                    image_path: row.try_get("image_path")?,
                    exists: row.try_get("image_exists")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use atelier_core::domain::product::{Product, ProductId, ProductType};
    use atelier_core::domain::variant::{ProductVariant, VariantOption};

    use super::SqlVariantImageRepository;
    use crate::repositories::{ProductRepository, SqlProductRepository, VariantImageRepository};
    use crate::{connect_with_settings, migrations};

    fn variant(chain: &str, exists: bool) -> ProductVariant {
        let filename = format!("necklace-{chain}.webp");
        ProductVariant {
            options: vec![VariantOption {
                setting_id: "chain_type".to_string(),
                setting_title: "Chain".to_string(),
                option_id: chain.to_string(),
                option_name: chain.replace('_', " "),
            }],
            display_name: format!("Classic Necklace - {}", chain.replace('_', " ")),
            image_path: exists.then(|| format!("necklace/{filename}")),
            filename,
            exists,
        }
    }

    async fn repository() -> (SqlVariantImageRepository, ProductId) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        let product_id = ProductId("necklace-classic".to_string());
        SqlProductRepository::new(pool.clone())
            .save(Product {
                id: product_id.clone(),
                name: "Classic Necklace".to_string(),
                product_type: ProductType::Necklace,
                base_price: Decimal::new(25_000, 2),
                category_id: None,
                active: true,
            })
            .await
            .expect("save product");
        (SqlVariantImageRepository::new(pool), product_id)
    }

    #[tokio::test]
    async fn recording_replaces_the_previous_snapshot() {
        let (repo, product_id) = repository().await;

        repo.record(&product_id, &[variant("cable", true), variant("rope", false)])
            .await
            .expect("record");
        let latest = vec![variant("black_leather", true)];
        repo.record(&product_id, &latest).await.expect("record again");

        assert_eq!(repo.list_for_product(&product_id).await.expect("list"), latest);
    }

    #[tokio::test]
    async fn variants_sharing_a_filename_keep_the_first_row() {
        let (repo, product_id) = repository().await;
        let first = variant("cable", true);
        let mut twin = variant("rope", false);
        twin.filename = first.filename.clone();

        repo.record(&product_id, &[first.clone(), twin, variant("black_leather", false)])
            .await
            .expect("record with shared filename");

        let stored = repo.list_for_product(&product_id).await.expect("list");
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0], first);
        assert_eq!(stored[1].filename, "necklace-black_leather.webp");
    }
}
