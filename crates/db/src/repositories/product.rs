use atelier_core::domain::product::{Product, ProductId, ProductType};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use super::{parse_decimal, ProductRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, product_type, base_price, category_id, active
             FROM jewelry_items
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn list_active(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, product_type, base_price, category_id, active
             FROM jewelry_items
             WHERE active = 1
             ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(product_from_row).collect()
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO jewelry_items (id, name, product_type, base_price, category_id, active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                product_type = excluded.product_type,
                base_price = excluded.base_price,
                category_id = excluded.category_id,
                active = excluded.active",
        )
        .bind(&product.id.0)
        .bind(&product.name)
        .bind(product.product_type.slug())
        .bind(product.base_price.to_string())
        .bind(&product.category_id)
        .bind(product.active)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

pub(crate) fn product_from_row(row: &SqliteRow) -> Result<Product, RepositoryError> {
    let product_type: String = row.try_get("product_type")?;
    let base_price: String = row.try_get("base_price")?;

    Ok(Product {
        id: ProductId(row.try_get("id")?),
        name: row.try_get("name")?,
        product_type: product_type.parse::<ProductType>().map_err(|error| {
            RepositoryError::Decode(format!("invalid product_type `{product_type}`: {error}"))
        })?,
        base_price: parse_decimal("base_price", &base_price)?,
        category_id: row.try_get("category_id")?,
        active: row.try_get("active")?,
    })
}
