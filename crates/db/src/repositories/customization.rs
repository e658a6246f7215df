use std::collections::HashMap;

use async_trait::async_trait;
use atelier_core::domain::customization::{CustomizationOption, CustomizationSetting, SettingKind};
use atelier_core::domain::product::{Product, ProductId, ProductType};
use atelier_core::sources::{CatalogSource, FilenameMappingSource, SlugKey, SourceError};
use sqlx::{sqlite::SqliteRow, Row};

use super::product::product_from_row;
use super::{parse_decimal, CustomizationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCustomizationRepository {
    pool: DbPool,
}

impl SqlCustomizationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomizationRepository for SqlCustomizationRepository {
    async fn settings_for_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<CustomizationSetting>, RepositoryError> {
        let setting_rows = sqlx::query(
            "SELECT setting_id, title, required, affects_image_variant, kind, display_order
             FROM customization_settings
             WHERE product_id = ?
             ORDER BY display_order, setting_id",
        )
        .bind(&product_id.0)
        .fetch_all(&self.pool)
        .await?;

        let option_rows = sqlx::query(
            "SELECT setting_id, option_id, name, price, price_lab_grown, image_url, color_hex,
                    filename_slug, active, display_order
             FROM customization_options
             WHERE product_id = ?
             ORDER BY display_order, option_id",
        )
        .bind(&product_id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut settings =
            setting_rows.iter().map(setting_from_row).collect::<Result<Vec<_>, _>>()?;
        for row in &option_rows {
            let option = option_from_row(row)?;
            match settings.iter_mut().find(|setting| setting.id == option.setting_id) {
                Some(setting) => setting.options.push(option),
                None => {
                    return Err(RepositoryError::Decode(format!(
                        "option `{}` references unknown setting `{}`",
                        option.id, option.setting_id
                    )))
                }
            }
        }

        Ok(settings)
    }

    async fn save_setting(
        &self,
        product_id: &ProductId,
        setting: CustomizationSetting,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO customization_settings
                (product_id, setting_id, title, required, affects_image_variant, kind, display_order)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(product_id, setting_id) DO UPDATE SET
                title = excluded.title,
                required = excluded.required,
                affects_image_variant = excluded.affects_image_variant,
                kind = excluded.kind,
                display_order = excluded.display_order",
        )
        .bind(&product_id.0)
        .bind(&setting.id)
        .bind(&setting.title)
        .bind(setting.required)
        .bind(setting.affects_image_variant)
        .bind(kind_as_str(setting.kind))
        .bind(setting.display_order)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM customization_options WHERE product_id = ? AND setting_id = ?")
            .bind(&product_id.0)
            .bind(&setting.id)
            .execute(&mut *tx)
            .await?;

        for option in &setting.options {
            sqlx::query(
                "INSERT INTO customization_options
                    (product_id, setting_id, option_id, name, price, price_lab_grown, image_url,
                     color_hex, filename_slug, active, display_order)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&product_id.0)
            .bind(&setting.id)
            .bind(&option.id)
            .bind(&option.name)
            .bind(option.price.to_string())
            .bind(option.price_lab_grown.map(|price| price.to_string()))
            .bind(&option.image_url)
            .bind(&option.color_hex)
            .bind(&option.filename_slug)
            .bind(option.active)
            .bind(option.display_order)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn filename_slugs(
        &self,
        product_type: &ProductType,
    ) -> Result<HashMap<SlugKey, String>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT o.setting_id, o.option_id, o.filename_slug
             FROM customization_options o
             JOIN jewelry_items p ON p.id = o.product_id
             WHERE p.product_type = ?
               AND o.filename_slug IS NOT NULL
               AND TRIM(o.filename_slug) <> ''
             ORDER BY p.id",
        )
        .bind(product_type.slug())
        .fetch_all(&self.pool)
        .await?;

        let mut slugs = HashMap::with_capacity(rows.len());
        for row in &rows {
            let key: SlugKey = (row.try_get("setting_id")?, row.try_get("option_id")?);
            let slug: String = row.try_get("filename_slug")?;
            slugs.entry(key).or_insert(slug);
        }
        Ok(slugs)
    }
}

#[async_trait]
impl CatalogSource for SqlCustomizationRepository {
    async fn product(&self, product_id: &ProductId) -> Result<Option<Product>, SourceError> {
        let row = sqlx::query(
            "SELECT id, name, product_type, base_price, category_id, active
             FROM jewelry_items
             WHERE id = ? AND active = 1",
        )
        .bind(&product_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.as_ref().map(product_from_row).transpose()?)
    }

    async fn settings_for_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<CustomizationSetting>, SourceError> {
        let mut settings =
            CustomizationRepository::settings_for_product(self, product_id).await?;
        for setting in &mut settings {
            setting.options.retain(|option| option.active);
        }
        Ok(settings)
    }
}

#[async_trait]
impl FilenameMappingSource for SqlCustomizationRepository {
    async fn filename_slugs(
        &self,
        product_type: &ProductType,
    ) -> Result<HashMap<SlugKey, String>, SourceError> {
        Ok(CustomizationRepository::filename_slugs(self, product_type).await?)
    }
}

fn kind_as_str(kind: SettingKind) -> &'static str {
    match kind {
        SettingKind::Options => "options",
        SettingKind::Text => "text",
    }
}

fn setting_from_row(row: &SqliteRow) -> Result<CustomizationSetting, RepositoryError> {
    let kind: String = row.try_get("kind")?;
    Ok(CustomizationSetting {
        id: row.try_get("setting_id")?,
        title: row.try_get("title")?,
        required: row.try_get("required")?,
        affects_image_variant: row.try_get("affects_image_variant")?,
        kind: match kind.as_str() {
            "options" => SettingKind::Options,
            "text" => SettingKind::Text,
            other => return Err(RepositoryError::Decode(format!("invalid setting kind: {other}"))),
        },
        display_order: row.try_get("display_order")?,
        options: Vec::new(),
    })
}

fn option_from_row(row: &SqliteRow) -> Result<CustomizationOption, RepositoryError> {
    let price: String = row.try_get("price")?;
    let price_lab_grown: Option<String> = row.try_get("price_lab_grown")?;

    Ok(CustomizationOption {
        id: row.try_get("option_id")?,
        setting_id: row.try_get("setting_id")?,
        name: row.try_get("name")?,
        price: parse_decimal("price", &price)?,
        price_lab_grown: price_lab_grown
            .map(|value| parse_decimal("price_lab_grown", &value))
            .transpose()?,
        image_url: row.try_get("image_url")?,
        color_hex: row.try_get("color_hex")?,
        filename_slug: row.try_get("filename_slug")?,
        active: row.try_get("active")?,
        display_order: row.try_get("display_order")?,
    })
}
