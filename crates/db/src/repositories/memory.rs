use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use atelier_core::domain::customization::CustomizationSetting;
use atelier_core::domain::email::{EmailTemplate, EmailTemplateGroup, EmailTemplateId};
use atelier_core::domain::product::{Product, ProductId, ProductType};
use atelier_core::domain::rule::{LogicRule, RuleId};
use atelier_core::domain::site::SiteStyle;
use atelier_core::domain::variant::ProductVariant;
use atelier_core::sources::{
    CatalogSource, FilenameMappingSource, RuleSource, SlugKey, SourceError,
};

use super::{
    CustomizationRepository, EmailTemplateRepository, LogicRuleRepository, ProductRepository,
    RepositoryError, SiteSettingsRepository, VariantImageRepository,
};

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<HashMap<String, Product>>,
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.get(&id.0).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        let mut active: Vec<_> = products.values().filter(|product| product.active).cloned().collect();
        active.sort_by(|left, right| (&left.name, &left.id).cmp(&(&right.name, &right.id)));
        Ok(active)
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        products.insert(product.id.0.clone(), product);
        Ok(())
    }
}

/// Settings keyed by product. Also serves the catalog and filename views, so
/// it tracks the products it has seen.
#[derive(Default)]
pub struct InMemoryCustomizationRepository {
    products: RwLock<HashMap<String, Product>>,
    settings: RwLock<HashMap<String, Vec<CustomizationSetting>>>,
}

impl InMemoryCustomizationRepository {
    pub async fn put_product(&self, product: Product) {
        self.products.write().await.insert(product.id.0.clone(), product);
    }
}

#[async_trait]
impl CustomizationRepository for InMemoryCustomizationRepository {
    async fn settings_for_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<CustomizationSetting>, RepositoryError> {
        let settings = self.settings.read().await;
        let mut found = settings.get(&product_id.0).cloned().unwrap_or_default();
        found.sort_by(|left, right| (left.display_order, &left.id).cmp(&(right.display_order, &right.id)));
        for setting in &mut found {
            setting.options.sort_by(|left, right| {
                (left.display_order, &left.id).cmp(&(right.display_order, &right.id))
            });
        }
        Ok(found)
    }

    async fn save_setting(
        &self,
        product_id: &ProductId,
        setting: CustomizationSetting,
    ) -> Result<(), RepositoryError> {
        let mut settings = self.settings.write().await;
        let entry = settings.entry(product_id.0.clone()).or_default();
        match entry.iter_mut().find(|existing| existing.id == setting.id) {
            Some(existing) => *existing = setting,
            None => entry.push(setting),
        }
        Ok(())
    }

    async fn filename_slugs(
        &self,
        product_type: &ProductType,
    ) -> Result<HashMap<SlugKey, String>, RepositoryError> {
        let products = self.products.read().await;
        let settings = self.settings.read().await;

        let mut product_ids: Vec<_> = products
            .values()
            .filter(|product| &product.product_type == product_type)
            .map(|product| product.id.0.clone())
            .collect();
        product_ids.sort();

        let mut slugs = HashMap::new();
        for product_id in product_ids {
            for setting in settings.get(&product_id).into_iter().flatten() {
                for option in &setting.options {
                    let Some(slug) = option.filename_slug.as_deref().map(str::trim) else {
                        continue;
                    };
                    if slug.is_empty() {
                        continue;
                    }
                    slugs
                        .entry((setting.id.clone(), option.id.clone()))
                        .or_insert_with(|| slug.to_string());
                }
            }
        }
        Ok(slugs)
    }
}

#[async_trait]
impl CatalogSource for InMemoryCustomizationRepository {
    async fn product(&self, product_id: &ProductId) -> Result<Option<Product>, SourceError> {
        let products = self.products.read().await;
        Ok(products.get(&product_id.0).filter(|product| product.active).cloned())
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
impl FilenameMappingSource for InMemoryCustomizationRepository {
    async fn filename_slugs(
        &self,
        product_type: &ProductType,
    ) -> Result<HashMap<SlugKey, String>, SourceError> {
        Ok(CustomizationRepository::filename_slugs(self, product_type).await?)
    }
}

#[derive(Default)]
pub struct InMemoryLogicRuleRepository {
    rules: RwLock<Vec<LogicRule>>,
}

impl InMemoryLogicRuleRepository {
    async fn sorted_for(&self, product_id: &ProductId, active_only: bool) -> Vec<LogicRule> {
        let rules = self.rules.read().await;
        let mut found: Vec<_> = rules
            .iter()
            .filter(|rule| &rule.product_id == product_id && (!active_only || rule.active))
            .cloned()
            .collect();
        found.sort_by(|left, right| (left.created_at, &left.id.0).cmp(&(right.created_at, &right.id.0)));
        found
    }
}

#[async_trait]
impl LogicRuleRepository for InMemoryLogicRuleRepository {
    async fn list_for_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<LogicRule>, RepositoryError> {
        Ok(self.sorted_for(product_id, false).await)
    }

    async fn save(&self, rule: LogicRule) -> Result<(), RepositoryError> {
        let mut rules = self.rules.write().await;
        match rules.iter_mut().find(|existing| existing.id == rule.id) {
            Some(existing) => *existing = rule,
            None => rules.push(rule),
        }
        Ok(())
    }

    async fn delete(&self, id: &RuleId) -> Result<bool, RepositoryError> {
        let mut rules = self.rules.write().await;
        let before = rules.len();
        rules.retain(|rule| &rule.id != id);
        Ok(rules.len() != before)
    }
}

#[async_trait]
impl RuleSource for InMemoryLogicRuleRepository {
    async fn active_rules(&self, product_id: &ProductId) -> Result<Vec<LogicRule>, SourceError> {
        Ok(self.sorted_for(product_id, true).await)
    }
}

#[derive(Default)]
pub struct InMemoryEmailTemplateRepository {
    templates: RwLock<HashMap<String, EmailTemplate>>,
    groups: RwLock<HashMap<String, EmailTemplateGroup>>,
}

#[async_trait]
impl EmailTemplateRepository for InMemoryEmailTemplateRepository {
    async fn list(&self) -> Result<Vec<EmailTemplate>, RepositoryError> {
        let templates = self.templates.read().await;
        let mut all: Vec<_> = templates.values().cloned().collect();
        all.sort_by(|left, right| (&left.name, &left.id.0).cmp(&(&right.name, &right.id.0)));
        Ok(all)
    }

    async fn find_by_id(
        &self,
        id: &EmailTemplateId,
    ) -> Result<Option<EmailTemplate>, RepositoryError> {
        let templates = self.templates.read().await;
        Ok(templates.get(&id.0).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<EmailTemplate>, RepositoryError> {
        let templates = self.templates.read().await;
        Ok(templates.values().find(|template| template.name == name).cloned())
    }

    async fn save(&self, template: EmailTemplate) -> Result<(), RepositoryError> {
        let mut templates = self.templates.write().await;
        if templates
            .values()
            .any(|existing| existing.name == template.name && existing.id != template.id)
        {
            return Err(RepositoryError::Decode(format!(
                "email template name `{}` already exists",
                template.name
            )));
        }
        templates.insert(template.id.0.clone(), template);
        Ok(())
    }

    async fn delete(&self, id: &EmailTemplateId) -> Result<bool, RepositoryError> {
        let mut templates = self.templates.write().await;
        Ok(templates.remove(&id.0).is_some())
    }

    async fn list_groups(&self) -> Result<Vec<EmailTemplateGroup>, RepositoryError> {
        let groups = self.groups.read().await;
        let mut all: Vec<_> = groups.values().cloned().collect();
        all.sort_by(|left, right| (left.display_order, &left.name).cmp(&(right.display_order, &right.name)));
        Ok(all)
    }

    async fn save_group(&self, group: EmailTemplateGroup) -> Result<(), RepositoryError> {
        let mut groups = self.groups.write().await;
        groups.insert(group.id.clone(), group);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySiteSettingsRepository {
    style: RwLock<Option<SiteStyle>>,
}

#[async_trait]
impl SiteSettingsRepository for InMemorySiteSettingsRepository {
    async fn site_style(&self) -> Result<SiteStyle, RepositoryError> {
        Ok(self.style.read().await.clone().unwrap_or_default())
    }

    async fn save_site_style(&self, style: &SiteStyle) -> Result<(), RepositoryError> {
        *self.style.write().await = Some(style.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryVariantImageRepository {
    variants: RwLock<HashMap<String, Vec<ProductVariant>>>,
}

#[async_trait]
impl VariantImageRepository for InMemoryVariantImageRepository {
    async fn record(
        &self,
        product_id: &ProductId,
        variants: &[ProductVariant],
    ) -> Result<(), RepositoryError> {
        self.variants.write().await.insert(product_id.0.clone(), variants.to_vec());
        Ok(())
    }

    async fn list_for_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<ProductVariant>, RepositoryError> {
        Ok(self.variants.read().await.get(&product_id.0).cloned().unwrap_or_default())
    }
}
