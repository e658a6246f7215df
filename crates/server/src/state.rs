use std::sync::Arc;

use atelier_core::config::AppConfig;
use atelier_core::sources::{CatalogSource, RuleSource, StorageLister};
use atelier_core::variants::{FilenameService, SlugCache, VariantGenerator};
use atelier_db::repositories::{
    EmailTemplateRepository, SiteSettingsRepository, SqlCustomizationRepository,
    SqlEmailTemplateRepository, SqlLogicRuleRepository, SqlSiteSettingsRepository,
    SqlVariantImageRepository, VariantImageRepository,
};
use atelier_db::{DbPool, EmailDispatcher};

/// Services shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub catalog: Arc<dyn CatalogSource>,
    pub rules: Arc<dyn RuleSource>,
    pub filenames: Arc<FilenameService>,
    pub variants: Arc<VariantGenerator>,
    pub variant_images: Arc<dyn VariantImageRepository>,
    pub email_templates: Arc<dyn EmailTemplateRepository>,
    pub site_settings: Arc<dyn SiteSettingsRepository>,
    pub mailer: Arc<dyn EmailDispatcher>,
    pub email_from: String,
}

impl AppState {
    pub fn new(
        db_pool: DbPool,
        config: &AppConfig,
        storage: Arc<dyn StorageLister>,
        mailer: Arc<dyn EmailDispatcher>,
    ) -> Self {
        let customization = Arc::new(SqlCustomizationRepository::new(db_pool.clone()));
        let filenames = Arc::new(FilenameService::new(
            customization.clone(),
            SlugCache::with_system_clock(config.customization.slug_cache_ttl()),
        ));
        let variants = Arc::new(VariantGenerator::new(
            filenames.clone(),
            storage,
            config.storage.variant_bucket.clone(),
        ));

        Self {
            catalog: customization,
            rules: Arc::new(SqlLogicRuleRepository::new(db_pool.clone())),
            filenames,
            variants,
            variant_images: Arc::new(SqlVariantImageRepository::new(db_pool.clone())),
            email_templates: Arc::new(SqlEmailTemplateRepository::new(db_pool.clone())),
            site_settings: Arc::new(SqlSiteSettingsRepository::new(db_pool.clone())),
            mailer,
            email_from: config.email.from_address.clone(),
            db_pool,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use atelier_core::config::AppConfig;
    use atelier_db::{
        connect_with_settings, migrations, DemoCatalog, LocalStorageLister,
        RecordingEmailDispatcher,
    };
    use tempfile::TempDir;

    use super::AppState;

    pub struct TestApp {
        pub state: AppState,
        pub storage_root: TempDir,
        pub mailer: Arc<RecordingEmailDispatcher>,
    }

    impl TestApp {
        /// Writes an empty image file into the variant bucket.
        pub fn add_image(&self, folder: &str, name: &str) {
            let dir = self.storage_root.path().join("customization-item").join(folder);
            std::fs::create_dir_all(&dir).expect("create image folder");
            std::fs::write(dir.join(name), b"img").expect("write image");
        }
    }

    pub async fn test_app() -> TestApp {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        DemoCatalog::load(&pool).await.expect("load demo catalog");

        let storage_root = tempfile::tempdir().expect("tempdir");
        let mut config = AppConfig::default();
        config.storage.local_root = storage_root.path().to_path_buf();
        let mailer = Arc::new(RecordingEmailDispatcher::default());
        let state = AppState::new(
            pool,
            &config,
            Arc::new(LocalStorageLister::new(storage_root.path())),
            mailer.clone(),
        );

        TestApp { state, storage_root, mailer }
    }
}
