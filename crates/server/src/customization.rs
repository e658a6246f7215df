//! Storefront customization endpoints.
//!
//! - `POST /api/products/{product_id}/customization/evaluate`
//! - `GET  /api/products/{product_id}/variants`

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use atelier_core::customization::rules::LogicRulesEngine;
use atelier_core::domain::customization::{CustomizationSetting, CustomizationState};
use atelier_core::domain::product::{Product, ProductId};
use atelier_core::domain::variant::ProductVariant;
use atelier_core::variants::VariantGenerationStats;
use atelier_core::{evaluate_customization, CustomizationEvaluation};

use crate::error::{not_found, source_failure, ApiFailure};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct EvaluateRequest {
    #[serde(default)]
    pub selections: CustomizationState,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub product_id: ProductId,
    #[serde(flatten)]
    pub evaluation: CustomizationEvaluation,
    /// Pre-rendered image for the effective selections, when one exists.
    pub image_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VariantsResponse {
    pub product_id: ProductId,
    pub variants: Vec<ProductVariant>,
    pub stats: VariantGenerationStats,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/products/{product_id}/customization/evaluate", post(evaluate))
        .route("/api/products/{product_id}/variants", get(list_variants))
        .with_state(state)
}

async fn load_product(
    state: &AppState,
    product_id: &ProductId,
) -> Result<(Product, Vec<CustomizationSetting>), ApiFailure> {
    let product = state
        .catalog
        .product(product_id)
        .await
        .map_err(source_failure)?
        .ok_or_else(|| not_found(format!("product `{product_id}` was not found")))?;
    let settings = state.catalog.settings_for_product(product_id).await.map_err(source_failure)?;
    Ok((product, settings))
}

async fn evaluate(
    Path(product_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, ApiFailure> {
    let product_id = ProductId(product_id);
    let (product, settings) = load_product(&state, &product_id).await?;
    let engine = LogicRulesEngine::load(state.rules.as_ref(), &product_id).await;

    let evaluation = evaluate_customization(&engine, &product, &settings, &body.selections);
    let image_path = state
        .variants
        .resolve_variant_image(&engine, &product, &settings, &evaluation.selections.state)
        .await;

    Ok(Json(EvaluateResponse { product_id, evaluation, image_path }))
}

async fn list_variants(
    Path(product_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<VariantsResponse>, ApiFailure> {
    let product_id = ProductId(product_id);
    let (product, settings) = load_product(&state, &product_id).await?;
    let engine = LogicRulesEngine::load(state.rules.as_ref(), &product_id).await;

    let (variants, stats) =
        state.variants.generate_variants_with_stats(&engine, &product, &settings).await;

    if let Err(error) = state.variant_images.record(&product_id, &variants).await {
        warn!(
            event_name = "variants.record_failed",
            product_id = %product_id,
            error = %error,
            "failed to record variant snapshot"
        );
    } else {
        info!(
            event_name = "variants.recorded",
            product_id = %product_id,
            variant_count = variants.len(),
            "variant snapshot recorded"
        );
    }

    Ok(Json(VariantsResponse { product_id, variants, stats }))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        extract::{Path, State},
        http::{Request, StatusCode},
        Json,
    };
    use rust_decimal::Decimal;
    use tower::ServiceExt;

    use atelier_core::customization::selection::SelectionSource;
    use atelier_core::domain::customization::CustomizationState;
    use atelier_core::domain::product::ProductId;
    use atelier_db::repositories::VariantImageRepository;
    use atelier_db::DemoCatalog;

    use super::{evaluate, list_variants, router, EvaluateRequest};
    use crate::state::test_support::test_app;

    #[tokio::test]
    async fn onyx_selection_pairs_leather_and_proposes_white_gold() {
        let app = test_app().await;
        app.add_image("necklace", "necklace-leather-onyx-wg.webp");

        let Json(response) = evaluate(
            Path(DemoCatalog::NECKLACE_ID.to_string()),
            State(app.state.clone()),
            Json(EvaluateRequest {
                selections: CustomizationState::new().with("first_stone", "black_onyx"),
            }),
        )
        .await
        .expect("evaluate");

        let selections = &response.evaluation.selections;
        assert_eq!(selections.state.get("chain_type"), Some("black_leather"));
        assert_eq!(selections.source_of("chain_type"), Some(SelectionSource::SpecialCase));
        assert_eq!(selections.state.get("metal"), Some("white_gold"));
        assert_eq!(selections.source_of("metal"), Some(SelectionSource::Proposed));

        let chains: Vec<_> = response
            .evaluation
            .rules
            .setting("chain_type")
            .expect("chain setting")
            .options
            .iter()
            .map(|option| option.id.as_str())
            .collect();
        assert_eq!(chains, vec!["cable", "black_leather"]);

        assert!(response.evaluation.validation.valid);
        assert_eq!(response.evaluation.price.total, Decimal::new(29_000, 2));
        assert_eq!(response.image_path.as_deref(), Some("necklace/necklace-leather-onyx-wg.webp"));
    }

    #[tokio::test]
    async fn missing_required_selections_are_reported() {
        let app = test_app().await;

        let Json(response) = evaluate(
            Path(DemoCatalog::NECKLACE_ID.to_string()),
            State(app.state.clone()),
            Json(EvaluateRequest {
                selections: CustomizationState::new().with("first_stone", "diamond"),
            }),
        )
        .await
        .expect("evaluate");

        let missing: Vec<_> = response
            .evaluation
            .validation
            .violations
            .iter()
            .map(|violation| violation.setting_id.as_str())
            .collect();
        assert_eq!(missing, vec!["chain_type", "metal", "diamond_origin"]);
        assert_eq!(response.image_path, None);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let app = test_app().await;

        let error = evaluate(
            Path("necklace-missing".to_string()),
            State(app.state.clone()),
            Json(EvaluateRequest::default()),
        )
        .await
        .expect_err("missing product");
        assert_eq!(error.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn variants_respect_rules_and_mark_stored_images() {
        let app = test_app().await;
        app.add_image("necklace", "necklace-cable-ruby-emerald-wg.webp");
        app.add_image("necklace", "necklace-rope-ruby-rg.PNG");

        let Json(response) =
            list_variants(Path(DemoCatalog::NECKLACE_ID.to_string()), State(app.state.clone()))
                .await
                .expect("variants");

        assert_eq!(response.stats.combinations, 72);
        assert_eq!(response.stats.rejected_by_rules, 12);
        assert_eq!(response.variants.len(), 60);
        assert_eq!(response.stats.existing_images, 2);

        let stored: Vec<_> = response
            .variants
            .iter()
            .filter(|variant| variant.exists)
            .filter_map(|variant| variant.image_path.as_deref())
            .collect();
        assert_eq!(
            stored,
            vec!["necklace/necklace-cable-ruby-emerald-wg.webp", "necklace/necklace-rope-ruby-rg.PNG"]
        );

        let recorded = app
            .state
            .variant_images
            .list_for_product(&ProductId(DemoCatalog::NECKLACE_ID.to_string()))
            .await
            .expect("recorded variants");
        assert_eq!(recorded.len(), 60);
    }

    #[tokio::test]
    async fn router_serves_variant_listing() {
        let app = test_app().await;

        let response = router(app.state.clone())
            .oneshot(
                Request::builder()
                    .uri("/api/products/ring-solitaire/variants")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
    }
}
