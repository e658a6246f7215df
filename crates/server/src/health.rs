use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use atelier_core::variants::FilenameService;
use atelier_db::{ping, DbPool};

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    filenames: Arc<FilenameService>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub catalog: HealthCheck,
    pub slug_cache: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, filenames: Arc<FilenameService>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, filenames })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let catalog = catalog_check(&state.db_pool).await;
    let ready = database.status == "ready" && catalog.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "atelier-server runtime initialized".to_string(),
        },
        database,
        catalog,
        slug_cache: slug_cache_check(&state.filenames),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match ping(pool).await {
        Ok(()) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

/// The customization endpoints need the catalog tables; an empty catalog is
/// still ready.
async fn catalog_check(pool: &DbPool) -> HealthCheck {
    let active: Result<i64, _> =
        sqlx::query_scalar("SELECT COUNT(1) FROM jewelry_items WHERE active = 1")
            .fetch_one(pool)
            .await;
    match active {
        Ok(count) => HealthCheck { status: "ready", detail: format!("{count} active product(s)") },
        Err(error) => HealthCheck {
            status: "degraded",
            detail: format!("catalog unavailable; run `atelier migrate`: {error}"),
        },
    }
}

fn slug_cache_check(filenames: &FilenameService) -> HealthCheck {
    HealthCheck {
        status: "ready",
        detail: format!("{} product type(s) cached", filenames.cache().len()),
    }
}
