//! Back-office endpoints for the admin console.
//!
//! - `GET|POST /api/admin/email/templates`
//! - `PUT|DELETE /api/admin/email/templates/{id}`
//! - `POST /api/admin/email/send`
//! - `GET|POST /api/admin/site-style`
//! - `POST /api/admin/filename-mappings/refresh`

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use atelier_core::domain::email::{EmailTemplate, EmailTemplateGroup, EmailTemplateId};
use atelier_core::domain::product::ProductType;
use atelier_core::domain::site::SiteStyle;
use atelier_core::errors::ApplicationError;
use atelier_db::{send_templated_email, EmailError};

use crate::error::{
    application_failure, bad_request, conflict, not_found, repository_failure, ApiError,
    ApiFailure,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TemplatePayload {
    pub name: String,
    pub subject: String,
    pub html_body: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl TemplatePayload {
    fn validate(&self) -> Result<(), ApiFailure> {
        for (field, value) in
            [("name", &self.name), ("subject", &self.subject), ("html_body", &self.html_body)]
        {
            if value.trim().is_empty() {
                return Err(bad_request(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    pub templates: Vec<EmailTemplate>,
    pub groups: Vec<EmailTemplateGroup>,
}

#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    pub template_name: String,
    pub to: String,
    #[serde(default = "empty_variables")]
    pub variables: serde_json::Value,
}

fn empty_variables() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

#[derive(Debug, Serialize)]
pub struct SendEmailResponse {
    pub to: String,
    pub subject: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub refreshed_product_types: Vec<ProductType>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/admin/email/templates", get(list_templates).post(create_template))
        .route("/api/admin/email/templates/{id}", put(update_template).delete(delete_template))
        .route("/api/admin/email/send", post(send_email))
        .route("/api/admin/site-style", get(get_site_style).post(save_site_style))
        .route("/api/admin/filename-mappings/refresh", post(refresh_filename_mappings))
        .with_state(state)
}

async fn list_templates(
    State(state): State<AppState>,
) -> Result<Json<TemplateListResponse>, ApiFailure> {
    let templates = state.email_templates.list().await.map_err(repository_failure)?;
    let groups = state.email_templates.list_groups().await.map_err(repository_failure)?;
    Ok(Json(TemplateListResponse { templates, groups }))
}

async fn ensure_name_available(
    state: &AppState,
    name: &str,
    id: Option<&EmailTemplateId>,
) -> Result<(), ApiFailure> {
    let existing = state.email_templates.find_by_name(name).await.map_err(repository_failure)?;
    match existing {
        Some(template) if Some(&template.id) != id => {
            Err(conflict(format!("an email template named `{name}` already exists")))
        }
        _ => Ok(()),
    }
}

async fn create_template(
    State(state): State<AppState>,
    Json(body): Json<TemplatePayload>,
) -> Result<(StatusCode, Json<EmailTemplate>), ApiFailure> {
    body.validate()?;
    let name = body.name.trim().to_string();
    ensure_name_available(&state, &name, None).await?;

    let now = Utc::now();
    let template = EmailTemplate {
        id: EmailTemplateId(format!("tpl-{}", Uuid::new_v4().simple())),
        group_id: body.group_id,
        name,
        subject: body.subject,
        html_body: body.html_body,
        active: body.active,
        created_at: now,
        updated_at: now,
    };
    state.email_templates.save(template.clone()).await.map_err(repository_failure)?;

    info!(
        event_name = "admin.email_template.created",
        template_id = %template.id.0,
        template_name = %template.name,
        "email template created"
    );
    Ok((StatusCode::CREATED, Json(template)))
}

async fn update_template(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<TemplatePayload>,
) -> Result<Json<EmailTemplate>, ApiFailure> {
    body.validate()?;
    let id = EmailTemplateId(id);
    let existing = state
        .email_templates
        .find_by_id(&id)
        .await
        .map_err(repository_failure)?
        .ok_or_else(|| not_found(format!("email template `{}` was not found", id.0)))?;
    let name = body.name.trim().to_string();
    ensure_name_available(&state, &name, Some(&id)).await?;

    let template = EmailTemplate {
        group_id: body.group_id,
        name,
        subject: body.subject,
        html_body: body.html_body,
        active: body.active,
        updated_at: Utc::now(),
        ..existing
    };
    state.email_templates.save(template.clone()).await.map_err(repository_failure)?;

    info!(
        event_name = "admin.email_template.updated",
        template_id = %template.id.0,
        "email template updated"
    );
    Ok(Json(template))
}

async fn delete_template(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiFailure> {
    let id = EmailTemplateId(id);
    let deleted = state.email_templates.delete(&id).await.map_err(repository_failure)?;
    if !deleted {
        return Err(not_found(format!("email template `{}` was not found", id.0)));
    }

    info!(event_name = "admin.email_template.deleted", template_id = %id.0, "email template deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn email_failure(error: EmailError) -> ApiFailure {
    match error {
        EmailError::TemplateNotFound(_) => not_found(error.to_string()),
        EmailError::TemplateInactive(_) | EmailError::Render(_) => bad_request(error.to_string()),
        EmailError::Repository(error) => repository_failure(error),
        EmailError::Disabled => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError {
                error: error.to_string(),
                correlation_id: crate::error::correlation_id(),
            }),
        ),
        EmailError::Request(_) | EmailError::Rejected { .. } => {
            let (_, Json(body)) =
                application_failure(ApplicationError::Integration(error.to_string()));
            (
                StatusCode::BAD_GATEWAY,
                Json(ApiError {
                    error: error.kind().user_message().to_string(),
                    correlation_id: body.correlation_id,
                }),
            )
        }
    }
}

async fn send_email(
    State(state): State<AppState>,
    Json(body): Json<SendEmailRequest>,
) -> Result<Json<SendEmailResponse>, ApiFailure> {
    if !body.to.contains('@') {
        return Err(bad_request("to must be an email address"));
    }

    let message = send_templated_email(
        state.email_templates.as_ref(),
        state.mailer.as_ref(),
        &body.template_name,
        &body.to,
        &state.email_from,
        &body.variables,
    )
    .await
    .map_err(email_failure)?;

    Ok(Json(SendEmailResponse { to: message.to, subject: message.subject }))
}

async fn get_site_style(State(state): State<AppState>) -> Result<Json<SiteStyle>, ApiFailure> {
    state.site_settings.site_style().await.map(Json).map_err(repository_failure)
}

async fn save_site_style(
    State(state): State<AppState>,
    Json(style): Json<SiteStyle>,
) -> Result<Json<SiteStyle>, ApiFailure> {
    style.validate().map_err(|error| application_failure(error.into()))?;
    state.site_settings.save_site_style(&style).await.map_err(repository_failure)?;

    info!(event_name = "admin.site_style.saved", "site style saved");
    Ok(Json(style))
}

/// Called after option slugs change in the admin console.
async fn refresh_filename_mappings(State(state): State<AppState>) -> Json<RefreshResponse> {
    let refreshed_product_types = state.filenames.refresh_after_db_change().await;
    Json(RefreshResponse { refreshed_product_types })
}

#[cfg(test)]
mod tests {
    use axum::{
        extract::{Path, State},
        http::StatusCode,
        Json,
    };
    use serde_json::json;

    use atelier_core::domain::product::ProductType;
    use atelier_core::domain::site::SiteStyle;

    use super::{
        create_template, delete_template, get_site_style, list_templates,
        refresh_filename_mappings, save_site_style, send_email, update_template,
        SendEmailRequest, TemplatePayload,
    };
    use crate::state::test_support::test_app;

    fn payload(name: &str) -> TemplatePayload {
        TemplatePayload {
            name: name.to_string(),
            subject: "Your {{ item }} shipped".to_string(),
            html_body: "<p>{{ item }} is on its way</p>".to_string(),
            group_id: Some("orders".to_string()),
            active: true,
        }
    }

    #[tokio::test]
    async fn templates_can_be_created_updated_and_deleted() {
        let app = test_app().await;

        let (status, Json(created)) =
            create_template(State(app.state.clone()), Json(payload("shipping_notice")))
                .await
                .expect("create");
        assert_eq!(status, StatusCode::CREATED);

        let mut changed = payload("shipping_notice");
        changed.subject = "Shipped: {{ item }}".to_string();
        let Json(updated) =
            update_template(Path(created.id.0.clone()), State(app.state.clone()), Json(changed))
                .await
                .expect("update");
        assert_eq!(updated.subject, "Shipped: {{ item }}");
        assert_eq!(updated.created_at, created.created_at);

        let Json(listing) = list_templates(State(app.state.clone())).await.expect("list");
        let names: Vec<_> = listing.templates.iter().map(|template| template.name.as_str()).collect();
        assert_eq!(names, vec!["order_confirmation", "shipping_notice"]);
        assert_eq!(listing.groups.len(), 1);

        let status = delete_template(Path(created.id.0.clone()), State(app.state.clone()))
            .await
            .expect("delete");
        assert_eq!(status, StatusCode::NO_CONTENT);
        let error = delete_template(Path(created.id.0), State(app.state.clone()))
            .await
            .expect_err("second delete");
        assert_eq!(error.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_or_blank_templates_are_rejected() {
        let app = test_app().await;

        let duplicate =
            create_template(State(app.state.clone()), Json(payload("order_confirmation")))
                .await
                .expect_err("duplicate name");
        assert_eq!(duplicate.0, StatusCode::CONFLICT);

        let mut blank = payload("blank");
        blank.subject = "  ".to_string();
        let error =
            create_template(State(app.state.clone()), Json(blank)).await.expect_err("blank");
        assert_eq!(error.0, StatusCode::BAD_REQUEST);
        assert!(error.1.error.contains("subject"));
    }

    #[tokio::test]
    async fn send_email_renders_seeded_template() {
        let app = test_app().await;

        let Json(sent) = send_email(
            State(app.state.clone()),
            Json(SendEmailRequest {
                template_name: "order_confirmation".to_string(),
                to: "ava@example.com".to_string(),
                variables: json!({ "order_number": "A-1001", "customer_name": "Ava" }),
            }),
        )
        .await
        .expect("send");

        assert_eq!(sent.subject, "Your order A-1001 is confirmed");
        let delivered = app.mailer.sent().await;
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].html.contains("Ava"));

        let missing = send_email(
            State(app.state.clone()),
            Json(SendEmailRequest {
                template_name: "nope".to_string(),
                to: "ava@example.com".to_string(),
                variables: json!({}),
            }),
        )
        .await
        .expect_err("missing template");
        assert_eq!(missing.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn site_style_is_validated_before_saving() {
        let app = test_app().await;

        let Json(current) = get_site_style(State(app.state.clone())).await.expect("style");
        assert_eq!(current, SiteStyle::default());

        let invalid = SiteStyle { primary_color: "black".to_string(), ..SiteStyle::default() };
        let error =
            save_site_style(State(app.state.clone()), Json(invalid)).await.expect_err("invalid");
        assert_eq!(error.0, StatusCode::BAD_REQUEST);

        let styled = SiteStyle { accent_color: "#b76e79".to_string(), ..SiteStyle::default() };
        save_site_style(State(app.state.clone()), Json(styled.clone())).await.expect("save");
        let Json(saved) = get_site_style(State(app.state.clone())).await.expect("style");
        assert_eq!(saved, styled);
    }

    #[tokio::test]
    async fn refresh_rewarms_previously_cached_product_types() {
        let app = test_app().await;
        let stem = app
            .state
            .filenames
            .filename_stem(&ProductType::Ring, &[("metal", "platinum")])
            .await;
        assert_eq!(stem, "ring-pt");

        let Json(response) = refresh_filename_mappings(State(app.state.clone())).await;
        assert_eq!(response.refreshed_product_types, vec![ProductType::Ring]);
    }
}
