//! Transactional email delivery through the hosted `send-email` function.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use atelier_core::config::EmailConfig;
use atelier_core::domain::email::EmailMessage;
use atelier_core::errors::{CheckoutErrorKind, DomainError};

use crate::repositories::{EmailTemplateRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email delivery is disabled")]
    Disabled,
    #[error("email template `{0}` was not found")]
    TemplateNotFound(String),
    #[error("email template `{0}` is inactive")]
    TemplateInactive(String),
    #[error(transparent)]
    Render(#[from] DomainError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("email request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("email function returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl EmailError {
    /// Shopper-facing failure category, classified like checkout errors.
    pub fn kind(&self) -> CheckoutErrorKind {
        match self {
            Self::Rejected { status, body } => CheckoutErrorKind::classify(Some(*status), body),
            Self::Request(error) => CheckoutErrorKind::classify(None, &error.to_string()),
            Self::Render(_) | Self::TemplateNotFound(_) | Self::TemplateInactive(_) => {
                CheckoutErrorKind::Validation
            }
            Self::Disabled | Self::Repository(_) => CheckoutErrorKind::Generic,
        }
    }
}

#[async_trait]
pub trait EmailDispatcher: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

pub fn email_dispatcher_from_config(config: &EmailConfig) -> Arc<dyn EmailDispatcher> {
    match (config.enabled, &config.function_url, &config.api_key) {
        (true, Some(function_url), Some(api_key)) => Arc::new(FunctionEmailDispatcher::new(
            Client::new(),
            function_url.clone(),
            api_key.clone(),
        )),
        _ => Arc::new(DisabledEmailDispatcher),
    }
}

pub struct FunctionEmailDispatcher {
    client: Client,
    function_url: String,
    api_key: SecretString,
}

impl FunctionEmailDispatcher {
    pub fn new(client: Client, function_url: impl Into<String>, api_key: SecretString) -> Self {
        Self { client, function_url: function_url.into(), api_key }
    }
}

#[async_trait]
impl EmailDispatcher for FunctionEmailDispatcher {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let response = self
            .client
            .post(&self.function_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "email.send.rejected",
                status = status.as_u16(),
                "email function rejected message"
            );
            return Err(EmailError::Rejected { status: status.as_u16(), body });
        }

        info!(event_name = "email.send.accepted", subject = %message.subject, "email dispatched");
        Ok(())
    }
}

pub struct DisabledEmailDispatcher;

#[async_trait]
impl EmailDispatcher for DisabledEmailDispatcher {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        info!(
            event_name = "email.send.skipped",
            subject = %message.subject,
            "email delivery disabled; message dropped"
        );
        Err(EmailError::Disabled)
    }
}

/// Keeps every message in memory. Used by local runs and tests.
#[derive(Default)]
pub struct RecordingEmailDispatcher {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingEmailDispatcher {
    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl EmailDispatcher for RecordingEmailDispatcher {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

/// Renders the named template with `variables` and hands it to the dispatcher.
pub async fn send_templated_email(
    templates: &dyn EmailTemplateRepository,
    dispatcher: &dyn EmailDispatcher,
    template_name: &str,
    to: &str,
    from: &str,
    variables: &serde_json::Value,
) -> Result<EmailMessage, EmailError> {
    let template = templates
        .find_by_name(template_name)
        .await?
        .ok_or_else(|| EmailError::TemplateNotFound(template_name.to_string()))?;
    if !template.active {
        return Err(EmailError::TemplateInactive(template_name.to_string()));
    }

    let message = template.render(to, from, variables)?;
    dispatcher.send(&message).await?;
    Ok(message)
}
