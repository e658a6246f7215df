use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailTemplateId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplateGroup {
    pub id: String,
    pub name: String,
    pub display_order: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: EmailTemplateId,
    pub group_id: Option<String>,
    pub name: String,
    pub subject: String,
    pub html_body: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload accepted by the transactional `send-email` function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub html: String,
}

impl EmailTemplate {
    /// Renders subject and body with the given variables. Templates use the
    /// `{{ variable }}` syntax; autoescaping applies to the HTML body only.
    pub fn render(
        &self,
        to: &str,
        from: &str,
        variables: &serde_json::Value,
    ) -> Result<EmailMessage, DomainError> {
        let context = Context::from_value(variables.clone()).map_err(|error| {
            DomainError::InvariantViolation(format!(
                "email variables must be a JSON object: {error}"
            ))
        })?;

        let subject = Tera::one_off(&self.subject, &context, false).map_err(|error| {
            DomainError::InvariantViolation(format!(
                "email template `{}` subject failed to render: {error}",
                self.name
            ))
        })?;
        let html = Tera::one_off(&self.html_body, &context, true).map_err(|error| {
            DomainError::InvariantViolation(format!(
                "email template `{}` body failed to render: {error}",
                self.name
            ))
        })?;

        Ok(EmailMessage {
            to: to.trim().to_string(),
            from: from.to_string(),
            subject: subject.trim().to_string(),
            html,
        })
    }
}
