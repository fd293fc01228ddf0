//! Raw form submissions and their normalization into an [`EventContext`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::context::{EventContext, Trigger, UserProfile};

/// Field names that may carry the submitter's consent.
pub const CONSENT_FIELDS: [&str; 4] = ["consent", "gdpr", "user_consent", "_consent"];

/// Field that binds a submission to one webhook when no explicit binding is given.
pub const BINDING_FIELD: &str = "_webhook_id";

/// Output format of [`format_last_login`].
pub const LAST_LOGIN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One event as delivered by the host.
///
/// Identifiers may arrive as strings or numbers; both are kept as strings.
///
/// ```
/// use formhook::dispatch::FormSubmission;
///
/// let submission: FormSubmission = serde_json::from_str(
///     r#"{"form_id": 7, "webhook_id": "crm", "fields": {"email": "a@b.com", "gdpr": "on"}}"#,
/// ).unwrap();
///
/// let context = submission.to_context();
/// assert_eq!(context.form_id, "7");
/// assert!(context.user_consent);
/// assert_eq!(submission.binding().as_deref(), Some("crm"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FormSubmission {
    pub trigger_when: Trigger,
    #[serde(deserialize_with = "lenient_string")]
    pub form_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub post_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub slug: String,
    #[serde(deserialize_with = "lenient_string")]
    pub webhook_id: String,
    pub fields: Map<String, Value>,
    pub user: Option<RawUser>,
}

/// The authenticated user as stored by the host, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawUser {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    pub login: String,
    pub email: String,
    pub registered_at: String,
    pub first_name: String,
    pub last_name: String,
    pub last_login: Option<Value>,
}

impl FormSubmission {
    /// Creates an `on_submit` submission with the given fields.
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Returns the webhook this submission is bound to, if any.
    ///
    /// The explicit `webhook_id` wins over a `_webhook_id` form field.
    #[must_use]
    pub fn binding(&self) -> Option<String> {
        let explicit = self.webhook_id.trim();
        if !explicit.is_empty() {
            return Some(explicit.to_string());
        }

        self.fields
            .get(BINDING_FIELD)
            .and_then(scalar_string)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
    }

    /// Returns true if any consent field holds a truthy value.
    #[must_use]
    pub fn has_consent(&self) -> bool {
        CONSENT_FIELDS
            .iter()
            .filter_map(|name| self.fields.get(*name))
            .any(is_truthy)
    }

    /// Builds the read-only context templates are rendered against.
    #[must_use]
    pub fn to_context(&self) -> EventContext {
        let context = EventContext::new(self.trigger_when.clone(), self.fields.clone())
            .with_form_id(self.form_id.trim())
            .with_post_id(self.post_id.trim())
            .with_slug(self.slug.trim())
            .with_consent(self.has_consent());

        match &self.user {
            Some(user) => context.with_user(user.normalize()),
            None => context,
        }
    }
}

impl RawUser {
    /// Converts the stored profile into the shape templates see.
    #[must_use]
    pub fn normalize(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            login: self.login.clone(),
            email: self.email.clone(),
            registered_at: self.registered_at.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            last_login: self
                .last_login
                .as_ref()
                .map(format_last_login)
                .unwrap_or_default(),
        }
    }
}

/// Interprets a boolean-ish form value.
///
/// Truthy: `true`, non-zero numbers, the strings `1`, `true`, `yes`, `on`
/// and `checked` (any case), and non-empty lists whose items are all truthy.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "checked"
        ),
        Value::Array(items) => !items.is_empty() && items.iter().all(is_truthy),
        Value::Null | Value::Object(_) => false,
    }
}

/// Formats a stored last-login value as `YYYY-MM-DD HH:MM:SS` (UTC).
///
/// Accepts Unix seconds (number or numeric string) and RFC 3339 strings.
/// Anything else, including zero and negative timestamps, yields `""`.
#[must_use]
pub fn format_last_login(value: &Value) -> String {
    let parsed = match value {
        Value::Number(n) => n.as_i64().and_then(from_unix),
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(secs) => from_unix(secs),
                Err(_) => DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc)),
            }
        }
        _ => None,
    };

    parsed
        .map(|dt| dt.format(LAST_LOGIN_FORMAT).to_string())
        .unwrap_or_default()
}

fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts a string, a number or null.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(String::new()),
        other => scalar_string(&other).ok_or_else(|| {
            serde::de::Error::custom(format!("expected a string or number, got {other}"))
        }),
    }
}
