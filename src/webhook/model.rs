//! Webhook destination definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::context::{EventContext, Trigger};
use crate::template::Row;

/// HTTP method a webhook is sent with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Returns the upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Converts to the `http` crate's method type.
    #[must_use]
    pub fn to_http(self) -> http::Method {
        match self {
            Self::Get => http::Method::GET,
            Self::Post => http::Method::POST,
            Self::Put => http::Method::PUT,
            Self::Patch => http::Method::PATCH,
            Self::Delete => http::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a method name is not one of the supported methods.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method '{0}': expected GET, POST, PUT, PATCH or DELETE")]
pub struct UnsupportedMethod(pub String);

impl FromStr for Method {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _ => Err(UnsupportedMethod(s.to_string())),
        }
    }
}

impl Serialize for Method {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Method {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Wire format of the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestFormat {
    /// `application/x-www-form-urlencoded`
    #[default]
    Form,
    /// `application/json`
    Json,
    /// `application/xml`
    Xml,
}

/// Which events a webhook applies to when fanning out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Every event.
    #[default]
    All,
    /// Only events whose form, post or slug is listed.
    Include,
    /// Every event except those whose form, post or slug is listed.
    Exclude,
}

/// Scope-based targeting rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Targeting {
    pub scope: Scope,
    pub form_ids: Vec<String>,
    pub post_ids: Vec<String>,
    pub slugs: Vec<String>,
}

impl Targeting {
    /// Returns true if an event with this context is targeted.
    #[must_use]
    pub fn matches(&self, context: &EventContext) -> bool {
        match self.scope {
            Scope::All => true,
            Scope::Include => self.lists(context),
            Scope::Exclude => !self.lists(context),
        }
    }

    fn lists(&self, context: &EventContext) -> bool {
        let listed = |ids: &[String], value: &str| {
            !value.is_empty() && ids.iter().any(|id| id == value)
        };

        listed(&self.form_ids, &context.form_id)
            || listed(&self.post_ids, &context.post_id)
            || listed(&self.slugs, &context.slug)
    }
}

/// A configured outbound destination plus its rendering rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub url: String,
    #[serde(default)]
    pub method: Method,
    #[serde(default)]
    pub request_format: RequestFormat,
    #[serde(default)]
    pub headers: Vec<Row>,
    #[serde(default)]
    pub body_mapping: Vec<Row>,
    #[serde(default)]
    pub trigger_when: Trigger,
    #[serde(default)]
    pub consent_required: bool,
    #[serde(default)]
    pub targeting: Targeting,
}

const fn enabled_by_default() -> bool {
    true
}

impl WebhookConfig {
    /// Creates an enabled POST/form webhook for `on_submit` with no rows.
    #[must_use]
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            enabled: true,
            url: url.into(),
            method: Method::default(),
            request_format: RequestFormat::default(),
            headers: Vec::new(),
            body_mapping: Vec::new(),
            trigger_when: Trigger::default(),
            consent_required: false,
            targeting: Targeting::default(),
        }
    }

    /// Sets the HTTP method.
    #[must_use]
    pub const fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the body format.
    #[must_use]
    pub const fn with_format(mut self, format: RequestFormat) -> Self {
        self.request_format = format;
        self
    }

    /// Appends a header row.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Row::new(key, value));
        self
    }

    /// Appends a body mapping row.
    #[must_use]
    pub fn with_mapping(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.body_mapping.push(Row::new(key, value));
        self
    }

    /// Requires submitter consent for `on_submit` deliveries.
    #[must_use]
    pub const fn with_consent_required(mut self, required: bool) -> Self {
        self.consent_required = required;
        self
    }

    /// Enables or disables the webhook.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the trigger.
    #[must_use]
    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger_when = trigger;
        self
    }

    /// Sets the targeting rules.
    #[must_use]
    pub fn with_targeting(mut self, targeting: Targeting) -> Self {
        self.targeting = targeting;
        self
    }

    /// Returns true if this webhook may fire for `context` given its consent
    /// requirement. Consent is only checked for `on_submit` webhooks.
    #[must_use]
    pub fn consent_satisfied(&self, context: &EventContext) -> bool {
        !(self.consent_required && self.trigger_when.is_on_submit()) || context.user_consent
    }
}
