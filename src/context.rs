//! Normalized snapshot of one triggering event.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event kind a webhook reacts to.
///
/// Kept open-ended: hosts may define their own kinds. Only
/// [`Trigger::ON_SUBMIT`] carries special meaning (consent checks).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trigger(String);

impl Trigger {
    /// Name of the form-submission trigger.
    pub const ON_SUBMIT: &'static str = "on_submit";

    /// Creates a trigger from its name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The form-submission trigger.
    #[must_use]
    pub fn on_submit() -> Self {
        Self::new(Self::ON_SUBMIT)
    }

    /// Returns true for the form-submission trigger.
    #[must_use]
    pub fn is_on_submit(&self) -> bool {
        self.0 == Self::ON_SUBMIT
    }

    /// Returns the trigger name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Self::on_submit()
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Profile of the authenticated user who triggered the event.
///
/// All fields are already normalized to strings; `last_login` is a formatted
/// date or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub login: String,
    pub email: String,
    pub registered_at: String,
    pub first_name: String,
    pub last_name: String,
    pub last_login: String,
}

/// Read-only snapshot of an event, as seen by templates.
///
/// Built once by the dispatcher and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventContext {
    pub trigger_when: Trigger,
    pub form_id: String,
    pub post_id: String,
    pub slug: String,
    pub user_consent: bool,
    pub data: Map<String, Value>,
    pub user: Option<UserProfile>,
}

impl EventContext {
    /// Creates a context for the given trigger with raw event data.
    #[must_use]
    pub fn new(trigger_when: Trigger, data: Map<String, Value>) -> Self {
        Self {
            trigger_when,
            data,
            ..Self::default()
        }
    }

    /// Sets the form identifier.
    #[must_use]
    pub fn with_form_id(mut self, form_id: impl Into<String>) -> Self {
        self.form_id = form_id.into();
        self
    }

    /// Sets the post identifier.
    #[must_use]
    pub fn with_post_id(mut self, post_id: impl Into<String>) -> Self {
        self.post_id = post_id.into();
        self
    }

    /// Sets the page slug.
    #[must_use]
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }

    /// Sets whether the submitter gave consent.
    #[must_use]
    pub const fn with_consent(mut self, consent: bool) -> Self {
        self.user_consent = consent;
        self
    }

    /// Attaches the authenticated user's profile.
    #[must_use]
    pub fn with_user(mut self, user: UserProfile) -> Self {
        self.user = Some(user);
        self
    }

    /// Returns the tree placeholders are resolved against:
    /// `{trigger_when, form_id, post_id, slug, user_consent, data, user}`.
    #[must_use]
    pub fn to_tree(&self) -> Value {
        // Plain strings, bools and maps always serialize.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trigger_defaults_to_on_submit() {
        assert!(Trigger::default().is_on_submit());
        assert!(!Trigger::new("on_payment").is_on_submit());
    }

    #[test]
    fn trigger_serializes_as_plain_string() {
        assert_eq!(serde_json::to_value(Trigger::on_submit()).unwrap(), json!("on_submit"));
    }

    #[test]
    fn tree_exposes_all_fields() {
        let mut data = Map::new();
        data.insert("email".to_string(), json!("a@b.com"));

        let context = EventContext::new(Trigger::on_submit(), data)
            .with_form_id("7")
            .with_post_id("12")
            .with_slug("contact")
            .with_consent(true)
            .with_user(UserProfile {
                login: "ada".to_string(),
                ..UserProfile::default()
            });

        let tree = context.to_tree();
        assert_eq!(tree["trigger_when"], "on_submit");
        assert_eq!(tree["form_id"], "7");
        assert_eq!(tree["post_id"], "12");
        assert_eq!(tree["slug"], "contact");
        assert_eq!(tree["user_consent"], true);
        assert_eq!(tree["data"]["email"], "a@b.com");
        assert_eq!(tree["user"]["login"], "ada");
    }

    #[test]
    fn tree_has_null_user_when_anonymous() {
        let context = EventContext::new(Trigger::on_submit(), Map::new());
        assert!(context.to_tree()["user"].is_null());
    }
}
