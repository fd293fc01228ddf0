//! Read-only access to configured webhooks.

use std::sync::Arc;

use crate::context::Trigger;
use crate::webhook::WebhookConfig;

/// Selection criteria for [`Repository::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookFilter {
    /// Skip disabled webhooks.
    pub enabled_only: bool,
    /// Only webhooks reacting to this trigger.
    pub trigger: Option<Trigger>,
}

impl WebhookFilter {
    /// Enabled webhooks reacting to `trigger`.
    #[must_use]
    pub const fn enabled_for(trigger: Trigger) -> Self {
        Self {
            enabled_only: true,
            trigger: Some(trigger),
        }
    }

    /// Returns true if `webhook` passes the filter.
    #[must_use]
    pub fn matches(&self, webhook: &WebhookConfig) -> bool {
        if self.enabled_only && !webhook.enabled {
            return false;
        }
        self.trigger
            .as_ref()
            .is_none_or(|trigger| *trigger == webhook.trigger_when)
    }
}

/// Lookup of webhook definitions.
///
/// Creation, updates and deletion happen elsewhere; the dispatcher only reads.
pub trait Repository: Send + Sync {
    /// Returns the webhook with this id.
    fn read(&self, id: &str) -> Option<WebhookConfig>;

    /// Returns every webhook passing `filter`, in configuration order.
    fn list(&self, filter: &WebhookFilter) -> Vec<WebhookConfig>;
}

impl<T: Repository + ?Sized> Repository for Arc<T> {
    fn read(&self, id: &str) -> Option<WebhookConfig> {
        (**self).read(id)
    }

    fn list(&self, filter: &WebhookFilter) -> Vec<WebhookConfig> {
        (**self).list(filter)
    }
}

/// Repository over a fixed list, e.g. the `[[webhooks]]` of a config file.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    webhooks: Vec<WebhookConfig>,
}

impl InMemoryRepository {
    #[must_use]
    pub const fn new(webhooks: Vec<WebhookConfig>) -> Self {
        Self { webhooks }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.webhooks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.webhooks.is_empty()
    }
}

impl FromIterator<WebhookConfig> for InMemoryRepository {
    fn from_iter<I: IntoIterator<Item = WebhookConfig>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Repository for InMemoryRepository {
    fn read(&self, id: &str) -> Option<WebhookConfig> {
        self.webhooks.iter().find(|w| w.id == id).cloned()
    }

    fn list(&self, filter: &WebhookFilter) -> Vec<WebhookConfig> {
        self.webhooks
            .iter()
            .filter(|w| filter.matches(w))
            .cloned()
            .collect()
    }
}
