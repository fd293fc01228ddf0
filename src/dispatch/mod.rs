//! Bridges host events to webhook deliveries.
//!
//! This module provides:
//! - Raw events and their normalization ([`FormSubmission`], [`is_truthy`],
//!   [`format_last_login`])
//! - Read-only webhook lookup ([`Repository`], [`InMemoryRepository`])
//! - The per-event dispatcher ([`Dispatcher`], [`DispatchReport`])
//!
//! # Selection
//!
//! A submission bound to a webhook id is delivered to that webhook only,
//! provided it exists, is enabled and its consent requirement is met.
//! Unbound submissions are dropped unless fan-out is enabled, in which case
//! every enabled webhook for the event's trigger whose targeting matches is
//! delivered in configuration order.
//!
//! Nothing here fails: dropped events are reported and traced, and delivery
//! failures end up in the history.

mod repository;
mod submission;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

use std::fmt;

pub use repository::{InMemoryRepository, Repository, WebhookFilter};
pub use submission::{
    BINDING_FIELD, CONSENT_FIELDS, FormSubmission, LAST_LOGIN_FORMAT, RawUser,
    format_last_login, is_truthy,
};

use crate::context::EventContext;
use crate::history::LogStore;
use crate::webhook::{HttpClient, Sender, WebhookConfig};

/// Why a submission produced no delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// No webhook id was named and fan-out is off.
    NoBinding,
    /// The bound webhook does not exist.
    NotFound(String),
    /// The bound webhook is disabled.
    Disabled(String),
    /// The bound webhook requires consent the submitter did not give.
    ConsentMissing(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBinding => f.write_str("no webhook bound"),
            Self::NotFound(id) => write!(f, "webhook {id} not found"),
            Self::Disabled(id) => write!(f, "webhook {id} is disabled"),
            Self::ConsentMissing(id) => write!(f, "webhook {id} requires consent"),
        }
    }
}

/// What [`Dispatcher::handle`] did with one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchReport {
    /// The bound webhook was handed to the sender.
    Sent(String),
    /// Nothing was sent.
    Dropped(DropReason),
    /// Fan-out delivered this many webhooks.
    FannedOut(usize),
}

/// Selects the webhooks for each event and delivers them.
pub struct Dispatcher<H, S, R> {
    sender: Sender<H, S>,
    repository: R,
    fan_out: bool,
}

impl<H: HttpClient, S: LogStore, R: Repository> Dispatcher<H, S, R> {
    /// Creates a binding-only dispatcher.
    #[must_use]
    pub const fn new(sender: Sender<H, S>, repository: R) -> Self {
        Self {
            sender,
            repository,
            fan_out: false,
        }
    }

    /// Enables or disables delivery of unbound submissions by targeting.
    #[must_use]
    pub const fn with_fan_out(mut self, fan_out: bool) -> Self {
        self.fan_out = fan_out;
        self
    }

    #[must_use]
    pub const fn sender(&self) -> &Sender<H, S> {
        &self.sender
    }

    #[must_use]
    pub const fn repository(&self) -> &R {
        &self.repository
    }

    /// Handles one submission.
    pub async fn handle(&self, submission: &FormSubmission) -> DispatchReport {
        let context = submission.to_context();

        let report = match submission.binding() {
            Some(id) => self.dispatch_bound(&id, &context).await,
            None if self.fan_out => self.dispatch_targeted(&context).await,
            None => DispatchReport::Dropped(DropReason::NoBinding),
        };

        if let DispatchReport::Dropped(reason) = &report {
            tracing::debug!("Submission for form '{}' dropped: {reason}", context.form_id);
        }
        report
    }

    async fn dispatch_bound(&self, id: &str, context: &EventContext) -> DispatchReport {
        let Some(webhook) = self.repository.read(id) else {
            return DispatchReport::Dropped(DropReason::NotFound(id.to_string()));
        };

        if !webhook.enabled {
            return DispatchReport::Dropped(DropReason::Disabled(webhook.id));
        }
        if !webhook.consent_satisfied(context) {
            return DispatchReport::Dropped(DropReason::ConsentMissing(webhook.id));
        }

        self.deliver(&webhook, context).await;
        DispatchReport::Sent(webhook.id)
    }

    async fn dispatch_targeted(&self, context: &EventContext) -> DispatchReport {
        let filter = WebhookFilter::enabled_for(context.trigger_when.clone());

        let mut delivered = 0;
        for webhook in self.repository.list(&filter) {
            if !webhook.targeting.matches(context) {
                continue;
            }
            if !webhook.consent_satisfied(context) {
                tracing::debug!("Webhook {} skipped: consent missing", webhook.id);
                continue;
            }
            self.deliver(&webhook, context).await;
            delivered += 1;
        }

        DispatchReport::FannedOut(delivered)
    }

    async fn deliver(&self, webhook: &WebhookConfig, context: &EventContext) {
        tracing::debug!(
            "Dispatching {} event to webhook {}",
            context.trigger_when,
            webhook.id
        );
        self.sender.send(webhook, context).await;
    }
}

impl<H: fmt::Debug, S: fmt::Debug, R: fmt::Debug> fmt::Debug for Dispatcher<H, S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("sender", &self.sender)
            .field("repository", &self.repository)
            .field("fan_out", &self.fan_out)
            .finish()
    }
}
