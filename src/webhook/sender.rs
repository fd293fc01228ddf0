//! Materializes and executes one delivery.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use http::{HeaderName, HeaderValue};
use serde_json::Value;
use url::Url;

use super::encode::{encode, encode_form};
use super::policy::{PolicyRejection, check_url};
use super::{HttpClient, HttpRequest, Method, RequestFormat, WebhookConfig};
use crate::context::EventContext;
use crate::history::{
    DeliveryStatus, LogEntry, LogStore, Logger, RequestSnapshot, ResponseSnapshot,
    mask_header_map, mask_headers, truncate_body,
};
use crate::settings::{Settings, SettingsProvider};
use crate::template::{build_payload, resolve_flat_pairs};

/// Headers the transport sets itself.
const TRANSPORT_HEADERS: [&str; 2] = ["host", "content-length"];

const CONTENT_TYPE: &str = "content-type";

/// Whether an attempt is recorded in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persist {
    /// Append the attempt to the webhook's log bucket.
    Log,
    /// Dry run: return the attempt without recording it.
    Skip,
}

/// Result of [`Sender::build_and_execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The destination policy refused the URL; nothing was sent or logged.
    Rejected(PolicyRejection),
    /// An HTTP attempt was made. Transport failures and non-2xx responses
    /// land here too; see [`LogEntry::status_code`].
    Completed(LogEntry),
}

impl Outcome {
    /// Returns the attempt record, if an attempt was made.
    #[must_use]
    pub const fn entry(&self) -> Option<&LogEntry> {
        match self {
            Self::Completed(entry) => Some(entry),
            Self::Rejected(_) => None,
        }
    }
}

/// A request ready to go, plus the data its log snapshot needs.
struct Prepared {
    request: HttpRequest,
    header_pairs: BTreeMap<String, String>,
    body_text: String,
}

/// Sends webhooks and records each attempt.
///
/// # Behavior
///
/// - The URL is checked against the destination policy first; a refused URL
///   aborts silently, without a log entry.
/// - Body and headers are rendered from the webhook's rows and the event.
/// - Every attempt is made exactly once; nothing is retried.
/// - Neither transport failures nor error statuses reach the caller; they
///   are recorded in the history instead.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use formhook::context::{EventContext, Trigger};
/// use formhook::history::{Logger, MemoryLogStore};
/// use formhook::settings::StaticSettings;
/// use formhook::webhook::{ReqwestClient, Sender, WebhookConfig};
///
/// # async fn example() -> Result<(), formhook::webhook::HttpError> {
/// let settings = Arc::new(StaticSettings::default());
/// let logger = Logger::new(MemoryLogStore::new(), settings.clone());
/// let sender = Sender::new(ReqwestClient::new()?, settings, logger);
///
/// let webhook = WebhookConfig::new("crm", "https://example.com/hook")
///     .with_mapping("email", "{{data.email}}");
/// let context = EventContext::new(Trigger::on_submit(), serde_json::Map::new());
/// sender.send(&webhook, &context).await;
/// # Ok(())
/// # }
/// ```
pub struct Sender<H, S> {
    client: H,
    settings: Arc<dyn SettingsProvider>,
    logger: Logger<S>,
}

impl<H: HttpClient, S: LogStore> Sender<H, S> {
    /// Creates a sender.
    #[must_use]
    pub fn new(client: H, settings: Arc<dyn SettingsProvider>, logger: Logger<S>) -> Self {
        Self {
            client,
            settings,
            logger,
        }
    }

    /// Returns the logger attempts are recorded with.
    #[must_use]
    pub const fn logger(&self) -> &Logger<S> {
        &self.logger
    }

    /// Delivers `webhook` for `context` and records the attempt.
    pub async fn send(&self, webhook: &WebhookConfig, context: &EventContext) {
        self.build_and_execute(webhook, context, Persist::Log).await;
    }

    /// Delivers `webhook` without recording the attempt, returning it
    /// instead. Used for administrator test sends.
    pub async fn test_send(&self, webhook: &WebhookConfig, context: &EventContext) -> Outcome {
        self.build_and_execute(webhook, context, Persist::Skip).await
    }

    /// Renders, encodes and executes one request for `webhook`.
    ///
    /// Shared by [`send`](Self::send) and [`test_send`](Self::test_send).
    pub async fn build_and_execute(
        &self,
        webhook: &WebhookConfig,
        context: &EventContext,
        persist: Persist,
    ) -> Outcome {
        let settings = self.settings.settings();

        let prepared = match prepare(webhook, context, &settings) {
            Ok(prepared) => prepared,
            Err(reason) => {
                tracing::warn!("Webhook {} not sent: {reason}", webhook.id);
                return Outcome::Rejected(reason);
            }
        };

        let mut entry = self.execute(prepared).await;
        entry.trigger_when = context.trigger_when.clone();

        match persist {
            Persist::Log => {
                self.logger.log(&webhook.id, entry.clone()).await;
            }
            Persist::Skip => {
                tracing::debug!("Test send for webhook {} not recorded", webhook.id);
            }
        }

        entry.webhook_id.clone_from(&webhook.id);
        entry.timestamp = self.logger.now();
        Outcome::Completed(entry)
    }

    async fn execute(&self, prepared: Prepared) -> LogEntry {
        let Prepared {
            request,
            header_pairs,
            body_text,
        } = prepared;

        let snapshot = RequestSnapshot {
            url: request.url.to_string(),
            method: request.method.to_string(),
            headers: mask_headers(&header_pairs),
            body: truncate_body(&body_text),
        };

        let started = Instant::now();
        let result = self.client.request(request).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (status_code, response) = match result {
            Ok(response) => {
                tracing::info!(
                    "{} {} -> {} in {duration_ms}ms",
                    snapshot.method,
                    snapshot.url,
                    response.status
                );
                (
                    DeliveryStatus::Http(response.status.as_u16()),
                    ResponseSnapshot {
                        headers: mask_header_map(&response.headers),
                        body: truncate_body(&response.body_text()),
                    },
                )
            }
            Err(e) => {
                tracing::warn!("{} {} failed: {e}", snapshot.method, snapshot.url);
                (
                    DeliveryStatus::Transport(e.code().to_string()),
                    ResponseSnapshot {
                        headers: BTreeMap::new(),
                        body: truncate_body(&e.to_string()),
                    },
                )
            }
        };

        LogEntry {
            status_code,
            duration_ms,
            request: snapshot,
            response,
            ..LogEntry::default()
        }
    }
}

impl<H: std::fmt::Debug, S: std::fmt::Debug> std::fmt::Debug for Sender<H, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender")
            .field("client", &self.client)
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}

/// Checks the destination and renders the request.
fn prepare(
    webhook: &WebhookConfig,
    context: &EventContext,
    settings: &Settings,
) -> Result<Prepared, PolicyRejection> {
    let mut url = check_url(&webhook.url, &settings.allowlist, &settings.denylist)?;

    let tree = context.to_tree();
    let payload = build_payload(&webhook.body_mapping, &tree);
    let mut header_pairs = resolve_flat_pairs(&webhook.headers, &tree);

    let body_text = if webhook.method == Method::Get {
        append_query(&mut url, &payload);
        String::new()
    } else {
        let encoded = encode(webhook.request_format, &payload);
        if webhook.request_format == RequestFormat::Json {
            header_pairs.insert(CONTENT_TYPE.to_string(), encoded.content_type.to_string());
        } else {
            header_pairs
                .entry(CONTENT_TYPE.to_string())
                .or_insert_with(|| encoded.content_type.to_string());
        }
        encoded.text
    };

    for name in TRANSPORT_HEADERS {
        header_pairs.remove(name);
    }

    let mut request = with_headers(
        HttpRequest::new(webhook.method.to_http(), url).with_timeout(settings.timeout),
        &webhook.id,
        &header_pairs,
    );
    if webhook.method != Method::Get {
        request = request.with_body(body_text.clone().into_bytes());
    }

    Ok(Prepared {
        request,
        header_pairs,
        body_text,
    })
}

/// Adds a form-encoded payload to the query string of a GET request.
fn append_query(url: &mut Url, payload: &Value) {
    let encoded = encode_form(payload);
    if encoded.is_empty() {
        return;
    }

    let query = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{encoded}"),
        _ => encoded,
    };
    url.set_query(Some(&query));
}

fn with_headers(
    mut request: HttpRequest,
    webhook_id: &str,
    pairs: &BTreeMap<String, String>,
) -> HttpRequest {
    for (name, value) in pairs {
        let parsed = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        );
        match parsed {
            (Ok(name), Ok(value)) => request = request.with_header(name, value),
            _ => tracing::warn!("Webhook {webhook_id}: skipping invalid header '{name}'"),
        }
    }
    request
}
