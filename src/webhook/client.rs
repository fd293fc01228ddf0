//! Production HTTP client implementation using reqwest.

use super::{HttpClient, HttpError, HttpRequest, HttpResponse};

/// Most response bytes kept per exchange; the history stores far less.
pub const MAX_RESPONSE_BYTES: usize = 64 * 1024;

/// [`HttpClient`] backed by a pooled `reqwest::Client`.
///
/// Redirects are never followed: a 3xx answer is a completed exchange, so
/// every host actually contacted is one the destination policy approved.
/// The per-request timeout carried by [`HttpRequest`] bounds the whole
/// exchange including the body read, and at most [`MAX_RESPONSE_BYTES`] of
/// the body are read.
///
/// # Example
///
/// ```no_run
/// use formhook::webhook::{ReqwestClient, HttpClient, HttpRequest};
/// use std::time::Duration;
/// use url::Url;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ReqwestClient::new()?;
/// let url = Url::parse("https://api.example.com/webhook")?;
/// let request = HttpRequest::new(http::Method::POST, url)
///     .with_body(b"hello".to_vec())
///     .with_timeout(Duration::from_secs(5));
/// let response = client.request(request).await?;
/// println!("Status: {}", response.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Client`] if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, HttpError> {
        Self::builder()
            .build()
            .map(Self::from_client)
            .map_err(|e| HttpError::Client(Box::new(e)))
    }

    /// Returns a reqwest builder preset with the delivery configuration
    /// (no redirects). Customize it and pass the result to [`Self::from_client`].
    #[must_use]
    pub fn builder() -> reqwest::ClientBuilder {
        reqwest::Client::builder().redirect(reqwest::redirect::Policy::none())
    }

    /// Wraps an existing reqwest client.
    ///
    /// Clients not built from [`Self::builder`] may follow redirects past
    /// the destination policy.
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { inner: client }
    }
}

fn classify(e: reqwest::Error) -> HttpError {
    if e.is_timeout() {
        HttpError::Timeout
    } else if e.is_builder() {
        HttpError::InvalidUrl(e.to_string())
    } else {
        HttpError::Connection(Box::new(e))
    }
}

/// Reads the body up to `limit` bytes, dropping the rest unread.
async fn read_prefix(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, HttpError> {
    let mut body = Vec::new();
    while body.len() < limit {
        let Some(chunk) = response.chunk().await.map_err(classify)? else {
            break;
        };
        let take = chunk.len().min(limit - body.len());
        body.extend_from_slice(&chunk[..take]);
    }
    Ok(body)
}

impl HttpClient for ReqwestClient {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut builder = self
            .inner
            .request(req.method, req.url.as_str())
            .headers(req.headers);

        if let Some(timeout) = req.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = read_prefix(response, MAX_RESPONSE_BYTES).await?;

        Ok(HttpResponse::new(status, headers, body))
    }
}
