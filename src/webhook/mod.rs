//! Outbound webhook delivery.
//!
//! This module provides:
//! - Webhook definitions ([`WebhookConfig`], [`Method`], [`RequestFormat`], [`Targeting`])
//! - HTTP request/response values and the transport trait ([`HttpRequest`],
//!   [`HttpResponse`], [`HttpClient`])
//! - Production transport ([`ReqwestClient`])
//! - Destination policy ([`check_url`], [`is_url_allowed`])
//! - Body encoders ([`encode`])
//! - The sender shared by dispatch and test sends ([`Sender`], [`Outcome`])

mod client;
pub mod encode;
mod error;
mod http;
mod model;
mod policy;
mod sender;


pub use client::{MAX_RESPONSE_BYTES, ReqwestClient};
pub use encode::{EncodedBody, encode};
pub use error::HttpError;
pub use self::http::{HttpClient, HttpRequest, HttpResponse};
pub use model::{Method, RequestFormat, Scope, Targeting, UnsupportedMethod, WebhookConfig};
pub use policy::{PolicyRejection, check_url, glob_matches, glob_to_regex, is_url_allowed};
pub use sender::{Outcome, Persist, Sender};
