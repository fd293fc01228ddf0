//! formhook: outbound webhooks for form submissions
//!
//! A library for rendering configured webhooks against submitted form data,
//! delivering them over HTTP, and keeping a bounded execution log per
//! webhook.

pub mod config;
pub mod context;
pub mod dispatch;
pub mod history;
pub mod settings;
pub mod template;
pub mod time;
pub mod webhook;
