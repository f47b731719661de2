// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound email transports for one-time codes.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("email transport is not configured")]
    NotConfigured,

    #[error("email request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("email provider rejected the message with status {status}")]
    Rejected { status: u16 },
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body_html: &str) -> Result<(), TransportError>;
}

#[derive(Serialize)]
struct OutgoingEmail<'a> {
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Posts `{to, subject, html}` as JSON to an HTTP email relay.
pub struct HttpEmailTransport {
    client: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpEmailTransport {
    pub fn new(endpoint: Url, token: Option<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint,
            token,
        })
    }
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    async fn send(&self, to: &str, subject: &str, body_html: &str) -> Result<(), TransportError> {
        let mut request = self.client.post(self.endpoint.clone()).json(&OutgoingEmail {
            to,
            subject,
            html: body_html,
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Transport used when no relay is configured. Every send fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredEmailTransport;

#[async_trait]
impl EmailTransport for UnconfiguredEmailTransport {
    async fn send(&self, _to: &str, _subject: &str, _body_html: &str) -> Result<(), TransportError> {
        Err(TransportError::NotConfigured)
    }
}

/// Development transport that writes the message to the log instead of
/// delivering it.
#[cfg(feature = "dev")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEmailTransport;

#[cfg(feature = "dev")]
#[async_trait]
impl EmailTransport for LogEmailTransport {
    async fn send(&self, to: &str, subject: &str, body_html: &str) -> Result<(), TransportError> {
        tracing::warn!(to, subject, body = body_html, "DEV: email not delivered, logged instead");
        Ok(())
    }
}
