//! Forwarding failures and their HTTP translation.
//!
//! A failed forward becomes
//! `{"message": "Unable to proxy request", "error": {...}}` with status 504
//! when the upstream refused the connection and 500 for everything else.

use std::error::Error as StdError;
use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use url::Url;

pub const PROXY_ERROR_MESSAGE: &str = "Unable to proxy request";

/// Classification of a forwarding failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ForwardErrorCode {
    #[serde(rename = "ECONNREFUSED")]
    ConnectionRefused,
    #[serde(rename = "ECONNRESET")]
    ConnectionReset,
    #[serde(rename = "ENOTFOUND")]
    NameNotResolved,
    #[serde(rename = "ETIMEDOUT")]
    TimedOut,
    #[serde(rename = "ETLS")]
    Tls,
    #[serde(rename = "EINVALIDURL")]
    InvalidUrl,
    #[serde(rename = "EPROXY")]
    Other,
}

impl ForwardErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ForwardErrorCode::ConnectionRefused => "ECONNREFUSED",
            ForwardErrorCode::ConnectionReset => "ECONNRESET",
            ForwardErrorCode::NameNotResolved => "ENOTFOUND",
            ForwardErrorCode::TimedOut => "ETIMEDOUT",
            ForwardErrorCode::Tls => "ETLS",
            ForwardErrorCode::InvalidUrl => "EINVALIDURL",
            ForwardErrorCode::Other => "EPROXY",
        }
    }
}

/// Structured details of a failed forward, serialized into the `error`
/// field of the response body.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{} forwarding to {}: {message}", .code.as_str(), .address.as_deref().unwrap_or("upstream"))]
pub struct ForwardError {
    pub code: ForwardErrorCode,
    pub errno: ForwardErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syscall: Option<&'static str>,
    pub message: String,
}

impl ForwardError {
    fn new(code: ForwardErrorCode, url: Option<&Url>, message: String) -> Self {
        Self {
            code,
            errno: code,
            address: url.and_then(|u| u.host_str()).map(str::to_string),
            port: url.and_then(Url::port_or_known_default),
            syscall: None,
            message,
        }
    }

    /// Classify a client error for the request sent to `url`.
    pub fn from_reqwest(err: &reqwest::Error, url: &Url) -> Self {
        let code = classify(err);
        let mut error = Self::new(code, Some(url), error_chain(err));
        if err.is_connect() {
            error.syscall = Some("connect");
        }
        error
    }

    pub fn invalid_url(err: url::ParseError) -> Self {
        Self::new(ForwardErrorCode::InvalidUrl, None, err.to_string())
    }

    /// 504 when the upstream refused the connection, 500 otherwise.
    pub fn status(&self) -> StatusCode {
        match self.code {
            ForwardErrorCode::ConnectionRefused => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ProxyErrorBody<'a> {
    message: &'static str,
    error: &'a ForwardError,
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        let body = ProxyErrorBody {
            message: PROXY_ERROR_MESSAGE,
            error: &self,
        };
        (self.status(), Json(body)).into_response()
    }
}

fn classify(err: &reqwest::Error) -> ForwardErrorCode {
    if err.is_timeout() {
        return ForwardErrorCode::TimedOut;
    }

    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<io::Error>() {
            match io.kind() {
                io::ErrorKind::ConnectionRefused => return ForwardErrorCode::ConnectionRefused,
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe => return ForwardErrorCode::ConnectionReset,
                io::ErrorKind::TimedOut => return ForwardErrorCode::TimedOut,
                _ => {}
            }
        }

        let text = cause.to_string().to_ascii_lowercase();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return ForwardErrorCode::NameNotResolved;
        }
        if text.contains("certificate")
            || text.contains("tls")
            || text.contains("ssl")
            || text.contains("handshake")
        {
            return ForwardErrorCode::Tls;
        }
        source = cause.source();
    }

    ForwardErrorCode::Other
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
