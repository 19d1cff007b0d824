//! MediaWiki client error types.
//!
//! Every failure is classified into a [`StoreErrorKind`] exactly once, in
//! [`ApiError::kind`], from the API error code or the HTTP status.

use std::sync::Arc;

use wikisweep_core::{StoreError, StoreErrorKind};

/// Errors from the MediaWiki Action API client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// The API URL is not a valid http(s) URL.
    #[error("invalid API URL: {0}")]
    InvalidUrl(String),

    /// The API answered with an `error` object.
    #[error("API error {code}: {info}")]
    Api { code: String, info: String },

    /// `action=login` did not succeed.
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// A token was requested but none came back.
    #[error("missing {0} token in response")]
    MissingToken(&'static str),

    /// A write returned without the expected success marker.
    #[error("unexpected {action} result: {result}")]
    Unexpected { action: &'static str, result: String },

    /// HTTP error response.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { ApiError::Timeout } else { ApiError::Network(Arc::new(err)) }
    }
}

impl ApiError {
    pub fn api(code: impl Into<String>, info: impl Into<String>) -> Self {
        ApiError::Api { code: code.into(), info: info.into() }
    }

    /// The API error code, if the API produced one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn kind(&self) -> StoreErrorKind {
        match self {
            ApiError::Api { code, .. } => kind_for_code(code),
            ApiError::LoginFailed(_) => StoreErrorKind::PermissionDenied,
            ApiError::HttpError { status } => match *status {
                401 | 403 => StoreErrorKind::PermissionDenied,
                404 => StoreErrorKind::NotFound,
                429 | 500..=599 => StoreErrorKind::Transient,
                _ => StoreErrorKind::Unknown,
            },
            ApiError::Timeout | ApiError::Network(_) => StoreErrorKind::Transient,
            ApiError::InvalidUrl(_)
            | ApiError::MissingToken(_)
            | ApiError::Unexpected { .. }
            | ApiError::Parse(_) => StoreErrorKind::Unknown,
        }
    }
}

fn kind_for_code(code: &str) -> StoreErrorKind {
    match code {
        "missingtitle" | "nosuchpageid" | "nosuchrevid" | "cantdelete" => StoreErrorKind::NotFound,
        "protectedpage"
        | "cascadeprotected"
        | "protectedtitle"
        | "protectednamespace"
        | "protectednamespace-interface"
        | "customcssprotected"
        | "customjsprotected" => StoreErrorKind::Locked,
        "permissiondenied" | "readapidenied" | "writeapidenied" | "notloggedin" | "mustbeloggedin"
        | "assertuserfailed" | "assertbotfailed" | "badaccess-groups" | "blocked" | "autoblocked"
        | "cantcreate" | "noedit" | "nodelete" | "cantmove" => StoreErrorKind::PermissionDenied,
        "ratelimited" | "maxlag" | "readonly" | "badtoken" => StoreErrorKind::Transient,
        code if code.starts_with("internal_api_error") => StoreErrorKind::Transient,
        _ => StoreErrorKind::Unknown,
    }
}

impl From<ApiError> for StoreError {
    fn from(err: ApiError) -> Self {
        StoreError::new(err.kind(), err.to_string())
    }
}
