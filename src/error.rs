//! User-visible failure taxonomy.
//!
//! Session actions never return errors to their caller. Every failure is
//! folded into a [`Notice`], which front ends render as an inline warning.

use serde::Serialize;
use thiserror::Error;

use crate::summarize::SummarizeError;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Notice {
    /// Network, auth, or quota failure from a data provider.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The item exists but has no usable content (e.g. no transcript).
    #[error("content unavailable: {0}")]
    ContentUnavailable(String),

    /// The generative provider produced no usable text.
    #[error("no generated response: {0}")]
    EmptyGenerativeResponse(String),

    #[error("enter at least one keyword")]
    UserInputMissing,

    #[error("no results for '{0}'")]
    NoResults(String),

    #[error("unknown item: {0}")]
    UnknownItem(String),
}

impl Notice {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::ContentUnavailable(_) => "content_unavailable",
            Self::EmptyGenerativeResponse(_) => "empty_generative_response",
            Self::UserInputMissing => "user_input_missing",
            Self::NoResults(_) => "no_results",
            Self::UnknownItem(_) => "unknown_item",
        }
    }
}

impl From<SummarizeError> for Notice {
    fn from(err: SummarizeError) -> Self {
        match err {
            SummarizeError::NoResponse(feedback) => Self::EmptyGenerativeResponse(feedback),
            SummarizeError::ProviderFailure(raw) => Self::UpstreamUnavailable(raw),
            SummarizeError::Unavailable(what) => Self::ContentUnavailable(what),
        }
    }
}
