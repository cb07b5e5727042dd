//! Structured error types shared across the sweep crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`BenchError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (paths, axis names, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the sweep engine.
///
/// Only [`BenchError::Launch`] and [`BenchError::StoreMissing`] are expected
/// to abort a sweep in normal operation; per-repeat failures never surface as
/// errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum BenchError {
    /// The benchmark executable could not be started.
    #[error("launch error: {0}")]
    Launch(ErrorInfo),
    /// Resume or skip mode was requested but no result table exists.
    #[error("store missing: {0}")]
    StoreMissing(ErrorInfo),
    /// Reading or writing the result table failed.
    #[error("store error: {0}")]
    Store(ErrorInfo),
    /// The sweep plan is inconsistent.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl BenchError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            BenchError::Launch(info)
            | BenchError::StoreMissing(info)
            | BenchError::Store(info)
            | BenchError::Config(info)
            | BenchError::Serde(info) => info,
        }
    }

    /// Whether the error must abort the whole sweep.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BenchError::Launch(_) | BenchError::StoreMissing(_))
    }
}

/// Shorthand for a configuration error with a single context entry.
pub fn config_error(
    code: &str,
    message: impl Into<String>,
    key: &str,
    value: impl Into<String>,
) -> BenchError {
    BenchError::Config(ErrorInfo::new(code, message).with_context(key, value))
}
