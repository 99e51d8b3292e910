//! Outcome classification.
//!
//! A completed request is a success only if its final status is one of the
//! configured success codes. Everything else, redirects included, is a failure.

use std::collections::HashSet;

use axum::http::StatusCode;
use serde::Serialize;

/// Binary outcome of one forwarded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

/// Maps status codes to outcomes using a fixed set of success codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeClassifier {
    success_codes: HashSet<StatusCode>,
}

impl OutcomeClassifier {
    /// Build a classifier. An empty set falls back to `{200 OK}`.
    pub fn new(success_codes: impl IntoIterator<Item = StatusCode>) -> Self {
        let mut success_codes: HashSet<StatusCode> = success_codes.into_iter().collect();
        if success_codes.is_empty() {
            success_codes.insert(StatusCode::OK);
        }
        Self { success_codes }
    }

    pub fn classify(&self, status: StatusCode) -> Outcome {
        if self.success_codes.contains(&status) {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }

    /// Success codes in ascending order.
    pub fn success_codes(&self) -> Vec<StatusCode> {
        let mut codes: Vec<StatusCode> = self.success_codes.iter().copied().collect();
        codes.sort_by_key(|code| code.as_u16());
        codes
    }
}

impl Default for OutcomeClassifier {
    fn default() -> Self {
        Self::new([StatusCode::OK])
    }
}
