//! Completion oracle: the external text-generation API.
//!
//! [`CompletionOracle`] is the seam to the provider; [`OracleClient`] wraps
//! any implementation with history trimming, a hard timeout and the localized
//! fallback so that a chat turn always ends with some text.

pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::language::Language;
use crate::session::{Role, Turn};
use crate::wisdom;

pub use openai::OpenAiOracle;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle credentials are not configured")]
    NotConfigured,

    #[error("oracle request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("oracle did not answer within {0:?}")]
    Timeout(Duration),

    #[error("oracle returned an empty completion")]
    Empty,
}

/// A black-box text-completion API.
#[async_trait]
pub trait CompletionOracle: Send + Sync + 'static {
    /// Complete `messages`, whose first entry is the system message.
    async fn complete(&self, messages: &[Turn]) -> Result<String, OracleError>;
}

/// Text produced for a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleAnswer {
    pub text: String,
    /// `true` when the canned reply replaced the oracle's answer.
    pub fallback: bool,
}

/// Keep the leading system message plus the `window` most recent turns.
pub fn trim_history(messages: &[Turn], window: usize) -> Vec<Turn> {
    let (head, rest) = match messages.split_first() {
        Some((first, rest)) if first.role == Role::System => (Some(first), rest),
        _ => (None, messages),
    };
    let skip = rest.len().saturating_sub(window);
    head.into_iter().chain(rest[skip..].iter()).cloned().collect()
}

#[derive(Clone)]
pub struct OracleClient {
    oracle: Arc<dyn CompletionOracle>,
    timeout: Duration,
    window: usize,
}

impl std::fmt::Debug for OracleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleClient")
            .field("timeout", &self.timeout)
            .field("window", &self.window)
            .finish()
    }
}

impl OracleClient {
    pub fn new(oracle: Arc<dyn CompletionOracle>, timeout: Duration, window: usize) -> Self {
        Self { oracle, timeout, window }
    }

    /// Ask the oracle to answer `history` under `system`.
    ///
    /// Failures are logged and replaced by the fallback reply for `language`
    /// and `question_count`; the provider error never reaches the caller.
    pub async fn answer(
        &self,
        system: String,
        history: &[Turn],
        language: Language,
        question_count: u8,
    ) -> OracleAnswer {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Turn::system(system));
        messages.extend_from_slice(history);
        let messages = trim_history(&messages, self.window);
        debug!(turns = messages.len(), "calling completion oracle");

        let result = match tokio::time::timeout(self.timeout, self.oracle.complete(&messages)).await {
            Ok(inner) => inner,
            Err(_) => Err(OracleError::Timeout(self.timeout)),
        };

        match result {
            Ok(text) if !text.trim().is_empty() => OracleAnswer { text: text.trim().to_owned(), fallback: false },
            Ok(_) => {
                warn!(error = %OracleError::Empty, "completion oracle failed; using fallback reply");
                self.fallback(language, question_count)
            }
            Err(e) => {
                warn!(error = %e, "completion oracle failed; using fallback reply");
                self.fallback(language, question_count)
            }
        }
    }

    fn fallback(&self, language: Language, question_count: u8) -> OracleAnswer {
        OracleAnswer {
            text: wisdom::fallback_reply(language, question_count),
            fallback: true,
        }
    }
}
