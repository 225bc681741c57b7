//! # Resilient Oracle
//!
//! The scoring entry point used by settlement. [`ResilientOracle::score`]
//! cannot fail:
//!
//! ```text
//! empty result ─────────────────────────────────────────▶ heuristic
//! no backend ───────────────────────────────────────────▶ heuristic
//! backend ──▶ timeout(backend.score) ─┬─ Ok(verdict) ───▶ verdict
//!                                     ├─ Err(_) ────────▶ heuristic
//!                                     └─ elapsed ───────▶ heuristic
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::heuristic::heuristic_verdict;
use crate::llm::LlmOracle;
use crate::{ScoringOracle, ScoringRequest, Verdict};

/// Timeout and fallback around an optional scoring backend.
#[derive(Clone)]
pub struct ResilientOracle {
    backend: Option<Arc<dyn ScoringOracle>>,
    timeout: Duration,
}

impl std::fmt::Debug for ResilientOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientOracle")
            .field("backend", &self.backend.as_ref().map(|_| "dyn ScoringOracle"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ResilientOracle {
    /// Wrap a backend with the given per-call timeout.
    pub fn new(backend: Arc<dyn ScoringOracle>, timeout: Duration) -> Self {
        Self {
            backend: Some(backend),
            timeout,
        }
    }

    /// An oracle that always uses the length heuristic.
    pub fn heuristic_only() -> Self {
        Self {
            backend: None,
            timeout: Duration::ZERO,
        }
    }

    /// Build from configuration: the LLM backend when a key is configured,
    /// otherwise heuristic only.
    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        if !config.llm_enabled() {
            tracing::info!("no oracle API key configured, scoring by heuristic only");
            return Ok(Self::heuristic_only());
        }
        let llm = LlmOracle::new(config)?;
        Ok(Self::new(
            Arc::new(llm),
            Duration::from_secs(config.timeout_secs),
        ))
    }

    /// Whether a backend is configured.
    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Score a submission. Never fails.
    pub async fn score(&self, request: &ScoringRequest) -> Verdict {
        if request.result_text.trim().is_empty() {
            return heuristic_verdict(&request.result_text);
        }
        let Some(backend) = &self.backend else {
            return heuristic_verdict(&request.result_text);
        };

        let outcome = match tokio::time::timeout(self.timeout, backend.score(request)).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(
                    quest_title = %request.quest_title,
                    error = %e,
                    "oracle unavailable, falling back to length heuristic"
                );
                heuristic_verdict(&request.result_text)
            }
        }
    }
}
