//! HTTP judge scorer
//!
//! Posts a candidate's provenance (kind, prompt, uri, content hash) to a
//! scoring endpoint and reads back `{ "score": f, "rationale": s }`.
//! Scorer transport failures surface as `EvaluationError`, never as a
//! low-score rejection.

use crate::config::LexideckConfig;
use crate::provider::{EvaluationError, EvaluationResult, MediaCandidate, MediaKind, MediaScorer};
use crate::providers::http_client;
use async_trait::async_trait;
use lexideck_core::{DeckError, Result};

const DEFAULT_JUDGE_URL: &str = "https://api.lexideck-judge.dev/v1/score";

/// Remote quality judge backend
pub struct JudgeScorer {
    api_key: String,
    api_url: String,
}

impl JudgeScorer {
    /// Create a scorer from config
    pub fn from_config(config: &LexideckConfig) -> Result<Self> {
        let api_key = config
            .api_key("judge")
            .ok_or_else(|| {
                DeckError::ConfigError(
                    "Judge API key not configured. Set LEXIDECK_JUDGE_API_KEY or add to .lexideck/config.toml".to_string(),
                )
            })?
            .to_string();

        let api_url = config
            .api_url("judge")
            .unwrap_or(DEFAULT_JUDGE_URL)
            .to_string();

        Ok(Self { api_key, api_url })
    }

    /// Parse a judge response body into an (unaccepted) result
    fn parse_response(body: &serde_json::Value) -> Option<EvaluationResult> {
        let score = body.get("score")?.as_f64()?;
        Some(EvaluationResult {
            score: score.clamp(0.0, 1.0),
            accepted: false,
            rationale: body
                .get("rationale")
                .and_then(|r| r.as_str())
                .map(|s| s.to_string()),
        })
    }
}

#[async_trait]
impl MediaScorer for JudgeScorer {
    fn name(&self) -> &str {
        "judge"
    }

    async fn score(
        &self,
        candidate: &MediaCandidate,
        kind: MediaKind,
    ) -> std::result::Result<EvaluationResult, EvaluationError> {
        let payload = serde_json::json!({
            "kind": kind.to_string(),
            "prompt": candidate.prompt,
            "provider": candidate.provider,
            "uri": candidate.handle.uri,
            "content_hash": candidate.handle.content_hash,
        });

        let response = http_client()
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| EvaluationError(format!("judge request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(EvaluationError(format!(
                "judge returned status {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EvaluationError(format!("judge response unreadable: {}", e)))?;

        Self::parse_response(&body)
            .ok_or_else(|| EvaluationError("judge response had no score".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let body = serde_json::json!({ "score": 0.82, "rationale": "clear pronunciation" });
        let result = JudgeScorer::parse_response(&body).unwrap();
        assert_eq!(result.score, 0.82);
        assert_eq!(result.rationale.as_deref(), Some("clear pronunciation"));
        assert!(!result.accepted); // the gate decides acceptance
    }

    #[test]
    fn test_parse_response_clamps_score() {
        let body = serde_json::json!({ "score": 1.7 });
        assert_eq!(JudgeScorer::parse_response(&body).unwrap().score, 1.0);
    }

    #[test]
    fn test_parse_response_missing_score() {
        let body = serde_json::json!({ "rationale": "no score field" });
        assert!(JudgeScorer::parse_response(&body).is_none());
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = LexideckConfig::default();
        assert!(JudgeScorer::from_config(&config).is_err());
    }
}
