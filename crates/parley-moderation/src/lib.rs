pub mod wordlist;

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use parley_types::models::ModerationResult;

/// Upper bound on the remote classification call. The write path must not
/// hang on an unresponsive classifier.
const REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// What to do when the remote classifier is unreachable. Exactly one policy
/// is active per deployment, chosen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Scan against the local word list and flag on a hit.
    Keyword,
    /// Accept everything, recording that the service was unavailable.
    FailOpen,
}

impl FallbackPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "keyword" => Some(Self::Keyword),
            "fail-open" => Some(Self::FailOpen),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
enum RemoteError {
    #[error("no moderation API key configured")]
    NotConfigured,

    #[error("moderation service returned {0}")]
    Status(reqwest::StatusCode),

    #[error("moderation service returned no results")]
    EmptyResponse,

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct RemoteResponse {
    results: Vec<RemoteVerdict>,
}

/// Per-category boolean verdicts plus an overall flag, as returned by
/// OpenAI-moderations-compatible services. BTreeMap keeps the category
/// order stable.
#[derive(Debug, Deserialize)]
struct RemoteVerdict {
    flagged: bool,
    categories: BTreeMap<String, bool>,
}

/// Content classifier: remote service first, local fallback on any failure.
/// `moderate` never surfaces the remote error to the caller — the write path
/// stays available during outages at the cost of weaker enforcement.
pub struct Moderator {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    fallback: FallbackPolicy,
    blocklist: Vec<String>,
}

impl Moderator {
    /// An absent `api_key` means the remote step is skipped entirely and
    /// every submission goes through the fallback policy.
    pub fn new(
        endpoint: String,
        api_key: Option<String>,
        fallback: FallbackPolicy,
        blocklist: Vec<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            api_key,
            fallback,
            blocklist,
        }
    }

    pub async fn moderate(&self, text: &str) -> ModerationResult {
        match self.classify_remote(text).await {
            Ok(result) => result,
            Err(err) => {
                warn!(
                    "remote moderation unavailable ({err}), applying {:?} fallback",
                    self.fallback
                );
                match self.fallback {
                    FallbackPolicy::Keyword => keyword_scan(text, &self.blocklist),
                    FallbackPolicy::FailOpen => ModerationResult {
                        flagged: false,
                        categories: Vec::new(),
                        reason: Some(
                            "Moderation service unavailable; content not screened".to_string(),
                        ),
                    },
                }
            }
        }
    }

    async fn classify_remote(&self, text: &str) -> Result<ModerationResult, RemoteError> {
        let api_key = self.api_key.as_ref().ok_or(RemoteError::NotConfigured)?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .timeout(REMOTE_TIMEOUT)
            .json(&json!({ "input": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RemoteError::Status(response.status()));
        }

        let body: RemoteResponse = response.json().await?;
        let verdict = body
            .results
            .into_iter()
            .next()
            .ok_or(RemoteError::EmptyResponse)?;

        Ok(result_from_remote(verdict))
    }
}

fn result_from_remote(verdict: RemoteVerdict) -> ModerationResult {
    let categories: Vec<String> = verdict
        .categories
        .into_iter()
        .filter(|(_, positive)| *positive)
        .map(|(category, _)| category)
        .collect();

    let reason = (!categories.is_empty())
        .then(|| format!("Content flagged for: {}", categories.join(", ")));

    ModerationResult {
        flagged: verdict.flagged,
        categories,
        reason,
    }
}

/// Local keyword fallback: flags when any whitespace-delimited token
/// case-insensitively contains a blocklist entry.
pub fn keyword_scan(text: &str, blocklist: &[String]) -> ModerationResult {
    let lowered = text.to_lowercase();
    let flagged = lowered
        .split_whitespace()
        .any(|token| blocklist.iter().any(|word| token.contains(word.as_str())));

    ModerationResult {
        flagged,
        categories: if flagged {
            vec!["profanity".to_string()]
        } else {
            Vec::new()
        },
        reason: flagged.then(|| "Content contains inappropriate language".to_string()),
    }
}

/// Boundary pre-filter: a cheap substring check against the whole content,
/// run before the moderator is consulted at all.
pub fn prefilter_hit(content: &str, words: &[String]) -> bool {
    let lowered = content.to_lowercase();
    words.iter().any(|word| lowered.contains(word.as_str()))
}
