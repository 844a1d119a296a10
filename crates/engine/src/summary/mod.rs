//! History-to-text summaries: an optional enrichment over committed ledger
//! data, with a deterministic non-LLM fallback.
//!
//! The summary path is fire-and-forget relative to the engine: it only
//! reads already-committed history and can never block or be blocked by a
//! transition. When no client is configured, or the client call fails, the
//! fallback summary is produced from the history data itself.

mod anthropic;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use cadre_core::InstanceStatus;
use cadre_storage::{CadreStorage, HistoryListing};
use serde::Serialize;

use crate::clock::{now_utc, parse_timestamp};
use crate::error::EngineError;
use crate::principal::Principal;

pub use anthropic::AnthropicClient;

/// Error type for summary client operations.
#[derive(Debug)]
pub enum SummaryError {
    /// Network or HTTP error.
    NetworkError(String),
    /// The API returned an error response.
    ApiError { status: u16, message: String },
    /// Failed to parse the response.
    ParseError(String),
}

impl fmt::Display for SummaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryError::NetworkError(msg) => write!(f, "summary network error: {}", msg),
            SummaryError::ApiError { status, message } => {
                write!(f, "summary API error ({}): {}", status, message)
            }
            SummaryError::ParseError(msg) => write!(f, "summary parse error: {}", msg),
        }
    }
}

impl std::error::Error for SummaryError {}

/// Trait for calling an LLM to get a text completion.
///
/// Implementations handle the specifics of the API; the service handles
/// prompt construction and the fallback.
#[async_trait]
pub trait SummaryClient: Send + Sync {
    /// Send a system prompt and user message, get a text response.
    async fn complete(&self, system: &str, user: &str) -> Result<String, SummaryError>;
}

/// The generated summary payload returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub summary: String,
    /// The process name the instance belongs to.
    pub instance: String,
    pub status: InstanceStatus,
    pub generated_at: String,
}

const SYSTEM_PROMPT: &str =
    "You are a process analyst. Summarize the following process execution history in 2-3 sentences.";

pub struct SummaryService<S: CadreStorage> {
    storage: Arc<S>,
    client: Option<Arc<dyn SummaryClient>>,
}

impl<S: CadreStorage> SummaryService<S> {
    pub fn new(storage: Arc<S>, client: Option<Arc<dyn SummaryClient>>) -> Self {
        SummaryService { storage, client }
    }

    /// Generate a summary for one instance from its committed history.
    pub async fn generate(
        &self,
        principal: &Principal,
        instance_id: &str,
    ) -> Result<SummaryReport, EngineError> {
        let instance = self
            .storage
            .get_instance(instance_id, &principal.organization_id)
            .await?;
        let definition = self
            .storage
            .get_definition(&instance.definition_id, &principal.organization_id)
            .await?;
        let history = self.storage.list_history(&instance.id).await?;

        let summary = match &self.client {
            Some(client) => {
                let user = build_user_message(&definition.name, instance.status, &history);
                match client.complete(SYSTEM_PROMPT, &user).await {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::warn!(%err, instance_id, "summary client failed, using fallback");
                        fallback_summary(&definition.name, instance.status, &history)
                    }
                }
            }
            None => fallback_summary(&definition.name, instance.status, &history),
        };

        Ok(SummaryReport {
            summary,
            instance: definition.name,
            status: instance.status,
            generated_at: now_utc(),
        })
    }
}

fn build_user_message(
    process_name: &str,
    status: InstanceStatus,
    history: &[HistoryListing],
) -> String {
    let lines: Vec<String> = history
        .iter()
        .map(|h| {
            format!(
                "[{}] Step: {}, Status: {}, Notes: {}",
                h.entry.performed_at,
                h.step_name.as_deref().unwrap_or("N/A"),
                h.entry.status,
                h.entry.notes.as_deref().unwrap_or("None"),
            )
        })
        .collect();
    format!(
        "Process: {}\nStatus: {}\n\nHistory:\n{}",
        process_name,
        status,
        lines.join("\n")
    )
}

/// Deterministic summary built from the history itself, used when no LLM
/// client is configured or the call fails.
fn fallback_summary(
    process_name: &str,
    status: InstanceStatus,
    history: &[HistoryListing],
) -> String {
    let step_count = history
        .iter()
        .filter_map(|h| h.entry.step_id.as_deref())
        .collect::<BTreeSet<_>>()
        .len();
    // History lists newest-first; the last element is the oldest entry.
    let minutes = history
        .last()
        .and_then(|h| parse_timestamp(&h.entry.performed_at))
        .and_then(|oldest| parse_timestamp(&now_utc()).map(|now| now - oldest))
        .map(|elapsed| elapsed.whole_minutes().max(0))
        .unwrap_or(0);
    let status_text = match status {
        InstanceStatus::Approved => "successfully completed",
        InstanceStatus::Rejected => "was rejected",
        InstanceStatus::Pending => "is currently in progress",
    };
    format!(
        "The process \"{}\" {}. It has gone through {} step(s) over approximately {} minutes with {} recorded action(s).",
        process_name,
        status_text,
        step_count,
        minutes,
        history.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadre_storage::HistoryRecord;

    fn entry(step: Option<&str>, status: InstanceStatus, at: &str) -> HistoryListing {
        HistoryListing {
            entry: HistoryRecord {
                id: "hist-1".to_string(),
                instance_id: "ins-1".to_string(),
                step_id: step.map(|s| s.to_string()),
                status,
                notes: None,
                performed_by: None,
                performed_at: at.to_string(),
            },
            step_name: step.map(|s| format!("name of {}", s)),
            performed_by_email: None,
        }
    }

    #[test]
    fn fallback_counts_distinct_steps_and_actions() {
        let history = vec![
            entry(Some("step-2"), InstanceStatus::Approved, "2026-01-01T01:00:00Z"),
            entry(Some("step-2"), InstanceStatus::Pending, "2026-01-01T00:30:00Z"),
            entry(Some("step-1"), InstanceStatus::Pending, "2026-01-01T00:00:00Z"),
        ];
        let text = fallback_summary("Expense approval", InstanceStatus::Approved, &history);
        assert!(text.contains("\"Expense approval\" successfully completed"), "{text}");
        assert!(text.contains("2 step(s)"), "{text}");
        assert!(text.contains("3 recorded action(s)"), "{text}");
    }

    #[test]
    fn fallback_handles_an_empty_history() {
        let text = fallback_summary("Onboarding", InstanceStatus::Pending, &[]);
        assert!(text.contains("is currently in progress"), "{text}");
        assert!(text.contains("0 step(s)"), "{text}");
    }

    #[test]
    fn user_message_carries_process_and_history_lines() {
        let history = vec![entry(Some("step-1"), InstanceStatus::Pending, "2026-01-01T00:00:00Z")];
        let msg = build_user_message("Onboarding", InstanceStatus::Pending, &history);
        assert!(msg.starts_with("Process: Onboarding\nStatus: pending"), "{msg}");
        assert!(msg.contains("Step: name of step-1"), "{msg}");
    }
}
