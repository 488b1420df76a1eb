//! Answering questions from a user's own journal.
//!
//! Every journal entry is joined into one context block and placed in a
//! fixed prompt template ahead of the question. The context is not truncated
//! to the model's window; very long journals will eventually be rejected by
//! the completion service, which surfaces as [`AnswerError::Service`].

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, instrument};

use crate::adapters::{CompletionRequest, CompletionService};
use crate::domain::JournalEntry;

/// Instruction placed before the context block
pub const INSTRUCTION: &str = "Answer the question as truthfully as possible using only the \
journal entries below. If the answer is not contained in them, say \"I don't know.\"";

/// Errors that can occur while generating an answer
#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("completion service failed: {0:#}")]
    Service(#[source] anyhow::Error),

    #[error("completion timed out after {0:?}")]
    Timeout(Duration),
}

/// Join journal text, in stored order, one entry per line
pub fn build_context(journal: &[JournalEntry]) -> String {
    journal
        .iter()
        .map(|entry| entry.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fill the prompt template
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "{}\n\nContext:\n{}\n\nQ: {}\nA: ",
        INSTRUCTION, context, question
    )
}

/// Asks a [`CompletionService`] to answer from journal context
pub struct AnswerGenerator {
    service: Arc<dyn CompletionService>,
    max_tokens: u32,
    timeout: Duration,
}

impl AnswerGenerator {
    pub fn new(service: Arc<dyn CompletionService>, max_tokens: u32, timeout: Duration) -> Self {
        Self {
            service,
            max_tokens,
            timeout,
        }
    }

    /// Answer `question` from `journal`. The service is called even when the
    /// journal is empty.
    #[instrument(skip(self, journal, question), fields(entries = journal.len(), service = self.service.name()))]
    pub async fn generate_answer(
        &self,
        journal: &[JournalEntry],
        question: &str,
    ) -> Result<String, AnswerError> {
        let context = build_context(journal);
        let prompt = build_prompt(&context, question);
        debug!(prompt_bytes = prompt.len(), "Requesting completion");

        let request = CompletionRequest::deterministic(prompt, self.max_tokens);
        let output = timeout(self.timeout, self.service.complete(&request))
            .await
            .map_err(|_| AnswerError::Timeout(self.timeout))?
            .map_err(AnswerError::Service)?;

        Ok(output.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_preserves_order() {
        let journal = vec![
            JournalEntry::new(1, "I have a dog named Rex"),
            JournalEntry::new(2, "I work at Acme"),
        ];
        assert_eq!(build_context(&journal), "I have a dog named Rex\nI work at Acme");
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt("line a\nline b", "Who am I?");

        assert!(prompt.starts_with(INSTRUCTION));
        assert!(prompt.ends_with("\n\nQ: Who am I?\nA: "));

        let q_at = prompt.find("Q: ").unwrap();
        assert!(prompt.find("line a").unwrap() < q_at);
        assert!(prompt.find("line b").unwrap() < q_at);
    }
}
