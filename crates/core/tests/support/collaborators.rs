//! Answer engine and classifier doubles

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use policyqa_core::{AnswerEngine, Classifier};
use policyqa_domain::{PolicyQaError, Result as DomainResult};

/// Answers every question with the same text, or fails when built with
/// [`FixedAnswer::failing`].
pub struct FixedAnswer {
    answer: Option<String>,
    pub calls: AtomicUsize,
}

impl FixedAnswer {
    pub fn new(answer: &str) -> Self {
        Self { answer: Some(answer.to_string()), calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { answer: None, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnswerEngine for FixedAnswer {
    async fn answer(&self, _question: &str) -> DomainResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .clone()
            .ok_or_else(|| PolicyQaError::Collaborator("qa model stack trace: CUDA OOM".into()))
    }
}

pub struct FixedLabel(pub Option<&'static str>);

#[async_trait]
impl Classifier for FixedLabel {
    async fn classify(&self, _question: &str) -> DomainResult<String> {
        self.0
            .map(str::to_string)
            .ok_or_else(|| PolicyQaError::Collaborator("classifier unavailable".into()))
    }
}
