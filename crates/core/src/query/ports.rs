//! Collaborator ports consumed by the query pipeline

use async_trait::async_trait;
use policyqa_domain::Result;

/// Produces an answer for a validated question
#[async_trait]
pub trait AnswerEngine: Send + Sync {
    async fn answer(&self, question: &str) -> Result<String>;
}

/// Assigns a topic label to a question
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, question: &str) -> Result<String>;
}
