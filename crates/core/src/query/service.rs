//! Query pipeline service
//!
//! Every failure is written to the error ledger with the request context
//! before the caller sees it. Store and cipher failures after an answer was
//! produced degrade instead of failing the request.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use policyqa_domain::constants::DEFAULT_CONSENT_TYPE;
use policyqa_domain::{
    ErrorContext, NewInteraction, PolicyQaError, QueryRequest, QueryResponse, Severity,
};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::ports::{AnswerEngine, Classifier};
use crate::audit::AuditLog;
use crate::compliance::{ConsentLedger, InteractionRepository};
use crate::error_analysis::ErrorAnalysisLedger;
use crate::security::{validate_input, CipherService, InputRejection};

const COMPONENT: &str = "query_pipeline";
const ANSWER_COMPONENT: &str = "qa_engine";
const CLASSIFIER_COMPONENT: &str = "classifier";
const STORE_COMPONENT: &str = "interaction_store";

/// A rejected or failed query, already recorded in the error ledger.
///
/// `Display` is safe to return to the user: the error class, a generic or
/// user-facing message and the ledger id, never internal detail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} ({}, error id {error_id})", .error.public_message(), .error.kind())]
pub struct QueryFailure {
    pub error: PolicyQaError,
    pub error_id: String,
}

impl From<QueryFailure> for PolicyQaError {
    fn from(failure: QueryFailure) -> Self {
        failure.error
    }
}

/// Ledger severity for an error that ends a request
fn severity_of(err: &PolicyQaError) -> Severity {
    match err {
        PolicyQaError::ConsentRequired(_) => Severity::Info,
        PolicyQaError::InvalidInput(_) | PolicyQaError::NotFound(_) => Severity::Low,
        PolicyQaError::Collaborator(_) | PolicyQaError::Database(_) => Severity::High,
        PolicyQaError::Security(_) | PolicyQaError::Config(_) | PolicyQaError::Internal(_) => {
            Severity::Critical
        }
    }
}

pub struct QueryPipeline {
    consent: Arc<ConsentLedger>,
    cipher: Arc<CipherService>,
    interactions: Arc<dyn InteractionRepository>,
    audit: Arc<AuditLog>,
    errors: Arc<ErrorAnalysisLedger>,
    answers: Arc<dyn AnswerEngine>,
    classifier: Option<Arc<dyn Classifier>>,
}

impl QueryPipeline {
    pub fn new(
        consent: Arc<ConsentLedger>,
        cipher: Arc<CipherService>,
        interactions: Arc<dyn InteractionRepository>,
        audit: Arc<AuditLog>,
        errors: Arc<ErrorAnalysisLedger>,
        answers: Arc<dyn AnswerEngine>,
    ) -> Self {
        Self { consent, cipher, interactions, audit, errors, answers, classifier: None }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Answer one question on behalf of a user
    #[instrument(skip(self, request), fields(user_id = %request.user_id, session_id = %request.session_id))]
    pub async fn handle(&self, request: &QueryRequest) -> Result<QueryResponse, QueryFailure> {
        let context = ErrorContext {
            user_id: Some(request.user_id.clone()),
            session_id: Some(request.session_id.clone()),
            ip_address: Some(request.ip_address.clone()),
            user_agent: Some(request.user_agent.clone()),
            request_data: Some(serde_json::json!({
                "question_chars": request.question.chars().count(),
            })),
            response_data: None,
        };

        match self.answer(request, &context).await {
            Ok(response) => Ok(response),
            Err(error) => {
                let error_id =
                    self.errors.log_failure(&error, COMPONENT, severity_of(&error), context).await;
                Err(QueryFailure { error, error_id })
            }
        }
    }

    async fn answer(
        &self,
        request: &QueryRequest,
        context: &ErrorContext,
    ) -> Result<QueryResponse, PolicyQaError> {
        let user_id = request.user_id.as_str();

        self.consent.require_consent(user_id, DEFAULT_CONSENT_TYPE).await?;

        let question = match validate_input(&request.question) {
            Ok(question) => question,
            Err(rejection) => {
                if rejection == InputRejection::BlockedFragment {
                    self.audit.record(user_id, "input_validation", "chat_interface", false).await;
                }
                return Err(rejection.into());
            }
        };

        self.audit.record(user_id, "query_received", "chat_interface", true).await;

        let started = Instant::now();
        let answer = self.answers.answer(&question).await?;
        self.errors
            .log_performance_metric(
                ANSWER_COMPONENT,
                "response_time",
                started.elapsed().as_secs_f64() * 1000.0,
                Some("ms"),
                None,
            )
            .await;

        let category = self.classify(&question, context).await;

        self.persist(request, &question, &answer, category.clone(), context).await;

        self.audit.record(user_id, "query_processed", "chat_interface", true).await;

        Ok(QueryResponse { answer, category })
    }

    /// Optional topic label. A classifier failure drops the label only.
    async fn classify(&self, question: &str, context: &ErrorContext) -> Option<String> {
        let classifier = self.classifier.as_ref()?;
        match classifier.classify(question).await {
            Ok(label) => Some(label),
            Err(err) => {
                self.errors
                    .log_failure(&err, CLASSIFIER_COMPONENT, Severity::Medium, context.clone())
                    .await;
                None
            }
        }
    }

    /// Encrypt and store the exchange. Failures are reported and swallowed;
    /// an unencryptable exchange is stored as plaintext.
    async fn persist(
        &self,
        request: &QueryRequest,
        question: &str,
        answer: &str,
        category: Option<String>,
        context: &ErrorContext,
    ) {
        let _permit = self.cipher.write_permit().await;
        let (query, answer) =
            match (self.cipher.encrypt(question), self.cipher.encrypt(answer)) {
                (Ok(query), Ok(answer)) => (query, answer),
                (Err(err), _) | (_, Err(err)) => {
                    warn!(error = %err, "query_pipeline.encryption_unavailable");
                    self.errors
                        .log_failure(&err, COMPONENT, Severity::High, context.clone())
                        .await;
                    (question.to_string(), answer.to_string())
                }
            };

        let interaction = NewInteraction {
            query,
            answer,
            category,
            timestamp: Utc::now(),
            user_id: request.user_id.clone(),
            session_id: request.session_id.clone(),
            ip_address: request.ip_address.clone(),
            user_agent: request.user_agent.clone(),
        };

        match self.interactions.insert_interaction(&interaction).await {
            Ok(id) => {
                debug!(interaction_id = id, "query_pipeline.persisted");
                self.consent
                    .record_processing(&request.user_id, "chat_query", "service_provision")
                    .await;
            }
            Err(err) => {
                self.errors.log_failure(&err, STORE_COMPONENT, Severity::High, context.clone()).await;
            }
        }
    }
}
