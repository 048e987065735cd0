//! Built-in insurance knowledge base
//!
//! A small FAQ answer engine and keyword classifier used when no model
//! service is configured. Both implement the core collaborator ports, so a
//! model-backed engine can replace them without touching the pipeline.

use async_trait::async_trait;
use policyqa_core::{AnswerEngine, Classifier};
use policyqa_domain::Result;

/// Returned when no entry covers the question
pub const FALLBACK_ANSWER: &str = "I don't have enough information to answer that question \
                                   accurately. Please contact your insurance provider for \
                                   specific details.";

const ENROLLMENT_HINT: &str =
    "For enrollment questions, visit HealthCare.gov or contact a licensed insurance broker.";

struct Entry {
    keywords: &'static [&'static str],
    answer: &'static str,
}

const ENTRIES: &[Entry] = &[
    Entry {
        keywords: &["hmo", "health maintenance organization"],
        answer: "HMOs (Health Maintenance Organizations) require you to choose a primary care \
                 physician and get referrals for specialists.",
    },
    Entry {
        keywords: &["ppo", "preferred provider"],
        answer: "PPOs (Preferred Provider Organizations) offer more flexibility with in-network \
                 and out-of-network coverage.",
    },
    Entry {
        keywords: &["epo", "exclusive provider"],
        answer: "EPOs (Exclusive Provider Organizations) are similar to PPOs but don't cover \
                 out-of-network care except in emergencies.",
    },
    Entry {
        keywords: &["deductible"],
        answer: "A deductible is the amount you pay for covered health care services before \
                 your insurance plan starts to pay. If your deductible is $1,000, you pay the \
                 first $1,000 of covered services yourself.",
    },
    Entry {
        keywords: &["copay", "co-pay"],
        answer: "A copay is a fixed amount you pay for a covered health care service, usually \
                 when you receive the service.",
    },
    Entry {
        keywords: &["premium"],
        answer: "A premium is the amount you pay for your health insurance every month.",
    },
    Entry {
        keywords: &["enroll", "open enrollment", "sign up"],
        answer: "Enrollment typically happens during open enrollment periods or through special \
                 enrollment periods for qualifying life events.",
    },
    Entry {
        keywords: &["aca", "affordable care act", "marketplace", "subsid"],
        answer: "The Affordable Care Act (ACA) provides marketplace plans with subsidies based \
                 on income.",
    },
];

/// FAQ-backed [`AnswerEngine`]. The first entry whose keyword appears in
/// the question wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct KnowledgeBase;

impl KnowledgeBase {
    pub fn new() -> Self {
        Self
    }

    pub fn lookup(&self, question: &str) -> Option<String> {
        let lowered = question.to_lowercase();
        let entry = ENTRIES.iter().find(|entry| {
            entry.keywords.iter().any(|keyword| contains_word(&lowered, keyword))
        })?;

        let mut answer = entry.answer.to_string();
        if KeywordClassifier::category_for(&lowered) == ENROLLMENT {
            answer.push(' ');
            answer.push_str(ENROLLMENT_HINT);
        }
        Some(answer)
    }
}

#[async_trait]
impl AnswerEngine for KnowledgeBase {
    async fn answer(&self, question: &str) -> Result<String> {
        Ok(self.lookup(question).unwrap_or_else(|| FALLBACK_ANSWER.to_string()))
    }
}

const PLAN_TYPE: &str = "Plan Type";
const ENROLLMENT: &str = "Enrollment";
const COSTS: &str = "Costs";
const MARKETPLACE: &str = "Marketplace";
const COVERAGE: &str = "Coverage";

const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (PLAN_TYPE, &["hmo", "ppo", "epo", "plan type", "network"]),
    (ENROLLMENT, &["enroll", "sign up", "deadline", "life event"]),
    (COSTS, &["deductible", "copay", "co-pay", "premium", "cost", "price", "pay"]),
    (MARKETPLACE, &["aca", "affordable care act", "marketplace", "subsid"]),
];

/// Keyword [`Classifier`]. Questions that match no keyword land in
/// `Coverage`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn category_for(lowered: &str) -> &'static str {
        CATEGORY_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|keyword| contains_word(lowered, keyword)))
            .map_or(COVERAGE, |(category, _)| category)
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, question: &str) -> Result<String> {
        Ok(Self::category_for(&question.to_lowercase()).to_string())
    }
}

/// Keyword match anchored at a word start, so "aca" does not match
/// "vacation" while "enroll" still matches "enrollment".
fn contains_word(haystack: &str, keyword: &str) -> bool {
    haystack.match_indices(keyword).any(|(start, _)| {
        haystack[..start].chars().next_back().map_or(true, |c| !c.is_alphanumeric())
    })
}
