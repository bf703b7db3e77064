//! Context assembly for chat turns.
//!
//! A deployment picks one strategy: the compiled-in checklist and policy
//! table (optionally with the client's earlier messages), or every policy
//! document currently in the store.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::db::models::PolicyWithBank;
use crate::db::{PolicyStore, StoreError};
use crate::llm::{CompletionRequest, ConversationHistory};

/// Credit assessment checklist (the five Cs of lending).
pub const CREDIT_CHECKLIST: &str = include_str!("../assets/credit_checklist.txt");

/// Per-bank income, credit, LMI and rate policies.
pub const BANK_POLICIES: &str = include_str!("../assets/bank_policies.txt");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextStrategy {
    Static,
    #[default]
    StaticWithHistory,
    Retrieval,
}

impl FromStr for ContextStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "static-with-history" => Ok(Self::StaticWithHistory),
            "retrieval" => Ok(Self::Retrieval),
            other => Err(format!("unknown context strategy: {other}")),
        }
    }
}

impl fmt::Display for ContextStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Static => "static",
            Self::StaticWithHistory => "static-with-history",
            Self::Retrieval => "retrieval",
        };
        f.write_str(name)
    }
}

/// Where a chat turn's context comes from.
#[derive(Clone)]
pub enum ContextSource {
    Static { include_history: bool },
    Retrieval(Arc<dyn PolicyStore>),
}

impl ContextSource {
    pub fn new(strategy: ContextStrategy, store: Arc<dyn PolicyStore>) -> Self {
        match strategy {
            ContextStrategy::Static => Self::Static {
                include_history: false,
            },
            ContextStrategy::StaticWithHistory => Self::Static {
                include_history: true,
            },
            ContextStrategy::Retrieval => Self::Retrieval(store),
        }
    }

    /// Build the completion request for `query`. `history` holds the user's
    /// earlier messages, not including `query`.
    pub fn build_request(
        &self,
        query: &str,
        history: ConversationHistory,
    ) -> Result<CompletionRequest, StoreError> {
        match self {
            Self::Static { include_history } => {
                let request = CompletionRequest::new(query, CREDIT_CHECKLIST)
                    .with_additional_context(BANK_POLICIES);
                if *include_history {
                    Ok(request.with_history(history))
                } else {
                    Ok(request)
                }
            }
            Self::Retrieval(store) => {
                let policies = store.list_all_policies_with_bank_name()?;
                tracing::debug!(count = policies.len(), "Retrieved policy documents for context");
                Ok(CompletionRequest::new(query, retrieval_context(&policies)))
            }
        }
    }
}

/// Policy texts joined by a blank line, in store order.
pub fn retrieval_context(policies: &[PolicyWithBank]) -> String {
    policies
        .iter()
        .map(|p| p.policy.policy_text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
