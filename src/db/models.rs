use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Bank {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PolicyDocument {
    pub id: i64,
    pub bank_id: i64,
    pub policy_text: String,
    pub embedding: Option<Vec<f32>>,
    pub updated_at: DateTime<Utc>,
}

/// A policy row joined with the name of the bank that owns it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PolicyWithBank {
    #[serde(flatten)]
    pub policy: PolicyDocument,
    pub name: String,
}
