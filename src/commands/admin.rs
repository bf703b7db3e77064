use std::collections::HashMap;
use std::sync::Arc;

use crate::db::models::{Bank, PolicyDocument};
use crate::db::PolicyStore;
use crate::embedding::EmbeddingClient;

/// Result of an admin action. Store failures are logged, not returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminOutcome {
    Applied,
    /// Blank input; nothing was attempted.
    Skipped,
    /// The store rejected the change; local state is untouched.
    Failed,
}

/// Editing state for the bank/policy admin view.
///
/// Every change goes to the store first; local state is only updated once
/// the store call has succeeded.
pub struct AdminPanel {
    store: Arc<dyn PolicyStore>,
    embedder: Arc<EmbeddingClient>,
    banks: Vec<Bank>,
    active_tab: Option<i64>,
    policies: HashMap<i64, PolicyDocument>,
    editing: Option<i64>,
    policy_text: String,
    is_loading: bool,
}

impl AdminPanel {
    pub fn new(store: Arc<dyn PolicyStore>, embedder: Arc<EmbeddingClient>) -> Self {
        Self {
            store,
            embedder,
            banks: Vec::new(),
            active_tab: None,
            policies: HashMap::new(),
            editing: None,
            policy_text: String::new(),
            is_loading: false,
        }
    }

    pub fn banks(&self) -> &[Bank] {
        &self.banks
    }

    pub fn active_tab(&self) -> Option<i64> {
        self.active_tab
    }

    pub fn active_bank(&self) -> Option<&Bank> {
        let id = self.active_tab?;
        self.banks.iter().find(|b| b.id == id)
    }

    pub fn active_policy(&self) -> Option<&PolicyDocument> {
        self.policies.get(&self.active_tab?)
    }

    pub fn policy(&self, bank_id: i64) -> Option<&PolicyDocument> {
        self.policies.get(&bank_id)
    }

    pub fn editing(&self) -> Option<i64> {
        self.editing
    }

    pub fn policy_text(&self) -> &str {
        &self.policy_text
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Fetch the bank list; the first bank becomes active if none is.
    pub fn load_banks(&mut self) -> AdminOutcome {
        match self.store.list_banks() {
            Ok(banks) => {
                if self.active_tab.is_none() {
                    self.active_tab = banks.first().map(|b| b.id);
                }
                self.banks = banks;
                AdminOutcome::Applied
            }
            Err(e) => {
                tracing::error!(error = %e, "Error loading banks");
                AdminOutcome::Failed
            }
        }
    }

    /// Switch tabs, loading the bank's policy the first time it is shown.
    /// Returns `false` and leaves the tab alone if the bank is not listed.
    pub fn select_tab(&mut self, bank_id: i64) -> bool {
        if !self.banks.iter().any(|b| b.id == bank_id) {
            return false;
        }
        self.active_tab = Some(bank_id);
        if !self.policies.contains_key(&bank_id) {
            self.load_policy(bank_id);
        }
        true
    }

    pub fn load_policy(&mut self, bank_id: i64) -> AdminOutcome {
        match self.store.get_policy_for_bank(bank_id) {
            Ok(Some(policy)) => {
                self.policies.insert(bank_id, policy);
                AdminOutcome::Applied
            }
            Ok(None) => AdminOutcome::Skipped,
            Err(e) => {
                tracing::error!(error = %e, bank_id, "Error loading policy");
                AdminOutcome::Failed
            }
        }
    }

    pub fn begin_edit(&mut self, bank_id: i64) {
        self.editing = Some(bank_id);
        self.policy_text = self
            .policies
            .get(&bank_id)
            .map(|p| p.policy_text.clone())
            .unwrap_or_default();
    }

    pub fn set_policy_text(&mut self, text: impl Into<String>) {
        self.policy_text = text.into();
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
        self.policy_text.clear();
    }

    /// Embed the edit buffer and store it as the bank's policy.
    pub async fn save_policy(&mut self, bank_id: i64) -> AdminOutcome {
        if self.policy_text.trim().is_empty() {
            return AdminOutcome::Skipped;
        }

        self.is_loading = true;
        let embedding = self.embedder.generate_embedding(&self.policy_text).await;
        let outcome = match self
            .store
            .upsert_policy(bank_id, &self.policy_text, &embedding)
        {
            Ok(policy) => {
                tracing::info!(bank_id, "Policy saved");
                self.policies.insert(bank_id, policy);
                self.editing = None;
                self.policy_text.clear();
                AdminOutcome::Applied
            }
            Err(e) => {
                tracing::error!(error = %e, bank_id, "Error saving policy");
                AdminOutcome::Failed
            }
        };
        self.is_loading = false;
        outcome
    }

    /// Create a bank and make it the active tab.
    pub fn add_bank(&mut self, name: &str) -> AdminOutcome {
        if name.trim().is_empty() {
            return AdminOutcome::Skipped;
        }
        match self.store.create_bank(name) {
            Ok(bank) => {
                tracing::info!(bank_id = bank.id, name = %bank.name, "Bank created");
                self.active_tab = Some(bank.id);
                self.banks.push(bank);
                AdminOutcome::Applied
            }
            Err(e) => {
                tracing::error!(error = %e, "Error creating bank");
                AdminOutcome::Failed
            }
        }
    }

    pub fn rename_bank(&mut self, bank_id: i64, name: &str) -> AdminOutcome {
        if name.trim().is_empty() {
            return AdminOutcome::Skipped;
        }
        match self.store.rename_bank(bank_id, name) {
            Ok(renamed) => {
                if let Some(bank) = self.banks.iter_mut().find(|b| b.id == bank_id) {
                    *bank = renamed;
                }
                AdminOutcome::Applied
            }
            Err(e) => {
                tracing::error!(error = %e, bank_id, "Error renaming bank");
                AdminOutcome::Failed
            }
        }
    }

    /// Delete a bank and its policy. If it was active, the first remaining
    /// bank takes over the tab.
    pub fn delete_bank(&mut self, bank_id: i64) -> AdminOutcome {
        if let Err(e) = self.store.delete_bank(bank_id) {
            tracing::error!(error = %e, bank_id, "Error deleting bank");
            return AdminOutcome::Failed;
        }

        tracing::info!(bank_id, "Bank deleted");
        self.banks.retain(|b| b.id != bank_id);
        self.policies.remove(&bank_id);
        if self.editing == Some(bank_id) {
            self.cancel_edit();
        }
        if self.active_tab == Some(bank_id) {
            self.active_tab = self.banks.first().map(|b| b.id);
        }
        AdminOutcome::Applied
    }
}
