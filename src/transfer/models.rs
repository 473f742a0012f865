use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Account, Goal, Transaction};

/// A proposed inter-account transfer, as submitted for execution.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub user_id: Uuid,
    pub source_account_id: Uuid,
    pub destination_account_id: Uuid,
    pub amount: Decimal,
    #[validate(length(min = 1, message = "Purpose cannot be empty"))]
    pub purpose: String,
    pub goal_id: Option<Uuid>,
}

/// Everything the validator looks at for one user, loaded in a single pass.
#[derive(Debug, Clone)]
pub struct FinancialContext {
    pub user_id: Uuid,
    pub accounts: Vec<Account>,
    pub goals: Vec<Goal>,
    pub transactions: Vec<Transaction>,
}

/// Accumulated validation outcome. Errors block, warnings never do; both
/// are collected in full so callers can show the complete picture.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// One transfer the recommendation engine proposes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecommendation {
    pub source_account_id: Uuid,
    pub destination_account_id: Uuid,
    pub amount: Decimal,
    pub purpose: String,
    pub goal_id: Option<Uuid>,
}

impl TransferRecommendation {
    pub fn to_request(&self, user_id: Uuid) -> TransferRequest {
        TransferRequest {
            user_id,
            source_account_id: self.source_account_id,
            destination_account_id: self.destination_account_id,
            amount: self.amount,
            purpose: self.purpose.clone(),
            goal_id: self.goal_id,
        }
    }
}

/// Why a recommendation run produced an empty list. An empty result is a
/// valid outcome, never a silent error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    ContextInvalid,
    NoIncomeAccount,
    NoSurplus,
    NoActiveGoals,
    AllCandidatesRejected,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationSummary {
    pub total_surplus: Decimal,
    pub total_allocated: Decimal,
    pub goals_considered: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationOutcome {
    pub recommendations: Vec<TransferRecommendation>,
    pub summary: AllocationSummary,
    pub reason: Option<ReasonCode>,
}

impl RecommendationOutcome {
    pub fn empty(reason: ReasonCode) -> Self {
        Self {
            recommendations: Vec::new(),
            summary: AllocationSummary::default(),
            reason: Some(reason),
        }
    }
}

/// Result of a successfully executed transfer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub source_balance: Decimal,
    pub destination_balance: Decimal,
    pub reference: String,
    /// Non-blocking findings from validation, passed through for display.
    pub warnings: Vec<String>,
}
