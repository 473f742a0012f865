use std::time::Instant;

/// Logical resource classes guarded by advisory locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockResource {
    /// Recommendation generation for one user.
    TransferRecommendation,
    /// Transfer execution for one user.
    TransferExecution,
    /// Mutation of a single account.
    Account,
}

impl LockResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockResource::TransferRecommendation => "transfer_recommendation",
            LockResource::TransferExecution => "transfer_execution",
            LockResource::Account => "account",
        }
    }
}

/// One held lock in the advisory table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LockEntry {
    /// Distinguishes this holder from a later one after a force-release.
    pub token: u64,
    pub acquired_at: Instant,
}
