use serde::Serialize;

/// Outcome of importing one document (all of its statements).
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub accounts_created: usize,
    pub transactions_inserted: usize,
    pub duplicates_skipped: usize,
}

impl ImportResult {
    pub(crate) fn absorb(&mut self, other: ImportResult) {
        self.accounts_created += other.accounts_created;
        self.transactions_inserted += other.transactions_inserted;
        self.duplicates_skipped += other.duplicates_skipped;
    }
}
