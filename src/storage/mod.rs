mod memory;
mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Account, Goal, NewAccount, NewTransaction, Transaction};

/// Contract the pipeline requires from persistence. The engine behind it is
/// deliberately unspecified; `PgStorage` is the production implementation,
/// `MemoryStorage` the single-process store the test suite runs on.
///
/// Money crosses this boundary as `Decimal`, never as a float.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_accounts_by_user(&self, user_id: Uuid) -> Result<Vec<Account>, AppError>;

    async fn get_account(&self, account_id: Uuid) -> Result<Account, AppError>;

    async fn get_transactions_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Transaction>, AppError>;

    async fn get_transactions_by_user(&self, user_id: Uuid)
        -> Result<Vec<Transaction>, AppError>;

    /// Match by `(user_id, IBAN)`; insert when absent, otherwise update the
    /// balance and last-seen timestamp. Returns the row and whether it was
    /// created.
    async fn upsert_account(&self, account: NewAccount) -> Result<(Account, bool), AppError>;

    /// Insert rows whose dedup key is not already present; atomic per call.
    /// Returns `(inserted, duplicates_skipped)`.
    async fn insert_transactions_if_absent(
        &self,
        account_id: Uuid,
        rows: Vec<NewTransaction>,
    ) -> Result<(usize, usize), AppError>;

    async fn get_goals_by_user(&self, user_id: Uuid) -> Result<Vec<Goal>, AppError>;

    async fn update_goal_current_amount(
        &self,
        goal_id: Uuid,
        amount: Decimal,
    ) -> Result<(), AppError>;

    /// Move `amount` between two accounts and write the two
    /// internal-transfer-tagged legs, all atomically. Returns the resulting
    /// `(source_balance, destination_balance)`.
    async fn execute_transfer(
        &self,
        source_id: Uuid,
        destination_id: Uuid,
        amount: Decimal,
        purpose: &str,
        reference: &str,
    ) -> Result<(Decimal, Decimal), AppError>;
}
