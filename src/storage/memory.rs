use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Storage;
use crate::errors::AppError;
use crate::models::{Account, Goal, NewAccount, NewTransaction, Transaction};

#[derive(Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    transactions: HashMap<Uuid, Vec<Transaction>>,
    dedup_keys: HashMap<Uuid, HashSet<String>>,
    goals: HashMap<Uuid, Goal>,
}

/// In-memory store. Correct only for a single-process deployment; every
/// mutating call takes one write lock, which is what makes the per-call
/// atomicity guarantees hold.
#[derive(Default)]
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account directly; test and bootstrap helper.
    pub async fn add_account(&self, account: Account) {
        self.inner.write().await.accounts.insert(account.id, account);
    }

    /// Seed a goal directly; test and bootstrap helper.
    pub async fn add_goal(&self, goal: Goal) {
        self.inner.write().await.goals.insert(goal.id, goal);
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_accounts_by_user(&self, user_id: Uuid) -> Result<Vec<Account>, AppError> {
        let inner = self.inner.read().await;
        let mut accounts: Vec<Account> = inner
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.discovered_at.cmp(&b.discovered_at));
        Ok(accounts)
    }

    async fn get_account(&self, account_id: Uuid) -> Result<Account, AppError> {
        self.inner
            .read()
            .await
            .accounts
            .get(&account_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))
    }

    async fn get_transactions_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Transaction>, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .transactions
            .get(&account_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_transactions_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Transaction>, AppError> {
        let inner = self.inner.read().await;
        let account_ids: HashSet<Uuid> = inner
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .map(|a| a.id)
            .collect();
        Ok(inner
            .transactions
            .iter()
            .filter(|(id, _)| account_ids.contains(id))
            .flat_map(|(_, rows)| rows.iter().cloned())
            .collect())
    }

    async fn upsert_account(&self, account: NewAccount) -> Result<(Account, bool), AppError> {
        let mut inner = self.inner.write().await;
        let existing_id = inner
            .accounts
            .values()
            .find(|a| a.user_id == account.user_id && a.iban == account.iban)
            .map(|a| a.id);

        if let Some(row) = existing_id.and_then(|id| inner.accounts.get_mut(&id)) {
            row.balance = account.balance;
            row.last_seen_at = Utc::now();
            if row.bic.is_none() {
                row.bic = account.bic;
            }
            return Ok((row.clone(), false));
        }

        let now = Utc::now();
        let row = Account {
            id: Uuid::new_v4(),
            user_id: account.user_id,
            iban: account.iban,
            bic: account.bic,
            holder_name: account.holder_name,
            custom_name: None,
            bank_name: None,
            // Role assignment is a separate user action after discovery.
            role: None,
            balance: account.balance,
            currency: account.currency,
            is_active: true,
            discovered_at: now,
            last_seen_at: now,
        };
        inner.accounts.insert(row.id, row.clone());
        Ok((row, true))
    }

    async fn insert_transactions_if_absent(
        &self,
        account_id: Uuid,
        rows: Vec<NewTransaction>,
    ) -> Result<(usize, usize), AppError> {
        let mut inner = self.inner.write().await;
        if !inner.accounts.contains_key(&account_id) {
            return Err(AppError::NotFound("Account not found".to_string()));
        }

        let mut inserted = 0;
        let mut skipped = 0;
        for row in rows {
            let keys = inner.dedup_keys.entry(account_id).or_default();
            if !keys.insert(row.dedup_key.clone()) {
                skipped += 1;
                continue;
            }
            inner
                .transactions
                .entry(account_id)
                .or_default()
                .push(Transaction {
                    id: Uuid::new_v4(),
                    account_id,
                    booking_date: row.booking_date,
                    amount: row.amount,
                    currency: row.currency,
                    description: row.description,
                    merchant: row.merchant,
                    category_id: None,
                    is_income: row.is_income,
                    counterparty_name: row.counterparty_name,
                    counterparty_iban: row.counterparty_iban,
                    reference: row.reference,
                    statement_id: row.statement_id,
                    internal_transfer: row.internal_transfer,
                    created_at: Utc::now(),
                });
            inserted += 1;
        }
        Ok((inserted, skipped))
    }

    async fn get_goals_by_user(&self, user_id: Uuid) -> Result<Vec<Goal>, AppError> {
        let inner = self.inner.read().await;
        let mut goals: Vec<Goal> = inner
            .goals
            .values()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect();
        goals.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.name.cmp(&b.name)));
        Ok(goals)
    }

    async fn update_goal_current_amount(
        &self,
        goal_id: Uuid,
        amount: Decimal,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let goal = inner
            .goals
            .get_mut(&goal_id)
            .ok_or_else(|| AppError::NotFound("Goal not found".to_string()))?;
        goal.current_amount = amount;
        Ok(())
    }

    async fn execute_transfer(
        &self,
        source_id: Uuid,
        destination_id: Uuid,
        amount: Decimal,
        purpose: &str,
        reference: &str,
    ) -> Result<(Decimal, Decimal), AppError> {
        let mut inner = self.inner.write().await;

        let source = inner
            .accounts
            .get(&source_id)
            .ok_or_else(|| AppError::NotFound("Source account not found".to_string()))?
            .clone();
        let destination = inner
            .accounts
            .get(&destination_id)
            .ok_or_else(|| AppError::NotFound("Destination account not found".to_string()))?
            .clone();

        if source.balance < amount {
            return Err(AppError::ValidationFailed {
                errors: vec![format!(
                    "Insufficient funds: balance {} is below the transfer amount {}",
                    source.balance, amount
                )],
                warnings: vec![],
            });
        }

        let new_source_balance = source.balance - amount;
        let new_destination_balance = destination.balance + amount;
        let today = Utc::now().date_naive();
        let currency = source.currency.clone();

        if let Some(row) = inner.accounts.get_mut(&source_id) {
            row.balance = new_source_balance;
        }
        if let Some(row) = inner.accounts.get_mut(&destination_id) {
            row.balance = new_destination_balance;
        }

        for (account_id, leg_amount, is_income) in [
            (source_id, -amount, false),
            (destination_id, amount, true),
        ] {
            inner
                .dedup_keys
                .entry(account_id)
                .or_default()
                .insert(reference.to_string());
            inner
                .transactions
                .entry(account_id)
                .or_default()
                .push(Transaction {
                    id: Uuid::new_v4(),
                    account_id,
                    booking_date: today,
                    amount: leg_amount,
                    currency: currency.clone(),
                    description: purpose.to_string(),
                    merchant: None,
                    category_id: None,
                    is_income,
                    counterparty_name: None,
                    counterparty_iban: None,
                    reference: Some(reference.to_string()),
                    statement_id: None,
                    internal_transfer: true,
                    created_at: Utc::now(),
                });
        }

        Ok((new_source_balance, new_destination_balance))
    }
}
