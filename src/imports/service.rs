use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::models::ImportResult;
use crate::camt::{parse_statements, Statement};
use crate::concurrency::{LockManager, LockResource};
use crate::config::PipelineConfig;
use crate::currency::CurrencyService;
use crate::errors::AppError;
use crate::models::{NewAccount, NewTransaction};
use crate::storage::Storage;

/// Reconciles parsed statements into persistent accounts and transactions.
pub struct ImportService {
    storage: Arc<dyn Storage>,
    locks: Arc<LockManager>,
    config: Arc<PipelineConfig>,
}

impl ImportService {
    pub fn new(
        storage: Arc<dyn Storage>,
        locks: Arc<LockManager>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            storage,
            locks,
            config,
        }
    }

    /// Import entrypoint: raw statement bytes plus the owning user.
    /// Parsing failures (`EncodingError`, `MalformedDocument`) abort before
    /// any write; each statement is then reconciled atomically under its
    /// account lock.
    pub async fn import_document(
        &self,
        user_id: Uuid,
        bytes: &[u8],
    ) -> Result<ImportResult, AppError> {
        let statements = parse_statements(bytes)?;

        let mut result = ImportResult::default();
        for statement in &statements {
            result.absorb(self.import_statement(user_id, statement).await?);
        }
        info!(
            %user_id,
            statements = statements.len(),
            inserted = result.transactions_inserted,
            skipped = result.duplicates_skipped,
            "statement import finished"
        );
        Ok(result)
    }

    /// Reconcile one parsed statement. An IBAN-keyed lock serializes imports
    /// for the same statement account; once the account id is known, the
    /// id-keyed lock that transfer execution takes is held as well, so an
    /// import and a transfer never mutate the same balance concurrently.
    pub async fn import_statement(
        &self,
        user_id: Uuid,
        statement: &Statement,
    ) -> Result<ImportResult, AppError> {
        let iban_key = format!("{user_id}:{}", statement.account.iban);
        let _iban_guard = self
            .locks
            .acquire(
                LockResource::Account,
                &iban_key,
                self.config.lock_timeout(),
            )
            .await?;

        // A first import has no account id to lock until the row exists; for
        // every later import the id is resolved and locked up front.
        let existing_id = self
            .storage
            .get_accounts_by_user(user_id)
            .await?
            .into_iter()
            .find(|account| account.iban == statement.account.iban)
            .map(|account| account.id);
        let _account_guard = match existing_id {
            Some(id) => Some(
                self.locks
                    .acquire(
                        LockResource::Account,
                        &id.to_string(),
                        self.config.lock_timeout(),
                    )
                    .await?,
            ),
            None => None,
        };

        self.reconcile(user_id, statement).await
    }

    async fn reconcile(
        &self,
        user_id: Uuid,
        statement: &Statement,
    ) -> Result<ImportResult, AppError> {
        // Validate every money value before the first write; a single bad
        // row aborts the whole statement instead of importing a gap.
        CurrencyService::decimal_to_minor_units(statement.account.closing_balance)?;
        let rows = Self::build_rows(statement)?;

        let (account, created) = self
            .storage
            .upsert_account(NewAccount {
                user_id,
                iban: statement.account.iban.clone(),
                bic: statement.account.bic.clone(),
                holder_name: statement.account.holder_name.clone(),
                // The statement's closing balance is authoritative; it
                // supersedes anything derivable by summing transactions.
                balance: statement.account.closing_balance,
                currency: statement.account.currency.clone(),
            })
            .await?;

        // A freshly created account only became lockable by id just now. The
        // IBAN guard kept creation exclusive, so this cannot self-deadlock.
        let _created_guard = if created {
            Some(
                self.locks
                    .acquire(
                        LockResource::Account,
                        &account.id.to_string(),
                        self.config.lock_timeout(),
                    )
                    .await?,
            )
        } else {
            None
        };

        let (inserted, skipped) = self
            .storage
            .insert_transactions_if_absent(account.id, rows)
            .await?;

        self.recompute_linked_goals(user_id, account.id, account.balance)
            .await?;

        Ok(ImportResult {
            accounts_created: usize::from(created),
            transactions_inserted: inserted,
            duplicates_skipped: skipped,
        })
    }

    fn build_rows(statement: &Statement) -> Result<Vec<NewTransaction>, AppError> {
        statement
            .transactions
            .iter()
            .map(|tx| {
                let minor = CurrencyService::decimal_to_minor_units(tx.amount)?;
                let dedup_key = match &tx.reference {
                    Some(reference) => format!("ref:{reference}"),
                    None => format!("cmp:{}|{minor}", tx.booking_date),
                };
                Ok(NewTransaction {
                    booking_date: tx.booking_date,
                    amount: tx.amount,
                    currency: tx.currency.clone(),
                    description: tx.description.clone(),
                    merchant: tx.merchant.clone(),
                    is_income: tx.amount > Decimal::ZERO,
                    counterparty_name: tx.counterparty_name.clone(),
                    counterparty_iban: tx.counterparty_iban.clone(),
                    reference: tx.reference.clone(),
                    statement_id: Some(statement.id.clone()),
                    internal_transfer: false,
                    dedup_key,
                })
            })
            .collect()
    }

    /// Goals linked to the updated account track its balance. The stored
    /// amount is intentionally uncapped; progress past the target is warned,
    /// never clamped.
    async fn recompute_linked_goals(
        &self,
        user_id: Uuid,
        account_id: Uuid,
        balance: Decimal,
    ) -> Result<(), AppError> {
        let goals = self.storage.get_goals_by_user(user_id).await?;
        for goal in goals {
            if goal.linked_account_id != Some(account_id) {
                continue;
            }
            if balance > goal.target_amount {
                warn!(
                    goal = %goal.name,
                    balance = %balance,
                    target = %goal.target_amount,
                    "goal progress exceeds its target"
                );
            }
            self.storage
                .update_goal_current_amount(goal.id, balance)
                .await?;
        }
        Ok(())
    }
}
