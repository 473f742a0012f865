use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::Storage;
use crate::errors::AppError;
use crate::models::{Account, Goal, NewAccount, NewTransaction, Transaction};

const ACCOUNT_COLUMNS: &str = "id, user_id, iban, bic, holder_name, custom_name, bank_name, \
     role, balance, currency, is_active, discovered_at, last_seen_at";

const TRANSACTION_COLUMNS: &str = "id, account_id, booking_date, amount, currency, description, \
     merchant, category_id, is_income, counterparty_name, counterparty_iban, reference, \
     statement_id, internal_transfer, created_at";

/// Postgres-backed store. The production implementation of the storage
/// contract; statement-import atomicity maps onto one database transaction
/// per call.
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn get_accounts_by_user(&self, user_id: Uuid) -> Result<Vec<Account>, AppError> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = $1 ORDER BY discovered_at ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)
    }

    async fn get_account(&self, account_id: Uuid) -> Result<Account, AppError> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))
    }

    async fn get_transactions_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Transaction>, AppError> {
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE account_id = $1 \
             ORDER BY booking_date ASC, created_at ASC"
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)
    }

    async fn get_transactions_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Transaction>, AppError> {
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT t.{} FROM transactions t \
             JOIN accounts a ON a.id = t.account_id \
             WHERE a.user_id = $1 \
             ORDER BY t.booking_date ASC, t.created_at ASC",
            TRANSACTION_COLUMNS.replace(", ", ", t.")
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)
    }

    async fn upsert_account(&self, account: NewAccount) -> Result<(Account, bool), AppError> {
        let existing = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = $1 AND iban = $2"
        ))
        .bind(account.user_id)
        .bind(&account.iban)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        if let Some(current) = existing {
            let updated = sqlx::query_as::<_, Account>(&format!(
                "UPDATE accounts SET balance = $2, bic = COALESCE(bic, $3), last_seen_at = NOW() \
                 WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
            ))
            .bind(current.id)
            .bind(account.balance)
            .bind(&account.bic)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;
            return Ok((updated, false));
        }

        let created = sqlx::query_as::<_, Account>(&format!(
            "INSERT INTO accounts \
                 (id, user_id, iban, bic, holder_name, balance, currency, is_active, \
                  discovered_at, last_seen_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, NOW(), NOW()) \
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(account.user_id)
        .bind(&account.iban)
        .bind(&account.bic)
        .bind(&account.holder_name)
        .bind(account.balance)
        .bind(&account.currency)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok((created, true))
    }

    async fn insert_transactions_if_absent(
        &self,
        account_id: Uuid,
        rows: Vec<NewTransaction>,
    ) -> Result<(usize, usize), AppError> {
        let total = rows.len();
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let mut inserted = 0usize;
        for row in rows {
            // Unique index on (account_id, dedup_key) makes re-imports no-ops.
            let result = sqlx::query(
                "INSERT INTO transactions \
                     (id, account_id, booking_date, amount, currency, description, merchant, \
                      is_income, counterparty_name, counterparty_iban, reference, statement_id, \
                      internal_transfer, dedup_key, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, NOW()) \
                 ON CONFLICT (account_id, dedup_key) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(account_id)
            .bind(row.booking_date)
            .bind(row.amount)
            .bind(&row.currency)
            .bind(&row.description)
            .bind(&row.merchant)
            .bind(row.is_income)
            .bind(&row.counterparty_name)
            .bind(&row.counterparty_iban)
            .bind(&row.reference)
            .bind(&row.statement_id)
            .bind(row.internal_transfer)
            .bind(&row.dedup_key)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(AppError::from)?;
        Ok((inserted, total - inserted))
    }

    async fn get_goals_by_user(&self, user_id: Uuid) -> Result<Vec<Goal>, AppError> {
        sqlx::query_as::<_, Goal>(
            "SELECT id, user_id, name, target_amount, current_amount, linked_account_id, \
                    target_date, priority, is_completed \
             FROM goals WHERE user_id = $1 ORDER BY priority ASC, name ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)
    }

    async fn update_goal_current_amount(
        &self,
        goal_id: Uuid,
        amount: Decimal,
    ) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE goals SET current_amount = $2 WHERE id = $1")
            .bind(goal_id)
            .bind(amount)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Goal not found".to_string()));
        }
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
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let source_balance: Option<Decimal> = sqlx::query_scalar(
            "UPDATE accounts SET balance = balance - $2 \
             WHERE id = $1 AND balance >= $2 RETURNING balance",
        )
        .bind(source_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?;

        let source_balance = match source_balance {
            Some(balance) => balance,
            None => {
                return Err(AppError::ValidationFailed {
                    errors: vec![
                        "Insufficient funds or unknown source account".to_string(),
                    ],
                    warnings: vec![],
                })
            }
        };

        let destination_balance: Decimal = sqlx::query_scalar(
            "UPDATE accounts SET balance = balance + $2 WHERE id = $1 RETURNING balance",
        )
        .bind(destination_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound("Destination account not found".to_string()))?;

        for (account_id, leg_amount, is_income) in [
            (source_id, -amount, false),
            (destination_id, amount, true),
        ] {
            sqlx::query(
                "INSERT INTO transactions \
                     (id, account_id, booking_date, amount, currency, description, is_income, \
                      reference, internal_transfer, dedup_key, created_at) \
                 SELECT $1, $2, CURRENT_DATE, $3, currency, $4, $5, $6, TRUE, $6, NOW() \
                 FROM accounts WHERE id = $2",
            )
            .bind(Uuid::new_v4())
            .bind(account_id)
            .bind(leg_amount)
            .bind(purpose)
            .bind(is_income)
            .bind(reference)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;
        }

        tx.commit().await.map_err(AppError::from)?;
        Ok((source_balance, destination_balance))
    }
}
