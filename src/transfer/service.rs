use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{
    AllocationSummary, FinancialContext, ReasonCode, RecommendationOutcome, TransferOutcome,
    TransferRecommendation, TransferRequest,
};
use super::validator::{validate_context, validate_transfer_request};
use crate::concurrency::{LockManager, LockResource};
use crate::config::PipelineConfig;
use crate::currency::CurrencyService;
use crate::errors::AppError;
use crate::models::{AccountRole, Goal};
use crate::recovery::{RecoveryCoordinator, RetryPolicy};
use crate::storage::Storage;

/// Generates transfer recommendations and executes accepted transfers.
pub struct TransferService {
    storage: Arc<dyn Storage>,
    locks: Arc<LockManager>,
    recovery: Arc<RecoveryCoordinator>,
    config: Arc<PipelineConfig>,
}

impl TransferService {
    pub fn new(
        storage: Arc<dyn Storage>,
        locks: Arc<LockManager>,
        recovery: Arc<RecoveryCoordinator>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            storage,
            locks,
            recovery,
            config,
        }
    }

    /// Recommendation entrypoint. An empty list with a reason code is a
    /// valid outcome, never an error.
    pub async fn recommend_transfers(
        &self,
        user_id: Uuid,
    ) -> Result<RecommendationOutcome, AppError> {
        self.recovery
            .run(
                "transfer_recommendation",
                &RetryPolicy::recommendation(),
                || self.recommend_inner(user_id),
            )
            .await
    }

    /// Execution entrypoint. Rejections come back as `ValidationFailed`
    /// enumerating every violated rule.
    pub async fn execute_transfer(
        &self,
        request: TransferRequest,
    ) -> Result<TransferOutcome, AppError> {
        self.recovery
            .run("transfer_execution", &RetryPolicy::execution(), || {
                self.execute_inner(&request)
            })
            .await
    }

    async fn recommend_inner(&self, user_id: Uuid) -> Result<RecommendationOutcome, AppError> {
        self.locks
            .with_lock(
                LockResource::TransferRecommendation,
                &user_id.to_string(),
                self.config.lock_timeout(),
                || self.build_recommendations(user_id),
            )
            .await
    }

    async fn build_recommendations(
        &self,
        user_id: Uuid,
    ) -> Result<RecommendationOutcome, AppError> {
        let ctx = self.load_context(user_id).await?;

        let context_report = validate_context(&ctx, &self.config);
        if !context_report.valid {
            debug!(%user_id, errors = ?context_report.errors, "context invalid, no recommendations");
            return Ok(RecommendationOutcome::empty(ReasonCode::ContextInvalid));
        }

        let income = match ctx
            .accounts
            .iter()
            .find(|a| a.role() == Some(AccountRole::Income))
        {
            Some(account) => account,
            None => return Ok(RecommendationOutcome::empty(ReasonCode::NoIncomeAccount)),
        };

        let balance_minor = CurrencyService::decimal_to_minor_units(income.balance)?;
        let surplus_minor = balance_minor - self.config.recommendation_buffer_cents;
        if surplus_minor <= 0 {
            return Ok(RecommendationOutcome::empty(ReasonCode::NoSurplus));
        }

        // Fundable goals: incomplete, below target, and backed by an account
        // the money can actually land in.
        let fundable: Vec<(&Goal, i64)> = ctx
            .goals
            .iter()
            .filter(|g| !g.is_completed && g.linked_account_id.is_some())
            .filter_map(|g| {
                let remaining =
                    CurrencyService::decimal_to_minor_units(g.target_amount - g.current_amount)
                        .ok()?;
                (remaining > 0).then_some((g, remaining))
            })
            .collect();
        if fundable.is_empty() {
            return Ok(RecommendationOutcome::empty(ReasonCode::NoActiveGoals));
        }

        let total_remaining: i64 = fundable.iter().map(|(_, r)| r).sum();
        let to_allocate = surplus_minor.min(total_remaining);

        // Priority 1 is most urgent and gets the largest weight.
        let buckets: Vec<(Uuid, u32)> = fundable
            .iter()
            .map(|(g, _)| (g.id, 11u32.saturating_sub(g.priority.clamp(1, 10) as u32)))
            .collect();
        let shares = CurrencyService::distribute_amount(to_allocate, &buckets)?;

        let mut recommendations = Vec::new();
        let mut allocated_minor: i64 = 0;
        let mut rejected = 0usize;
        for ((goal, remaining), (_, share)) in fundable.iter().zip(shares) {
            let amount_minor = share
                .min(*remaining)
                .min(self.config.max_transfer_cents);
            if amount_minor < self.config.min_transfer_cents {
                continue;
            }
            let destination = match goal.linked_account_id {
                Some(id) => id,
                None => continue,
            };
            let candidate = TransferRecommendation {
                source_account_id: income.id,
                destination_account_id: destination,
                amount: CurrencyService::minor_units_to_decimal(amount_minor),
                purpose: format!("Goal funding: {}", goal.name),
                goal_id: Some(goal.id),
            };
            let report =
                validate_transfer_request(&candidate.to_request(user_id), &ctx, &self.config);
            if !report.valid {
                debug!(goal = %goal.name, errors = ?report.errors, "candidate rejected");
                rejected += 1;
                continue;
            }
            allocated_minor += amount_minor;
            recommendations.push(candidate);
        }

        let reason = if recommendations.is_empty() {
            Some(if rejected > 0 {
                ReasonCode::AllCandidatesRejected
            } else {
                ReasonCode::NoActiveGoals
            })
        } else {
            None
        };

        info!(
            %user_id,
            recommended = recommendations.len(),
            allocated = %CurrencyService::from_minor_units(allocated_minor),
            "recommendation run finished"
        );
        Ok(RecommendationOutcome {
            recommendations,
            summary: AllocationSummary {
                total_surplus: CurrencyService::minor_units_to_decimal(surplus_minor),
                total_allocated: CurrencyService::minor_units_to_decimal(allocated_minor),
                goals_considered: fundable.len(),
            },
            reason,
        })
    }

    async fn execute_inner(&self, request: &TransferRequest) -> Result<TransferOutcome, AppError> {
        let ctx = self.load_context(request.user_id).await?;

        let report = validate_transfer_request(request, &ctx, &self.config);
        if !report.valid {
            return Err(AppError::ValidationFailed {
                errors: report.errors,
                warnings: report.warnings,
            });
        }

        let timeout = self.config.lock_timeout();
        let _execution_guard = self
            .locks
            .acquire(
                LockResource::TransferExecution,
                &request.user_id.to_string(),
                timeout,
            )
            .await?;
        // Sorted pair acquisition keeps concurrent executions deadlock-free.
        let _account_guards = self
            .locks
            .acquire_multiple_account_locks(
                &[request.source_account_id, request.destination_account_id],
                timeout,
            )
            .await?;

        let reference = format!("TRF-{}", Uuid::new_v4());
        let (source_balance, destination_balance) = self
            .storage
            .execute_transfer(
                request.source_account_id,
                request.destination_account_id,
                request.amount,
                &request.purpose,
                &reference,
            )
            .await?;

        info!(
            user_id = %request.user_id,
            amount = %request.amount,
            %reference,
            "transfer executed"
        );
        Ok(TransferOutcome {
            source_balance,
            destination_balance,
            reference,
            warnings: report.warnings,
        })
    }

    /// Validation context for one user, loaded under the data-access retry
    /// policy.
    pub async fn load_context(&self, user_id: Uuid) -> Result<FinancialContext, AppError> {
        self.recovery
            .run("load_financial_context", &RetryPolicy::data_access(), || async move {
                let accounts = self.storage.get_accounts_by_user(user_id).await?;
                let goals = self.storage.get_goals_by_user(user_id).await?;
                let transactions = self.storage.get_transactions_by_user(user_id).await?;
                Ok(FinancialContext {
                    user_id,
                    accounts,
                    goals,
                    transactions,
                })
            })
            .await
    }

    /// Post-transfer convenience: the affected balances as fixed 2-place
    /// strings for display.
    pub fn format_balance(balance: Decimal) -> Result<String, AppError> {
        let minor = CurrencyService::decimal_to_minor_units(balance)?;
        Ok(CurrencyService::from_minor_units(minor))
    }
}
