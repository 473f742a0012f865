use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

use super::models::{FinancialContext, TransferRequest, ValidationReport};
use crate::config::PipelineConfig;
use crate::currency::CurrencyService;
use crate::models::{Account, AccountRole};

/// Pure validation over a user's financial data. Lock-free and
/// side-effect-free; safe to run unboundedly in parallel.
///
/// Checks accumulate into errors and warnings rather than returning on the
/// first failure, except for structural breakage that would make the
/// remaining checks meaningless.
pub fn validate_context(ctx: &FinancialContext, _config: &PipelineConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    if ctx.accounts.is_empty() {
        report.error("No accounts available for this user");
        return report;
    }

    check_accounts(ctx, &mut report);
    check_goals(ctx, &mut report);
    check_transactions(ctx, &mut report);
    check_balance_consistency(ctx, &mut report);

    report
}

/// Validate a proposed transfer against the context. Returns the complete
/// rule picture; callers decide whether to reject.
pub fn validate_transfer_request(
    request: &TransferRequest,
    ctx: &FinancialContext,
    config: &PipelineConfig,
) -> ValidationReport {
    let mut report = ValidationReport::new();

    if ctx.accounts.is_empty() {
        report.error("No accounts available for this user");
        return report;
    }
    if request.user_id != ctx.user_id {
        report.error("Transfer request does not belong to this user");
        return report;
    }

    // Structural checks on the request itself.
    if let Err(errors) = request.validate() {
        for (_, field_errors) in errors.field_errors() {
            for field_error in field_errors {
                match &field_error.message {
                    Some(message) => report.error(message.to_string()),
                    None => report.error(format!("Invalid field: {}", field_error.code)),
                }
            }
        }
    }
    if request.purpose.len() > config.max_purpose_length {
        report.warn(format!(
            "Purpose is longer than {} characters",
            config.max_purpose_length
        ));
    }

    let amount_minor = match CurrencyService::decimal_to_minor_units(request.amount) {
        Ok(minor) => minor,
        Err(err) => {
            report.error(err.to_string());
            return report;
        }
    };
    if let Err(err) = CurrencyService::validate_transfer_amount(amount_minor, config) {
        report.error(err.to_string());
    }

    if request.source_account_id == request.destination_account_id {
        report.error("Source and destination are the same account");
    }

    let source = find_account(ctx, request.source_account_id);
    let destination = find_account(ctx, request.destination_account_id);
    if source.is_none() {
        report.error("Source account does not exist or does not belong to this user");
    }
    if destination.is_none() {
        report.error("Destination account does not exist or does not belong to this user");
    }

    if let Some(source) = source {
        check_funds(source, request.amount, amount_minor, config, &mut report);
        check_daily_ceiling(ctx, amount_minor, config, &mut report);
        if let Some(destination) = destination {
            check_role_pairing(source, destination, amount_minor, config, &mut report);
        }
    }

    if let Some(goal_id) = request.goal_id {
        check_goal_transfer(ctx, goal_id, request, &mut report);
    }

    report
}

fn find_account(ctx: &FinancialContext, id: Uuid) -> Option<&Account> {
    ctx.accounts
        .iter()
        .find(|a| a.id == id && a.user_id == ctx.user_id)
}

fn check_accounts(ctx: &FinancialContext, report: &mut ValidationReport) {
    let mut seen_ids = HashSet::new();
    let mut seen_ibans = HashSet::new();

    for account in &ctx.accounts {
        if !seen_ids.insert(account.id) {
            report.error(format!("Duplicate account id {}", account.id));
        }
        if !seen_ibans.insert(account.iban.as_str()) {
            report.error(format!("Duplicate IBAN {}", account.iban));
        }
        if account.user_id != ctx.user_id {
            report.error(format!(
                "Account {} belongs to a different user",
                account.iban
            ));
        }
        if account.balance < Decimal::ZERO {
            report.warn(format!(
                "Account {} has a negative balance ({})",
                account.iban, account.balance
            ));
        }
        if let Err(err) = CurrencyService::decimal_to_minor_units(account.balance) {
            report.error(format!("Account {} balance: {err}", account.iban));
        }
    }

    if !ctx
        .accounts
        .iter()
        .any(|a| a.role() == Some(AccountRole::Income))
    {
        report.warn("No account is assigned the income role");
    }
}

fn check_goals(ctx: &FinancialContext, report: &mut ValidationReport) {
    if ctx.goals.is_empty() {
        report.warn("No goals are defined");
        return;
    }

    let account_ids: HashSet<Uuid> = ctx.accounts.iter().map(|a| a.id).collect();
    let today = Utc::now().date_naive();

    for goal in &ctx.goals {
        if goal.current_amount > goal.target_amount && !goal.is_completed {
            report.warn(format!(
                "Goal '{}' is past its target but not marked completed",
                goal.name
            ));
        }
        if goal.is_completed && goal.current_amount < goal.target_amount {
            report.warn(format!(
                "Goal '{}' is marked completed below its target",
                goal.name
            ));
        }
        if let Some(linked) = goal.linked_account_id {
            if !account_ids.contains(&linked) {
                report.error(format!(
                    "Goal '{}' is linked to a nonexistent account",
                    goal.name
                ));
            }
        }
        if let Some(target_date) = goal.target_date {
            if target_date < today && !goal.is_completed {
                report.warn(format!("Goal '{}' is past its target date", goal.name));
            }
        }
        if !(1..=10).contains(&goal.priority) {
            report.warn(format!(
                "Goal '{}' priority {} is outside the 1-10 range",
                goal.name, goal.priority
            ));
        }
    }
}

fn check_transactions(ctx: &FinancialContext, report: &mut ValidationReport) {
    if ctx.transactions.is_empty() {
        report.warn("No transactions have been imported yet");
        return;
    }

    let account_ids: HashSet<Uuid> = ctx.accounts.iter().map(|a| a.id).collect();
    let mut seen_references = HashSet::new();
    let today = Utc::now().date_naive();

    for tx in &ctx.transactions {
        if !account_ids.contains(&tx.account_id) {
            report.error(format!(
                "Transaction {} references a nonexistent account",
                tx.id
            ));
        }
        if let Some(reference) = &tx.reference {
            if !seen_references.insert((tx.account_id, reference.clone())) {
                report.warn(format!("Duplicate transaction reference '{reference}'"));
            }
        }
        if tx.booking_date > today {
            report.warn(format!(
                "Transaction {} is dated in the future ({})",
                tx.id, tx.booking_date
            ));
        }
        if let Err(err) = CurrencyService::decimal_to_minor_units(tx.amount) {
            report.error(format!("Transaction {} amount: {err}", tx.id));
        }
    }
}

/// Summed transactions drifting from the stored balance by more than one
/// cent is warned, never auto-corrected here.
fn check_balance_consistency(ctx: &FinancialContext, report: &mut ValidationReport) {
    let one_cent = Decimal::new(1, 2);
    for account in &ctx.accounts {
        let rows: Vec<&_> = ctx
            .transactions
            .iter()
            .filter(|t| t.account_id == account.id)
            .collect();
        if rows.is_empty() {
            continue;
        }
        let sum: Decimal = rows.iter().map(|t| t.amount).sum();
        let drift = (account.balance - sum).abs();
        if drift > one_cent {
            report.warn(format!(
                "Account {} balance {} diverges from its transaction sum {} by {}",
                account.iban, account.balance, sum, drift
            ));
        }
    }
}

fn check_funds(
    source: &Account,
    amount: Decimal,
    amount_minor: i64,
    config: &PipelineConfig,
    report: &mut ValidationReport,
) {
    if source.balance < amount {
        report.error(format!(
            "Insufficient funds: balance {} is below the requested {}",
            source.balance, amount
        ));
        return;
    }
    let remaining = match CurrencyService::decimal_to_minor_units(source.balance) {
        Ok(balance_minor) => balance_minor - amount_minor,
        Err(_) => return, // already reported by the context checks
    };
    if remaining < config.low_balance_threshold_cents {
        report.warn(format!(
            "Transfer would leave the source account below {}",
            CurrencyService::from_minor_units(config.low_balance_threshold_cents)
        ));
    }
}

fn check_daily_ceiling(
    ctx: &FinancialContext,
    amount_minor: i64,
    config: &PipelineConfig,
    report: &mut ValidationReport,
) {
    let today = Utc::now().date_naive();
    let spent_today: i64 = ctx
        .transactions
        .iter()
        .filter(|t| t.internal_transfer && t.amount < Decimal::ZERO && t.booking_date == today)
        .filter_map(|t| CurrencyService::decimal_to_minor_units(t.amount).ok())
        .map(i64::abs)
        .sum();

    if spent_today + amount_minor > config.daily_transfer_ceiling_cents {
        report.error(format!(
            "Daily transfer ceiling of {} would be exceeded ({} already transferred today)",
            CurrencyService::from_minor_units(config.daily_transfer_ceiling_cents),
            CurrencyService::from_minor_units(spent_today)
        ));
    }
}

fn check_role_pairing(
    source: &Account,
    destination: &Account,
    amount_minor: i64,
    config: &PipelineConfig,
    report: &mut ValidationReport,
) {
    match (source.role(), destination.role()) {
        (Some(AccountRole::Emergency), Some(AccountRole::Investment)) => {
            report.warn("Moving emergency funds into investments is unusual");
        }
        (Some(AccountRole::Savings), Some(AccountRole::Checking))
            if amount_minor > config.daily_transfer_ceiling_cents / 2 =>
        {
            report.warn("Large transfer from savings back to checking");
        }
        _ => {}
    }
}

fn check_goal_transfer(
    ctx: &FinancialContext,
    goal_id: Uuid,
    request: &TransferRequest,
    report: &mut ValidationReport,
) {
    let goal = match ctx.goals.iter().find(|g| g.id == goal_id) {
        Some(goal) => goal,
        None => {
            report.error("Goal does not exist");
            return;
        }
    };

    if goal.is_completed {
        report.error(format!(
            "Goal '{}' is already completed; transfers to it are rejected",
            goal.name
        ));
        return;
    }

    let projected = goal.current_amount + request.amount;
    if projected > goal.target_amount {
        report.warn(format!(
            "Transfer would exceed goal '{}' target by {}",
            goal.name,
            projected - goal.target_amount
        ));
    }

    if let Some(linked) = goal.linked_account_id {
        if linked != request.destination_account_id {
            report.warn(format!(
                "Destination account does not match the account linked to goal '{}'",
                goal.name
            ));
        }
    }
}
