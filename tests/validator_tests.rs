mod common;

use chrono::{Duration, Utc};
use fire_core::config::PipelineConfig;
use fire_core::transfer::validator::{validate_context, validate_transfer_request};
use fire_core::transfer::{FinancialContext, TransferRequest};
use uuid::Uuid;

use common::{account, dec, goal, transaction};

fn context(user_id: Uuid) -> FinancialContext {
    FinancialContext {
        user_id,
        accounts: Vec::new(),
        goals: Vec::new(),
        transactions: Vec::new(),
    }
}

#[test]
fn empty_context_is_a_single_error() {
    let config = PipelineConfig::default();
    let report = validate_context(&context(Uuid::new_v4()), &config);
    assert!(!report.valid);
    assert_eq!(report.errors, vec!["No accounts available for this user"]);
}

#[test]
fn negative_balance_warns_without_blocking() {
    let config = PipelineConfig::default();
    let user_id = Uuid::new_v4();
    let mut ctx = context(user_id);
    ctx.accounts
        .push(account(user_id, "NL91ABNA0417164300", "-12.50", Some("income")));

    let report = validate_context(&ctx, &config);
    assert!(report.valid);
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("negative balance")));
}

#[test]
fn duplicate_ibans_are_an_error() {
    let config = PipelineConfig::default();
    let user_id = Uuid::new_v4();
    let mut ctx = context(user_id);
    ctx.accounts
        .push(account(user_id, "NL91ABNA0417164300", "10.00", Some("income")));
    ctx.accounts
        .push(account(user_id, "NL91ABNA0417164300", "20.00", None));

    let report = validate_context(&ctx, &config);
    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.contains("Duplicate IBAN")));
}

#[test]
fn goal_linked_to_a_missing_account_is_an_error() {
    let config = PipelineConfig::default();
    let user_id = Uuid::new_v4();
    let mut ctx = context(user_id);
    ctx.accounts
        .push(account(user_id, "NL91ABNA0417164300", "10.00", Some("income")));
    ctx.goals.push(goal(
        user_id,
        "Orphan",
        "100.00",
        "0.00",
        Some(Uuid::new_v4()),
        3,
    ));

    let report = validate_context(&ctx, &config);
    assert!(!report.valid);
    assert!(report
        .errors
        .iter()
        .any(|e| e.contains("nonexistent account")));
}

#[test]
fn out_of_range_goal_priority_warns() {
    let config = PipelineConfig::default();
    let user_id = Uuid::new_v4();
    let mut ctx = context(user_id);
    let acct = account(user_id, "NL91ABNA0417164300", "10.00", Some("income"));
    ctx.goals
        .push(goal(user_id, "Rushed", "100.00", "0.00", Some(acct.id), 0));
    ctx.accounts.push(acct);

    let report = validate_context(&ctx, &config);
    assert!(report.valid);
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("outside the 1-10 range")));
}

#[test]
fn balance_drift_beyond_one_cent_warns() {
    let config = PipelineConfig::default();
    let user_id = Uuid::new_v4();
    let mut ctx = context(user_id);
    let acct = account(user_id, "NL91ABNA0417164300", "100.00", Some("income"));
    let today = Utc::now().date_naive();
    // Transactions sum to 90.00 against a stored balance of 100.00.
    ctx.transactions.push(transaction(acct.id, today, "90.00"));
    ctx.accounts.push(acct);

    let report = validate_context(&ctx, &config);
    assert!(report.valid);
    assert!(report.warnings.iter().any(|w| w.contains("diverges")));
}

#[test]
fn one_cent_of_drift_is_tolerated() {
    let config = PipelineConfig::default();
    let user_id = Uuid::new_v4();
    let mut ctx = context(user_id);
    let acct = account(user_id, "NL91ABNA0417164300", "100.00", Some("income"));
    let today = Utc::now().date_naive();
    ctx.transactions.push(transaction(acct.id, today, "99.99"));
    ctx.accounts.push(acct);

    let report = validate_context(&ctx, &config);
    assert!(!report.warnings.iter().any(|w| w.contains("diverges")));
}

#[test]
fn future_dated_transactions_warn() {
    let config = PipelineConfig::default();
    let user_id = Uuid::new_v4();
    let mut ctx = context(user_id);
    let acct = account(user_id, "NL91ABNA0417164300", "25.00", Some("income"));
    let tomorrow = Utc::now().date_naive() + Duration::days(1);
    ctx.transactions.push(transaction(acct.id, tomorrow, "25.00"));
    ctx.accounts.push(acct);

    let report = validate_context(&ctx, &config);
    assert!(report.valid);
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("dated in the future")));
}

#[test]
fn empty_purpose_and_bounds_are_request_errors() {
    let config = PipelineConfig::default();
    let user_id = Uuid::new_v4();
    let source = account(user_id, "NL91ABNA0417164300", "500.00", Some("income"));
    let destination = account(user_id, "NL39RABO0300065264", "0.00", None);
    let mut ctx = context(user_id);
    ctx.accounts.push(source.clone());
    ctx.accounts.push(destination.clone());

    let request = TransferRequest {
        user_id,
        source_account_id: source.id,
        destination_account_id: destination.id,
        amount: dec("0.00"),
        purpose: String::new(),
        goal_id: None,
    };
    let report = validate_transfer_request(&request, &ctx, &config);
    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.contains("Purpose cannot be empty")));
    // A zero amount falls below the per-transfer minimum.
    assert!(report.errors.len() >= 2);
}

#[test]
fn over_length_purpose_warns_without_blocking() {
    let config = PipelineConfig::default();
    let user_id = Uuid::new_v4();
    let source = account(user_id, "NL91ABNA0417164300", "500.00", Some("income"));
    let destination = account(user_id, "NL39RABO0300065264", "0.00", None);
    let mut ctx = context(user_id);
    ctx.accounts.push(source.clone());
    ctx.accounts.push(destination.clone());

    let request = TransferRequest {
        user_id,
        source_account_id: source.id,
        destination_account_id: destination.id,
        amount: dec("10.00"),
        purpose: "x".repeat(config.max_purpose_length + 1),
        goal_id: None,
    };
    let report = validate_transfer_request(&request, &ctx, &config);
    assert!(report.valid);
    assert!(report.warnings.iter().any(|w| w.contains(&format!(
        "Purpose is longer than {} characters",
        config.max_purpose_length
    ))));
}

#[test]
fn request_for_another_users_account_is_rejected() {
    let config = PipelineConfig::default();
    let user_id = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let source = account(user_id, "NL91ABNA0417164300", "500.00", Some("income"));
    let foreign = account(stranger, "NL39RABO0300065264", "0.00", None);
    let mut ctx = context(user_id);
    ctx.accounts.push(source.clone());

    let request = TransferRequest {
        user_id,
        source_account_id: source.id,
        destination_account_id: foreign.id,
        amount: dec("10.00"),
        purpose: "Exfiltrate".to_string(),
        goal_id: None,
    };
    let report = validate_transfer_request(&request, &ctx, &config);
    assert!(!report.valid);
    assert!(report
        .errors
        .iter()
        .any(|e| e.contains("Destination account does not exist")));
}

#[test]
fn emergency_to_investment_pairing_warns() {
    let config = PipelineConfig::default();
    let user_id = Uuid::new_v4();
    let source = account(user_id, "NL91ABNA0417164300", "500.00", Some("emergency"));
    let destination = account(user_id, "NL39RABO0300065264", "0.00", Some("investment"));
    let mut ctx = context(user_id);
    ctx.accounts.push(source.clone());
    ctx.accounts.push(destination.clone());

    let request = TransferRequest {
        user_id,
        source_account_id: source.id,
        destination_account_id: destination.id,
        amount: dec("50.00"),
        purpose: "Punt".to_string(),
        goal_id: None,
    };
    let report = validate_transfer_request(&request, &ctx, &config);
    assert!(report.valid);
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("emergency funds into investments")));
}
