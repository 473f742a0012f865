use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Functional role a user has assigned to an account. Freshly imported
/// accounts carry no role; assignment is a separate user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    /// Salary and other inflows land here.
    Income,
    /// Day-to-day spending account.
    Spending,
    /// Emergency fund.
    Emergency,
    Savings,
    Investment,
    /// Earmarked for a specific goal.
    Goal,
    Checking,
}

impl AccountRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Income => "income",
            AccountRole::Spending => "spending",
            AccountRole::Emergency => "emergency",
            AccountRole::Savings => "savings",
            AccountRole::Investment => "investment",
            AccountRole::Goal => "goal",
            AccountRole::Checking => "checking",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "income" => Some(AccountRole::Income),
            "spending" => Some(AccountRole::Spending),
            "emergency" => Some(AccountRole::Emergency),
            "savings" => Some(AccountRole::Savings),
            "investment" => Some(AccountRole::Investment),
            "goal" => Some(AccountRole::Goal),
            "checking" => Some(AccountRole::Checking),
            _ => None,
        }
    }
}

/// Persistent bank account. IBAN is unique within a user's account set.
/// A negative balance is a valid but warned state (overdraft).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub iban: String,
    pub bic: Option<String>,
    pub holder_name: String,
    pub custom_name: Option<String>,
    pub bank_name: Option<String>,
    #[sqlx(default)]
    pub role: Option<String>,
    pub balance: Decimal,
    pub currency: String,
    pub is_active: bool,
    pub discovered_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl Account {
    pub fn role(&self) -> Option<AccountRole> {
        self.role.as_deref().and_then(AccountRole::parse)
    }
}

/// Account row as produced by the statement parser, before it has an id.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: Uuid,
    pub iban: String,
    pub bic: Option<String>,
    pub holder_name: String,
    pub balance: Decimal,
    pub currency: String,
}

/// Persistent transaction. Amount is signed: positive is credit/income,
/// negative is debit.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub booking_date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub merchant: Option<String>,
    pub category_id: Option<Uuid>,
    pub is_income: bool,
    pub counterparty_name: Option<String>,
    pub counterparty_iban: Option<String>,
    pub reference: Option<String>,
    pub statement_id: Option<String>,
    /// Set on the two legs written by an executed internal transfer; feeds
    /// the daily-ceiling check.
    pub internal_transfer: bool,
    pub created_at: DateTime<Utc>,
}

/// Transaction row ready for insertion, carrying its precomputed dedup key.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub booking_date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub merchant: Option<String>,
    pub is_income: bool,
    pub counterparty_name: Option<String>,
    pub counterparty_iban: Option<String>,
    pub reference: Option<String>,
    pub statement_id: Option<String>,
    pub internal_transfer: bool,
    pub dedup_key: String,
}

/// Savings goal. `current_amount` is derived from the linked account's
/// balance on import and intentionally never capped at the target.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    pub linked_account_id: Option<Uuid>,
    pub target_date: Option<NaiveDate>,
    /// Bounded 1-10; out-of-range values are warned, not rejected.
    pub priority: i16,
    pub is_completed: bool,
}
