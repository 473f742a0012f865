use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// Account snapshot as reported by one statement document.
#[derive(Debug, Clone, Serialize)]
pub struct StatementAccount {
    pub iban: String,
    pub bic: Option<String>,
    pub holder_name: String,
    pub currency: String,
    /// Closing booked balance (`CLBD`) - the authoritative balance.
    pub closing_balance: Decimal,
    /// Opening balance (`PRCD`), informational only.
    pub opening_balance: Option<Decimal>,
    pub statement_date: NaiveDate,
}

/// One booked entry from a statement. Amount is signed by `CdtDbtInd`:
/// credits positive, debits negative. The sign is authoritative and never
/// inferred from the description text.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedTransaction {
    pub booking_date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    /// Extracted from card-payment descriptions; unset when no pattern
    /// matched, with the raw description left as the sole user-facing text.
    pub merchant: Option<String>,
    pub counterparty_name: Option<String>,
    pub counterparty_iban: Option<String>,
    /// End-to-end reference when the bank supplied a real one.
    pub reference: Option<String>,
}

/// One parsed bank statement. Transient: created per import call and merged
/// into persistent rows, never stored as-is.
///
/// Transaction order is append-order-of-appearance in the source document;
/// callers must not assume chronological sort.
#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    /// Content-derived id, stable across byte-identical re-imports.
    pub id: String,
    pub account: StatementAccount,
    pub transactions: Vec<ParsedTransaction>,
}
