use chrono::NaiveDate;
use encoding_rs::Encoding;
use lazy_static::lazy_static;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::str::FromStr;
use tracing::debug;

use super::models::{ParsedTransaction, Statement, StatementAccount};
use crate::errors::AppError;

lazy_static! {
    /// Wallet point-of-sale rows: "BEA, Apple Pay, Celly Shop,PAS123 ...".
    /// The merchant sits between the wallet marker and the next comma.
    static ref WALLET_PAYMENT: Regex =
        Regex::new(r"(?:BEA|GEA),\s*(?:Apple Pay|Google Pay),\s*([^,]+)").unwrap();
    /// Plain card rows: "BEA NR:NYA505 01.01.24/12.34 Albert Heijn AMS,PAS123".
    static ref CARD_PAYMENT: Regex = Regex::new(
        r"^(?:BEA|GEA)\s+NR:\S+\s+\d{2}\.\d{2}\.\d{2}/\d{2}[.:]\d{2}\s+([^,]+)"
    )
    .unwrap();
    static ref XML_ENCODING_DECL: Regex =
        Regex::new(r#"encoding\s*=\s*["']([A-Za-z0-9._-]+)["']"#).unwrap();
}

/// Decode raw statement bytes to text before any XML parsing. Banks ship
/// CAMT files in UTF-8, UTF-16 and Latin encodings; the order here is BOM,
/// then the XML declaration's `encoding=` label, then a UTF-8 check with a
/// Windows-1252 fallback for bare Latin files.
pub fn decode_document(bytes: &[u8]) -> Result<String, AppError> {
    if bytes.is_empty() {
        return Err(AppError::EncodingError("document is empty".to_string()));
    }

    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        let (text, _, had_errors) = encoding.decode(bytes);
        if had_errors {
            return Err(AppError::EncodingError(format!(
                "document claims {} but does not decode as it",
                encoding.name()
            )));
        }
        return Ok(text.into_owned());
    }

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]).into_owned();
    if let Some(cap) = XML_ENCODING_DECL.captures(&head) {
        let label = &cap[1];
        let encoding = Encoding::for_label(label.as_bytes()).ok_or_else(|| {
            AppError::EncodingError(format!("unknown encoding label '{label}'"))
        })?;
        let (text, _, had_errors) = encoding.decode(bytes);
        if had_errors {
            return Err(AppError::EncodingError(format!(
                "document claims {label} but does not decode as it"
            )));
        }
        return Ok(text.into_owned());
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            Ok(text.into_owned())
        }
    }
}

/// Parse a CAMT.053 document into statements, one per `<Stmt>` block.
///
/// Statement ids are derived from a SHA-256 over the raw document bytes plus
/// the statement's ordinal, so re-importing a byte-identical file is
/// detectable downstream without re-parsing.
pub fn parse_statements(bytes: &[u8]) -> Result<Vec<Statement>, AppError> {
    let text = decode_document(bytes)?;
    let digest = hex::encode(Sha256::digest(bytes));

    let mut reader = Reader::from_str(&text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut statements: Vec<Statement> = Vec::new();
    let mut stmt: Option<StatementBuilder> = None;
    let mut balance: Option<BalanceBuilder> = None;
    let mut entry: Option<EntryBuilder> = None;

    loop {
        match reader.read_event() {
            Err(e) => {
                return Err(AppError::MalformedDocument(format!(
                    "XML error at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                match name.as_str() {
                    "Stmt" => stmt = Some(StatementBuilder::default()),
                    "Bal" if stmt.is_some() => balance = Some(BalanceBuilder::default()),
                    "Ntry" if stmt.is_some() => entry = Some(EntryBuilder::default()),
                    "Amt" => {
                        // The parent element decides whose currency this is.
                        if let Some(ccy) = ccy_attribute(&e) {
                            match stack.last().map(String::as_str) {
                                Some("Bal") => {
                                    if let Some(b) = balance.as_mut() {
                                        b.currency = Some(ccy);
                                    }
                                }
                                Some("Ntry") => {
                                    if let Some(en) = entry.as_mut() {
                                        en.currency = Some(ccy);
                                    }
                                }
                                _ => {}
                            }
                        }
                    }
                    _ => {}
                }
                stack.push(name);
            }
            Ok(Event::End(_)) => {
                let name = stack.pop().unwrap_or_default();
                match name.as_str() {
                    "Bal" => {
                        if let (Some(s), Some(b)) = (stmt.as_mut(), balance.take()) {
                            s.apply_balance(b)?;
                        }
                    }
                    "Ntry" => {
                        if let (Some(s), Some(en)) = (stmt.as_mut(), entry.take()) {
                            s.transactions.push(en.finish()?);
                        }
                    }
                    "Stmt" => {
                        if let Some(s) = stmt.take() {
                            let ordinal = statements.len();
                            statements.push(s.finish(&digest, ordinal)?);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(t)) => {
                let value = t
                    .unescape()
                    .map_err(|e| AppError::MalformedDocument(format!("bad text node: {e}")))?
                    .trim()
                    .to_string();
                if value.is_empty() {
                    continue;
                }
                capture_text(
                    &stack,
                    value,
                    stmt.as_mut(),
                    balance.as_mut(),
                    entry.as_mut(),
                );
            }
            Ok(_) => {}
        }
    }

    if !stack.is_empty() || stmt.is_some() {
        return Err(AppError::MalformedDocument(
            "document ended inside an open element".to_string(),
        ));
    }

    debug!(statements = statements.len(), "parsed CAMT document");
    Ok(statements)
}

/// Apply the merchant-extraction rules to a raw remittance description.
pub fn extract_merchant(description: &str) -> Option<String> {
    if let Some(cap) = WALLET_PAYMENT.captures(description) {
        return Some(cap[1].trim().to_string());
    }
    if let Some(cap) = CARD_PAYMENT.captures(description) {
        return Some(cap[1].trim().to_string());
    }
    None
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn ccy_attribute(e: &BytesStart) -> Option<String> {
    e.try_get_attribute("Ccy")
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

fn ends_with(stack: &[String], suffix: &[&str]) -> bool {
    stack.len() >= suffix.len()
        && stack[stack.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(a, b)| a == b)
}

fn capture_text(
    stack: &[String],
    value: String,
    stmt: Option<&mut StatementBuilder>,
    balance: Option<&mut BalanceBuilder>,
    entry: Option<&mut EntryBuilder>,
) {
    let at = |suffix: &[&str]| ends_with(stack, suffix);

    if let Some(b) = balance {
        if at(&["Bal", "Tp", "CdOrPrtry", "Cd"]) {
            b.code = Some(value);
        } else if at(&["Bal", "Amt"]) {
            b.amount = Some(value);
        } else if at(&["Bal", "CdtDbtInd"]) {
            b.credit_debit = Some(value);
        } else if at(&["Bal", "Dt", "Dt"]) || at(&["Bal", "Dt", "DtTm"]) {
            b.date = Some(value);
        }
        return;
    }

    if let Some(en) = entry {
        if at(&["Ntry", "Amt"]) {
            en.amount = Some(value);
        } else if at(&["Ntry", "CdtDbtInd"]) {
            en.credit_debit = Some(value);
        } else if at(&["BookgDt", "Dt"]) || at(&["BookgDt", "DtTm"]) {
            en.booking_date = Some(value);
        } else if at(&["RmtInf", "Ustrd"]) {
            en.remittance.push(value);
        } else if at(&["Ntry", "AddtlNtryInf"]) {
            en.additional_info = Some(value);
        } else if at(&["RltdPties", "Cdtr", "Nm"]) || at(&["Cdtr", "Pty", "Nm"]) {
            en.creditor_name = Some(value);
        } else if at(&["RltdPties", "Dbtr", "Nm"]) || at(&["Dbtr", "Pty", "Nm"]) {
            en.debtor_name = Some(value);
        } else if at(&["CdtrAcct", "Id", "IBAN"]) {
            en.creditor_iban = Some(value);
        } else if at(&["DbtrAcct", "Id", "IBAN"]) {
            en.debtor_iban = Some(value);
        } else if at(&["Refs", "EndToEndId"]) {
            en.end_to_end_id = Some(value);
        } else if at(&["Refs", "TxId"]) {
            en.tx_id = Some(value);
        }
        return;
    }

    if let Some(s) = stmt {
        if at(&["Acct", "Id", "IBAN"]) {
            s.iban = Some(value);
        } else if at(&["Acct", "Ccy"]) {
            s.currency = Some(value);
        } else if at(&["FinInstnId", "BIC"]) || at(&["FinInstnId", "BICFI"]) {
            s.bic = Some(value);
        } else if at(&["Acct", "Ownr", "Nm"]) || at(&["Ownr", "Pty", "Nm"]) {
            s.holder_name = Some(value);
        }
    }
}

fn parse_amount(raw: &str) -> Result<Decimal, AppError> {
    Decimal::from_str(raw)
        .map_err(|_| AppError::MalformedDocument(format!("'{raw}' is not a valid amount")))
}

fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| AppError::MalformedDocument(format!("'{raw}' is not a valid ISO date")))
}

#[derive(Default)]
struct StatementBuilder {
    iban: Option<String>,
    bic: Option<String>,
    holder_name: Option<String>,
    currency: Option<String>,
    closing_balance: Option<Decimal>,
    closing_currency: Option<String>,
    closing_date: Option<NaiveDate>,
    opening_balance: Option<Decimal>,
    transactions: Vec<ParsedTransaction>,
}

impl StatementBuilder {
    fn apply_balance(&mut self, b: BalanceBuilder) -> Result<(), AppError> {
        let code = match b.code {
            Some(code) => code,
            // Balance entries without a type code are skipped, not fatal.
            None => return Ok(()),
        };
        let raw = b.amount.ok_or_else(|| {
            AppError::MalformedDocument(format!("{code} balance entry has no amount"))
        })?;
        let mut amount = parse_amount(&raw)?;
        if b.credit_debit.as_deref() == Some("DBIT") {
            amount = -amount;
        }

        match code.as_str() {
            "CLBD" => {
                self.closing_balance = Some(amount);
                self.closing_currency = b.currency;
                if let Some(raw_date) = b.date {
                    self.closing_date = Some(parse_date(&raw_date)?);
                }
            }
            // Opening balance is informational only.
            "PRCD" => self.opening_balance = Some(amount),
            _ => {}
        }
        Ok(())
    }

    fn finish(self, digest: &str, ordinal: usize) -> Result<Statement, AppError> {
        let iban = self.iban.ok_or_else(|| {
            AppError::MalformedDocument("statement has no account IBAN".to_string())
        })?;
        let closing_balance = self.closing_balance.ok_or_else(|| {
            AppError::MalformedDocument(
                "statement has no closing booked (CLBD) balance".to_string(),
            )
        })?;
        let statement_date = self.closing_date.ok_or_else(|| {
            AppError::MalformedDocument("closing balance entry has no date".to_string())
        })?;
        let currency = self
            .currency
            .or(self.closing_currency)
            .unwrap_or_else(|| "EUR".to_string());

        Ok(Statement {
            id: format!("{}-{}", &digest[..32], ordinal),
            account: StatementAccount {
                iban,
                bic: self.bic,
                holder_name: self.holder_name.unwrap_or_default(),
                currency,
                closing_balance,
                opening_balance: self.opening_balance,
                statement_date,
            },
            transactions: self.transactions,
        })
    }
}

#[derive(Default)]
struct EntryBuilder {
    amount: Option<String>,
    currency: Option<String>,
    credit_debit: Option<String>,
    booking_date: Option<String>,
    remittance: Vec<String>,
    additional_info: Option<String>,
    creditor_name: Option<String>,
    creditor_iban: Option<String>,
    debtor_name: Option<String>,
    debtor_iban: Option<String>,
    end_to_end_id: Option<String>,
    tx_id: Option<String>,
}

impl EntryBuilder {
    fn finish(self) -> Result<ParsedTransaction, AppError> {
        let raw_amount = self
            .amount
            .ok_or_else(|| AppError::MalformedDocument("entry has no amount".to_string()))?;
        let indicator = self.credit_debit.ok_or_else(|| {
            AppError::MalformedDocument("entry has no credit-debit indicator".to_string())
        })?;
        let raw_date = self.booking_date.ok_or_else(|| {
            AppError::MalformedDocument("entry has no booking date".to_string())
        })?;

        let magnitude = parse_amount(&raw_amount)?;
        // Sign comes from the indicator alone, never from description text.
        let amount = match indicator.as_str() {
            "CRDT" => magnitude,
            "DBIT" => -magnitude,
            other => {
                return Err(AppError::MalformedDocument(format!(
                    "unknown credit-debit indicator '{other}'"
                )))
            }
        };

        let description = if self.remittance.is_empty() {
            self.additional_info.unwrap_or_default()
        } else {
            self.remittance.join(" ")
        };
        let merchant = extract_merchant(&description);

        // The counterparty is whoever the money moved towards or from.
        let (counterparty_name, counterparty_iban) = if amount < Decimal::ZERO {
            (self.creditor_name, self.creditor_iban)
        } else {
            (self.debtor_name, self.debtor_iban)
        };

        let reference = self
            .end_to_end_id
            .filter(|r| r != "NOTPROVIDED")
            .or(self.tx_id);

        Ok(ParsedTransaction {
            booking_date: parse_date(&raw_date)?,
            amount,
            currency: self.currency.unwrap_or_else(|| "EUR".to_string()),
            description,
            merchant,
            counterparty_name,
            counterparty_iban,
            reference,
        })
    }
}

#[derive(Default)]
struct BalanceBuilder {
    code: Option<String>,
    amount: Option<String>,
    currency: Option<String>,
    credit_debit: Option<String>,
    date: Option<String>,
}
