#![allow(dead_code)]

use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use fire_core::concurrency::LockManager;
use fire_core::config::PipelineConfig;
use fire_core::imports::ImportService;
use fire_core::models::{Account, Goal, Transaction};
use fire_core::recovery::RecoveryCoordinator;
use fire_core::storage::{MemoryStorage, Storage};
use fire_core::transfer::TransferService;

// Log output is off by default; set TEST_LOG=1 to see it while debugging.
static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .init();
    }
});

/// Fully wired pipeline over the in-memory store.
pub struct TestPipeline {
    pub storage: Arc<MemoryStorage>,
    pub locks: Arc<LockManager>,
    pub recovery: Arc<RecoveryCoordinator>,
    pub config: Arc<PipelineConfig>,
    pub imports: ImportService,
    pub transfers: TransferService,
}

impl TestPipeline {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Lazy::force(&TRACING);
        let storage = Arc::new(MemoryStorage::new());
        let locks = Arc::new(LockManager::new());
        let recovery = Arc::new(RecoveryCoordinator::new(&config));
        let config = Arc::new(config);

        let dyn_storage: Arc<dyn Storage> = storage.clone();
        let imports = ImportService::new(dyn_storage.clone(), locks.clone(), config.clone());
        let transfers = TransferService::new(
            dyn_storage,
            locks.clone(),
            recovery.clone(),
            config.clone(),
        );

        Self {
            storage,
            locks,
            recovery,
            config,
            imports,
            transfers,
        }
    }
}

pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).expect("valid decimal literal")
}

pub fn account(user_id: Uuid, iban: &str, balance: &str, role: Option<&str>) -> Account {
    let now = Utc::now();
    Account {
        id: Uuid::new_v4(),
        user_id,
        iban: iban.to_string(),
        bic: None,
        holder_name: "Test Holder".to_string(),
        custom_name: None,
        bank_name: None,
        role: role.map(str::to_string),
        balance: dec(balance),
        currency: "EUR".to_string(),
        is_active: true,
        discovered_at: now,
        last_seen_at: now,
    }
}

pub fn goal(
    user_id: Uuid,
    name: &str,
    target: &str,
    current: &str,
    linked_account_id: Option<Uuid>,
    priority: i16,
) -> Goal {
    Goal {
        id: Uuid::new_v4(),
        user_id,
        name: name.to_string(),
        target_amount: dec(target),
        current_amount: dec(current),
        linked_account_id,
        target_date: None,
        priority,
        is_completed: false,
    }
}

pub fn transaction(account_id: Uuid, booking_date: NaiveDate, amount: &str) -> Transaction {
    let amount = dec(amount);
    Transaction {
        id: Uuid::new_v4(),
        account_id,
        booking_date,
        amount,
        currency: "EUR".to_string(),
        description: "SEPA Overboeking".to_string(),
        merchant: None,
        category_id: None,
        is_income: amount > Decimal::ZERO,
        counterparty_name: None,
        counterparty_iban: None,
        reference: None,
        statement_id: None,
        internal_transfer: false,
        created_at: Utc::now(),
    }
}

/// CAMT.053 fixture: closing balance 561.54, opening 749.58, 8 debit
/// entries summing 188.04, one of them an Apple Pay payment at Celly Shop.
pub const SAMPLE_STATEMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Document xmlns="urn:iso:std:iso:20022:tech:xsd:camt.053.001.02">
  <BkToCstmrStmt>
    <GrpHdr>
      <MsgId>STMT-2024-0302</MsgId>
      <CreDtTm>2024-03-02T04:10:00</CreDtTm>
    </GrpHdr>
    <Stmt>
      <Id>0249/1</Id>
      <CreDtTm>2024-03-02T04:10:00</CreDtTm>
      <Acct>
        <Id><IBAN>NL91ABNA0417164300</IBAN></Id>
        <Ccy>EUR</Ccy>
        <Ownr><Nm>J. Doe</Nm></Ownr>
        <Svcr><FinInstnId><BIC>ABNANL2A</BIC></FinInstnId></Svcr>
      </Acct>
      <Bal>
        <Tp><CdOrPrtry><Cd>PRCD</Cd></CdOrPrtry></Tp>
        <Amt Ccy="EUR">749.58</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <Dt><Dt>2024-03-01</Dt></Dt>
      </Bal>
      <Bal>
        <Tp><CdOrPrtry><Cd>CLBD</Cd></CdOrPrtry></Tp>
        <Amt Ccy="EUR">561.54</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <Dt><Dt>2024-03-02</Dt></Dt>
      </Bal>
      <Ntry>
        <Amt Ccy="EUR">35.00</Amt>
        <CdtDbtInd>DBIT</CdtDbtInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2024-03-01</Dt></BookgDt>
        <NtryDtls><TxDtls>
          <Refs><EndToEndId>E2E-0001</EndToEndId></Refs>
          <RltdPties>
            <Cdtr><Nm>Celly Shop</Nm></Cdtr>
            <CdtrAcct><Id><IBAN>NL39RABO0300065264</IBAN></Id></CdtrAcct>
          </RltdPties>
          <RmtInf><Ustrd>BEA, Apple Pay, Celly Shop,PAS123 NR:406 01.03.24/14:35 AMSTERDAM</Ustrd></RmtInf>
        </TxDtls></NtryDtls>
      </Ntry>
      <Ntry>
        <Amt Ccy="EUR">12.50</Amt>
        <CdtDbtInd>DBIT</CdtDbtInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2024-03-01</Dt></BookgDt>
        <NtryDtls><TxDtls>
          <Refs><EndToEndId>E2E-0002</EndToEndId></Refs>
          <RmtInf><Ustrd>SEPA Incasso Streamflix maandabonnement</Ustrd></RmtInf>
        </TxDtls></NtryDtls>
      </Ntry>
      <Ntry>
        <Amt Ccy="EUR">8.99</Amt>
        <CdtDbtInd>DBIT</CdtDbtInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2024-03-01</Dt></BookgDt>
        <NtryDtls><TxDtls>
          <Refs><EndToEndId>NOTPROVIDED</EndToEndId></Refs>
          <RmtInf><Ustrd>BEA NR:NYA505 01.03.24/12:34 Bakkerij Jansen AMSTERD,PAS123</Ustrd></RmtInf>
        </TxDtls></NtryDtls>
      </Ntry>
      <Ntry>
        <Amt Ccy="EUR">45.67</Amt>
        <CdtDbtInd>DBIT</CdtDbtInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2024-03-01</Dt></BookgDt>
        <NtryDtls><TxDtls>
          <Refs><EndToEndId>E2E-0004</EndToEndId></Refs>
          <RltdPties>
            <Cdtr><Nm>Energie Direct</Nm></Cdtr>
          </RltdPties>
          <RmtInf><Ustrd>SEPA Incasso Energie Direct termijnbedrag maart</Ustrd></RmtInf>
        </TxDtls></NtryDtls>
      </Ntry>
      <Ntry>
        <Amt Ccy="EUR">23.10</Amt>
        <CdtDbtInd>DBIT</CdtDbtInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2024-03-02</Dt></BookgDt>
        <NtryDtls><TxDtls>
          <Refs><EndToEndId>E2E-0005</EndToEndId></Refs>
          <RmtInf><Ustrd>GEA, Google Pay, Tankstation De Berg,PAS123</Ustrd></RmtInf>
        </TxDtls></NtryDtls>
      </Ntry>
      <Ntry>
        <Amt Ccy="EUR">9.99</Amt>
        <CdtDbtInd>DBIT</CdtDbtInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2024-03-02</Dt></BookgDt>
        <NtryDtls><TxDtls>
          <Refs><EndToEndId>NOTPROVIDED</EndToEndId></Refs>
          <RmtInf><Ustrd>SEPA Incasso Mobiel Bundel 10GB</Ustrd></RmtInf>
        </TxDtls></NtryDtls>
      </Ntry>
      <Ntry>
        <Amt Ccy="EUR">18.79</Amt>
        <CdtDbtInd>DBIT</CdtDbtInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2024-03-02</Dt></BookgDt>
        <NtryDtls><TxDtls>
          <Refs><EndToEndId>E2E-0007</EndToEndId></Refs>
          <RmtInf><Ustrd>BEA, Apple Pay, Supermarkt Plus,PAS123 NR:407 02.03.24/09:12 UTRECHT</Ustrd></RmtInf>
        </TxDtls></NtryDtls>
      </Ntry>
      <Ntry>
        <Amt Ccy="EUR">34.00</Amt>
        <CdtDbtInd>DBIT</CdtDbtInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2024-03-02</Dt></BookgDt>
        <NtryDtls><TxDtls>
          <Refs><EndToEndId>E2E-0008</EndToEndId></Refs>
          <RltdPties>
            <Cdtr><Nm>M. de Vries</Nm></Cdtr>
            <CdtrAcct><Id><IBAN>NL20INGB0001234567</IBAN></Id></CdtrAcct>
          </RltdPties>
          <RmtInf><Ustrd>SEPA Overboeking Etentje terugbetaald</Ustrd></RmtInf>
        </TxDtls></NtryDtls>
      </Ntry>
    </Stmt>
  </BkToCstmrStmt>
</Document>
"#;

/// A file carrying two statements for two different accounts.
pub const TWO_ACCOUNT_STATEMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Document xmlns="urn:iso:std:iso:20022:tech:xsd:camt.053.001.02">
  <BkToCstmrStmt>
    <Stmt>
      <Id>0251/1</Id>
      <Acct>
        <Id><IBAN>NL91ABNA0417164300</IBAN></Id>
        <Ccy>EUR</Ccy>
      </Acct>
      <Bal>
        <Tp><CdOrPrtry><Cd>CLBD</Cd></CdOrPrtry></Tp>
        <Amt Ccy="EUR">200.00</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <Dt><Dt>2024-03-04</Dt></Dt>
      </Bal>
      <Ntry>
        <Amt Ccy="EUR">150.00</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2024-03-04</Dt></BookgDt>
        <NtryDtls><TxDtls>
          <Refs><EndToEndId>E2E-0101</EndToEndId></Refs>
          <RmtInf><Ustrd>SEPA Overboeking Salaris maart</Ustrd></RmtInf>
        </TxDtls></NtryDtls>
      </Ntry>
    </Stmt>
    <Stmt>
      <Id>0251/2</Id>
      <Acct>
        <Id><IBAN>NL62INGB0000000123</IBAN></Id>
        <Ccy>EUR</Ccy>
      </Acct>
      <Bal>
        <Tp><CdOrPrtry><Cd>CLBD</Cd></CdOrPrtry></Tp>
        <Amt Ccy="EUR">80.00</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <Dt><Dt>2024-03-04</Dt></Dt>
      </Bal>
      <Ntry>
        <Amt Ccy="EUR">10.00</Amt>
        <CdtDbtInd>DBIT</CdtDbtInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2024-03-04</Dt></BookgDt>
        <NtryDtls><TxDtls>
          <Refs><EndToEndId>E2E-0102</EndToEndId></Refs>
          <RmtInf><Ustrd>SEPA Incasso Sportclub contributie</Ustrd></RmtInf>
        </TxDtls></NtryDtls>
      </Ntry>
      <Ntry>
        <Amt Ccy="EUR">5.50</Amt>
        <CdtDbtInd>DBIT</CdtDbtInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2024-03-04</Dt></BookgDt>
        <NtryDtls><TxDtls>
          <Refs><EndToEndId>E2E-0103</EndToEndId></Refs>
          <RmtInf><Ustrd>BEA, Apple Pay, Koffiebar Zuid,PAS456</Ustrd></RmtInf>
        </TxDtls></NtryDtls>
      </Ntry>
    </Stmt>
  </BkToCstmrStmt>
</Document>
"#;

/// A statement with a closing balance and no entries; valid per the parser.
pub const EMPTY_STATEMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Document xmlns="urn:iso:std:iso:20022:tech:xsd:camt.053.001.02">
  <BkToCstmrStmt>
    <Stmt>
      <Id>0250/1</Id>
      <Acct>
        <Id><IBAN>NL91ABNA0417164300</IBAN></Id>
        <Ccy>EUR</Ccy>
      </Acct>
      <Bal>
        <Tp><CdOrPrtry><Cd>CLBD</Cd></CdOrPrtry></Tp>
        <Amt Ccy="EUR">100.00</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <Dt><Dt>2024-03-03</Dt></Dt>
      </Bal>
    </Stmt>
  </BkToCstmrStmt>
</Document>
"#;
