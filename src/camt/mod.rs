mod models;
mod parser;

pub use models::{ParsedTransaction, Statement, StatementAccount};
pub use parser::{decode_document, extract_merchant, parse_statements};
