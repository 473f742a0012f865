mod service;

pub use service::{CurrencyService, MAX_MINOR_UNITS};
