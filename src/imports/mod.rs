mod models;
mod service;

pub use models::ImportResult;
pub use service::ImportService;
