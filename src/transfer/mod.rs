mod models;
mod service;
pub mod validator;

pub use models::{
    AllocationSummary, FinancialContext, ReasonCode, RecommendationOutcome, TransferOutcome,
    TransferRecommendation, TransferRequest, ValidationReport,
};
pub use service::TransferService;
