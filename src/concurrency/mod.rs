mod models;
mod service;

pub use models::LockResource;
pub use service::{LockGuard, LockManager};
