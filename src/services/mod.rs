pub mod notifications;
pub mod orchestrator;
pub mod query;
pub mod refunds;
pub mod stats;
pub mod webhooks;
