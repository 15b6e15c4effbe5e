use crate::providers::error::ProviderResult;
use crate::providers::types::{ChargeOutcome, ChargeRequest, ProviderFamily};
use async_trait::async_trait;

/// Strategy seam between the orchestrator and the downstream processors.
/// One implementation per provider family, selected by the payment method
/// at orchestration time.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn create_charge(&self, request: ChargeRequest) -> ProviderResult<ChargeOutcome>;

    fn family(&self) -> ProviderFamily;
}
