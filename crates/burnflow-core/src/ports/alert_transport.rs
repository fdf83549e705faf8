use crate::domain::AlertChannel;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryResult {
    pub accepted: bool,
    pub provider_message_id: Option<String>,
}

/// Outbound notification transport (SMS / voice / email / push gateways).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AlertTransport: Send + Sync {
    async fn send(
        &self,
        channel: AlertChannel,
        recipient_id: u64,
        payload: &str,
    ) -> anyhow::Result<DeliveryResult>;
}
