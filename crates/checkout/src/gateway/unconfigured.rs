use async_trait::async_trait;

use super::{CreateGatewayOrder, GatewayError, GatewayOrder, PaymentGateway};

/// Stand-in used when no gateway credentials are configured.
///
/// Always unavailable, so every checkout takes the direct path.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredGateway;

#[async_trait]
impl PaymentGateway for UnconfiguredGateway {
    fn is_available(&self) -> bool {
        false
    }

    fn key_id(&self) -> Option<&str> {
        None
    }

    async fn create_order(
        &self,
        _request: CreateGatewayOrder,
    ) -> Result<GatewayOrder, GatewayError> {
        Err(GatewayError::Unavailable(
            "no payment gateway configured".to_string(),
        ))
    }
}
