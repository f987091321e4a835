//! In-memory payment gateway for tests and local development.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CreateGatewayOrder, GatewayError, GatewayOrder, PaymentGateway};

/// In-memory gateway that issues sequential order ids.
#[derive(Debug, Clone)]
pub struct InMemoryPaymentGateway {
    key_id: String,
    orders: Arc<RwLock<HashMap<String, CreateGatewayOrder>>>,
    next_id: Arc<AtomicU32>,
    available: Arc<AtomicBool>,
    fail_on_create: Arc<AtomicBool>,
}

impl Default for InMemoryPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self {
            key_id: "rzp_test_memory".to_string(),
            orders: Arc::default(),
            next_id: Arc::new(AtomicU32::new(0)),
            available: Arc::new(AtomicBool::new(true)),
            fail_on_create: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes the gateway report itself (un)available.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes order creation fail as if the gateway were down.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.fail_on_create.store(fail, Ordering::SeqCst);
    }

    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Returns the request a gateway order was created from.
    pub async fn order(&self, gateway_order_id: &str) -> Option<CreateGatewayOrder> {
        self.orders.read().await.get(gateway_order_id).cloned()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn key_id(&self) -> Option<&str> {
        Some(&self.key_id)
    }

    async fn create_order(
        &self,
        request: CreateGatewayOrder,
    ) -> Result<GatewayOrder, GatewayError> {
        if !self.is_available() || self.fail_on_create.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable(
                "in-memory gateway is down".to_string(),
            ));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("order_mem{n:06}");
        let order = GatewayOrder {
            id: id.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
        };
        self.orders.write().await.insert(id, request);
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use domain::Money;

    use super::*;

    fn request() -> CreateGatewayOrder {
        CreateGatewayOrder {
            amount: Money::from_rupees(500),
            currency: "INR".to_string(),
            receipt: "r1".to_string(),
            notes: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_sequential_order_ids() {
        let gateway = InMemoryPaymentGateway::new();
        let first = gateway.create_order(request()).await.unwrap();
        let second = gateway.create_order(request()).await.unwrap();
        assert_eq!(first.id, "order_mem000001");
        assert_eq!(second.id, "order_mem000002");
        assert_eq!(gateway.order_count().await, 2);
    }

    #[tokio::test]
    async fn test_unavailable_gateway_refuses_orders() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_available(false);
        let result = gateway.create_order(request()).await;
        assert!(matches!(result, Err(ref e) if e.is_unavailable()));
        assert_eq!(gateway.order_count().await, 0);
    }
}
