//! HTTP client for a Razorpay-compatible orders API.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use domain::Money;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CreateGatewayOrder, GatewayError, GatewayOrder, PaymentGateway};
use crate::secret::Secret;

#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// e.g. `https://api.razorpay.com`
    pub base_url: String,
    pub key_id: String,
    pub key_secret: Secret<String>,
    /// How long the gateway is treated as down after a failure.
    pub cooldown: Duration,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct OrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: &'a BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

/// Gateway client with a cool-down circuit.
///
/// A transport failure or 5xx answer marks the gateway unavailable for the
/// configured cool-down; checkout falls back to direct orders meanwhile.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    config: HttpGatewayConfig,
    epoch: Instant,
    /// Milliseconds since `epoch` until which the circuit is open; 0 = closed.
    open_until_ms: Arc<AtomicU64>,
}

impl HttpPaymentGateway {
    pub fn new(config: HttpGatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .user_agent("marketplace-checkout")
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            config,
            epoch: Instant::now(),
            open_until_ms: Arc::new(AtomicU64::new(0)),
        })
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn trip(&self, reason: &str) {
        let cooldown = u64::try_from(self.config.cooldown.as_millis()).unwrap_or(u64::MAX);
        let until = self.now_ms().saturating_add(cooldown).max(1);
        self.open_until_ms.store(until, Ordering::SeqCst);
        tracing::warn!(
            reason,
            cooldown_secs = self.config.cooldown.as_secs(),
            "payment gateway marked unavailable"
        );
    }

    fn orders_url(&self) -> String {
        format!("{}/v1/orders", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    fn is_available(&self) -> bool {
        self.now_ms() >= self.open_until_ms.load(Ordering::SeqCst)
    }

    fn key_id(&self) -> Option<&str> {
        Some(&self.config.key_id)
    }

    #[tracing::instrument(skip(self, request), fields(receipt = %request.receipt, amount = request.amount.paise()))]
    async fn create_order(
        &self,
        request: CreateGatewayOrder,
    ) -> Result<GatewayOrder, GatewayError> {
        if !self.is_available() {
            return Err(GatewayError::Unavailable("cooling down".to_string()));
        }

        let body = OrderRequest {
            amount: request.amount.paise(),
            currency: &request.currency,
            receipt: &request.receipt,
            notes: &request.notes,
        };
        let response = match self
            .client
            .post(self.orders_url())
            .basic_auth(&self.config.key_id, Some(self.config.key_secret.reveal()))
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.trip("transport error");
                return Err(e.into());
            }
        };

        let status = response.status();
        if status.is_server_error() {
            self.trip("server error");
            return Err(GatewayError::Unavailable(format!(
                "gateway answered {status}"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        if order.amount != request.amount.paise() {
            return Err(GatewayError::InvalidResponse(format!(
                "order {} has amount {} but {} was requested",
                order.id,
                order.amount,
                request.amount.paise()
            )));
        }

        tracing::debug!(gateway_order_id = %order.id, "gateway order created");
        Ok(GatewayOrder {
            id: order.id,
            amount: Money::from_paise(order.amount),
            currency: order.currency,
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn gateway(server: &MockServer) -> HttpPaymentGateway {
        HttpPaymentGateway::new(HttpGatewayConfig {
            base_url: server.uri(),
            key_id: "rzp_test_key".to_string(),
            key_secret: Secret::new("secret".to_string()),
            cooldown: Duration::from_secs(60),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn request(rupees: i64) -> CreateGatewayOrder {
        CreateGatewayOrder {
            amount: Money::from_rupees(rupees),
            currency: "INR".to_string(),
            receipt: "rcpt_1".to_string(),
            notes: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_creates_order_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "order_Nx1",
                "amount": 50000,
                "currency": "INR",
                "status": "created"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let order = gateway(&server).create_order(request(500)).await.unwrap();
        assert_eq!(order.id, "order_Nx1");
        assert_eq!(order.amount, Money::from_rupees(500));
    }

    #[tokio::test]
    async fn test_server_error_opens_circuit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = gateway(&server);
        assert!(gateway.is_available());
        let result = gateway.create_order(request(500)).await;
        assert!(matches!(result, Err(ref e) if e.is_unavailable()));
        assert!(!gateway.is_available());

        // Cooling down: no second request reaches the server.
        let result = gateway.create_order(request(500)).await;
        assert!(matches!(result, Err(GatewayError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_client_error_is_rejection_not_outage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let gateway = gateway(&server);
        let result = gateway.create_order(request(500)).await;
        assert!(matches!(
            result,
            Err(GatewayError::Rejected { status: 401, .. })
        ));
        assert!(gateway.is_available());
    }

    #[tokio::test]
    async fn test_amount_mismatch_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "order_Nx2",
                "amount": 100,
                "currency": "INR"
            })))
            .mount(&server)
            .await;

        let result = gateway(&server).create_order(request(500)).await;
        assert!(matches!(result, Err(GatewayError::InvalidResponse(_))));
    }
}
