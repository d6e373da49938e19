//! Payment gateway adapter.
//!
//! The engine never holds card data; it only holds opaque session and
//! payment references. Session creation and refunds are out-of-process I/O
//! and deliberately happen outside any storage critical section: the
//! commitment stays `WaitingPayment` until the provider's success callback
//! re-enters the engine.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::CoreError;
use crate::sweeper::PAYMENT_TIMEOUT_MINUTES;

/// A request for a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer_email: String,
    /// Line amount in minor currency units per unit.
    pub unit_amount_cents: i64,
    pub quantity: i64,
    pub currency: String,
    pub product_name: String,
    /// Where the provider redirects after successful payment.
    pub success_url: String,
    pub cancel_url: String,
    /// Campaign id, echoed back by the provider in webhooks.
    pub campaign_id: String,
}

/// A created checkout session: where to send the customer, and the opaque
/// reference the engine keeps for later refunds.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub session_id: String,
    pub session_url: String,
}

/// Outcome of a refund call.
#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub refund_id: String,
    pub status: String,
}

/// Provider-side status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
}

/// Abstract payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted payment session for `quantity * unit_amount_cents`.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, CoreError>;

    /// Refund a captured payment. `amount_cents = None` refunds in full.
    async fn refund(
        &self,
        payment_ref: &str,
        amount_cents: Option<i64>,
        reason: &str,
    ) -> Result<RefundOutcome, CoreError>;

    async fn payment_status(&self, payment_ref: &str) -> Result<PaymentStatus, CoreError>;
}

/// Stripe Checkout implementation.
#[derive(Clone)]
pub struct StripeCheckout {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct StripeRefund {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct StripeSessionStatus {
    payment_status: String,
}

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Form fields for a hosted checkout session. The session expires with the
/// capacity reservation it backs, so a customer cannot pay into a slot the
/// timeout sweep already released.
fn session_form(request: &CheckoutRequest, expires_at: DateTime<Utc>) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "payment".to_string()),
        ("payment_method_types[0]", "card".to_string()),
        ("customer_email", request.customer_email.clone()),
        ("success_url", request.success_url.clone()),
        ("cancel_url", request.cancel_url.clone()),
        ("expires_at", expires_at.timestamp().to_string()),
        ("metadata[campaign_id]", request.campaign_id.clone()),
        ("line_items[0][quantity]", request.quantity.to_string()),
        (
            "line_items[0][price_data][currency]",
            request.currency.clone(),
        ),
        (
            "line_items[0][price_data][unit_amount]",
            request.unit_amount_cents.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]",
            request.product_name.clone(),
        ),
    ]
}

impl StripeCheckout {
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: STRIPE_API_BASE.to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    /// Custom base URL, for testing against a stub server.
    pub fn with_base_url(secret_key: &str, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    fn provider_err(e: reqwest::Error) -> CoreError {
        CoreError::PaymentProvider(e.to_string())
    }
}

#[async_trait]
impl PaymentGateway for StripeCheckout {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, CoreError> {
        let url = format!("{}/checkout/sessions", self.base_url);
        let expires_at = Utc::now() + Duration::minutes(PAYMENT_TIMEOUT_MINUTES);
        let form = session_form(request, expires_at);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(Self::provider_err)?;

        if !response.status().is_success() {
            return Err(CoreError::PaymentProvider(format!(
                "checkout session creation returned {}",
                response.status()
            )));
        }

        let session = response
            .json::<StripeSession>()
            .await
            .map_err(Self::provider_err)?;

        Ok(CheckoutSession {
            session_id: session.id,
            session_url: session.url,
        })
    }

    async fn refund(
        &self,
        payment_ref: &str,
        amount_cents: Option<i64>,
        reason: &str,
    ) -> Result<RefundOutcome, CoreError> {
        let url = format!("{}/refunds", self.base_url);

        let mut form: Vec<(&str, String)> = vec![
            ("payment_intent", payment_ref.to_string()),
            ("metadata[reason]", reason.to_string()),
        ];
        if let Some(amount) = amount_cents {
            form.push(("amount", amount.to_string()));
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(Self::provider_err)?;

        if !response.status().is_success() {
            return Err(CoreError::RefundFailed(format!(
                "refund call returned {}",
                response.status()
            )));
        }

        let refund = response
            .json::<StripeRefund>()
            .await
            .map_err(Self::provider_err)?;

        Ok(RefundOutcome {
            refund_id: refund.id,
            status: refund.status,
        })
    }

    async fn payment_status(&self, payment_ref: &str) -> Result<PaymentStatus, CoreError> {
        let url = format!("{}/checkout/sessions/{}", self.base_url, payment_ref);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(Self::provider_err)?;

        if !response.status().is_success() {
            return Err(CoreError::PaymentProvider(format!(
                "payment status lookup returned {}",
                response.status()
            )));
        }

        let status = response
            .json::<StripeSessionStatus>()
            .await
            .map_err(Self::provider_err)?;

        Ok(match status.payment_status.as_str() {
            "paid" => PaymentStatus::Paid,
            "refunded" => PaymentStatus::Refunded,
            _ => PaymentStatus::Unpaid,
        })
    }
}

/// In-memory gateway for tests: hands out deterministic sessions and can be
/// scripted to fail refunds.
pub mod mock {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    use super::*;

    pub struct MockPaymentGateway {
        counter: AtomicU64,
        fail_refunds: AtomicBool,
        status: Mutex<PaymentStatus>,
        /// (payment_ref, amount_cents, reason) per refund call.
        pub refunds: Mutex<Vec<(String, Option<i64>, String)>>,
    }

    impl Default for MockPaymentGateway {
        fn default() -> Self {
            Self {
                counter: AtomicU64::new(0),
                fail_refunds: AtomicBool::new(false),
                status: Mutex::new(PaymentStatus::Paid),
                refunds: Mutex::new(Vec::new()),
            }
        }
    }

    impl MockPaymentGateway {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_refunds(&self, fail: bool) {
            self.fail_refunds.store(fail, Ordering::SeqCst);
        }

        /// What `payment_status` reports for every session. Defaults to
        /// `Paid`, matching a customer who completed checkout.
        pub fn set_payment_status(&self, status: PaymentStatus) {
            *self.status.lock().unwrap() = status;
        }

        pub fn refund_count(&self) -> usize {
            self.refunds.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PaymentGateway for MockPaymentGateway {
        async fn create_checkout_session(
            &self,
            request: &CheckoutRequest,
        ) -> Result<CheckoutSession, CoreError> {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(CheckoutSession {
                session_id: format!("sess_{n}"),
                session_url: format!("https://pay.test/session/{n}/{}", request.campaign_id),
            })
        }

        async fn refund(
            &self,
            payment_ref: &str,
            amount_cents: Option<i64>,
            reason: &str,
        ) -> Result<RefundOutcome, CoreError> {
            if self.fail_refunds.load(Ordering::SeqCst) {
                return Err(CoreError::RefundFailed(
                    "provider declined the refund".to_string(),
                ));
            }
            self.refunds.lock().unwrap().push((
                payment_ref.to_string(),
                amount_cents,
                reason.to_string(),
            ));
            Ok(RefundOutcome {
                refund_id: format!("re_{payment_ref}"),
                status: "succeeded".to_string(),
            })
        }

        async fn payment_status(&self, _payment_ref: &str) -> Result<PaymentStatus, CoreError> {
            Ok(*self.status.lock().unwrap())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockPaymentGateway;
    use super::*;

    fn checkout_request() -> CheckoutRequest {
        CheckoutRequest {
            customer_email: "a@example.com".to_string(),
            unit_amount_cents: 1200,
            quantity: 3,
            currency: "egp".to_string(),
            product_name: "Rice".to_string(),
            success_url: "http://localhost/ok".to_string(),
            cancel_url: "http://localhost/no".to_string(),
            campaign_id: "camp-1".to_string(),
        }
    }

    #[test]
    fn test_session_form_expires_with_reservation() {
        let expires_at = Utc::now() + Duration::minutes(PAYMENT_TIMEOUT_MINUTES);
        let form = session_form(&checkout_request(), expires_at);

        let expiry = form
            .iter()
            .find(|(key, _)| *key == "expires_at")
            .map(|(_, value)| value.clone());
        assert_eq!(expiry, Some(expires_at.timestamp().to_string()));
        assert!(
            form.iter()
                .any(|(key, value)| *key == "line_items[0][price_data][unit_amount]"
                    && value == "1200")
        );
    }

    #[tokio::test]
    async fn test_mock_sessions_are_distinct() {
        let gateway = MockPaymentGateway::new();
        let request = checkout_request();

        let a = gateway.create_checkout_session(&request).await.unwrap();
        let b = gateway.create_checkout_session(&request).await.unwrap();
        assert_ne!(a.session_id, b.session_id);
    }

    #[tokio::test]
    async fn test_mock_refund_failure_is_scriptable() {
        let gateway = MockPaymentGateway::new();
        gateway.fail_refunds(true);

        let result = gateway.refund("sess_0", Some(100), "test").await;
        assert!(matches!(result, Err(CoreError::RefundFailed(_))));
        assert_eq!(gateway.refund_count(), 0);

        gateway.fail_refunds(false);
        let outcome = gateway.refund("sess_0", Some(100), "test").await.unwrap();
        assert_eq!(outcome.status, "succeeded");
        assert_eq!(gateway.refund_count(), 1);
    }
}
