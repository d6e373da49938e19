//! Notification adapter: invoice and cancellation emails.
//!
//! Fire-and-forget from the engine's perspective. Delivery failure is logged
//! here and never rolls back a state transition.

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

/// Everything needed to render and address an invoice email.
#[derive(Debug, Clone)]
pub struct InvoiceNotification {
    pub customer_id: String,
    pub customer_email: String,
    pub campaign_id: String,
    pub commitment_id: String,
    pub product_name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
}

impl InvoiceNotification {
    pub fn total_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity
    }
}

/// Everything needed to render a cancellation confirmation.
#[derive(Debug, Clone)]
pub struct CancellationNotification {
    pub customer_id: String,
    pub customer_email: String,
    pub commitment_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub amount_cents: i64,
    pub reason: Option<String>,
    /// True when a captured payment was refunded as part of the cancellation.
    pub refund_issued: bool,
}

/// Abstract mail delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_invoice(&self, notification: &InvoiceNotification);
    async fn send_cancellation(&self, notification: &CancellationNotification);
}

fn format_amount(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, (cents % 100).abs())
}

/// Render the invoice email body.
pub fn render_invoice_html(n: &InvoiceNotification) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; padding: 20px;">
  <h1>Invoice</h1>
  <table style="width: 100%; border-collapse: collapse;">
    <thead>
      <tr><th>Product</th><th>Unit Price</th><th>Quantity</th><th>Final Price</th></tr>
    </thead>
    <tbody>
      <tr>
        <td>{product}</td>
        <td>{unit} EGP</td>
        <td>{quantity}</td>
        <td>{total} EGP</td>
      </tr>
    </tbody>
  </table>
  <div style="font-weight: bold; text-align: right;">Total Paid: {total} EGP</div>
</div>"#,
        product = n.product_name,
        unit = format_amount(n.unit_price_cents),
        quantity = n.quantity,
        total = format_amount(n.total_cents()),
    )
}

/// Render the cancellation confirmation body.
pub fn render_cancellation_html(n: &CancellationNotification) -> String {
    let reason_line = match &n.reason {
        Some(reason) => format!("<p><strong>Reason:</strong> {reason}</p>"),
        None => String::new(),
    };
    let refund_line = if n.refund_issued {
        "<p><strong>Refund Status:</strong> Your refund is being processed and will \
         appear in your account within 5-10 business days.</p>"
    } else {
        "<p><strong>Refund Status:</strong> No payment was captured, nothing to refund.</p>"
    };

    format!(
        r#"<div style="font-family: Arial, sans-serif; padding: 20px;">
  <h2>Purchase Cancelled</h2>
  <p>Your purchase has been cancelled:</p>
  <p><strong>Product:</strong> {product}</p>
  <p><strong>Quantity:</strong> {quantity}</p>
  <p><strong>Amount:</strong> {amount} EGP</p>
  {reason_line}
  {refund_line}
</div>"#,
        product = n.product_name,
        quantity = n.quantity,
        amount = format_amount(n.amount_cents),
    )
}

/// Mail relay client: posts rendered emails as JSON to a configured
/// delivery endpoint.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    relay_url: String,
}

#[derive(Serialize)]
struct OutboundMail<'a> {
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

impl HttpMailer {
    pub fn new(relay_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            relay_url: relay_url.to_string(),
        }
    }

    async fn deliver(&self, to: &str, subject: &str, html: &str) {
        let mail = OutboundMail { to, subject, html };
        match self.client.post(&self.relay_url).json(&mail).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!(status = %response.status(), subject, "Mail relay rejected message");
            }
            Err(e) => {
                warn!(error = %e, subject, "Failed to reach mail relay");
            }
        }
    }
}

#[async_trait]
impl Notifier for HttpMailer {
    async fn send_invoice(&self, notification: &InvoiceNotification) {
        let html = render_invoice_html(notification);
        self.deliver(&notification.customer_email, "Your Invoice", &html)
            .await;
    }

    async fn send_cancellation(&self, notification: &CancellationNotification) {
        let html = render_cancellation_html(notification);
        self.deliver(
            &notification.customer_email,
            "Purchase Cancellation Confirmation",
            &html,
        )
        .await;
    }
}

/// Recording notifier for tests.
pub mod mock {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct MockNotifier {
        pub invoices: Mutex<Vec<InvoiceNotification>>,
        pub cancellations: Mutex<Vec<CancellationNotification>>,
    }

    impl MockNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn invoice_count(&self) -> usize {
            self.invoices.lock().unwrap().len()
        }

        pub fn cancellation_count(&self) -> usize {
            self.cancellations.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        async fn send_invoice(&self, notification: &InvoiceNotification) {
            self.invoices.lock().unwrap().push(notification.clone());
        }

        async fn send_cancellation(&self, notification: &CancellationNotification) {
            self.cancellations
                .lock()
                .unwrap()
                .push(notification.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_html_contains_totals() {
        let n = InvoiceNotification {
            customer_id: "cust-1".to_string(),
            customer_email: "a@example.com".to_string(),
            campaign_id: "camp-1".to_string(),
            commitment_id: "com-1".to_string(),
            product_name: "Rice 25kg".to_string(),
            unit_price_cents: 120_050,
            quantity: 3,
        };

        let html = render_invoice_html(&n);
        assert!(html.contains("Rice 25kg"));
        assert!(html.contains("1200.50 EGP"));
        assert!(html.contains("3601.50 EGP"));
    }

    #[test]
    fn test_cancellation_html_refund_line() {
        let base = CancellationNotification {
            customer_id: "cust-1".to_string(),
            customer_email: "a@example.com".to_string(),
            commitment_id: "com-1".to_string(),
            product_name: "Rice 25kg".to_string(),
            quantity: 2,
            amount_cents: 240_000,
            reason: Some("moved away".to_string()),
            refund_issued: true,
        };

        let html = render_cancellation_html(&base);
        assert!(html.contains("refund is being processed"));
        assert!(html.contains("moved away"));

        let unpaid = CancellationNotification {
            refund_issued: false,
            reason: None,
            ..base
        };
        let html = render_cancellation_html(&unpaid);
        assert!(html.contains("nothing to refund"));
        assert!(!html.contains("Reason:"));
    }
}
