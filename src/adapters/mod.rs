//! External collaborators of the campaign engine.
//!
//! The engine only ever talks to the payment provider and the mail relay
//! through the traits defined here. Concrete implementations are HTTP
//! clients; tests substitute in-memory mocks.
//!
//! # Modules
//!
//! - [`payment`]: payment-session creation, refunds, payment status
//! - [`notification`]: invoice and cancellation emails

pub mod notification;
pub mod payment;

pub use notification::{HttpMailer, Notifier};
pub use payment::{PaymentGateway, StripeCheckout};
