//! Data models for Bulkify campaigns and commitments.
//!
//! A **campaign** is one time-boxed bulk-purchase attempt for one product,
//! anchored at the location of its first commitment. A **commitment** is one
//! customer's pledge of quantity toward a campaign. The lifecycle engine is
//! the only writer of either; everything else reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// Fixed campaign window: a campaign ends 14 days after it starts.
pub const CAMPAIGN_WINDOW_DAYS: i64 = 14;

/// Lifecycle status of a campaign.
///
/// `Completed`, `Cancelled` and `EndedWithoutPurchase` are terminal; no
/// transition ever leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignStatus {
    /// Created, initiating customer has not paid yet.
    #[serde(rename = "Waiting Payment")]
    WaitingPayment,
    /// Initiating payment confirmed; open for joiners.
    Started,
    /// Target quantity reached and paid.
    Completed,
    /// Every participant cancelled before completion.
    Cancelled,
    /// The 14-day window elapsed without reaching the target.
    #[serde(rename = "Ended without purchase")]
    EndedWithoutPurchase,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::WaitingPayment => "Waiting Payment",
            CampaignStatus::Started => "Started",
            CampaignStatus::Completed => "Completed",
            CampaignStatus::Cancelled => "Cancelled",
            CampaignStatus::EndedWithoutPurchase => "Ended without purchase",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Waiting Payment" => Some(CampaignStatus::WaitingPayment),
            "Started" => Some(CampaignStatus::Started),
            "Completed" => Some(CampaignStatus::Completed),
            "Cancelled" => Some(CampaignStatus::Cancelled),
            "Ended without purchase" => Some(CampaignStatus::EndedWithoutPurchase),
            _ => None,
        }
    }

    /// A campaign still accepting payments or joiners.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            CampaignStatus::WaitingPayment | CampaignStatus::Started
        )
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_live()
    }
}

/// Lifecycle status of a single customer's commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitmentStatus {
    /// Created, payment session issued, payment not yet confirmed.
    #[serde(rename = "Waiting Payment")]
    WaitingPayment,
    /// Payment captured; counts toward the campaign target.
    Pending,
    /// The owning campaign completed.
    Completed,
    /// Customer cancelled (refunded if payment had been captured).
    Cancelled,
    /// The owning campaign expired unfulfilled.
    #[serde(rename = "Ended without purchase")]
    EndedWithoutPurchase,
}

impl CommitmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitmentStatus::WaitingPayment => "Waiting Payment",
            CommitmentStatus::Pending => "Pending",
            CommitmentStatus::Completed => "Completed",
            CommitmentStatus::Cancelled => "Cancelled",
            CommitmentStatus::EndedWithoutPurchase => "Ended without purchase",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Waiting Payment" => Some(CommitmentStatus::WaitingPayment),
            "Pending" => Some(CommitmentStatus::Pending),
            "Completed" => Some(CommitmentStatus::Completed),
            "Cancelled" => Some(CommitmentStatus::Cancelled),
            "Ended without purchase" => Some(CommitmentStatus::EndedWithoutPurchase),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommitmentStatus::Completed
                | CommitmentStatus::Cancelled
                | CommitmentStatus::EndedWithoutPurchase
        )
    }
}

/// A product as the campaign core sees it: priced, with a bulk threshold.
///
/// Products are owned by the catalog; the core only reads them (and copies
/// `bulk_threshold` into new campaigns as their target).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Unit price in minor currency units (e.g. piasters).
    pub price_cents: i64,
    /// Target quantity for a full campaign of this product.
    pub bulk_threshold: i64,
    pub supplier_id: String,
}

/// One bulk-purchase campaign for one product at one geographic anchor.
#[derive(Debug, Clone, Serialize)]
pub struct Campaign {
    pub id: String,
    pub product_id: String,
    /// `[longitude, latitude]` of the originating commitment. Immutable.
    pub anchor_location: Coordinate,
    /// Quantity goal, copied from the product's bulk threshold at creation.
    pub target_quantity: i64,
    pub start_date: DateTime<Utc>,
    /// `start_date + 14 days`. Immutable.
    pub end_date: DateTime<Utc>,
    pub status: CampaignStatus,
}

/// One customer's pledge of quantity toward a campaign.
#[derive(Debug, Clone, Serialize)]
pub struct Commitment {
    pub id: String,
    pub campaign_id: String,
    pub customer_id: String,
    /// Contact address for invoice and cancellation mail.
    pub customer_email: String,
    /// Denormalized from the campaign for query convenience.
    pub product_id: String,
    pub quantity: i64,
    pub status: CommitmentStatus,
    pub payment_method: String,
    /// Opaque payment reference from the gateway, once a session exists.
    pub payment_ref: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Request body for starting a campaign.
#[derive(Debug, Clone, Deserialize)]
pub struct StartCampaignRequest {
    pub customer_id: String,
    pub customer_email: String,
    pub quantity: i64,
    /// `[longitude, latitude]` of the customer.
    pub customer_location: Vec<f64>,
}

/// Request body for joining ("voting on") a campaign.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinCampaignRequest {
    pub product_id: String,
    pub customer_id: String,
    pub customer_email: String,
    pub quantity: i64,
    pub customer_location: Vec<f64>,
}

/// Request body for cancelling a commitment.
#[derive(Debug, Clone, Deserialize)]
pub struct CancelCommitmentRequest {
    pub customer_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Response for start/join: the caller must complete payment at `session_url`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub message: String,
    pub session_url: String,
    pub campaign_id: String,
    pub commitment_id: String,
}

/// Outcome of a cancellation, including what happened on the payment side.
#[derive(Debug, Clone, Serialize)]
pub struct CancellationResponse {
    pub message: String,
    pub commitment_id: String,
    /// "refunded" when a captured payment was returned, "none" otherwise.
    pub refund_status: String,
    pub refund_amount_cents: i64,
    /// True when this was the last live commitment and the campaign folded.
    pub campaign_cancelled: bool,
}

/// One entry in the nearby-campaign listing.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignSummary {
    #[serde(flatten)]
    pub campaign: Campaign,
    /// Quantity already counting toward the target (`Pending` + `Completed`).
    pub committed_quantity: i64,
    /// Distance in km from the requesting customer, when a location was given.
    pub distance_km: Option<f64>,
}

/// Response for the per-product campaign listing.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignListResponse {
    pub campaigns: Vec<CampaignSummary>,
    /// Campaigns aged out by the opportunistic sweep that ran before the read.
    pub swept: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campaign_status_round_trip() {
        for status in [
            CampaignStatus::WaitingPayment,
            CampaignStatus::Started,
            CampaignStatus::Completed,
            CampaignStatus::Cancelled,
            CampaignStatus::EndedWithoutPurchase,
        ] {
            assert_eq!(CampaignStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(CampaignStatus::parse("Placed"), None);
    }

    #[test]
    fn test_commitment_status_round_trip() {
        for status in [
            CommitmentStatus::WaitingPayment,
            CommitmentStatus::Pending,
            CommitmentStatus::Completed,
            CommitmentStatus::Cancelled,
            CommitmentStatus::EndedWithoutPurchase,
        ] {
            assert_eq!(CommitmentStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!CampaignStatus::WaitingPayment.is_terminal());
        assert!(!CampaignStatus::Started.is_terminal());
        assert!(CampaignStatus::Completed.is_terminal());
        assert!(CampaignStatus::Cancelled.is_terminal());
        assert!(CampaignStatus::EndedWithoutPurchase.is_terminal());

        assert!(!CommitmentStatus::WaitingPayment.is_terminal());
        assert!(!CommitmentStatus::Pending.is_terminal());
        assert!(CommitmentStatus::Completed.is_terminal());
    }
}
