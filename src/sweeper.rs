//! Expiry sweeper: lazy, idempotent aging of campaigns and commitments.
//!
//! There is no timer in the system. The sweep runs opportunistically ahead
//! of reads that filter on "active" status, so it must tolerate being
//! invoked redundantly, frequently, and concurrently with live join/cancel
//! traffic. Every transition is a status-guarded compare-and-set: a
//! campaign being completed by a payment confirmation can not
//! simultaneously be aged out here, and a second sweep over the same data
//! finds nothing left to move.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::model::{CampaignStatus, CommitmentStatus};
use crate::storage::Store;

/// How long a `WaitingPayment` commitment may hold its reserved capacity
/// before the slot is released. Distinct from the 14-day campaign window.
pub const PAYMENT_TIMEOUT_MINUTES: i64 = 60;

/// Age out every live campaign whose window closed before `now`.
///
/// Each expired campaign moves to `EndedWithoutPurchase` together with all
/// of its `WaitingPayment` and `Pending` commitments. Returns how many
/// campaigns this call transitioned; a repeat call with no intervening
/// writes returns zero. A failure on one campaign is logged and does not
/// abort the rest of the batch.
pub async fn sweep_expired(store: &Store, now: DateTime<Utc>) -> Result<usize, sqlx::Error> {
    let expired = store.find_expired_open_campaigns(now).await?;

    let mut swept = 0;
    for campaign in expired {
        let moved = match store
            .transition_campaign(
                &campaign.id,
                &[CampaignStatus::WaitingPayment, CampaignStatus::Started],
                CampaignStatus::EndedWithoutPurchase,
            )
            .await
        {
            Ok(moved) => moved,
            Err(e) => {
                warn!(campaign_id = %campaign.id, error = %e, "Failed to age out campaign");
                continue;
            }
        };
        if !moved {
            // Completed or cancelled between the scan and the update
            continue;
        }

        match store
            .transition_commitments_of_campaign(
                &campaign.id,
                &[CommitmentStatus::WaitingPayment, CommitmentStatus::Pending],
                CommitmentStatus::EndedWithoutPurchase,
            )
            .await
        {
            Ok(commitments) => {
                swept += 1;
                info!(
                    campaign_id = %campaign.id,
                    commitments,
                    end_date = %campaign.end_date,
                    "Campaign ended without purchase"
                );
            }
            Err(e) => {
                // The campaign is already terminal; the next sweep cannot
                // retry it, so surface loudly.
                warn!(
                    campaign_id = %campaign.id,
                    error = %e,
                    "Campaign aged out but its commitments were not"
                );
                swept += 1;
            }
        }
    }

    Ok(swept)
}

/// Release capacity held by commitments whose payment never arrived.
///
/// A `WaitingPayment` commitment older than [`PAYMENT_TIMEOUT_MINUTES`] is
/// cancelled, and a campaign left with no live participants folds with it.
/// Returns how many commitments were released.
pub async fn release_stale_payments(store: &Store, now: DateTime<Utc>) -> Result<usize, sqlx::Error> {
    let cutoff = now - Duration::minutes(PAYMENT_TIMEOUT_MINUTES);
    let stale = store.find_stale_waiting_commitments(cutoff).await?;

    let mut released = 0;
    for commitment in stale {
        let cancelled = match store
            .cancel_commitment_row(
                &commitment.id,
                &[CommitmentStatus::WaitingPayment],
                Some("Payment not completed in time"),
                now,
            )
            .await
        {
            Ok(cancelled) => cancelled,
            Err(e) => {
                warn!(commitment_id = %commitment.id, error = %e, "Failed to release stale commitment");
                continue;
            }
        };
        if !cancelled {
            continue;
        }
        released += 1;
        info!(
            commitment_id = %commitment.id,
            campaign_id = %commitment.campaign_id,
            quantity = commitment.quantity,
            "Released reserved capacity for unpaid commitment"
        );

        match store.count_live_commitments(&commitment.campaign_id).await {
            Ok(0) => {
                if let Err(e) = store
                    .transition_campaign(
                        &commitment.campaign_id,
                        &[CampaignStatus::WaitingPayment, CampaignStatus::Started],
                        CampaignStatus::Cancelled,
                    )
                    .await
                {
                    warn!(campaign_id = %commitment.campaign_id, error = %e, "Failed to fold empty campaign");
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(campaign_id = %commitment.campaign_id, error = %e, "Failed to count live commitments");
            }
        }
    }

    Ok(released)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Campaign;
    use crate::storage::NewCommitment;

    async fn setup() -> Store {
        Store::new("sqlite::memory:").await.unwrap()
    }

    async fn expired_campaign(store: &Store, now: DateTime<Utc>) -> Campaign {
        // Started 20 days ago, so the 14-day window is well past
        store
            .create_campaign("prod-1", [31.0, 30.0], 10, now - Duration::days(20))
            .await
            .unwrap()
    }

    async fn add_commitment(
        store: &Store,
        campaign: &Campaign,
        customer: &str,
        status: CommitmentStatus,
        created: DateTime<Utc>,
    ) -> String {
        let commitment = store
            .create_commitment_reserving(
                &NewCommitment {
                    campaign_id: &campaign.id,
                    customer_id: customer,
                    customer_email: "test@example.com",
                    product_id: "prod-1",
                    quantity: 1,
                    target_quantity: campaign.target_quantity,
                    payment_method: "Credit Card",
                },
                created,
            )
            .await
            .unwrap()
            .unwrap();
        if status != CommitmentStatus::WaitingPayment {
            store
                .transition_commitment(
                    &commitment.id,
                    &[CommitmentStatus::WaitingPayment],
                    status,
                )
                .await
                .unwrap();
        }
        commitment.id
    }

    #[tokio::test]
    async fn test_sweep_covers_pending_and_waiting() {
        let store = setup().await;
        let now = Utc::now();
        let campaign = expired_campaign(&store, now).await;
        store
            .transition_campaign(
                &campaign.id,
                &[CampaignStatus::WaitingPayment],
                CampaignStatus::Started,
            )
            .await
            .unwrap();

        for customer in ["a", "b", "c"] {
            add_commitment(&store, &campaign, customer, CommitmentStatus::Pending, now).await;
        }
        add_commitment(&store, &campaign, "d", CommitmentStatus::WaitingPayment, now).await;

        let swept = sweep_expired(&store, now).await.unwrap();
        assert_eq!(swept, 1);

        let loaded = store.get_campaign(&campaign.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, CampaignStatus::EndedWithoutPurchase);

        let commitments = store.commitments_for_campaign(&campaign.id).await.unwrap();
        assert_eq!(commitments.len(), 4);
        for c in commitments {
            assert_eq!(c.status, CommitmentStatus::EndedWithoutPurchase);
        }
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let store = setup().await;
        let now = Utc::now();
        expired_campaign(&store, now).await;

        let first = sweep_expired(&store, now).await.unwrap();
        assert_eq!(first, 1);
        let second = sweep_expired(&store, now).await.unwrap();
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn test_sweep_skips_live_and_terminal_campaigns() {
        let store = setup().await;
        let now = Utc::now();

        // Still inside its window
        let live = store
            .create_campaign("prod-1", [31.0, 30.0], 10, now)
            .await
            .unwrap();

        // Expired but already completed
        let done = expired_campaign(&store, now).await;
        store
            .transition_campaign(
                &done.id,
                &[CampaignStatus::WaitingPayment],
                CampaignStatus::Started,
            )
            .await
            .unwrap();
        store
            .transition_campaign(&done.id, &[CampaignStatus::Started], CampaignStatus::Completed)
            .await
            .unwrap();

        let swept = sweep_expired(&store, now).await.unwrap();
        assert_eq!(swept, 0);

        let live_status = store.get_campaign(&live.id).await.unwrap().unwrap().status;
        assert_eq!(live_status, CampaignStatus::WaitingPayment);
        let done_status = store.get_campaign(&done.id).await.unwrap().unwrap().status;
        assert_eq!(done_status, CampaignStatus::Completed);
    }

    #[tokio::test]
    async fn test_release_stale_payments_frees_capacity_and_folds_campaign() {
        let store = setup().await;
        let now = Utc::now();
        let campaign = store
            .create_campaign("prod-1", [31.0, 30.0], 10, now)
            .await
            .unwrap();

        let stale_id = add_commitment(
            &store,
            &campaign,
            "a",
            CommitmentStatus::WaitingPayment,
            now - Duration::minutes(PAYMENT_TIMEOUT_MINUTES + 5),
        )
        .await;

        let released = release_stale_payments(&store, now).await.unwrap();
        assert_eq!(released, 1);

        let commitment = store.get_commitment(&stale_id).await.unwrap().unwrap();
        assert_eq!(commitment.status, CommitmentStatus::Cancelled);
        assert_eq!(
            commitment.cancellation_reason.as_deref(),
            Some("Payment not completed in time")
        );

        // The campaign lost its only participant
        let folded = store.get_campaign(&campaign.id).await.unwrap().unwrap();
        assert_eq!(folded.status, CampaignStatus::Cancelled);

        // And a fresh commitment would get the capacity back
        let replay = release_stale_payments(&store, now).await.unwrap();
        assert_eq!(replay, 0);
    }

    #[tokio::test]
    async fn test_release_leaves_recent_commitments_alone() {
        let store = setup().await;
        let now = Utc::now();
        let campaign = store
            .create_campaign("prod-1", [31.0, 30.0], 10, now)
            .await
            .unwrap();
        let fresh_id =
            add_commitment(&store, &campaign, "a", CommitmentStatus::WaitingPayment, now).await;

        let released = release_stale_payments(&store, now).await.unwrap();
        assert_eq!(released, 0);

        let commitment = store.get_commitment(&fresh_id).await.unwrap().unwrap();
        assert_eq!(commitment.status, CommitmentStatus::WaitingPayment);
    }
}
