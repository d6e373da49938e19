//! Campaign lifecycle engine.
//!
//! Owns every state transition of campaigns and commitments. The engine is
//! stateless between calls: all truth lives in the [`Store`], and every
//! transition is a status-guarded compare-and-set there, so correctness does
//! not depend on in-process coordination.
//!
//! Payment flows are two-phase. Starting or joining a campaign creates a
//! `WaitingPayment` commitment and a hosted payment session; the provider's
//! success callback re-enters the engine through the `confirm_*` operations,
//! which promote the commitment and, once the target is reached, complete
//! the campaign. Confirmation callbacks may be replayed by the provider and
//! are idempotent.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::adapters::notification::{CancellationNotification, InvoiceNotification, Notifier};
use crate::adapters::payment::{CheckoutRequest, CheckoutSession, PaymentGateway, PaymentStatus};
use crate::error::CoreError;
use crate::geo::{Coordinate, EXCLUSION_RADIUS_KM, distance_km};
use crate::model::{
    Campaign, CampaignListResponse, CampaignStatus, CampaignSummary, Commitment, CommitmentStatus,
    JoinCampaignRequest, Product, StartCampaignRequest,
};
use crate::storage::{NewCommitment, Store};
use crate::sweeper;

/// Bounded internal retries for storage contention on a guarded write.
const MAX_CONTENTION_RETRIES: u32 = 3;

/// Payment method recorded on commitments created through checkout.
const DEFAULT_PAYMENT_METHOD: &str = "Credit Card";

const CURRENCY: &str = "egp";

/// The lifecycle engine and its external collaborators.
#[derive(Clone)]
pub struct Engine {
    store: Store,
    payments: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    /// Base URL the payment provider redirects back to on success.
    callback_base_url: String,
    /// Where the provider sends customers who abandon checkout.
    cancel_url: String,
}

/// Result of starting or joining a campaign: the records created and the
/// session the customer must pay through.
#[derive(Debug, Clone)]
pub struct CheckoutHandle {
    pub campaign: Campaign,
    pub commitment: Commitment,
    pub session: CheckoutSession,
}

fn parse_location(raw: &[f64]) -> Result<Coordinate, CoreError> {
    match raw {
        [lon, lat] => Ok([*lon, *lat]),
        _ => Err(CoreError::InvalidInput(
            "customer location must be a [longitude, latitude] pair".to_string(),
        )),
    }
}

fn validate_quantity(quantity: i64) -> Result<(), CoreError> {
    if quantity <= 0 {
        return Err(CoreError::InvalidInput(
            "quantity must be positive".to_string(),
        ));
    }
    Ok(())
}

/// SQLite reports writer contention as a busy/locked database error; those
/// are the only storage errors worth retrying.
fn is_contention(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            let msg = db.message().to_lowercase();
            msg.contains("locked") || msg.contains("busy")
        }
        _ => false,
    }
}

impl Engine {
    pub fn new(
        store: Store,
        payments: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        callback_base_url: &str,
        cancel_url: &str,
    ) -> Self {
        Self {
            store,
            payments,
            notifier,
            callback_base_url: callback_base_url.trim_end_matches('/').to_string(),
            cancel_url: cancel_url.to_string(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    async fn require_product(&self, product_id: &str) -> Result<Product, CoreError> {
        self.store
            .get_product(product_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("product {product_id}")))
    }

    async fn require_campaign(&self, campaign_id: &str) -> Result<Campaign, CoreError> {
        self.store
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("campaign {campaign_id}")))
    }

    /// The success redirect is a guessable URL; before promoting an unpaid
    /// commitment, ask the provider whether the session was actually paid.
    async fn verify_payment_captured(&self, commitment: &Commitment) -> Result<(), CoreError> {
        if commitment.status != CommitmentStatus::WaitingPayment {
            return Ok(());
        }
        let payment_ref = commitment.payment_ref.as_deref().ok_or_else(|| {
            CoreError::InvalidState("no payment session on this commitment".to_string())
        })?;
        match self.payments.payment_status(payment_ref).await? {
            PaymentStatus::Paid => Ok(()),
            PaymentStatus::Unpaid | PaymentStatus::Refunded => Err(CoreError::InvalidState(
                "payment has not been captured for this commitment".to_string(),
            )),
        }
    }

    /// Return a captured payment on a commitment that can no longer count
    /// toward its campaign. A checkout session outlives the reservation it
    /// was created for, so a payment can land after the timeout sweep
    /// released the slot or after the campaign ended; that money must go
    /// back, not sit stranded on a dead commitment.
    async fn refund_stranded_payment(&self, commitment: &Commitment) -> Result<(), CoreError> {
        let Some(payment_ref) = commitment.payment_ref.as_deref() else {
            return Ok(());
        };
        if self.payments.payment_status(payment_ref).await? != PaymentStatus::Paid {
            return Ok(());
        }
        let product = self.require_product(&commitment.product_id).await?;
        let outcome = self
            .payments
            .refund(
                payment_ref,
                Some(product.price_cents * commitment.quantity),
                "Payment arrived after the purchase was released",
            )
            .await?;
        warn!(
            commitment_id = %commitment.id,
            refund_id = %outcome.refund_id,
            "Refunded a payment captured after its commitment was released"
        );
        Ok(())
    }

    /// Complete the campaign if the paid tally has reached the target,
    /// promoting every `Pending` commitment with it. Returns the campaign
    /// status observed after the attempt, so callers can react to the
    /// sweeper having ended the campaign in the meantime.
    async fn complete_if_target_met(
        &self,
        campaign: &Campaign,
    ) -> Result<CampaignStatus, CoreError> {
        let committed = self
            .store
            .sum_committed_quantity(
                &campaign.id,
                &[CommitmentStatus::Pending, CommitmentStatus::Completed],
            )
            .await?;
        if committed < campaign.target_quantity {
            return Ok(campaign.status);
        }

        let completed = self
            .store
            .transition_campaign(
                &campaign.id,
                &[CampaignStatus::WaitingPayment, CampaignStatus::Started],
                CampaignStatus::Completed,
            )
            .await?;

        let current = self.require_campaign(&campaign.id).await?;
        if current.status == CampaignStatus::Completed {
            let moved = self
                .store
                .transition_commitments_of_campaign(
                    &campaign.id,
                    &[CommitmentStatus::Pending],
                    CommitmentStatus::Completed,
                )
                .await?;
            if completed {
                info!(
                    campaign_id = %campaign.id,
                    committed, participants = moved, "Campaign completed"
                );
            }
        }
        Ok(current.status)
    }

    /// Start a new campaign with its initiating commitment.
    ///
    /// The campaign anchors at the customer's location and copies the
    /// product's bulk threshold as its target. Both records stay in
    /// `WaitingPayment` until the payment callback arrives; the returned
    /// session URL is where the customer pays.
    pub async fn start_campaign(
        &self,
        product_id: &str,
        request: &StartCampaignRequest,
    ) -> Result<CheckoutHandle, CoreError> {
        let product = self.require_product(product_id).await?;
        let location = parse_location(&request.customer_location)?;
        validate_quantity(request.quantity)?;

        if request.quantity > product.bulk_threshold {
            return Err(CoreError::CapacityExceeded(format!(
                "quantity {} exceeds the product bulk threshold {}",
                request.quantity, product.bulk_threshold
            )));
        }

        // Exclusion applies only against campaigns that are still live;
        // ended or cancelled campaigns do not block a new attempt.
        let active = self
            .store
            .find_active_campaigns_for_product(product_id)
            .await?;
        for campaign in &active {
            let d = distance_km(location, campaign.anchor_location);
            if d <= EXCLUSION_RADIUS_KM {
                return Err(CoreError::ProximityConflict(format!(
                    "another purchase is in progress within {EXCLUSION_RADIUS_KM} km"
                )));
            }
        }

        let now = Utc::now();
        let campaign = self
            .store
            .create_campaign(product_id, location, product.bulk_threshold, now)
            .await?;

        let commitment = self
            .store
            .create_commitment_reserving(
                &NewCommitment {
                    campaign_id: &campaign.id,
                    customer_id: &request.customer_id,
                    customer_email: &request.customer_email,
                    product_id,
                    quantity: request.quantity,
                    target_quantity: campaign.target_quantity,
                    payment_method: DEFAULT_PAYMENT_METHOD,
                },
                now,
            )
            .await?
            .ok_or_else(|| {
                CoreError::CapacityExceeded(format!(
                    "quantity {} exceeds the campaign target {}",
                    request.quantity, campaign.target_quantity
                ))
            })?;

        let session = self
            .create_session(
                &product,
                &request.customer_email,
                request.quantity,
                &campaign.id,
                &format!(
                    "{}/campaigns/{}/confirm/{}",
                    self.callback_base_url, campaign.id, request.customer_id
                ),
            )
            .await?;
        self.store
            .set_commitment_payment_ref(&commitment.id, &session.session_id)
            .await?;

        info!(
            campaign_id = %campaign.id,
            product_id,
            customer_id = %request.customer_id,
            quantity = request.quantity,
            "Campaign started, awaiting payment"
        );

        Ok(CheckoutHandle {
            campaign,
            commitment,
            session,
        })
    }

    /// Payment callback for the initiating commitment: campaign `WaitingPayment
    /// -> Started`, commitment `WaitingPayment -> Pending`, invoice sent. A
    /// starter whose quantity already meets the target completes the campaign
    /// here rather than waiting for a join that will never come.
    ///
    /// Idempotent: the provider may retry the callback; a replay after the
    /// transition returns success without re-sending the invoice.
    pub async fn confirm_start_payment(
        &self,
        campaign_id: &str,
        customer_id: &str,
    ) -> Result<(), CoreError> {
        let campaign = self.require_campaign(campaign_id).await?;
        let commitment = self
            .store
            .find_commitment_for_customer(campaign_id, customer_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(format!(
                    "commitment for customer {customer_id} on campaign {campaign_id}"
                ))
            })?;

        // A payment landing after the slot was released gets refunded, never
        // resurrected.
        if matches!(
            commitment.status,
            CommitmentStatus::Cancelled | CommitmentStatus::EndedWithoutPurchase
        ) {
            self.refund_stranded_payment(&commitment).await?;
            return Err(CoreError::InvalidState(format!(
                "commitment is {}",
                commitment.status.as_str()
            )));
        }
        self.verify_payment_captured(&commitment).await?;

        let campaign_moved = self
            .store
            .transition_campaign(
                campaign_id,
                &[CampaignStatus::WaitingPayment],
                CampaignStatus::Started,
            )
            .await?;
        if !campaign_moved {
            // Someone already transitioned it; only an error if the campaign
            // left the live set entirely.
            let current = self.require_campaign(campaign_id).await?;
            if current.status.is_terminal() && current.status != CampaignStatus::Completed {
                self.refund_stranded_payment(&commitment).await?;
                return Err(CoreError::InvalidState(format!(
                    "campaign is {}",
                    current.status.as_str()
                )));
            }
        }

        let promoted = self
            .store
            .transition_commitment(
                &commitment.id,
                &[CommitmentStatus::WaitingPayment],
                CommitmentStatus::Pending,
            )
            .await?;
        if !promoted {
            let current = self
                .store
                .get_commitment(&commitment.id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("commitment {}", commitment.id)))?;
            return match current.status {
                // Callback replay after the promotion already happened
                CommitmentStatus::Pending | CommitmentStatus::Completed => Ok(()),
                other => {
                    self.refund_stranded_payment(&current).await?;
                    Err(CoreError::InvalidState(format!(
                        "commitment is {}",
                        other.as_str()
                    )))
                }
            };
        }

        if self.complete_if_target_met(&campaign).await?
            == CampaignStatus::EndedWithoutPurchase
        {
            // The sweeper won the race before this payment landed
            self.store
                .transition_commitment(
                    &commitment.id,
                    &[CommitmentStatus::Pending],
                    CommitmentStatus::EndedWithoutPurchase,
                )
                .await?;
            self.refund_stranded_payment(&commitment).await?;
            return Err(CoreError::InvalidState(
                "campaign ended before payment was confirmed".to_string(),
            ));
        }

        let product = self.require_product(&campaign.product_id).await?;
        self.notifier
            .send_invoice(&InvoiceNotification {
                customer_id: customer_id.to_string(),
                customer_email: commitment.customer_email.clone(),
                campaign_id: campaign_id.to_string(),
                commitment_id: commitment.id.clone(),
                product_name: product.name.clone(),
                unit_price_cents: product.price_cents,
                quantity: commitment.quantity,
            })
            .await;

        info!(campaign_id, customer_id, "Start payment confirmed, campaign is live");
        Ok(())
    }

    /// Join ("vote on") an existing campaign.
    ///
    /// The customer must be within the exclusion radius of the campaign's
    /// anchor, and the pledged quantity must fit the remaining capacity.
    /// Capacity is reserved atomically at admission; the slot is released if
    /// the payment never arrives (see the payment-timeout sweep).
    pub async fn join_campaign(
        &self,
        campaign_id: &str,
        request: &JoinCampaignRequest,
    ) -> Result<CheckoutHandle, CoreError> {
        let campaign = self.require_campaign(campaign_id).await?;
        let product = self.require_product(&request.product_id).await?;
        let location = parse_location(&request.customer_location)?;
        validate_quantity(request.quantity)?;

        if !campaign.status.is_live() {
            return Err(CoreError::InvalidState(format!(
                "campaign is {}",
                campaign.status.as_str()
            )));
        }

        let d = distance_km(location, campaign.anchor_location);
        if d > EXCLUSION_RADIUS_KM {
            return Err(CoreError::ProximityConflict(format!(
                "{d:.2} km from the campaign area; must be within {EXCLUSION_RADIUS_KM} km"
            )));
        }

        // The guarded insert re-checks capacity atomically; the loop only
        // absorbs transient writer contention, re-reading nothing stale.
        let mut attempt = 0;
        let commitment = loop {
            attempt += 1;
            let result = self
                .store
                .create_commitment_reserving(
                    &NewCommitment {
                        campaign_id,
                        customer_id: &request.customer_id,
                        customer_email: &request.customer_email,
                        product_id: &request.product_id,
                        quantity: request.quantity,
                        target_quantity: campaign.target_quantity,
                        payment_method: DEFAULT_PAYMENT_METHOD,
                    },
                    Utc::now(),
                )
                .await;
            match result {
                Ok(Some(commitment)) => break commitment,
                Ok(None) => {
                    let committed = self
                        .store
                        .sum_committed_quantity(
                            campaign_id,
                            &[CommitmentStatus::Pending, CommitmentStatus::WaitingPayment],
                        )
                        .await?;
                    return Err(CoreError::CapacityExceeded(format!(
                        "quantity {} plus committed {} exceeds target {}",
                        request.quantity, committed, campaign.target_quantity
                    )));
                }
                Err(e) if is_contention(&e) && attempt < MAX_CONTENTION_RETRIES => {
                    warn!(campaign_id, attempt, "Store contention on join, retrying");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let session = self
            .create_session(
                &product,
                &request.customer_email,
                request.quantity,
                campaign_id,
                &format!(
                    "{}/campaigns/{}/votes/confirm/{}/{}",
                    self.callback_base_url, campaign_id, request.customer_id, commitment.id
                ),
            )
            .await?;
        self.store
            .set_commitment_payment_ref(&commitment.id, &session.session_id)
            .await?;

        info!(
            campaign_id,
            customer_id = %request.customer_id,
            quantity = request.quantity,
            "Join admitted, awaiting payment"
        );

        Ok(CheckoutHandle {
            campaign,
            commitment,
            session,
        })
    }

    /// Payment callback for a joiner: commitment `WaitingPayment -> Pending`,
    /// then complete the campaign if the paid tally reached the target.
    ///
    /// Completion is a one-way compare-and-set: a campaign being completed
    /// here can not simultaneously be aged out by the sweeper, and vice
    /// versa. Replays are idempotent.
    pub async fn confirm_join_payment(
        &self,
        campaign_id: &str,
        customer_id: &str,
        commitment_id: &str,
    ) -> Result<(), CoreError> {
        let campaign = self.require_campaign(campaign_id).await?;
        let commitment = self
            .store
            .get_commitment(commitment_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("commitment {commitment_id}")))?;
        if commitment.campaign_id != campaign_id {
            return Err(CoreError::NotFound(format!(
                "commitment {commitment_id} on campaign {campaign_id}"
            )));
        }
        if commitment.customer_id != customer_id {
            return Err(CoreError::Forbidden(
                "commitment belongs to another customer".to_string(),
            ));
        }

        // A payment landing after the slot was released gets refunded, never
        // resurrected.
        if matches!(
            commitment.status,
            CommitmentStatus::Cancelled | CommitmentStatus::EndedWithoutPurchase
        ) {
            self.refund_stranded_payment(&commitment).await?;
            return Err(CoreError::InvalidState(format!(
                "commitment is {}",
                commitment.status.as_str()
            )));
        }
        self.verify_payment_captured(&commitment).await?;

        let newly_promoted = self
            .store
            .transition_commitment(
                commitment_id,
                &[CommitmentStatus::WaitingPayment],
                CommitmentStatus::Pending,
            )
            .await?;
        if !newly_promoted {
            let current = self
                .store
                .get_commitment(commitment_id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("commitment {commitment_id}")))?;
            match current.status {
                CommitmentStatus::Pending | CommitmentStatus::Completed => {}
                other => {
                    self.refund_stranded_payment(&current).await?;
                    return Err(CoreError::InvalidState(format!(
                        "commitment is {}",
                        other.as_str()
                    )));
                }
            }
        }

        if self.complete_if_target_met(&campaign).await?
            == CampaignStatus::EndedWithoutPurchase
        {
            // The sweeper won the race before this payment landed; fold the
            // freshly promoted commitment in with the rest and return the
            // money.
            self.store
                .transition_commitment(
                    commitment_id,
                    &[CommitmentStatus::Pending],
                    CommitmentStatus::EndedWithoutPurchase,
                )
                .await?;
            self.refund_stranded_payment(&commitment).await?;
            return Err(CoreError::InvalidState(
                "campaign ended before payment was confirmed".to_string(),
            ));
        }

        if newly_promoted {
            let product = self.require_product(&campaign.product_id).await?;
            self.notifier
                .send_invoice(&InvoiceNotification {
                    customer_id: customer_id.to_string(),
                    customer_email: commitment.customer_email.clone(),
                    campaign_id: campaign_id.to_string(),
                    commitment_id: commitment_id.to_string(),
                    product_name: product.name.clone(),
                    unit_price_cents: product.price_cents,
                    quantity: commitment.quantity,
                })
                .await;
        }

        Ok(())
    }

    /// Cancel a customer's commitment, refunding first when payment was
    /// captured.
    ///
    /// A failed refund aborts the cancellation: the commitment stays
    /// `Pending` and the caller sees `RefundFailed`. When the last live
    /// commitment of a campaign cancels, the campaign folds with it.
    pub async fn cancel_commitment(
        &self,
        commitment_id: &str,
        customer_id: &str,
        reason: Option<&str>,
    ) -> Result<crate::model::CancellationResponse, CoreError> {
        let commitment = self
            .store
            .get_commitment(commitment_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("commitment {commitment_id}")))?;
        if commitment.customer_id != customer_id {
            return Err(CoreError::Forbidden(
                "commitment belongs to another customer".to_string(),
            ));
        }

        match commitment.status {
            CommitmentStatus::Cancelled => {
                return Err(CoreError::InvalidState(
                    "purchase is already cancelled".to_string(),
                ));
            }
            CommitmentStatus::Completed => {
                return Err(CoreError::InvalidState(
                    "cannot cancel a completed purchase".to_string(),
                ));
            }
            CommitmentStatus::EndedWithoutPurchase => {
                return Err(CoreError::InvalidState(
                    "cannot cancel an expired purchase".to_string(),
                ));
            }
            CommitmentStatus::WaitingPayment | CommitmentStatus::Pending => {}
        }

        let product = self.require_product(&commitment.product_id).await?;
        let amount_cents = product.price_cents * commitment.quantity;

        // Resolve the payment side before touching commitment state. If the
        // provider declines, nothing changes here.
        let refund_issued = if commitment.status == CommitmentStatus::Pending {
            let payment_ref = commitment.payment_ref.as_deref().ok_or_else(|| {
                CoreError::RefundFailed("no payment reference on a paid commitment".to_string())
            })?;
            let outcome = self
                .payments
                .refund(
                    payment_ref,
                    Some(amount_cents),
                    reason.unwrap_or("Customer requested cancellation"),
                )
                .await?;
            info!(
                commitment_id,
                refund_id = %outcome.refund_id,
                status = %outcome.status,
                "Refund issued"
            );
            true
        } else {
            false
        };

        // Guard on the exact status the refund decision was based on: if a
        // concurrent payment callback promoted the commitment after our
        // read, the update must miss rather than cancel a paid pledge
        // without its refund.
        let now = Utc::now();
        let cancelled = self
            .store
            .cancel_commitment_row(commitment_id, &[commitment.status], reason, now)
            .await?;
        if !cancelled {
            // Promoted, completed, or swept between our read and the guarded
            // update; the caller can retry against the fresh status.
            let current = self
                .store
                .get_commitment(commitment_id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("commitment {commitment_id}")))?;
            return Err(CoreError::InvalidState(format!(
                "commitment is {}",
                current.status.as_str()
            )));
        }

        // Fold the campaign if this was its last live participant
        let live = self
            .store
            .count_live_commitments(&commitment.campaign_id)
            .await?;
        let campaign_cancelled = if live == 0 {
            self.store
                .transition_campaign(
                    &commitment.campaign_id,
                    &[CampaignStatus::WaitingPayment, CampaignStatus::Started],
                    CampaignStatus::Cancelled,
                )
                .await?
        } else {
            false
        };

        self.notifier
            .send_cancellation(&CancellationNotification {
                customer_id: customer_id.to_string(),
                customer_email: commitment.customer_email.clone(),
                commitment_id: commitment_id.to_string(),
                product_name: product.name.clone(),
                quantity: commitment.quantity,
                amount_cents,
                reason: reason.map(str::to_string),
                refund_issued,
            })
            .await;

        info!(
            commitment_id,
            campaign_id = %commitment.campaign_id,
            refund_issued,
            campaign_cancelled,
            "Commitment cancelled"
        );

        Ok(crate::model::CancellationResponse {
            message: "Purchase cancelled successfully".to_string(),
            commitment_id: commitment_id.to_string(),
            refund_status: if refund_issued {
                "refunded".to_string()
            } else {
                "none".to_string()
            },
            refund_amount_cents: if refund_issued { amount_cents } else { 0 },
            campaign_cancelled,
        })
    }

    /// Active campaigns for a product, swept first.
    ///
    /// The expiry sweep runs opportunistically ahead of this read rather
    /// than on a timer, so listings never show campaigns whose window has
    /// already closed.
    pub async fn list_active_campaigns(
        &self,
        product_id: &str,
        customer_location: Option<Coordinate>,
    ) -> Result<CampaignListResponse, CoreError> {
        self.require_product(product_id).await?;

        let now = Utc::now();
        let swept = sweeper::sweep_expired(&self.store, now).await?;
        sweeper::release_stale_payments(&self.store, now).await?;

        let campaigns = self
            .store
            .find_active_campaigns_for_product(product_id)
            .await?;

        let mut summaries = Vec::with_capacity(campaigns.len());
        for campaign in campaigns {
            let committed = self
                .store
                .sum_committed_quantity(
                    &campaign.id,
                    &[CommitmentStatus::Pending, CommitmentStatus::Completed],
                )
                .await?;
            let distance =
                customer_location.map(|loc| distance_km(loc, campaign.anchor_location));
            summaries.push(CampaignSummary {
                campaign,
                committed_quantity: committed,
                distance_km: distance,
            });
        }

        Ok(CampaignListResponse {
            campaigns: summaries,
            swept,
        })
    }

    async fn create_session(
        &self,
        product: &Product,
        customer_email: &str,
        quantity: i64,
        campaign_id: &str,
        success_url: &str,
    ) -> Result<CheckoutSession, CoreError> {
        self.payments
            .create_checkout_session(&CheckoutRequest {
                customer_email: customer_email.to_string(),
                unit_amount_cents: product.price_cents,
                quantity,
                currency: CURRENCY.to_string(),
                product_name: product.name.clone(),
                success_url: success_url.to_string(),
                cancel_url: self.cancel_url.clone(),
                campaign_id: campaign_id.to_string(),
            })
            .await
    }
}
