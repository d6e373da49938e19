//! SQLite storage layer for Bulkify.
//!
//! The `Store` is the sole persistence boundary for campaigns and
//! commitments. Every status change goes through a status-guarded
//! conditional update (`UPDATE ... WHERE status IN (...)`), and commitment
//! insertion is capacity-guarded in a single atomic statement, so the
//! capacity invariant holds even under concurrent joins without any
//! in-process locking.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use uuid::Uuid;

use crate::geo::Coordinate;
use crate::model::{
    CAMPAIGN_WINDOW_DAYS, Campaign, CampaignStatus, Commitment, CommitmentStatus, Product,
};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

/// Parameters for admitting a new commitment to a campaign.
#[derive(Debug, Clone, Copy)]
pub struct NewCommitment<'a> {
    pub campaign_id: &'a str,
    pub customer_id: &'a str,
    pub customer_email: &'a str,
    pub product_id: &'a str,
    pub quantity: i64,
    /// The owning campaign's immutable target, re-checked atomically.
    pub target_quantity: i64,
    pub payment_method: &'a str,
}

/// Render a status slice as a SQL `IN` list. Inputs come from the status
/// enums only, never from user data.
fn campaign_status_list(statuses: &[CampaignStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn commitment_status_list(statuses: &[CommitmentStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn decode_error(msg: String) -> sqlx::Error {
    sqlx::Error::Decode(msg.into())
}

fn campaign_from_row(row: &SqliteRow) -> Result<Campaign, sqlx::Error> {
    let status_str: String = row.get("status");
    let status = CampaignStatus::parse(&status_str)
        .ok_or_else(|| decode_error(format!("unknown campaign status '{status_str}'")))?;
    let start_ts: i64 = row.get("start_date");
    let end_ts: i64 = row.get("end_date");

    Ok(Campaign {
        id: row.get("id"),
        product_id: row.get("product_id"),
        anchor_location: [row.get("anchor_lon"), row.get("anchor_lat")],
        target_quantity: row.get("target_quantity"),
        start_date: Utc
            .timestamp_opt(start_ts, 0)
            .single()
            .ok_or_else(|| decode_error(format!("bad start_date {start_ts}")))?,
        end_date: Utc
            .timestamp_opt(end_ts, 0)
            .single()
            .ok_or_else(|| decode_error(format!("bad end_date {end_ts}")))?,
        status,
    })
}

fn commitment_from_row(row: &SqliteRow) -> Result<Commitment, sqlx::Error> {
    let status_str: String = row.get("status");
    let status = CommitmentStatus::parse(&status_str)
        .ok_or_else(|| decode_error(format!("unknown commitment status '{status_str}'")))?;
    let created_ts: i64 = row.get("created_at");
    let cancelled_ts: Option<i64> = row.get("cancelled_at");

    Ok(Commitment {
        id: row.get("id"),
        campaign_id: row.get("campaign_id"),
        customer_id: row.get("customer_id"),
        customer_email: row.get("customer_email"),
        product_id: row.get("product_id"),
        quantity: row.get("quantity"),
        status,
        payment_method: row.get("payment_method"),
        payment_ref: row.get("payment_ref"),
        cancellation_reason: row.get("cancellation_reason"),
        cancelled_at: cancelled_ts.and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
        created_at: Utc
            .timestamp_opt(created_ts, 0)
            .single()
            .ok_or_else(|| decode_error(format!("bad created_at {created_ts}")))?,
    })
}

impl Store {
    /// Create a new store and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:bulkify.db" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;

        Ok(store)
    }

    async fn initialize_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                price_cents INTEGER NOT NULL,
                bulk_threshold INTEGER NOT NULL,
                supplier_id TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS campaigns (
                id TEXT PRIMARY KEY,
                product_id TEXT NOT NULL,
                anchor_lon REAL NOT NULL,
                anchor_lat REAL NOT NULL,
                target_quantity INTEGER NOT NULL,
                start_date INTEGER NOT NULL,
                end_date INTEGER NOT NULL,
                status TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS commitments (
                id TEXT PRIMARY KEY,
                campaign_id TEXT NOT NULL,
                customer_id TEXT NOT NULL,
                customer_email TEXT NOT NULL,
                product_id TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                status TEXT NOT NULL,
                payment_method TEXT NOT NULL,
                payment_ref TEXT,
                cancellation_reason TEXT,
                cancelled_at INTEGER,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Indexes for the hot paths: active-campaign lookup per product,
        // expiry scans, and per-campaign commitment aggregation
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_campaigns_product_status
            ON campaigns(product_id, status)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_campaigns_end_date
            ON campaigns(end_date, status)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_commitments_campaign_status
            ON commitments(campaign_id, status)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Product catalog (read-only from the engine's perspective)
    // ------------------------------------------------------------------

    /// Insert a product. The catalog proper lives outside the core; this
    /// exists so the service can be seeded and tested end to end.
    pub async fn insert_product(&self, product: &Product) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, bulk_threshold, supplier_id)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.bulk_threshold)
        .bind(&product.supplier_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_product(&self, product_id: &str) -> Result<Option<Product>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, name, price_cents, bulk_threshold, supplier_id
            FROM products WHERE id = ?
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Product {
            id: r.get("id"),
            name: r.get("name"),
            price_cents: r.get("price_cents"),
            bulk_threshold: r.get("bulk_threshold"),
            supplier_id: r.get("supplier_id"),
        }))
    }

    // ------------------------------------------------------------------
    // Campaigns
    // ------------------------------------------------------------------

    /// Create a campaign in `WaitingPayment` with a fixed 14-day window.
    pub async fn create_campaign(
        &self,
        product_id: &str,
        anchor_location: Coordinate,
        target_quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<Campaign, sqlx::Error> {
        let campaign = Campaign {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            anchor_location,
            target_quantity,
            start_date: now,
            end_date: now + chrono::Duration::days(CAMPAIGN_WINDOW_DAYS),
            status: CampaignStatus::WaitingPayment,
        };

        sqlx::query(
            r#"
            INSERT INTO campaigns
                (id, product_id, anchor_lon, anchor_lat, target_quantity, start_date, end_date, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&campaign.id)
        .bind(&campaign.product_id)
        .bind(campaign.anchor_location[0])
        .bind(campaign.anchor_location[1])
        .bind(campaign.target_quantity)
        .bind(campaign.start_date.timestamp())
        .bind(campaign.end_date.timestamp())
        .bind(campaign.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(campaign)
    }

    pub async fn get_campaign(&self, campaign_id: &str) -> Result<Option<Campaign>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM campaigns WHERE id = ?")
            .bind(campaign_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| campaign_from_row(&r)).transpose()
    }

    /// Campaigns for a product with status in {WaitingPayment, Started}.
    pub async fn find_active_campaigns_for_product(
        &self,
        product_id: &str,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        let sql = format!(
            "SELECT * FROM campaigns WHERE product_id = ? AND status IN ({})",
            campaign_status_list(&[CampaignStatus::WaitingPayment, CampaignStatus::Started])
        );

        let rows = sqlx::query(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(campaign_from_row).collect()
    }

    /// Campaigns whose window elapsed while still live.
    pub async fn find_expired_open_campaigns(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        let sql = format!(
            "SELECT * FROM campaigns WHERE end_date < ? AND status IN ({})",
            campaign_status_list(&[CampaignStatus::WaitingPayment, CampaignStatus::Started])
        );

        let rows = sqlx::query(&sql)
            .bind(now.timestamp())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(campaign_from_row).collect()
    }

    /// Compare-and-set a campaign's status. Returns `true` when this call
    /// performed the transition, `false` when the row was not in any of the
    /// `from` statuses (someone else already transitioned it).
    pub async fn transition_campaign(
        &self,
        campaign_id: &str,
        from: &[CampaignStatus],
        to: CampaignStatus,
    ) -> Result<bool, sqlx::Error> {
        let sql = format!(
            "UPDATE campaigns SET status = ? WHERE id = ? AND status IN ({})",
            campaign_status_list(from)
        );

        let result = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(campaign_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    // ------------------------------------------------------------------
    // Commitments
    // ------------------------------------------------------------------

    /// Create a commitment in `WaitingPayment`, reserving its quantity
    /// against the campaign target in one atomic statement.
    ///
    /// Reserved capacity counts `Pending` and `WaitingPayment` commitments:
    /// an unpaid pledge holds its slot until it is confirmed, cancelled, or
    /// released by the payment-timeout sweep. Returns `None` when admitting
    /// this quantity would exceed `target_quantity`.
    pub async fn create_commitment_reserving(
        &self,
        new: &NewCommitment<'_>,
        now: DateTime<Utc>,
    ) -> Result<Option<Commitment>, sqlx::Error> {
        let id = Uuid::new_v4().to_string();
        let sql = format!(
            r#"
            INSERT INTO commitments
                (id, campaign_id, customer_id, customer_email, product_id,
                 quantity, status, payment_method, created_at)
            SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?
            WHERE (
                SELECT COALESCE(SUM(quantity), 0) FROM commitments
                WHERE campaign_id = ? AND status IN ({})
            ) + ? <= ?
            "#,
            commitment_status_list(&[CommitmentStatus::Pending, CommitmentStatus::WaitingPayment])
        );

        let result = sqlx::query(&sql)
            .bind(&id)
            .bind(new.campaign_id)
            .bind(new.customer_id)
            .bind(new.customer_email)
            .bind(new.product_id)
            .bind(new.quantity)
            .bind(CommitmentStatus::WaitingPayment.as_str())
            .bind(new.payment_method)
            .bind(now.timestamp())
            .bind(new.campaign_id)
            .bind(new.quantity)
            .bind(new.target_quantity)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(Commitment {
            id,
            campaign_id: new.campaign_id.to_string(),
            customer_id: new.customer_id.to_string(),
            customer_email: new.customer_email.to_string(),
            product_id: new.product_id.to_string(),
            quantity: new.quantity,
            status: CommitmentStatus::WaitingPayment,
            payment_method: new.payment_method.to_string(),
            payment_ref: None,
            cancellation_reason: None,
            cancelled_at: None,
            created_at: now,
        }))
    }

    pub async fn get_commitment(
        &self,
        commitment_id: &str,
    ) -> Result<Option<Commitment>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM commitments WHERE id = ?")
            .bind(commitment_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| commitment_from_row(&r)).transpose()
    }

    pub async fn commitments_for_campaign(
        &self,
        campaign_id: &str,
    ) -> Result<Vec<Commitment>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM commitments WHERE campaign_id = ?")
            .bind(campaign_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(commitment_from_row).collect()
    }

    /// The initiating commitment of a campaign (oldest row for the customer).
    pub async fn find_commitment_for_customer(
        &self,
        campaign_id: &str,
        customer_id: &str,
    ) -> Result<Option<Commitment>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM commitments
            WHERE campaign_id = ? AND customer_id = ?
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(campaign_id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| commitment_from_row(&r)).transpose()
    }

    /// Record the payment session reference on a commitment.
    pub async fn set_commitment_payment_ref(
        &self,
        commitment_id: &str,
        payment_ref: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE commitments SET payment_ref = ? WHERE id = ?")
            .bind(payment_ref)
            .bind(commitment_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Sum of `quantity` over commitments of a campaign matching `statuses`.
    /// Always computed fresh; never cached in process memory.
    pub async fn sum_committed_quantity(
        &self,
        campaign_id: &str,
        statuses: &[CommitmentStatus],
    ) -> Result<i64, sqlx::Error> {
        let sql = format!(
            "SELECT COALESCE(SUM(quantity), 0) AS total FROM commitments
             WHERE campaign_id = ? AND status IN ({})",
            commitment_status_list(statuses)
        );

        let row = sqlx::query(&sql)
            .bind(campaign_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("total"))
    }

    /// Number of commitments still live (`Pending` or `WaitingPayment`) for
    /// a campaign.
    pub async fn count_live_commitments(&self, campaign_id: &str) -> Result<i64, sqlx::Error> {
        let sql = format!(
            "SELECT COUNT(*) AS n FROM commitments WHERE campaign_id = ? AND status IN ({})",
            commitment_status_list(&[CommitmentStatus::Pending, CommitmentStatus::WaitingPayment])
        );

        let row = sqlx::query(&sql)
            .bind(campaign_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("n"))
    }

    /// Compare-and-set a single commitment's status.
    pub async fn transition_commitment(
        &self,
        commitment_id: &str,
        from: &[CommitmentStatus],
        to: CommitmentStatus,
    ) -> Result<bool, sqlx::Error> {
        let sql = format!(
            "UPDATE commitments SET status = ? WHERE id = ? AND status IN ({})",
            commitment_status_list(from)
        );

        let result = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(commitment_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Transition every commitment of a campaign currently in one of the
    /// `from` statuses. Returns how many rows moved.
    pub async fn transition_commitments_of_campaign(
        &self,
        campaign_id: &str,
        from: &[CommitmentStatus],
        to: CommitmentStatus,
    ) -> Result<u64, sqlx::Error> {
        let sql = format!(
            "UPDATE commitments SET status = ? WHERE campaign_id = ? AND status IN ({})",
            commitment_status_list(from)
        );

        let result = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(campaign_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Cancel a commitment with reason and timestamp, guarded on its current
    /// status being non-terminal.
    pub async fn cancel_commitment_row(
        &self,
        commitment_id: &str,
        from: &[CommitmentStatus],
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let sql = format!(
            "UPDATE commitments
             SET status = ?, cancellation_reason = ?, cancelled_at = ?
             WHERE id = ? AND status IN ({})",
            commitment_status_list(from)
        );

        let result = sqlx::query(&sql)
            .bind(CommitmentStatus::Cancelled.as_str())
            .bind(reason)
            .bind(now.timestamp())
            .bind(commitment_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Commitments still `WaitingPayment` created before `cutoff`, whose
    /// reserved capacity should be released.
    pub async fn find_stale_waiting_commitments(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Commitment>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM commitments WHERE status = ? AND created_at < ?",
        )
        .bind(CommitmentStatus::WaitingPayment.as_str())
        .bind(cutoff.timestamp())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(commitment_from_row).collect()
    }
}
