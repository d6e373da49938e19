//! Bulkify - a group-buying marketplace backend.
//!
//! # Overview
//!
//! Suppliers list products; customers start or join ("vote on") time-boxed
//! bulk-purchase **campaigns** anchored at a geographic point. A campaign
//! completes once enough paid quantity is committed within a 2 km radius of
//! its anchor; campaigns that miss their 14-day window are aged out lazily
//! by the expiry sweeper.
//!
//! Payments are two-phase: admission creates a `WaitingPayment` commitment
//! and a hosted checkout session, and the provider's success callback
//! promotes it. All state transitions are status-guarded compare-and-sets
//! in SQLite, so capacity and terminal-state invariants hold under
//! concurrent requests without in-process locking.
//!
//! # Modules
//!
//! - [`geo`]: haversine distance and the 2 km exclusion radius
//! - [`model`]: campaigns, commitments, and their status machines
//! - [`error`]: the `CoreError` taxonomy
//! - [`storage`]: SQLite campaign store
//! - [`engine`]: campaign lifecycle engine
//! - [`sweeper`]: lazy expiry and payment-timeout sweeps
//! - [`adapters`]: payment gateway and mail notification collaborators
//! - [`api`]: HTTP API handlers

pub mod adapters;
pub mod api;
pub mod engine;
pub mod error;
pub mod geo;
pub mod model;
pub mod storage;
pub mod sweeper;
