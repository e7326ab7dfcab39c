//! fieldsync - Offline Capture & Sync Engine
//!
//! fieldsync keeps building condition assessments working without a network.
//! Field captures (assessments, deficiencies, photos and voice notes) are
//! written to a durable local queue first and drained to the remote API
//! whenever connectivity allows.
//!
//! # Module Structure
//!
//! - **`shared`** - Types used by every layer
//!   - Queued record model, status lifecycle and storage statistics
//!   - Sync events, error types, configuration
//!
//! - **`local_db`** - Durable key-object store
//!   - SQLite implementation (sqlx) with schema migrations
//!   - In-memory implementation for ephemeral sessions and tests
//!
//! - **`offline`** - Capture entry points
//!   - Photo compression and geolocation
//!   - Assessment and deficiency capture
//!   - Voice note queue with upload and transcription
//!
//! - **`sync`** - Drain passes
//!   - Single-flight engine with a circuit breaker and cooperative stop
//!   - Typed event broadcast, connectivity monitor, run state and metrics
//!
//! - **`remote`** - Remote API trait and its HTTP client
//!
//! - **`notify`** - Toasts, system notifications and location
//!
//! - **`app`** - Coordinator owning one of each, with startup recovery and
//!   a shutdown hook
//!
//! # Usage
//!
//! ```rust,no_run
//! use fieldsync::app::SyncApp;
//! use fieldsync::shared::{AppConfig, AssessmentPayload};
//!
//! # async fn example() -> fieldsync::shared::Result<()> {
//! let mut app = SyncApp::open(AppConfig::load(None)?).await?;
//! app.start_background();
//!
//! let local_id = app
//!     .capture()
//!     .save_assessment(AssessmentPayload {
//!         asset_id: "bldg-12".to_string(),
//!         component_code: "B3010".to_string(),
//!         condition_rating: 3,
//!         observations: "Ponding near drains".to_string(),
//!         estimated_repair_cost: None,
//!         remaining_useful_life_years: Some(6),
//!         assessor: None,
//!     })
//!     .await?;
//! println!("queued {}", local_id);
//!
//! app.sync_now().await?;
//! app.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Every fallible operation returns [`shared::Result`] with a
//! [`shared::SyncError`]. Capture entry points propagate storage errors;
//! drain passes contain per-item errors and record them on the item.

/// Shared types and data structures
pub mod shared;

/// Local durable store
pub mod local_db;

/// Offline capture queues
pub mod offline;

/// Sync engine
pub mod sync;

/// Remote API client
pub mod remote;

/// User-facing notifications
pub mod notify;

/// Application coordinator
pub mod app;
