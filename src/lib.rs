//! # Ticketwarden
//!
//! **License validation and feature gating for a self-hosted ticket bot.**
//!
//! Ticketwarden checks the bot's license against a license server with a
//! signed JSON request, keeps the last good answer in a local cache, and
//! answers "is this feature allowed?" and "what is the limit?" for every
//! gated command.
//!
//! ## Features
//!
//! - **Signed requests** - SHA-256 over the sorted payload and the license key
//! - **Last-known-good cache** - file, SQLite or in-memory, keyed by key hash
//! - **Soft degrade** - a failed revalidation keeps a valid license while the
//!   cache is still fresh
//! - **Atomic entitlement** - readers never see a half-applied validation
//! - **Never-failing gates** - invalid licenses fall back to default limits
//!
//! ## Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//! use ticketwarden::{spawn_revalidation, LicenseConfig, LicenseManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ticketwarden::TicketwardenError> {
//!     let config = LicenseConfig::from_file("config.json".as_ref())?.with_env_overrides();
//!     let manager = Arc::new(LicenseManager::new(config)?);
//!
//!     manager.initialize().await;
//!     let loop_handle = spawn_revalidation(Arc::clone(&manager));
//!
//!     if manager.check_feature_access("api_access") {
//!         println!("API enabled, {} tickets/month", manager.get_feature_limit("max_tickets"));
//!     }
//!
//!     loop_handle.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Threat Model
//!
//! The request signature uses the license key itself as the secret, so it
//! proves nothing to anyone who already holds the key. Responses are not
//! signed. Treat this as tamper-evidence for honest deployments, not as
//! protection against a hostile operator.

#![warn(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Crypto layer
pub mod crypto;

// Protocol layer
pub mod protocol;

// Client layer
pub mod client;

// Cache layer
pub mod cache;

// State and policy
pub mod policy;
pub mod state;

// Metering layer
pub mod meter;

// Manager (main public API)
pub mod manager;
pub mod notify;
pub mod report;
pub mod revalidate;

// Re-exports for public API
pub use cache::{CacheRecord, CacheStore};
pub use client::http::ValidationClient;
pub use client::Validator;
pub use clock::{Clock, SystemClock};
pub use config::LicenseConfig;
pub use errors::TicketwardenError;
pub use manager::{LicenseManager, TickOutcome};
pub use notify::{LicenseIssue, LicenseNotifier, LogNotifier};
pub use policy::access::UsageCaps;
pub use protocol::models::{FeatureValue, ValidationResponse};
pub use revalidate::{spawn_revalidation, RevalidationHandle};
pub use state::{Entitlement, LicenseStatus};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
