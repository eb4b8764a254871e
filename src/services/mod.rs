//! Service layer for business logic and orchestration.
//!
//! Services sit between the HTTP layer and the report store. The consensus
//! engine is pure computation; the ingestion gate orchestrates validation,
//! rate limiting, and persistence; feeds and retention are thin repository
//! wrappers.

pub mod consensus;

pub mod feed;

pub mod ingestion;

pub mod rate_limit;

pub mod retention;

pub mod validation;


#[cfg(test)]
#[path = "ingestion_tests.rs"]
mod ingestion_tests;



pub use consensus::{compute_snapshot, compute_snapshots, decay_weight, ConsensusParams};
pub use ingestion::{ClientContext, GateError, IngestionGate};
pub use rate_limit::{InMemoryRateLimiter, RateDecision, RateLimiter, StoreRateLimiter};
pub use validation::{ReportSubmission, ValidationError};
