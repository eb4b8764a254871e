//! # Shorecast Backend
//!
//! Crowd-report ingestion and consensus engine for beach conditions.
//!
//! This crate turns a noisy stream of anonymous crowd reports into a single
//! trustworthy "current state" per beach. It accepts candidate reports through
//! a rate-limited ingestion gate, persists them in an append-only report
//! store, and aggregates the recent window into a per-location consensus
//! snapshot with a time-decayed weighted vote. The backend exposes a REST API
//! via Axum for web and mobile clients.
//!
//! ## Features
//!
//! - **Ingestion Gate**: field validation, attribution allow-listing,
//!   per-reporter cooldown and anonymous volume limiting
//! - **Consensus Engine**: pure, reproducible aggregation with exponential
//!   recency decay, per-axis weighted votes, and a confidence score
//! - **Report Store**: repository pattern with in-memory and Postgres
//!   backends, hosting the append-only report table and the atomic
//!   rate-limit counter primitive
//! - **HTTP API**: RESTful endpoints for submission, feeds, and snapshots
//!
//! ## Architecture
//!
//! The crate is organized into several logical modules:
//!
//! - [`models`]: Domain types (reports, consensus snapshots, level enums)
//! - [`db`]: Report store, repository pattern, and persistence layer
//! - [`services`]: Ingestion gate, rate limiting, consensus computation
//! - [`http`]: Axum-based HTTP server and request handlers
//! - [`config`]: Runtime configuration from environment or TOML file

pub mod config;

pub mod db;
pub mod models;

pub mod services;

#[cfg(feature = "http-server")]
pub mod http;
