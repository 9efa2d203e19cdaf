//! poly-snap: Market data snapshot recorder for Polymarket
//!
//! This library provides the core components for:
//! - Market catalog discovery via the Gamma API
//! - Normalization of loosely-typed API payloads
//! - Point-in-time snapshot construction with derived fields
//! - Append-only SQLite persistence
//! - Real-time market stream ingestion with automatic reconnection
//! - Periodic recording loop

pub mod cli;
pub mod clob;
pub mod config;
pub mod market;
pub mod recorder;
pub mod snapshot;
pub mod store;
pub mod stream;
pub mod telemetry;
