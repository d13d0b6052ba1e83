//! # marketsync-gateway
//!
//! Webhook ingestion and priority-tiered synchronization gateway for
//! e-commerce marketplaces.
//!
//! Inbound, every marketplace delivery is authenticated with an HMAC
//! signature over the exact bytes received, classified into a handler and
//! handed to a bounded dispatch queue before it is acknowledged. Outbound,
//! a scheduler runs per-marketplace sync tiers (high, medium, low) through
//! a job executor that respects minute, hour and day call ceilings. Every
//! webhook and every job ends up in the Outcome Log.
//!
//! ## Architecture
//!
//! ```text
//! Marketplaces (webhooks)          Operators (REST)
//!     │                                 │
//!     ├── WebhookGateway               ├── api/ handlers
//!     │     ├── signature_verifier     │
//!     │     ├── EventClassifier        ├── SyncScheduler
//!     │     └── QueueDispatcher        │     └── JobExecutor
//!     │                                 │           ├── RateLimiter
//!     │                                 │           └── MarketplaceSync
//!     │                                 │
//!     └──────────── OutcomeLog (memory or PostgreSQL) ───┘
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
