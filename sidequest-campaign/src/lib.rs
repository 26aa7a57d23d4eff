//! # sidequest-campaign — Campaign Host Integration
//!
//! Glue between a campaign-style host (heroes, kingdoms, settlements,
//! map events, a daily clock) and the host-agnostic `sidequest-core`
//! engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               Campaign host                  │
//! │  callbacks ──► hooks ──► WorldEvent          │
//! │      │                       │               │
//! │      ▼                       ▼               │
//! │  ┌─────────────── CampaignRule ───────────┐  │
//! │  │  HostIds      IssueBoard (core)        │  │
//! │  └───────┬────────────────────────────────┘  │
//! │          │ save_bytes / load                 │
//! │          ▼                                   │
//! │      SnapshotStore (SQLite, per campaign)    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `bridge` — native id ↔ engine id registry
//! - `hooks` — host callback arguments to engine events
//! - `campaign_rule` — scheduler, event, tick and save bindings
//! - `dialogue` — conversation sessions with token rendering
//! - `config` — campaign config and tracing bootstrap
//! - `store` — SQLite snapshots keyed per campaign

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod campaign_rule;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod hooks;
pub mod store;

pub use bridge::HostIds;
pub use campaign_rule::{CampaignRule, TickOutcome};
pub use config::{CampaignConfig, init_tracing};
pub use dialogue::{ConversationSession, LineContext, LineOverrides};
pub use error::CampaignError;
pub use store::{SnapshotInfo, SnapshotMeta, SnapshotStore};
