//! # Sidequest Core Library
//!
//! Host-agnostic lifecycle engine for optional side-objectives in a
//! persistent, event-driven campaign world.
//!
//! An actor in the host world (the *candidate*) may pose an [`Issue`] when
//! world-state predicates hold. Once the player takes it, the issue spawns a
//! [`Quest`] that is driven by world events rather than polling:
//!
//! - **Predicates** — pure checks against host state (relations, war, roles, inventory)
//! - **Event bus** — instance-scoped subscriptions that die with their quest
//! - **Issue lifecycle** — Dormant → Potential → Active → {Resolved, Expired, Abandoned}
//! - **Quest lifecycle** — Offered → Accepted → {Succeeded, Failed, Cancelled}
//! - **Progress** — authoritative recomputation from inventory, never deltas
//! - **Dialog gate** — player choices gated on progress, deferred completion
//! - **Persistence** — integer-keyed, versioned records that re-attach on load
//!
//! The host is reached only through [`world::WorldQuery`] (reads) and
//! [`world::WorldActions`] (mutations). Nothing here blocks, spawns or
//! holds a lock across a host call.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod board;
pub mod bus;
pub mod config;
pub mod dialog;
pub mod error;
pub mod events;
pub mod issue;
pub mod metrics;
pub mod persistence;
pub mod predicate;
pub mod progress;
pub mod quest;
pub mod template;
pub mod types;
pub mod world;

pub use board::IssueBoard;
pub use config::SidequestConfig;
pub use error::QuestError;
pub use issue::{Issue, IssueState};
pub use quest::{Quest, QuestState};
pub use types::*;
