//! Error types for the sidequest core library.
//!
//! Only programming defects and save-data problems surface as errors.
//! Eligibility mismatches are plain `false`, accept-time refusals are
//! [`crate::predicate::AcceptBlocked`] values, and event handlers never
//! return errors at all.

use thiserror::Error;

use crate::template::TemplateKind;
use crate::types::{ActorId, IssueId, QuestId};

/// Top-level error type for all sidequest operations.
#[derive(Error, Debug)]
pub enum QuestError {
    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A save record was written by a newer schema than this build understands.
    #[error("Unsupported schema version {found} (supported up to {supported})")]
    UnsupportedSchema {
        /// Version found in the record.
        found: u16,
        /// Highest version this build reads.
        supported: u16,
    },

    /// A required persisted field is absent.
    #[error("Missing field {key} ({name})")]
    MissingField {
        /// Stable field key.
        key: u16,
        /// Human-readable field name.
        name: &'static str,
    },

    /// A persisted field holds a value of the wrong shape.
    #[error("Field {key} has the wrong type (expected {expected})")]
    FieldType {
        /// Stable field key.
        key: u16,
        /// Expected value shape.
        expected: &'static str,
    },

    /// A template is referenced that is not registered with the catalog.
    #[error("Template not available: {0:?}")]
    TemplateUnavailable(TemplateKind),

    /// A lifecycle transition was requested from a state that does not allow it.
    #[error("Invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        /// "issue" or "quest".
        entity: &'static str,
        /// Current state.
        from: &'static str,
        /// Requested state.
        to: &'static str,
    },

    /// No issue with the given ID.
    #[error("Issue not found: {0}")]
    IssueNotFound(IssueId),

    /// No live or archived quest with the given ID.
    #[error("Quest not found: {0}")]
    QuestNotFound(QuestId),

    /// A scheduler tried to start an issue whose eligibility predicate fails.
    #[error("Candidate {candidate} is not eligible for {kind:?}")]
    NotEligible {
        /// The candidate actor.
        candidate: ActorId,
        /// The template that was requested.
        kind: TemplateKind,
    },

    /// A disabled dialog option was selected.
    #[error("Dialog option unavailable: {reason}")]
    OptionUnavailable {
        /// The reason shown to the player.
        reason: String,
    },

    /// The selected option does not exist in the open flow.
    #[error("Unknown dialog option: {0}")]
    UnknownOption(String),

    /// A dialog was requested with someone other than the quest giver.
    #[error("Actor {0} is not the quest giver")]
    WrongPartner(ActorId),

    /// Save data is internally inconsistent.
    #[error("Corrupt save data: {0}")]
    Corrupt(String),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, QuestError>;
