//! Error type for the campaign integration layer.

use sidequest_core::QuestError;
use thiserror::Error;

/// Everything that can go wrong between the host and the engine.
#[derive(Error, Debug)]
pub enum CampaignError {
    /// An engine error.
    #[error(transparent)]
    Quest(#[from] QuestError),

    /// SQLite error from the snapshot store.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding of a save blob failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The snapshot store holds nothing for this campaign.
    #[error("No snapshot stored for campaign {0}")]
    NoSnapshot(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CampaignError>;
