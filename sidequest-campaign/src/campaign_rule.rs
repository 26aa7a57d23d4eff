//! Campaign rule — binds host campaign callbacks to the issue board.
//!
//! The host owns the callbacks (issue scheduler, daily tick, map events,
//! save/load) and forwards each to the matching `on_*` method here. The
//! rule keeps the [`IssueBoard`], the native id registry and the clocks
//! for the slower periodic passes.

use serde::{Deserialize, Serialize};
use sidequest_core::board::{DispatchReport, IssueBoard, Settlement, TakeOutcome};
use sidequest_core::events::WorldEvent;
use sidequest_core::issue::PotentialIssue;
use sidequest_core::persistence::{BoardSnapshot, SCHEMA_VERSION};
use sidequest_core::template::TemplateKind;
use sidequest_core::types::{CampaignTime, IssueId};
use sidequest_core::world::{Host, WorldQuery};
use tracing::{debug, info};

use crate::bridge::HostIds;
use crate::config::CampaignConfig;
use crate::error::{CampaignError, Result};
use crate::store::{SnapshotMeta, SnapshotStore, StoredSnapshot};

// ---------------------------------------------------------------------------
// Save envelope
// ---------------------------------------------------------------------------

/// Everything the rule writes into a save slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CampaignSave {
    ids: HostIds,
    board: BoardSnapshot,
    last_reevaluation: CampaignTime,
    last_autosave: CampaignTime,
}

/// What one clock tick produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Terminal transitions from `advance` and, if it ran, `reevaluate`.
    pub settled: Settlement,
    /// Whether the re-evaluation pass ran this tick.
    pub reevaluated: bool,
    /// Whether the host should write the autosave slot now.
    pub autosave_due: bool,
}

// ---------------------------------------------------------------------------
// Rule state
// ---------------------------------------------------------------------------

/// Campaign-side driver of the engine.
#[derive(Debug)]
pub struct CampaignRule {
    board: IssueBoard,
    ids: HostIds,
    config: CampaignConfig,
    last_reevaluation: CampaignTime,
    last_autosave: CampaignTime,
}

impl CampaignRule {
    /// A fresh campaign.
    ///
    /// # Errors
    /// Returns a config error if `config` does not validate.
    pub fn new(config: CampaignConfig) -> Result<Self> {
        config.validate()?;
        let board = IssueBoard::new(&config.core)?;
        Ok(Self {
            board,
            ids: HostIds::new(),
            config,
            last_reevaluation: CampaignTime::ZERO,
            last_autosave: CampaignTime::ZERO,
        })
    }

    /// The issue board.
    #[must_use]
    pub fn board(&self) -> &IssueBoard {
        &self.board
    }

    /// The issue board, for conversation sessions.
    pub fn board_mut(&mut self) -> &mut IssueBoard {
        &mut self.board
    }

    /// Native id registry.
    #[must_use]
    pub fn ids(&self) -> &HostIds {
        &self.ids
    }

    /// Native id registry, for hook constructors and host adapters.
    pub fn ids_mut(&mut self) -> &mut HostIds {
        &mut self.ids
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &CampaignConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Issue scheduler
    // ------------------------------------------------------------------

    /// The host's scheduler asks which issues `hero` could carry.
    pub fn on_check_for_issue<W: WorldQuery + ?Sized>(
        &mut self,
        world: &W,
        hero: u64,
    ) -> Vec<PotentialIssue> {
        let candidate = self.ids.actor(hero);
        self.board.potential_issues(world, candidate)
    }

    /// The scheduler picked `kind` for `hero`.
    ///
    /// # Errors
    /// `NotEligible` if the candidate no longer qualifies, or
    /// `TemplateUnavailable` for a disabled template.
    pub fn on_issue_selected<W: WorldQuery + ?Sized>(
        &mut self,
        world: &W,
        hero: u64,
        kind: TemplateKind,
        now: CampaignTime,
    ) -> Result<IssueId> {
        let candidate = self.ids.actor(hero);
        Ok(self.board.offer(world, candidate, kind, now)?)
    }

    /// The player asked to take an issue from its owner.
    ///
    /// # Errors
    /// `IssueNotFound`, `InvalidTransition` or `NotEligible`.
    pub fn on_player_takes_issue<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        issue: IssueId,
        now: CampaignTime,
    ) -> Result<TakeOutcome> {
        Ok(self.board.take(host, issue, now)?)
    }

    // ------------------------------------------------------------------
    // Events & time
    // ------------------------------------------------------------------

    /// Forward a translated host event.
    pub fn on_event<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        event: &WorldEvent,
        now: CampaignTime,
    ) -> DispatchReport {
        self.board.dispatch(host, event, now)
    }

    /// A battle or siege finished without a raid result; its native id
    /// may be reused by the host.
    pub fn on_map_event_ended(&mut self, event: u64) {
        if let Some(id) = self.ids.end_map_event(event) {
            debug!(native = event, map_event = %id, "Map event ended");
        }
    }

    /// The campaign clock moved to `now`.
    ///
    /// Runs `advance` every call, `reevaluate` once per
    /// `reevaluate_interval_ticks`, and flags the autosave when its
    /// interval has passed.
    pub fn on_tick<H: Host + ?Sized>(&mut self, host: &mut H, now: CampaignTime) -> TickOutcome {
        let settings = &self.config.campaign;
        let mut outcome = TickOutcome {
            settled: self.board.advance(host, now),
            ..TickOutcome::default()
        };

        if now.0.saturating_sub(self.last_reevaluation.0) >= settings.reevaluate_interval_ticks {
            outcome.settled.merge(self.board.reevaluate(host, now));
            outcome.reevaluated = true;
            self.last_reevaluation = now;
        }

        let autosave = settings.autosave_interval_ticks;
        if autosave > 0 && now.0.saturating_sub(self.last_autosave.0) >= autosave {
            outcome.autosave_due = true;
            self.last_autosave = now;
        }

        if !outcome.settled.is_empty() {
            debug!(
                now = %now,
                succeeded = outcome.settled.succeeded.len(),
                failed = outcome.settled.failed.len(),
                cancelled = outcome.settled.cancelled.len(),
                "Tick settled quests"
            );
        }
        outcome
    }

    // ------------------------------------------------------------------
    // Save / load
    // ------------------------------------------------------------------

    /// Encode the whole campaign state as MessagePack.
    ///
    /// # Errors
    /// Returns `CampaignError::Serialization` on encoder failure.
    pub fn save_bytes(&self) -> Result<Vec<u8>> {
        let save = CampaignSave {
            ids: self.ids.clone(),
            board: self.board.snapshot(),
            last_reevaluation: self.last_reevaluation,
            last_autosave: self.last_autosave,
        };
        rmp_serde::to_vec_named(&save).map_err(|e| CampaignError::Serialization(e.to_string()))
    }

    /// Rebuild a campaign from [`Self::save_bytes`] output.
    ///
    /// # Errors
    /// `Serialization` for undecodable bytes, and the board's restore
    /// errors (`UnsupportedSchema`, `TemplateUnavailable`, `Corrupt`).
    pub fn load(config: CampaignConfig, bytes: &[u8]) -> Result<Self> {
        config.validate()?;
        let save: CampaignSave =
            rmp_serde::from_slice(bytes).map_err(|e| CampaignError::Serialization(e.to_string()))?;
        let board = IssueBoard::restore(&config.core, &save.board)?;
        info!(
            ids = save.ids.count(),
            saved_at = %save.board.saved_at,
            "Campaign loaded"
        );
        Ok(Self {
            board,
            ids: save.ids,
            config,
            last_reevaluation: save.last_reevaluation,
            last_autosave: save.last_autosave,
        })
    }

    /// Append a snapshot taken at `now` under `campaign.campaign_id`.
    /// Returns its sequence number.
    ///
    /// # Errors
    /// Encoding or database errors.
    pub fn save_to(&self, store: &SnapshotStore, now: CampaignTime) -> Result<u64> {
        let bytes = self.save_bytes()?;
        let meta = SnapshotMeta {
            game_time: now,
            schema: SCHEMA_VERSION,
            live_quests: self.board.live_quests().count(),
        };
        let campaign = &self.config.campaign.campaign_id;
        let seq = store.save(campaign, meta, &bytes)?;
        info!(campaign = %campaign, seq, bytes = bytes.len(), "Campaign saved");
        Ok(seq)
    }

    /// Resume from the newest snapshot of `campaign.campaign_id`.
    ///
    /// # Errors
    /// `NoSnapshot` if nothing was stored, otherwise as [`Self::load`].
    pub fn load_from(config: CampaignConfig, store: &SnapshotStore) -> Result<Self> {
        let stored = store.latest(&config.campaign.campaign_id)?;
        Self::load_stored(config, stored, None)
    }

    /// Resume from snapshot `seq` of `campaign.campaign_id`.
    ///
    /// # Errors
    /// `NoSnapshot` if `seq` was pruned or never written, otherwise as
    /// [`Self::load`].
    pub fn load_version(config: CampaignConfig, store: &SnapshotStore, seq: u64) -> Result<Self> {
        let stored = store.get(&config.campaign.campaign_id, seq)?;
        Self::load_stored(config, stored, Some(seq))
    }

    fn load_stored(
        config: CampaignConfig,
        stored: Option<StoredSnapshot>,
        seq: Option<u64>,
    ) -> Result<Self> {
        let Some(stored) = stored else {
            let campaign = &config.campaign.campaign_id;
            return Err(CampaignError::NoSnapshot(match seq {
                Some(seq) => format!("{campaign} #{seq}"),
                None => campaign.clone(),
            }));
        };
        debug!(
            seq = stored.info.seq,
            game_time = %stored.info.meta.game_time,
            "Loading stored snapshot"
        );
        Self::load(config, &stored.data)
    }
}
