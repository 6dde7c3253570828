//! Durable load/save of [`PersistedState`] as a single JSON document.
//!
//! Writes go to a sibling temp file which is fsynced and renamed over the
//! target, so a crash mid-write leaves the previous document readable.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::error::{AppError, Result};
use crate::state::{PersistedState, RetentionLimits};

pub struct StateGateway {
    path: PathBuf,
    limits: RetentionLimits,
}

impl StateGateway {
    pub fn new(path: impl Into<PathBuf>, limits: RetentionLimits) -> Self {
        Self {
            path: path.into(),
            limits,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state, falling back to an empty state on a missing
    /// or unreadable document. Retention is applied on the way in so history
    /// that expired while the process was down is never used as a reference.
    pub fn load(&self, now: DateTime<Utc>) -> PersistedState {
        let mut state = match self.read() {
            Ok(Some(state)) => state,
            Ok(None) => {
                info!(path = %self.path.display(), "No state file yet, starting fresh");
                PersistedState::default()
            }
            Err(e) => {
                error!(path = %self.path.display(), "{e}. Starting with empty state");
                PersistedState::default()
            }
        };

        state.compact(now, &self.limits);
        info!(
            scan_count = state.scan_count,
            markets = state.price_history.market_count(),
            points = state.price_history.point_count(),
            cooldown_keys = state.cooldowns_gap.len()
                + state.cooldowns_move.len()
                + state.cooldowns_correlation.len(),
            "State loaded: scan #{} | tracking {} markets",
            state.scan_count,
            state.price_history.market_count(),
        );
        state
    }

    fn read(&self) -> Result<Option<PersistedState>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::StateCorrupt(format!("unreadable: {e}"))),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| AppError::StateCorrupt(e.to_string()))
    }

    /// Compact then atomically replace the document on disk.
    pub fn save(&self, state: &mut PersistedState, now: DateTime<Utc>) -> Result<()> {
        state.compact(now, &self.limits);
        let json = serde_json::to_vec(&*state)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        let cleanup_and_err = |e: std::io::Error| {
            if let Err(rm) = fs::remove_file(&temp_path) {
                warn!("could not remove {}: {rm}", temp_path.display());
            }
            AppError::Io(e)
        };

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&json).map_err(cleanup_and_err)?;
        file.sync_all().map_err(cleanup_and_err)?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(cleanup_and_err)?;
        Ok(())
    }
}
