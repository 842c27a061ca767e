mod config;
pub mod database;
pub mod store;

pub use config::{Config, DisplayConfig, SessionConfig};
pub use database::Database;
pub use store::ScheduleStore;

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schedule::DaySchedule;

/// The full persisted state: one [`DaySchedule`] per date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    #[serde(default)]
    pub schedule: BTreeMap<NaiveDate, DaySchedule>,
}

/// Storage collaborator for [`ScheduleStore`].
///
/// `load` is called once when the store opens, `save` after every committed
/// mutation.
pub trait Persistence {
    fn load(&self) -> Result<Option<ScheduleState>>;
    fn save(&mut self, state: &ScheduleState) -> Result<()>;
}

/// Keeps the state in memory. Used by tests and embedders that persist
/// elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    stored: Option<ScheduleState>,
    saves: usize,
    fail_saves: bool,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: ScheduleState) -> Self {
        Self {
            stored: Some(state),
            ..Self::default()
        }
    }

    /// Number of successful saves.
    pub fn saves(&self) -> usize {
        self.saves
    }

    pub fn stored(&self) -> Option<&ScheduleState> {
        self.stored.as_ref()
    }

    /// Make every following save fail with an IO error.
    pub fn set_fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }
}

impl Persistence for MemoryPersistence {
    fn load(&self) -> Result<Option<ScheduleState>> {
        Ok(self.stored.clone())
    }

    fn save(&mut self, state: &ScheduleState) -> Result<()> {
        if self.fail_saves {
            return Err(std::io::Error::other("save rejected").into());
        }
        self.stored = Some(state.clone());
        self.saves += 1;
        Ok(())
    }
}

/// Returns the data directory, creating it if needed.
///
/// `POMOTODO_DATA_DIR` wins when set. Otherwise `~/.config/pomotodo`, or
/// `~/.config/pomotodo-dev` when `POMOTODO_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("POMOTODO_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("POMOTODO_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pomotodo-dev")
            } else {
                base_dir.join("pomotodo")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
