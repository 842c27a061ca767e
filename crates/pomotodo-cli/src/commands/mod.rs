pub mod config;
pub mod period;
pub mod session;
pub mod stats;
pub mod timer;
pub mod todo;

use pomotodo_core::{CoreError, Database, EventBus, ScheduleStore};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Open the schedule store backed by the on-disk database.
pub fn open_store() -> Result<ScheduleStore<Database>, CoreError> {
    ScheduleStore::open(Database::open()?, EventBus::new())
}
