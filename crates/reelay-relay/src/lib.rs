//! The relay pipeline: per-post delivery, per-profile sync, and the periodic
//! scheduler that drives both.

pub mod error;
pub mod markers;
pub mod relay;
pub mod scheduler;
pub mod sync;

pub use error::{RelayError, SyncError};
pub use relay::{PostOutcome, PostRelay, RelayObserver, RelaySettings};
pub use scheduler::{Scheduler, TickSummary};
pub use sync::{sync_profile, ProfileSync, SyncReport, SyncStatus};
