//! Episode and encounter lifecycle
//!
//! - [`manager`] - [`EpisodeLifecycleManager`] and its request/response types
//! - [`period`] - Clock abstraction and the period arithmetic for opening
//!   and closing resources

pub mod manager;
pub mod period;

pub use manager::{
    EndedEpisode, EpisodeLifecycleManager, StartEpisodeRequest, StartedEpisode,
    UpgradeEpisodeRequest,
};
pub use period::{Clock, FixedClock, SystemClock, CLOSE_OFFSET_HOURS};
