// [apps/coordinator/src/daemons/mod.rs]
pub mod dispatch;
pub mod stale_sweep;
pub mod timeout_reaper;
