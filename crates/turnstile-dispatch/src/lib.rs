//! # turnstile-dispatch
//!
//! Everything the decision path hands off: device commands go through a
//! bounded `crossbeam-channel` queue to a small pool of worker threads that
//! call the `DeviceGateway`; detection records land in an in-memory log.
//! A full queue drops the command and counts it. Nothing here ever blocks a
//! swipe.

pub mod dispatcher;
pub mod record_log;
pub mod stats;

pub use dispatcher::SideEffectDispatcher;
pub use record_log::DetectionRecordLog;
pub use stats::DispatchStats;
