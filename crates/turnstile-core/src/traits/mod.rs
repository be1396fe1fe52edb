//! Seams to external collaborators. Evaluators only ever see these traits.

pub mod clock;
pub mod command_sink;
pub mod device_gateway;
pub mod rule_store;
pub mod state_cache;

pub use clock::{Clock, ManualClock, SystemClock};
pub use command_sink::{CommandSink, NullSink};
pub use device_gateway::DeviceGateway;
pub use rule_store::RuleStore;
pub use state_cache::{CacheValue, StateCache};
