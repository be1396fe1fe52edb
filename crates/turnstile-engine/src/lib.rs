//! # turnstile-engine
//!
//! Policy evaluators and the decision orchestrator.
//!
//! Each evaluator reads rules through `RuleStore`, keeps its state in a
//! `StateCache`, and hands side effects to a `CommandSink`. None of them
//! holds mutable state of its own, so one instance serves every thread.

pub mod anti_passback;
pub mod capacity;
mod cas;
pub mod interlock;
pub mod orchestrator;

pub use anti_passback::AntiPassbackEvaluator;
pub use capacity::CapacityEvaluator;
pub use interlock::InterlockEvaluator;
pub use orchestrator::DecisionEvaluator;

use std::sync::Arc;

use turnstile_core::traits::{Clock, CommandSink, RuleStore, StateCache};

/// The collaborators every evaluator is built from.
#[derive(Clone)]
pub struct EngineContext {
    pub rules: Arc<dyn RuleStore>,
    pub cache: Arc<dyn StateCache>,
    pub sink: Arc<dyn CommandSink>,
    pub clock: Arc<dyn Clock>,
}

impl EngineContext {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        cache: Arc<dyn StateCache>,
        sink: Arc<dyn CommandSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { rules, cache, sink, clock }
    }
}
