/// Turnstile version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Decision latency budget for a single swipe, in milliseconds.
pub const DEFAULT_LATENCY_BUDGET_MS: u64 = 100;

/// Cache lifetime of anti-passback pass history. Independent of the
/// configured pass-count window.
pub const DEFAULT_ANTI_PASSBACK_CACHE_TTL_SECS: u64 = 30 * 60;

/// Most recent passes kept per anti-passback scope.
pub const DEFAULT_PASS_HISTORY_LIMIT: usize = 10;

/// Compare-and-set attempts before an evaluator gives up on a contended key.
pub const DEFAULT_CAS_RETRIES: u32 = 8;

/// Maximum entries held by the in-memory state cache.
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 100_000;

/// Bounded side-effect queue depth.
pub const DEFAULT_DISPATCH_QUEUE_CAPACITY: usize = 1024;

/// Side-effect worker threads.
pub const DEFAULT_DISPATCH_WORKERS: usize = 2;

/// Detection records retained by the record log.
pub const DEFAULT_DISPATCH_RECORD_LIMIT: usize = 100_000;

/// Response message for an unrestricted pass.
pub const MSG_NORMAL_PASS: &str = "正常通行";

/// Response message for a soft anti-passback violation.
pub const MSG_SOFT_VIOLATION: &str = "软反潜回：告警但允许通行";

/// Response message for a hard anti-passback violation.
pub const MSG_HARD_VIOLATION: &str = "硬反潜回：阻止通行";

/// Interlock trigger with no matching rule.
pub const MSG_NO_INTERLOCK_RULE: &str = "未找到匹配的互锁规则";

/// Interlock event that neither arms nor releases a rule.
pub const MSG_INTERLOCK_NOT_APPLICABLE: &str = "事件无需互锁处理";
