//! Anti-passback detection records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AreaId, DetectForm, DetectOutcome, DetectResult, DeviceId, RuleId, UserId};

/// One evaluated detection, kept for audit and operator follow-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub record_id: String,
    pub user_id: UserId,
    pub device_id: DeviceId,
    pub area_id: AreaId,
    pub outcome: DetectOutcome,
    pub violation_message: Option<String>,
    pub config_id: Option<RuleId>,
    pub detected_at: DateTime<Utc>,
    pub handled: bool,
    pub handle_remark: Option<String>,
    pub handled_at: Option<DateTime<Utc>>,
}

impl DetectionRecord {
    pub fn new(form: &DetectForm, result: &DetectResult, detected_at: DateTime<Utc>) -> Self {
        let violation = result.violation.as_ref();
        Self {
            record_id: uuid::Uuid::new_v4().to_string(),
            user_id: form.user_id,
            device_id: form.device_id,
            area_id: form.area_id,
            outcome: result.outcome,
            violation_message: violation.map(|v| v.message.clone()),
            config_id: violation.map(|v| v.config_id),
            detected_at,
            handled: false,
            handle_remark: None,
            handled_at: None,
        }
    }

    pub fn is_violation(&self) -> bool {
        self.outcome != DetectOutcome::Normal
    }

    pub fn mark_handled(&mut self, remark: Option<String>, at: DateTime<Utc>) {
        self.handled = true;
        self.handle_remark = remark;
        self.handled_at = Some(at);
    }
}

/// Query over detection records. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub user_id: Option<UserId>,
    pub area_id: Option<AreaId>,
    pub outcome: Option<DetectOutcome>,
    pub handled: Option<bool>,
    pub limit: Option<usize>,
}

impl RecordFilter {
    pub fn matches(&self, record: &DetectionRecord) -> bool {
        self.user_id.map_or(true, |u| u == record.user_id)
            && self.area_id.map_or(true, |a| a == record.area_id)
            && self.outcome.map_or(true, |o| o == record.outcome)
            && self.handled.map_or(true, |h| h == record.handled)
    }
}
