use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// One interval of a computed schedule, keyed by output column name.
pub type ScheduleRecord = BTreeMap<String, f64>;

/// Response of `POST /schedule`. Exactly one of `data` and `error` is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./schedule.ts")]
pub struct ScheduleResponse {
    /// Schedule records in interval order.
    pub data: Option<Vec<ScheduleRecord>>,
    /// Error message when the schedule could not be computed.
    pub error: Option<String>,
}

impl ScheduleResponse {
    pub fn success(data: Vec<ScheduleRecord>) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_serializes_null_data() {
        let json = serde_json::to_value(ScheduleResponse::failure("boom")).unwrap();
        assert_eq!(json["error"], "boom");
        assert!(json["data"].is_null());
    }

    #[test]
    fn test_success_round_trips_records() {
        let mut record = ScheduleRecord::new();
        record.insert("battery_soc".to_string(), 0.5);
        let response = ScheduleResponse::success(vec![record]);

        let json = serde_json::to_string(&response).unwrap();
        let parsed: ScheduleResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, response);
        assert!(!parsed.is_error());
    }
}
