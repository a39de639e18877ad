use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// A day-ahead scheduling request as accepted by `POST /schedule` and as
/// written into the request log.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema, TS)]
#[ts(export, export_to = "./schedule.ts")]
pub struct ScheduleRequest {
    /// Timestamp of the first row in `data`.
    #[schema(value_type = String, format = DateTime)]
    #[ts(type = "string")]
    pub start_time: NaiveDateTime,
    /// Forecast rows in 15 minute resolution (kW, `price` in EUR/kWh).
    pub data: Vec<BTreeMap<String, f64>>,
    /// Per-call parameters, e.g. `battery_soc_t0` or `<site>_grid_p_peak_consume`.
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
}

/// Wire form of [`ScheduleRequest`]; `start_time` may carry an offset.
#[derive(Deserialize)]
struct WireScheduleRequest {
    #[serde(deserialize_with = "crate::datetime::deserialize")]
    start_time: NaiveDateTime,
    data: Vec<BTreeMap<String, f64>>,
    #[serde(default)]
    parameters: BTreeMap<String, f64>,
}

impl<'de> Deserialize<'de> for ScheduleRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = WireScheduleRequest::deserialize(deserializer)?;
        Ok(Self {
            start_time: wire.start_time,
            data: wire.data,
            parameters: wire.parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserializes_with_offset_start_time() {
        let raw = r#"{
            "start_time": "2024-06-15T00:00:00Z",
            "data": [{"pv_s": 1.0, "price": 0.1}],
            "parameters": {"battery_soc_t0": 0.5}
        }"#;
        let request: ScheduleRequest = serde_json::from_str(raw).unwrap();

        assert_eq!(request.start_time.to_string(), "2024-06-15 00:00:00");
        assert_eq!(request.data.len(), 1);
        assert_eq!(request.data[0]["price"], 0.1);
        assert_eq!(request.parameters["battery_soc_t0"], 0.5);
    }

    #[test]
    fn test_request_parameters_default_to_empty() {
        let raw = r#"{"start_time": "2024-06-15T00:00:00", "data": []}"#;
        let request: ScheduleRequest = serde_json::from_str(raw).unwrap();
        assert!(request.parameters.is_empty());
    }

    #[test]
    fn test_request_rejects_invalid_start_time() {
        let raw = r#"{"start_time": "soon", "data": []}"#;
        let err = serde_json::from_str::<ScheduleRequest>(raw).unwrap_err();
        assert!(err.to_string().contains("invalid ISO-8601 timestamp"));
    }

    #[test]
    fn test_typescript_declaration_types_start_time_as_string() {
        let decl = ScheduleRequest::decl();
        assert!(decl.contains("start_time: string"));
        assert!(decl.contains("parameters"));
    }
}
