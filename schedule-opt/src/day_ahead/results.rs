use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use indexmap::IndexMap;

use crate::day_ahead::layout::{
    BATTERY_CAPACITY_PARAMETER, BATTERY_SETPOINT_COLUMN, BATTERY_SOC_COLUMN, ModelLayout,
};
use crate::day_ahead::solver::{ResultMode, SolverRun};
use crate::general::error::ScheduleError;
use crate::general::time_series::TimeSeriesTable;

/// Final schedule: one row per returned interval with the per-site grid
/// exchange, the battery setpoint and the battery state of charge.
pub type ScheduleResult = TimeSeriesTable;

/// Everything read out of a solver run; holds no reference to the run.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Pivoted primal values keyed by `component.fieldtype.field`.
    pub wide: TimeSeriesTable,
    pub schedule: ScheduleResult,
}

/// Pivot the long-format primal results into one row per requested timestamp.
///
/// Snapshot `k` (k >= 1) of the run maps to `timestamps[k - 1]`. Values for
/// snapshots beyond the requested range are discarded.
pub fn pivot_results<R: SolverRun + ?Sized>(
    run: &R,
    timestamps: &[NaiveDateTime],
) -> Result<TimeSeriesTable, ScheduleError> {
    let time_map: HashMap<&str, usize> = run
        .snapshots()
        .iter()
        .skip(1)
        .map(String::as_str)
        .zip(0..timestamps.len())
        .collect();

    let mut cells: BTreeMap<String, (Vec<f64>, Vec<bool>)> = BTreeMap::new();
    let mut row_seen = vec![false; timestamps.len()];

    let primal = run
        .results()
        .iter()
        .filter(|row| row.mode == ResultMode::Primal);
    for row in primal {
        let Some(snapshot) = row.snapshot.as_deref() else {
            continue;
        };
        let Some(&index) = time_map.get(snapshot) else {
            continue;
        };

        let entry = row.entry();
        let width = timestamps.len();
        let (values, filled) = cells
            .entry(entry.clone())
            .or_insert_with(|| (vec![f64::NAN; width], vec![false; width]));
        if filled[index] {
            return Err(ScheduleError::DuplicateEntry {
                entry,
                time: timestamps[index],
            });
        }
        values[index] = row.value;
        filled[index] = true;
        row_seen[index] = true;
    }

    if let Some(missing) = row_seen.iter().position(|seen| !seen) {
        return Err(ScheduleError::MissingTimestamp(timestamps[missing]));
    }

    let columns: IndexMap<String, Vec<f64>> = cells
        .into_iter()
        .map(|(entry, (values, _))| (entry, values))
        .collect();
    TimeSeriesTable::from_columns(columns)?.with_timestamps(timestamps.to_vec())
}

/// Column of the pivoted results; absence means the model and layout disagree.
pub fn require_column<'a>(
    wide: &'a TimeSeriesTable,
    key: &str,
) -> Result<&'a [f64], ScheduleError> {
    wide.column(key)
        .ok_or_else(|| ScheduleError::MissingField(key.to_string()))
}

/// Derive the named output series from the pivoted results.
pub fn derive_schedule(
    wide: &TimeSeriesTable,
    layout: &ModelLayout,
    battery_capacity: f64,
) -> Result<ScheduleResult, ScheduleError> {
    let mut columns = IndexMap::new();
    for site in layout.site_names() {
        let flow = require_column(wide, &ModelLayout::metering_key(site))?;
        columns.insert(ModelLayout::schedule_column(site), flow.to_vec());
    }

    let discharging = require_column(wide, &layout.discharging_key())?;
    let charging = require_column(wide, &layout.charging_key())?;
    let setpoint = discharging
        .iter()
        .zip(charging)
        .map(|(out, into)| out - into)
        .collect();
    columns.insert(BATTERY_SETPOINT_COLUMN.to_string(), setpoint);

    let state = require_column(wide, &layout.state_key())?;
    let soc = state.iter().map(|energy| energy / battery_capacity).collect();
    columns.insert(BATTERY_SOC_COLUMN.to_string(), soc);

    let timestamps = wide.timestamps().map(<[NaiveDateTime]>::to_vec).unwrap_or_default();
    TimeSeriesTable::from_columns(columns)?.with_timestamps(timestamps)
}

/// Read everything needed from a run so it can be released right after.
pub fn extract_schedule<R: SolverRun + ?Sized>(
    run: &R,
    timestamps: &[NaiveDateTime],
    layout: &ModelLayout,
) -> Result<Extraction, ScheduleError> {
    let battery_capacity = run
        .input_parameter(BATTERY_CAPACITY_PARAMETER)
        .ok_or_else(|| {
            ScheduleError::MissingInputParameter(BATTERY_CAPACITY_PARAMETER.to_string())
        })?;
    let wide = pivot_results(run, timestamps)?;
    let schedule = derive_schedule(&wide, layout, battery_capacity)?;
    Ok(Extraction { wide, schedule })
}

/// Largest non-NaN value, `None` when there is none.
pub fn column_max(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|value| !value.is_nan())
        .fold(None, |max, value| Some(max.map_or(value, |m: f64| m.max(value))))
}
