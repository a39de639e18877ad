use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use indexmap::IndexMap;

use crate::general::error::ScheduleError;
use crate::general::log_sink::LogSink;
use crate::general::settings::{SchedulerSettings, StartTimePolicy};

/// Column-wise table of equally spaced numeric series.
///
/// Every column holds exactly `len()` values. Timestamps are optional: raw
/// caller input carries none, the normalized table carries one per row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeriesTable {
    columns: IndexMap<String, Vec<f64>>,
    timestamps: Option<Vec<NaiveDateTime>>,
    len: usize,
}

impl TimeSeriesTable {
    /// Build a table from row mappings. Every row must carry every field.
    pub fn from_rows(rows: &[BTreeMap<String, f64>]) -> Result<Self, ScheduleError> {
        let mut columns: IndexMap<String, Vec<f64>> = IndexMap::new();
        for row in rows {
            for name in row.keys() {
                if !columns.contains_key(name) {
                    columns.insert(name.clone(), Vec::with_capacity(rows.len()));
                }
            }
        }

        for (index, row) in rows.iter().enumerate() {
            for (name, values) in columns.iter_mut() {
                let value = row.get(name).ok_or_else(|| {
                    ScheduleError::Validation(format!("row {} lacks field '{}'", index, name))
                })?;
                values.push(*value);
            }
        }

        Ok(Self {
            columns,
            timestamps: None,
            len: rows.len(),
        })
    }

    /// Build a table from named columns of equal length.
    pub fn from_columns(columns: IndexMap<String, Vec<f64>>) -> Result<Self, ScheduleError> {
        let len = columns.values().next().map_or(0, Vec::len);
        if let Some((name, values)) = columns.iter().find(|(_, values)| values.len() != len) {
            return Err(ScheduleError::Validation(format!(
                "column '{}' has {} values, expected {}",
                name,
                values.len(),
                len
            )));
        }
        Ok(Self {
            columns,
            timestamps: None,
            len,
        })
    }

    /// Attach one timestamp per row.
    pub fn with_timestamps(
        mut self,
        timestamps: Vec<NaiveDateTime>,
    ) -> Result<Self, ScheduleError> {
        if timestamps.len() != self.len {
            return Err(ScheduleError::Validation(format!(
                "got {} timestamps for {} rows",
                timestamps.len(),
                self.len
            )));
        }
        self.timestamps = Some(timestamps);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn timestamps(&self) -> Option<&[NaiveDateTime]> {
        self.timestamps.as_deref()
    }

    /// Row `index` as field/value pairs.
    pub fn row(&self, index: usize) -> Option<BTreeMap<String, f64>> {
        if index >= self.len {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|(name, values)| (name.clone(), values[index]))
                .collect(),
        )
    }

    /// All rows as field/value mappings, without timestamps.
    pub fn to_records(&self) -> Vec<BTreeMap<String, f64>> {
        (0..self.len).filter_map(|index| self.row(index)).collect()
    }

    /// First `count` rows, wrapping around to the start when `count > len()`.
    /// Row `i` of the result is row `i % len()` of `self`.
    fn take_cyclic(&self, count: usize) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| {
                let repeated: Vec<f64> = values.iter().copied().cycle().take(count).collect();
                (name.clone(), repeated)
            })
            .collect();
        Self {
            columns,
            timestamps: None,
            len: count,
        }
    }
}

impl fmt::Display for TimeSeriesTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<20}", "time")?;
        for name in self.columns.keys() {
            write!(f, " {:>22}", name)?;
        }
        writeln!(f)?;
        for index in 0..self.len {
            match self.timestamps.as_ref() {
                Some(timestamps) => {
                    write!(f, "{:<20}", timestamps[index].format("%Y-%m-%d %H:%M"))?
                }
                None => write!(f, "{:<20}", index)?,
            }
            for values in self.columns.values() {
                write!(f, " {:>22.4}", values[index])?;
            }
            writeln!(f)?;
        }
        write!(f, "[{} rows x {} columns]", self.len, self.columns.len())
    }
}

/// Last interval boundary before the next calendar month begins.
pub fn end_of_month(start_time: NaiveDateTime, interval: Duration) -> Option<NaiveDateTime> {
    let (year, month) = if start_time.month() == 12 {
        (start_time.year() + 1, 1)
    } else {
        (start_time.year(), start_time.month() + 1)
    };
    let next_month = NaiveDate::from_ymd_opt(year, month, 1)?.and_time(NaiveTime::MIN);
    Some(next_month - interval)
}

/// Number of intervals from `start_time` up to and including the end-of-month interval.
pub fn intervals_to_end_of_month(start_time: NaiveDateTime, interval: Duration) -> Option<usize> {
    let step = interval.num_seconds();
    if step <= 0 {
        return None;
    }
    let end = end_of_month(start_time, interval)?;
    let span = (end - start_time).num_seconds();
    // Truncates toward zero, so a start inside the final interval still yields one step.
    Some((span / step + 1).max(0) as usize)
}

/// Reject raw input shorter than the configured minimum.
pub fn validate_input_length(
    available: usize,
    settings: &SchedulerSettings,
) -> Result<(), ScheduleError> {
    if available == 0 {
        return Err(ScheduleError::Validation("data contains no entries".to_string()));
    }
    if available < settings.min_input_intervals {
        return Err(ScheduleError::Validation(format!(
            "data must contain at least {} entries (a full day in {} minute intervals), got {}",
            settings.min_input_intervals, settings.interval_minutes, available
        )));
    }
    Ok(())
}

pub fn validate_start_time(
    start_time: NaiveDateTime,
    policy: StartTimePolicy,
) -> Result<(), ScheduleError> {
    match policy {
        StartTimePolicy::Flexible => Ok(()),
        StartTimePolicy::RequireMidnight => {
            if start_time.num_seconds_from_midnight() == 0 && start_time.nanosecond() == 0 {
                Ok(())
            } else {
                Err(ScheduleError::Validation(format!(
                    "start time must be midnight, got {}",
                    start_time
                )))
            }
        }
    }
}

/// Extend or truncate `data` to the horizon the solver needs and attach timestamps.
///
/// The horizon runs from `start_time` through the last interval of the calendar
/// month, but is never shorter than `settings.min_horizon_intervals`. Short
/// input is repeated cyclically. Length and start-time policy are checked by
/// [`validate_input_length`] and [`validate_start_time`].
pub fn normalize_to_eom(
    data: &TimeSeriesTable,
    start_time: NaiveDateTime,
    settings: &SchedulerSettings,
    sink: &dyn LogSink,
) -> Result<TimeSeriesTable, ScheduleError> {
    if data.is_empty() {
        return Err(ScheduleError::Validation("data contains no entries".to_string()));
    }

    let interval = settings.interval();
    let eom = end_of_month(start_time, interval).ok_or_else(|| {
        ScheduleError::Validation(format!("start time {} is out of range", start_time))
    })?;
    sink.info(&format!(
        "Normalizing: start_time={}, end_of_month={}",
        start_time, eom
    ));

    let required = intervals_to_end_of_month(start_time, interval)
        .ok_or_else(|| ScheduleError::Validation("invalid scheduling interval".to_string()))?
        .max(settings.min_horizon_intervals);
    sink.info(&format!(
        "Normalizing data: available={}, required={}",
        data.len(),
        required
    ));

    let timestamps = (0..required)
        .map(|step| start_time + interval * step as i32)
        .collect();
    data.take_cyclic(required).with_timestamps(timestamps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::general::log_sink::{LogLevel, MemorySink};

    fn ts(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn counting_table(len: usize) -> TimeSeriesTable {
        let mut columns = IndexMap::new();
        columns.insert("index".to_string(), (0..len).map(|i| i as f64).collect());
        columns.insert("price".to_string(), vec![0.1; len]);
        TimeSeriesTable::from_columns(columns).unwrap()
    }

    #[test]
    fn test_intervals_to_end_of_month_mid_june() {
        let n = intervals_to_end_of_month(ts("2024-06-15 00:00:00"), Duration::minutes(15));
        assert_eq!(n, Some(16 * 96));
    }

    #[test]
    fn test_end_of_month_rolls_over_year() {
        let eom = end_of_month(ts("2024-12-31 12:00:00"), Duration::minutes(15)).unwrap();
        assert_eq!(eom, ts("2024-12-31 23:45:00"));
    }

    #[test]
    fn test_intervals_in_leap_february() {
        let leap = intervals_to_end_of_month(ts("2024-02-01 00:00:00"), Duration::minutes(15));
        let common = intervals_to_end_of_month(ts("2023-02-01 00:00:00"), Duration::minutes(15));
        assert_eq!(leap, Some(29 * 96));
        assert_eq!(common, Some(28 * 96));
    }

    #[test]
    fn test_start_inside_last_interval_counts_one_step() {
        let n = intervals_to_end_of_month(ts("2024-06-30 23:50:00"), Duration::minutes(15));
        assert_eq!(n, Some(1));
    }

    #[test]
    fn test_normalize_truncates_long_input() {
        let sink = MemorySink::new();
        let data = counting_table(5000);
        let start = ts("2024-06-15 00:00:00");

        let normalized =
            normalize_to_eom(&data, start, &SchedulerSettings::default(), &sink).unwrap();

        assert_eq!(normalized.len(), 1536);
        assert_eq!(normalized.column("index").unwrap()[1535], 1535.0);
        let timestamps = normalized.timestamps().unwrap();
        assert_eq!(timestamps[0], start);
        assert_eq!(timestamps[1535], ts("2024-06-30 23:45:00"));
    }

    #[test]
    fn test_normalize_repeats_short_input_cyclically() {
        let sink = MemorySink::new();
        let data = counting_table(100);

        let normalized = normalize_to_eom(
            &data,
            ts("2024-06-15 00:00:00"),
            &SchedulerSettings::default(),
            &sink,
        )
        .unwrap();

        let index = normalized.column("index").unwrap();
        for (i, value) in index.iter().enumerate() {
            assert_eq!(*value, (i % 100) as f64);
        }
        assert!(normalized.column("price").unwrap().iter().all(|p| *p == 0.1));
    }

    #[test]
    fn test_normalize_enforces_two_day_minimum_near_month_end() {
        let sink = MemorySink::new();
        let data = counting_table(96);
        let start = ts("2024-06-30 10:07:00");

        let normalized =
            normalize_to_eom(&data, start, &SchedulerSettings::default(), &sink).unwrap();

        assert_eq!(normalized.len(), 192);
        let timestamps = normalized.timestamps().unwrap();
        assert!(timestamps.windows(2).all(|w| w[1] - w[0] == Duration::minutes(15)));
        assert_eq!(timestamps[0], start);
        assert!(
            sink.messages(LogLevel::Info)
                .iter()
                .any(|m| m.contains("required=192"))
        );
    }

    #[test]
    fn test_input_shorter_than_a_day_is_rejected() {
        let settings = SchedulerSettings::default();
        assert!(validate_input_length(96, &settings).is_ok());
        let err = validate_input_length(95, &settings).unwrap_err();
        assert!(matches!(err, ScheduleError::Validation(_)));
        assert!(err.to_string().contains("at least 96"));
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let sink = MemorySink::new();
        let settings = SchedulerSettings {
            min_input_intervals: 0,
            ..SchedulerSettings::default()
        };
        assert!(validate_input_length(0, &settings).is_err());
        let err = normalize_to_eom(
            &counting_table(0),
            ts("2024-06-15 00:00:00"),
            &settings,
            &sink,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no entries"));
    }

    #[test]
    fn test_require_midnight_policy() {
        let policy = StartTimePolicy::RequireMidnight;
        assert!(validate_start_time(ts("2024-06-15 00:00:00"), policy).is_ok());
        let err = validate_start_time(ts("2024-06-15 00:15:00"), policy).unwrap_err();
        assert!(err.to_string().contains("midnight"));
        assert!(validate_start_time(ts("2024-06-15 00:15:00"), StartTimePolicy::Flexible).is_ok());
    }

    #[test]
    fn test_from_rows_requires_every_field() {
        let mut complete = BTreeMap::new();
        complete.insert("pv".to_string(), 1.0);
        complete.insert("price".to_string(), 0.2);
        let mut partial = BTreeMap::new();
        partial.insert("pv".to_string(), 2.0);

        let table = TimeSeriesTable::from_rows(&[complete.clone(), complete.clone()]).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.row(1).unwrap(), complete);

        let err = TimeSeriesTable::from_rows(&[complete, partial]).unwrap_err();
        assert!(err.to_string().contains("lacks field 'price'"));
    }

    #[test]
    fn test_from_columns_rejects_ragged_columns() {
        let mut columns = IndexMap::new();
        columns.insert("a".to_string(), vec![1.0, 2.0]);
        columns.insert("b".to_string(), vec![1.0]);
        assert!(TimeSeriesTable::from_columns(columns).is_err());
    }
}
