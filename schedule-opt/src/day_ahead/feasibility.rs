use crate::day_ahead::layout::ModelLayout;
use crate::day_ahead::results::{column_max, require_column};
use crate::general::error::ScheduleError;
use crate::general::log_sink::LogSink;
use crate::general::time_series::TimeSeriesTable;

/// Worst slack observed in a run. Values are maxima over the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeasibilityReport {
    pub softmin_slack: Option<f64>,
    pub feasibility_slack: Option<f64>,
    pub softmin_violated: bool,
    pub feasibility_violated: bool,
}

impl FeasibilityReport {
    pub fn is_clean(&self) -> bool {
        !self.softmin_violated && !self.feasibility_violated
    }

    /// One-line description of the slack maxima.
    pub fn summary(&self) -> String {
        let describe = |slack: Option<f64>| match slack {
            Some(value) => format!("{:.6}", value),
            None => "n/a".to_string(),
        };
        format!(
            "Feasibility check {}: max softmin slack={}, max feasibility slack={}",
            if self.is_clean() { "passed" } else { "reported violations" },
            describe(self.softmin_slack),
            describe(self.feasibility_slack)
        )
    }
}

/// Keys of the penalized feasibility slacks, e.g. `bromberg.feasibility_unserved.exp.value`.
pub fn is_feasibility_key(key: &str) -> bool {
    key.contains(".feasibility_") && key.contains(".exp.value")
}

/// Inspect soft-constraint slacks and warn when they exceed `tolerance`.
///
/// Violations never fail the run. A missing SoC soft-minimum column does,
/// since it means the model and the layout disagree.
pub fn check_feasibility(
    wide: &TimeSeriesTable,
    layout: &ModelLayout,
    tolerance: f64,
    sink: &dyn LogSink,
) -> Result<FeasibilityReport, ScheduleError> {
    let softmin_slack = column_max(require_column(wide, &layout.softmin_key())?);
    let softmin_violated = softmin_slack.is_some_and(|slack| slack > tolerance);
    if softmin_violated {
        sink.warn("Day-ahead schedule model: Battery SoC softmin constraint was violated!");
    }

    let feasibility_slack = wide
        .column_names()
        .filter(|key| is_feasibility_key(key))
        .filter_map(|key| wide.column(key).and_then(column_max))
        .reduce(f64::max);
    let feasibility_violated = feasibility_slack.is_some_and(|slack| slack > tolerance);
    if feasibility_violated {
        sink.warn("Day-ahead schedule model: Some feasibility constraints were violated!");
    }

    Ok(FeasibilityReport {
        softmin_slack,
        feasibility_slack,
        softmin_violated,
        feasibility_violated,
    })
}
