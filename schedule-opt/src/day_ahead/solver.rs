use std::path::PathBuf;

use indexmap::IndexMap;

use crate::general::error::SolverError;
use crate::general::parameters::{ParameterSet, ParameterValue};
use crate::general::time_series::TimeSeriesTable;

/// Configuration key for the planning horizon length.
pub const SNAPSHOT_COUNT_KEY: &str = "optimization.snapshots.count";
/// Name under which the forecast table is handed to the solver.
pub const DATA_FILE: &str = "data";

/// Model file reference plus overrides applied on top of it.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    pub model_file: PathBuf,
    pub overrides: IndexMap<String, ParameterValue>,
}

impl SolverConfig {
    pub fn new(model_file: impl Into<PathBuf>) -> Self {
        Self {
            model_file: model_file.into(),
            overrides: IndexMap::new(),
        }
    }

    pub fn with_override(
        mut self,
        key: impl Into<String>,
        value: impl Into<ParameterValue>,
    ) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Planning horizon requested through [`SNAPSHOT_COUNT_KEY`].
    pub fn snapshot_count(&self) -> Option<usize> {
        match self.overrides.get(SNAPSHOT_COUNT_KEY)? {
            ParameterValue::Int(count) if *count >= 0 => Some(*count as usize),
            _ => None,
        }
    }
}

/// In-memory input tables, addressed by name from the model.
pub type VirtualFiles = IndexMap<String, TimeSeriesTable>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultMode {
    /// Value of a feasible solution.
    Primal,
    Dual,
    /// Solver bookkeeping, never part of a schedule.
    Diagnostic,
}

/// One value of the long-format solver output.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub mode: ResultMode,
    /// `None` for values that are not bound to a time step (e.g. the objective).
    pub snapshot: Option<String>,
    pub component: String,
    pub fieldtype: String,
    pub field: String,
    pub value: f64,
}

impl ResultRow {
    pub fn primal(
        snapshot: Option<&str>,
        component: &str,
        fieldtype: &str,
        field: &str,
        value: f64,
    ) -> Self {
        Self {
            mode: ResultMode::Primal,
            snapshot: snapshot.map(str::to_string),
            component: component.to_string(),
            fieldtype: fieldtype.to_string(),
            field: field.to_string(),
            value,
        }
    }

    /// `component.fieldtype.field`
    pub fn entry(&self) -> String {
        format!("{}.{}.{}", self.component, self.fieldtype, self.field)
    }
}

/// A finished solver run. Dropping it releases the solver's model state.
pub trait SolverRun {
    /// Parameter value as resolved by the solver (after defaults and transformations).
    fn input_parameter(&self, name: &str) -> Option<f64>;

    /// Ordered snapshot identifiers. Index 0 is the initial-condition anchor,
    /// scheduling steps start at index 1.
    fn snapshots(&self) -> &[String];

    fn results(&self) -> &[ResultRow];
}

/// Optimization backend used by the scheduler.
pub trait Solver {
    type Run: SolverRun;

    fn solve(
        &self,
        config: &SolverConfig,
        parameters: &ParameterSet,
        files: &VirtualFiles,
    ) -> Result<Self::Run, SolverError>;
}
