use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use schedule_model::ScheduleRequest;

use crate::day_ahead::feasibility::check_feasibility;
use crate::day_ahead::layout::ModelLayout;
use crate::day_ahead::lp_model::LpSolver;
use crate::day_ahead::results::{ScheduleResult, extract_schedule};
use crate::day_ahead::solver::{DATA_FILE, SNAPSHOT_COUNT_KEY, Solver, SolverConfig, VirtualFiles};
use crate::general::error::ScheduleError;
use crate::general::log_sink::{LogSink, TracingSink};
use crate::general::parameters::{
    InitialConditions, ParameterSet, ParameterSource, assemble_parameters,
};
use crate::general::settings::SchedulerSettings;
use crate::general::time_series::{
    TimeSeriesTable, normalize_to_eom, validate_input_length, validate_start_time,
};

/// File inside the configuration directory describing the model layout.
pub const MODEL_FILE: &str = "model.json";
/// Optional file inside the configuration directory with scheduler settings.
pub const SETTINGS_FILE: &str = "scheduler.toml";
/// Optional file inside the configuration directory with default model parameters.
pub const PARAMETERS_FILE: &str = "parameters.env";

/// Day-ahead schedule orchestration: validate, normalize, assemble
/// parameters, solve, extract and check feasibility.
pub struct Scheduler<S> {
    solver: S,
    layout: ModelLayout,
    model_file: PathBuf,
    settings: SchedulerSettings,
    parameter_source: Option<ParameterSource>,
    sink: Arc<dyn LogSink>,
}

impl<S: Solver> Scheduler<S> {
    pub fn new(solver: S, layout: ModelLayout, model_file: impl Into<PathBuf>) -> Self {
        Self {
            solver,
            layout,
            model_file: model_file.into(),
            settings: SchedulerSettings::default(),
            parameter_source: None,
            sink: Arc::new(TracingSink),
        }
    }

    /// Build a scheduler from `<config_dir>/model.json` and the optional
    /// `<config_dir>/scheduler.toml` and `<config_dir>/parameters.env`.
    pub fn from_config_dir(solver: S, config_dir: &Path) -> Result<Self, ScheduleError> {
        let model_file = config_dir.join(MODEL_FILE);
        let layout = ModelLayout::load(&model_file)?;
        let settings = SchedulerSettings::load_or_default(&config_dir.join(SETTINGS_FILE))?;
        let mut scheduler = Self::new(solver, layout, model_file).with_settings(settings);
        let parameters_file = config_dir.join(PARAMETERS_FILE);
        if parameters_file.is_file() {
            scheduler = scheduler.with_parameter_source(ParameterSource::load(&parameters_file)?);
        }
        Ok(scheduler)
    }

    pub fn with_settings(mut self, settings: SchedulerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the parameter source.
    pub fn with_parameter_source(mut self, source: ParameterSource) -> Self {
        self.parameter_source = Some(source);
        self
    }

    /// Merge `source` over the current parameter source; its entries win.
    pub fn with_parameter_overlay(mut self, source: ParameterSource) -> Self {
        self.parameter_source = Some(match self.parameter_source.take() {
            Some(mut base) => {
                base.parameters.merge(&source.parameters);
                ParameterSource {
                    path: source.path,
                    parameters: base.parameters,
                }
            }
            None => source,
        });
        self
    }

    pub fn parameter_source(&self) -> Option<&ParameterSource> {
        self.parameter_source.as_ref()
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn layout(&self) -> &ModelLayout {
        &self.layout
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn sink(&self) -> &dyn LogSink {
        self.sink.as_ref()
    }

    /// Compute the schedule for `data`, whose first row starts at `start_time`.
    ///
    /// `overrides` win over `initial`, which wins over the parameter source.
    pub fn schedule(
        &self,
        data: &TimeSeriesTable,
        start_time: NaiveDateTime,
        initial: &InitialConditions,
        overrides: &ParameterSet,
    ) -> Result<ScheduleResult, ScheduleError> {
        let sink = self.sink.as_ref();
        validate_input_length(data.len(), &self.settings)?;
        validate_start_time(start_time, self.settings.start_time_policy)?;

        let normalized = normalize_to_eom(data, start_time, &self.settings, sink)?;
        let snapshot_count = normalized.len();
        let returned = if self.settings.trim_to_input {
            data.len().min(snapshot_count)
        } else {
            snapshot_count
        };
        let timestamps: Vec<NaiveDateTime> = normalized
            .timestamps()
            .map(|all| all[..returned].to_vec())
            .unwrap_or_default();

        let parameters = assemble_parameters(self.parameter_source.as_ref(), initial, overrides);
        let config = SolverConfig::new(&self.model_file)
            .with_override(SNAPSHOT_COUNT_KEY, snapshot_count as i64);
        let mut files = VirtualFiles::new();
        files.insert(DATA_FILE.to_string(), normalized);

        sink.info(&format!(
            "Running solver with {} snapshots and {} parameters",
            snapshot_count,
            parameters.len()
        ));
        let extraction = {
            let run = self.solver.solve(&config, &parameters, &files)?;
            let extraction = extract_schedule(&run, &timestamps, &self.layout);
            // Release solver state before post-processing.
            drop(run);
            extraction?
        };
        drop(files);

        let report = check_feasibility(
            &extraction.wide,
            &self.layout,
            self.settings.feasibility_tolerance,
            sink,
        )?;
        sink.info(&report.summary());
        sink.info(&format!(
            "Scheduling completed with {} result data points",
            extraction.schedule.len()
        ));
        Ok(extraction.schedule)
    }

    /// Compute the schedule for a wire request; request parameters act as overrides.
    pub fn schedule_request(
        &self,
        request: &ScheduleRequest,
    ) -> Result<ScheduleResult, ScheduleError> {
        let data = TimeSeriesTable::from_rows(&request.data)?;
        let overrides: ParameterSet = request
            .parameters
            .iter()
            .map(|(name, value)| (name.clone(), *value))
            .collect();
        self.sink.info(&format!(
            "Received scheduling request with {} data points starting at {} and {} parameters",
            data.len(),
            request.start_time,
            overrides.len()
        ));
        self.schedule(
            &data,
            request.start_time,
            &InitialConditions::default(),
            &overrides,
        )
    }
}

impl Scheduler<LpSolver> {
    /// Scheduler backed by the bundled LP model, configured from `config_dir`.
    pub fn with_lp_model(config_dir: &Path) -> Result<Self, ScheduleError> {
        let settings = SchedulerSettings::load_or_default(&config_dir.join(SETTINGS_FILE))?;
        Self::from_config_dir(LpSolver::new(settings.interval()), config_dir)
    }
}
