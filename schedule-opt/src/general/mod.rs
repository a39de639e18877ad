pub mod error;
pub mod log_sink;
pub mod parameters;
pub mod settings;
pub mod time_series;

pub use error::{ReplayError, ScheduleError, SolverError};
pub use log_sink::{LogSink, MemorySink, TracingSink};
pub use parameters::{InitialConditions, ParameterSet, ParameterSource, ParameterValue};
pub use settings::{SchedulerSettings, StartTimePolicy};
pub use time_series::{TimeSeriesTable, normalize_to_eom};
