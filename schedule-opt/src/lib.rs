pub mod day_ahead;
pub mod general;

// Re-export commonly used items for convenience
pub use day_ahead::lp_model::LpSolver;
pub use day_ahead::results::ScheduleResult;
pub use day_ahead::scheduler::Scheduler;
pub use general::error::ScheduleError;
