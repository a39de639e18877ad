use std::fs;
use std::path::Path;

use schedule_model::ScheduleRequest;

use crate::day_ahead::results::ScheduleResult;
use crate::day_ahead::scheduler::Scheduler;
use crate::day_ahead::solver::Solver;
use crate::general::error::{ReplayError, ScheduleError};

/// Line marker opening a logged request payload.
pub const REQUEST_MARKER: &str = "===== REQUEST =====";
/// Prefix of the line marker closing a logged request payload.
pub const RESPONSE_MARKER_PREFIX: &str = "===== RESPONSE";

/// Text between the first request marker line and the next response marker line.
pub fn extract_request_block<'a>(text: &'a str, origin: &str) -> Result<&'a str, ReplayError> {
    let mut start = None;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let line_end = offset + line.len();
        match start {
            None if line.contains(REQUEST_MARKER) => start = Some(line_end),
            Some(begin) if line.contains(RESPONSE_MARKER_PREFIX) => {
                let block = text[begin..offset].trim();
                if block.is_empty() {
                    return Err(ReplayError::EmptyBlock {
                        origin: origin.to_string(),
                    });
                }
                return Ok(block);
            }
            _ => {}
        }
        offset = line_end;
    }

    match start {
        None => Err(ReplayError::RequestMarkerNotFound {
            origin: origin.to_string(),
            marker: REQUEST_MARKER,
        }),
        Some(_) => Err(ReplayError::ResponseMarkerNotFound {
            origin: origin.to_string(),
            marker: RESPONSE_MARKER_PREFIX,
        }),
    }
}

/// Parse the logged request contained in `text`.
pub fn parse_request(text: &str, origin: &str) -> Result<ScheduleRequest, ReplayError> {
    let block = extract_request_block(text, origin)?;
    serde_json::from_str(block).map_err(|source| ReplayError::InvalidPayload {
        origin: origin.to_string(),
        source,
    })
}

/// Read a request log file.
pub fn load_request(path: &Path) -> Result<ScheduleRequest, ScheduleError> {
    let text = fs::read_to_string(path).map_err(|source| ScheduleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_request(&text, &path.display().to_string())?)
}

/// Re-run a logged request through `scheduler`, exactly as the service would.
pub fn replay_log_file<S: Solver>(
    path: &Path,
    scheduler: &Scheduler<S>,
) -> Result<ScheduleResult, ScheduleError> {
    let request = load_request(path)?;
    scheduler.sink().info(&format!("Replaying request from {}", path.display()));
    scheduler.schedule_request(&request)
}
