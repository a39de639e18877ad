pub mod datetime;
pub mod request;
pub mod response;

pub use request::ScheduleRequest;
pub use response::{ScheduleRecord, ScheduleResponse};
