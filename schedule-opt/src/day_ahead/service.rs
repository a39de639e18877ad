use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use schedule_model::{ScheduleRequest, ScheduleResponse};

use crate::day_ahead::scheduler::Scheduler;
use crate::day_ahead::solver::Solver;

/// Run one request and fold every failure into the response body.
pub fn handle_schedule_request<S: Solver>(
    scheduler: &Scheduler<S>,
    request: ScheduleRequest,
) -> ScheduleResponse {
    match scheduler.schedule_request(&request) {
        Ok(result) => {
            scheduler.sink().info(&format!(
                "Returning {} result data points",
                result.len()
            ));
            ScheduleResponse::success(result.to_records())
        }
        Err(err) => {
            scheduler
                .sink()
                .error(&format!("Error running day-ahead scheduler: {}", err));
            ScheduleResponse::failure(err.to_string())
        }
    }
}

async fn schedule_handler<S>(
    State(scheduler): State<Arc<Scheduler<S>>>,
    payload: Result<Json<ScheduleRequest>, JsonRejection>,
) -> Json<ScheduleResponse>
where
    S: Solver + Send + Sync + 'static,
{
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            scheduler
                .sink()
                .error(&format!("Rejected scheduling request: {}", rejection.body_text()));
            return Json(ScheduleResponse::failure(rejection.body_text()));
        }
    };

    let worker = Arc::clone(&scheduler);
    let response = tokio::task::spawn_blocking(move || handle_schedule_request(&worker, request))
        .await
        .unwrap_or_else(|err| {
            let message = format!("scheduler worker failed: {}", err);
            scheduler.sink().error(&message);
            ScheduleResponse::failure(message)
        });
    Json(response)
}

async fn healthcheck() -> Json<&'static str> {
    Json("OK")
}

/// `POST /schedule` and `GET /healthcheck`.
pub fn router<S>(scheduler: Arc<Scheduler<S>>) -> Router
where
    S: Solver + Send + Sync + 'static,
{
    Router::new()
        .route("/schedule", post(schedule_handler::<S>))
        .route("/healthcheck", get(healthcheck))
        .with_state(scheduler)
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::day_ahead::layout::ModelLayout;
    use crate::day_ahead::test_support::MockSolver;
    use crate::general::log_sink::{LogLevel, MemorySink};

    fn request_body(rows: usize) -> String {
        let data = vec![r#"{"pv_s": 10.0, "price": 0.1}"#; rows].join(",");
        format!(
            concat!(
                r#"{{"start_time": "2024-06-29T00:00:00+02:00", "data": [{}], "#,
                r#""parameters": {{"battery_soc_t0": 0.5}}}}"#
            ),
            data
        )
    }

    fn app(solver: MockSolver, sink: Arc<MemorySink>) -> Router {
        let scheduler =
            Scheduler::new(solver, ModelLayout::default(), "opt/model.json").with_sink(sink);
        router(Arc::new(scheduler))
    }

    async fn post_schedule(app: Router, body: String) -> (StatusCode, ScheduleResponse) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/schedule")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_schedule_returns_one_record_per_interval() {
        let sink = Arc::new(MemorySink::new());
        let (status, response) =
            post_schedule(app(MockSolver::default(), sink), request_body(96)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(response.error.is_none());
        let data = response.data.unwrap();
        assert_eq!(data.len(), 192);
        assert!(data[0].contains_key("battery_soc"));
        assert!(!data[0].contains_key("time"));
    }

    #[tokio::test]
    async fn test_validation_error_becomes_error_body() {
        let sink = Arc::new(MemorySink::new());
        let (status, response) =
            post_schedule(app(MockSolver::default(), sink.clone()), request_body(10)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(response.data.is_none());
        assert!(response.error.unwrap().contains("at least 96"));
        assert_eq!(sink.messages(LogLevel::Error).len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_body_becomes_error_body() {
        let sink = Arc::new(MemorySink::new());
        let (status, response) =
            post_schedule(app(MockSolver::default(), sink), "{\"data\": 3}".to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert!(response.is_error());
    }

    #[tokio::test]
    async fn test_panicking_solver_becomes_error_body() {
        let sink = Arc::new(MemorySink::new());
        let solver = MockSolver {
            panic: true,
            ..Default::default()
        };
        let (status, response) = post_schedule(app(solver, sink), request_body(96)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(response.error.unwrap().contains("worker failed"));
    }

    #[tokio::test]
    async fn test_healthcheck() {
        let sink = Arc::new(MemorySink::new());
        let response = app(MockSolver::default(), sink)
            .oneshot(Request::builder().uri("/healthcheck").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"\"OK\"");
    }
}
