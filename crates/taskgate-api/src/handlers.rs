use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use taskgate_common::{CallContext, CoordError, RunRequest, RunResponse, RunStatus};

use crate::service::into_response;
use crate::state::AppState;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub fn status_code(result: &Result<crate::waiter::WaitOutcome, CoordError>) -> StatusCode {
    match result {
        Ok(_) => StatusCode::OK,
        Err(CoordError::Validation(_)) => StatusCode::BAD_REQUEST,
        Err(CoordError::Transport { .. }) => StatusCode::BAD_GATEWAY,
        Err(CoordError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        Err(CoordError::Terminal { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Blank bodies mean "all defaults".
pub fn parse_run_request(body: &str) -> Result<RunRequest, String> {
    if body.trim().is_empty() {
        return Ok(RunRequest::default());
    }
    serde_json::from_str(body).map_err(|e| format!("invalid json body: {e}"))
}

pub async fn run(State(st): State<AppState>, body: String) -> (StatusCode, Json<RunResponse>) {
    let req = match parse_run_request(&body) {
        Ok(req) => req,
        Err(msg) => {
            st.metrics.record_run(RunStatus::Error);
            return (
                StatusCode::BAD_REQUEST,
                Json(RunResponse::error(RunStatus::Error, msg)),
            );
        }
    };

    let ctx = match st.request_deadline {
        Some(d) => CallContext::with_timeout(d),
        None => CallContext::background(),
    };
    let result = st.service.run(&ctx, &req).await;
    let code = status_code(&result);
    let resp = into_response(result);
    st.metrics.record_run(resp.status);
    (code, Json(resp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskgate_common::ExecutionStatus;

    #[test]
    fn test_parse_run_request() {
        assert_eq!(parse_run_request("").unwrap(), RunRequest::default());
        assert_eq!(parse_run_request(" \n").unwrap(), RunRequest::default());
        assert_eq!(parse_run_request(r#"{"delaySeconds":3}"#).unwrap().delay_seconds, 3);
        let err = parse_run_request("{not json").unwrap_err();
        assert!(err.starts_with("invalid json body:"));
    }

    #[test]
    fn test_status_codes() {
        let terminal = Err(CoordError::Terminal {
            status: ExecutionStatus::Failed,
            execution_id: "e".to_string(),
            elapsed_ms: 1,
            cause: "boom".to_string(),
        });
        assert_eq!(status_code(&terminal), StatusCode::INTERNAL_SERVER_ERROR);

        let timeout = Err(CoordError::Timeout {
            execution_id: None,
            elapsed_ms: 0,
            reason: "deadline too close".to_string(),
        });
        assert_eq!(status_code(&timeout), StatusCode::GATEWAY_TIMEOUT);

        let transport = Err(CoordError::Transport {
            op: "start execution",
            execution_id: None,
            elapsed_ms: 0,
            message: "refused".to_string(),
        });
        assert_eq!(status_code(&transport), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_code(&Err(CoordError::Validation("x".to_string()))),
            StatusCode::BAD_REQUEST
        );
    }
}
