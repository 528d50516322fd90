//! Domain Model → DTO conversions.

use crate::domain::Status;

use super::Response;

impl From<Status> for Response {
    fn from(status: Status) -> Self {
        Response {
            ok: !status.is_failure(),
            body: status.details,
        }
    }
}

impl From<&Status> for Response {
    fn from(status: &Status) -> Self {
        Response {
            ok: !status.is_failure(),
            body: status.details.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{StatusCode, TIMEOUT_DETAILS};

    #[test]
    fn test_success_status_to_response() {
        // テスト項目: Success ステータスは ok: true のレスポンスに変換される
        // given (前提条件):
        let status = Status::success("medion has joined to the chat.");

        // when (操作):
        let response = Response::from(status);

        // then (期待する結果):
        assert!(response.ok);
        assert_eq!(response.body, "medion has joined to the chat.");
    }

    #[test]
    fn test_failure_statuses_to_response() {
        // テスト項目: Error と Timeout は ok: false に変換され、詳細が body になる
        // given (前提条件):
        let error = Status::new(StatusCode::Error, "on creating a lobby");
        let timeout = Status::timeout();

        // when (操作):
        let error_response = Response::from(&error);
        let timeout_response = Response::from(timeout);

        // then (期待する結果):
        assert!(!error_response.ok);
        assert_eq!(error_response.body, "on creating a lobby");
        assert!(!timeout_response.ok);
        assert_eq!(timeout_response.body, TIMEOUT_DETAILS);
    }
}
