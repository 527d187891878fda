use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Generates a uuid v4 `x-request-id` for requests that arrive without one
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}
