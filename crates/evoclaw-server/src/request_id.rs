//! A UUID-backed `MakeRequestId`, since `tower-http` ships the trait but not
//! a generator.

use tower_http::request_id::{MakeRequestId, RequestId};

#[derive(Clone, Default)]
pub struct MakeUuidRequestId;

impl MakeRequestId for MakeUuidRequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        axum::http::HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}
