//! SSE framing shared by `/api/chat/stream` and the log stream.

use axum::response::sse::Event;
use serde::Serialize;

/// Build one SSE event carrying `payload` as its JSON data frame.
pub fn json_event<T: Serialize>(payload: &T) -> Result<Event, axum::Error> {
    Event::default().json_data(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_event_builds_without_error() {
        assert!(json_event(&json!({"a": 1})).is_ok());
    }
}
