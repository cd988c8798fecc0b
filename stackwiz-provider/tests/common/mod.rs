//! Shared test helpers: a scripted Cloudflare API transport and assertion macros

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use stackwiz_provider::{
    ApiRequest, ApiResponse, CloudflareProvider, HttpTransport, RetryPolicy,
};

/// Assert that an `Option` is `Some` and unwrap it (fails the test otherwise).
#[macro_export]
macro_rules! require_some {
    ($expr:expr $(,)?) => {{
        let opt = $expr;
        assert!(opt.is_some(), "expected Some(..), got None");
        let Some(val) = opt else {
            return;
        };
        val
    }};
}

/// Assert that a `Result` is `Ok` and unwrap it (fails the test otherwise).
#[macro_export]
macro_rules! require_ok {
    ($expr:expr $(,)?) => {{
        let res = $expr;
        assert!(res.is_ok(), "expected Ok(..), got {res:?}");
        let Ok(val) = res else {
            return;
        };
        val
    }};
}

/// Transport replaying queued responses in order and recording every request it saw.
///
/// When the queue holds a single response it is repeated forever.
#[derive(Default)]
pub struct ScriptedApi {
    responses: Mutex<VecDeque<ApiResponse>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, status: u16, body: serde_json::Value) -> &Self {
        self.push_raw(status, None, body.to_string())
    }

    pub fn push_rate_limited(&self, retry_after: Option<u64>) -> &Self {
        self.push_raw(
            429,
            retry_after,
            r#"{"success":false,"errors":[{"code":971,"message":"Please wait and consider throttling your request speed"}]}"#
                .to_string(),
        )
    }

    pub fn push_raw(&self, status: u16, retry_after: Option<u64>, body: String) -> &Self {
        self.responses.lock().unwrap().push_back(ApiResponse {
            status,
            retry_after,
            body,
        });
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedApi {
    async fn send(&self, request: &ApiRequest) -> stackwiz_provider::Result<ApiResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let mut responses = self.responses.lock().unwrap();
        let response = if responses.len() > 1 {
            responses.pop_front()
        } else {
            responses.front().cloned()
        };
        Ok(response.unwrap_or(ApiResponse {
            status: 500,
            retry_after: None,
            body: "no scripted response".to_string(),
        }))
    }
}

/// Cloudflare provider over a scripted transport.
pub fn provider(api: &Arc<ScriptedApi>) -> CloudflareProvider {
    CloudflareProvider::with_transport(api.clone()).with_retry_policy(RetryPolicy::default())
}

/// `{"success": true, "result": ...}`
pub fn ok(result: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "success": true, "errors": [], "result": result })
}

/// List envelope with `result_info`.
pub fn ok_page(result: serde_json::Value, total_count: u32) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "errors": [],
        "result": result,
        "result_info": { "page": 1, "per_page": 100, "count": 0, "total_count": total_count }
    })
}

/// Error envelope with a single code.
pub fn api_error(code: i64, message: &str) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "errors": [{ "code": code, "message": message }],
        "result": null
    })
}

pub fn cf_record(id: &str, record_type: &str, name: &str, content: &str, proxied: bool) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "type": record_type,
        "name": name,
        "content": content,
        "ttl": 1,
        "proxied": proxied,
        "created_on": "2024-05-01T10:00:00.000000Z",
        "modified_on": "2024-05-01T10:00:00.000000Z"
    })
}
