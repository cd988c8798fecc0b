//! Cloudflare request execution and envelope handling

use serde::de::DeserializeOwned;

use crate::error::{ProviderError, Result};
use crate::http_client::{ApiRequest, ApiResponse, HttpUtils};
use crate::traits::{ErrorContext, ProviderErrorMapper, RawApiError};
use crate::utils::log_sanitizer::truncate_for_log;

use super::CloudflareProvider;
use super::types::CloudflareError;
use super::CloudflareResponse;

impl CloudflareProvider {
    /// Execute a request and return the unwrapped `result`
    pub(crate) async fn request<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        context: ErrorContext,
    ) -> Result<T> {
        let envelope: CloudflareResponse<T> = self.send(&request, context).await?;
        envelope
            .result
            .ok_or_else(|| self.parse_error("response is missing the `result` field"))
    }

    /// Execute a list request, returning the page items and the total count
    pub(crate) async fn request_paginated<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        context: ErrorContext,
    ) -> Result<(Vec<T>, u32)> {
        let envelope: CloudflareResponse<Vec<T>> = self.send(&request, context).await?;
        let items = envelope.result.unwrap_or_default();
        let total_count = envelope.result_info.map_or_else(
            || u32::try_from(items.len()).unwrap_or(u32::MAX),
            |info| info.total_count,
        );
        Ok((items, total_count))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        context: ErrorContext,
    ) -> Result<CloudflareResponse<T>> {
        let response = HttpUtils::execute_with_retry(
            self.transport.as_ref(),
            request,
            self.provider_name(),
            self.retry,
        )
        .await?;

        if !response.is_success() {
            return Err(self.error_from_response(&response, context));
        }

        let envelope: CloudflareResponse<T> =
            HttpUtils::parse_json(&response.body, self.provider_name())?;

        if !envelope.success {
            let raw = raw_api_error(envelope.errors.as_deref()).status(response.status);
            log::error!("[{}] API error: {}", self.provider_name(), raw.message);
            return Err(self.map_error(raw, context));
        }

        Ok(envelope)
    }

    /// Non-2xx responses: use the error list when the body carries one
    fn error_from_response(&self, response: &ApiResponse, context: ErrorContext) -> ProviderError {
        let errors = serde_json::from_str::<CloudflareResponse<serde_json::Value>>(&response.body)
            .ok()
            .and_then(|envelope| envelope.errors)
            .filter(|errors| !errors.is_empty());

        if let Some(errors) = errors {
            let raw = raw_api_error(Some(&errors)).status(response.status);
            log::warn!(
                "[{}] HTTP {} with API error: {}",
                self.provider_name(),
                response.status,
                raw.message
            );
            return self.map_error(raw, context);
        }

        log::warn!(
            "[{}] HTTP {}: {}",
            self.provider_name(),
            response.status,
            truncate_for_log(&response.body)
        );
        match response.status {
            401 => ProviderError::InvalidCredentials {
                provider: self.provider_name().to_string(),
                raw_message: Some(response.body.clone()),
            },
            403 => ProviderError::PermissionDenied {
                provider: self.provider_name().to_string(),
                raw_message: Some(response.body.clone()),
            },
            status => self.unknown_error(RawApiError::new(response.body.clone()).status(status)),
        }
    }
}

/// Collapse Cloudflare's error list (including nested chains) into one raw error.
/// The first code drives the mapping; messages are joined as `[code] message; ...`.
fn raw_api_error(errors: Option<&[CloudflareError]>) -> RawApiError {
    let Some(errors) = errors.filter(|e| !e.is_empty()) else {
        return RawApiError::new("Unknown error");
    };

    let mut parts = Vec::new();
    collect_messages(errors, &mut parts);

    RawApiError::with_code(errors[0].code.to_string(), parts.join("; "))
}

fn collect_messages(errors: &[CloudflareError], out: &mut Vec<String>) {
    for error in errors {
        out.push(format!("[{}] {}", error.code, error.message));
        if let Some(chain) = &error.error_chain {
            collect_messages(chain, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors(json: &str) -> Vec<CloudflareError> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn joins_codes_and_messages() {
        let list = errors(
            r#"[{"code":81057,"message":"The record already exists."},
                {"code":1004,"message":"DNS Validation Error"}]"#,
        );
        let raw = raw_api_error(Some(&list));
        assert_eq!(raw.code.as_deref(), Some("81057"));
        assert_eq!(
            raw.message,
            "[81057] The record already exists.; [1004] DNS Validation Error"
        );
    }

    #[test]
    fn includes_error_chain() {
        let list = errors(
            r#"[{"code":1004,"message":"DNS Validation Error",
                 "error_chain":[{"code":9005,"message":"Content must be an IPv4 address"}]}]"#,
        );
        let raw = raw_api_error(Some(&list));
        assert_eq!(raw.code.as_deref(), Some("1004"));
        assert!(raw.message.contains("[9005] Content must be an IPv4 address"));
    }

    #[test]
    fn empty_list_is_unknown() {
        let raw = raw_api_error(Some(&[]));
        assert!(raw.code.is_none());
        assert_eq!(raw.message, "Unknown error");
    }
}
