//! Cloudflare error mapping
//!
//! Reference: <https://developers.cloudflare.com/api/> (error codes in the `errors` array)

use crate::error::ProviderError;
use crate::traits::{ErrorContext, ProviderErrorMapper, RawApiError};

use super::CloudflareProvider;

/// What a Cloudflare error code tells us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeClass {
    /// Token missing, malformed or not authorized
    Credentials,
    /// Request rejected because of the named parameter
    Parameter(&'static str),
    /// A conflicting record is already there (81053-81058)
    RecordExists,
    /// 81044
    RecordMissing,
    /// No route to the zone (7000, 7003)
    ZoneMissing,
}

fn classify(code: &str) -> Option<CodeClass> {
    let class = match code {
        "6003" | "6103" | "6111" | "9109" | "10000" => CodeClass::Credentials,
        "1004" => CodeClass::Parameter("general"),
        "9000" => CodeClass::Parameter("name"),
        "9005" | "9006" | "9009" => CodeClass::Parameter("value"),
        "9021" => CodeClass::Parameter("ttl"),
        "9041" => CodeClass::Parameter("proxied"),
        "81053" | "81054" | "81055" | "81056" | "81057" | "81058" => CodeClass::RecordExists,
        "81044" => CodeClass::RecordMissing,
        "7000" | "7003" => CodeClass::ZoneMissing,
        _ => return None,
    };
    Some(class)
}

fn or_unknown(value: Option<String>) -> String {
    value.unwrap_or_else(|| "<unknown>".to_string())
}

impl ProviderErrorMapper for CloudflareProvider {
    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }

    fn map_error(&self, raw: RawApiError, context: ErrorContext) -> ProviderError {
        let Some(class) = raw.code.as_deref().and_then(classify) else {
            return self.unknown_error(raw);
        };
        let provider = self.provider_name().to_string();

        match class {
            CodeClass::Credentials => ProviderError::InvalidCredentials {
                provider,
                raw_message: Some(raw.message),
            },
            CodeClass::Parameter(param) => ProviderError::InvalidParameter {
                provider,
                param: param.to_string(),
                detail: raw.message,
            },
            CodeClass::RecordExists => ProviderError::RecordExists {
                provider,
                record_name: or_unknown(context.record_name),
                raw_message: Some(raw.message),
            },
            CodeClass::RecordMissing => ProviderError::RecordNotFound {
                provider,
                record_id: or_unknown(context.record_id),
                raw_message: Some(raw.message),
            },
            CodeClass::ZoneMissing => ProviderError::ZoneNotFound {
                provider,
                domain: or_unknown(context.domain),
                raw_message: Some(raw.message),
            },
        }
    }
}
