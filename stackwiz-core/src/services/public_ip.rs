//! Server public IP detection through external echo services

use std::future::Future;
use std::net::IpAddr;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CoreError, CoreResult};
use crate::traits::PublicIpResolver;

const REQUEST_TIMEOUT_SECS: u64 = 5;

/// Echo services, queried in order
pub const DEFAULT_IP_SERVICES: [&str; 3] = [
    "https://ipv4.icanhazip.com",
    "https://api.ipify.org",
    "https://ifconfig.me/ip",
];

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .unwrap_or_default()
});

/// [`PublicIpResolver`] that asks plain-text IP echo services
pub struct EchoServiceResolver {
    services: Vec<String>,
}

impl EchoServiceResolver {
    pub fn new(services: Vec<String>) -> Self {
        Self { services }
    }
}

impl Default for EchoServiceResolver {
    fn default() -> Self {
        Self::new(DEFAULT_IP_SERVICES.iter().map(ToString::to_string).collect())
    }
}

#[async_trait]
impl PublicIpResolver for EchoServiceResolver {
    async fn resolve(&self) -> CoreResult<IpAddr> {
        first_valid_ip(&self.services, |url| async move {
            let response = HTTP_CLIENT
                .get(&url)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            if !response.status().is_success() {
                return Err(format!("HTTP {}", response.status()));
            }
            response.text().await.map_err(|e| e.to_string())
        })
        .await
    }
}

/// Query `services` in order with `fetch` and return the first body that parses as an IP
/// literal. Unreachable services and invalid payloads move on to the next one.
pub async fn first_valid_ip<F, Fut>(services: &[String], fetch: F) -> CoreResult<IpAddr>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<String, String>>,
{
    let mut failures = Vec::with_capacity(services.len());
    for service in services {
        match fetch(service.clone()).await {
            Ok(body) => match body.trim().parse::<IpAddr>() {
                Ok(ip) => {
                    log::debug!("Public IP {ip} detected via {service}");
                    return Ok(ip);
                }
                Err(_) => {
                    log::warn!("IP service {service} returned an invalid payload");
                    failures.push(format!("{service}: invalid payload"));
                }
            },
            Err(e) => {
                log::warn!("IP service {service} unreachable: {e}");
                failures.push(format!("{service}: {e}"));
            }
        }
    }
    Err(CoreError::IpDetectionFailed(if failures.is_empty() {
        "no IP services configured".to_string()
    } else {
        failures.join("; ")
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn services() -> Vec<String> {
        vec!["one".into(), "two".into(), "three".into()]
    }

    #[tokio::test]
    async fn skips_failures_and_garbage() {
        let calls = AtomicUsize::new(0);
        let ip = first_valid_ip(&services(), |url| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                match url.as_str() {
                    "one" => Err("connection refused".to_string()),
                    "two" => Ok("<html>blocked</html>".to_string()),
                    _ => Ok("203.0.113.7\n".to_string()),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(ip, "203.0.113.7".parse::<IpAddr>().unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_at_first_valid() {
        let calls = AtomicUsize::new(0);
        let ip = first_valid_ip(&services(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("2001:db8::1".to_string()) }
        })
        .await
        .unwrap();
        assert!(ip.is_ipv6());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_failing_is_detection_failure() {
        let err = first_valid_ip(&services(), |_| async { Err("timeout".to_string()) })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::IpDetectionFailed(msg) if msg.contains("three")));
    }
}
