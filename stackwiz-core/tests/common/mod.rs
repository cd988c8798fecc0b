//! Shared test helpers: environment-free configuration and assertion macros

#![allow(dead_code)]

use std::collections::HashMap;

use stackwiz_core::types::StackSpec;
use stackwiz_core::StackwizConfig;

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

/// Assert that a `Result` is `Err` and unwrap the error (fails the test otherwise).
#[macro_export]
macro_rules! require_err {
    ($expr:expr $(,)?) => {{
        let res = $expr;
        assert!(res.is_err(), "expected Err(..), got Ok");
        let Err(err) = res else {
            return;
        };
        err
    }};
}

/// Configuration loaded from a fixed variable set instead of the process environment.
pub fn config_from(vars: &[(&str, &str)]) -> stackwiz_core::CoreResult<StackwizConfig> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    StackwizConfig::from_lookup(|key| vars.get(key).cloned(), false)
}

pub fn generic_spec(name: &str, image: &str, port: i64) -> StackSpec {
    StackSpec {
        name: name.to_string(),
        image: Some(image.to_string()),
        port: Some(port),
        ..StackSpec::default()
    }
}
