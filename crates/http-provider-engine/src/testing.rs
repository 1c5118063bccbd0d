//! Shared fixtures for engine tests

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use http_provider_common::crd::Mapping;

use crate::model::{ResourceSpec, ResponseCheck};

/// Fixed reconcile time used by every orchestrator test
pub(crate) const NOW_RFC3339: &str = "2024-05-01T12:00:00Z";

pub(crate) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// A spec with the given mappings and default everything else
pub(crate) fn spec_with_mappings(mappings: Vec<Mapping>) -> ResourceSpec {
    ResourceSpec {
        mappings,
        payload: Default::default(),
        headers: Default::default(),
        expected_response_check: ResponseCheck::StatusSuccess,
        is_removed_check: ResponseCheck::StatusNotFound,
        secret_injections: Vec::new(),
        secret_namespace: Some("default".to_string()),
        wait_timeout: Duration::from_secs(5),
        insecure_skip_tls_verify: false,
        rollback_retries_limit: None,
        should_loop_infinitely: false,
        next_reconcile: None,
    }
}
