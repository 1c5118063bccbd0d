//! Action mapper
//!
//! A mapping naming the action wins. Otherwise the first mapping without an
//! action whose method implies it (`POST` create, `GET` observe, `PUT`/`PATCH`
//! update, `DELETE` remove) is used.

use http_provider_common::crd::{Mapping, RequestAction};

use crate::error::ReconcileError;
use crate::model::ResourceSpec;

/// Resolve the mapping for `action`
///
/// # Errors
///
/// Returns [`ReconcileError::NoMapping`] when no mapping serves the action.
pub fn resolve(spec: &ResourceSpec, action: RequestAction) -> Result<&Mapping, ReconcileError> {
    spec.mappings
        .iter()
        .find(|m| m.action == Some(action))
        .or_else(|| {
            spec.mappings.iter().find(|m| {
                m.action.is_none() && RequestAction::implied_by_method(&m.method) == Some(action)
            })
        })
        .ok_or(ReconcileError::NoMapping(action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spec_with_mappings;

    fn mapping(action: Option<RequestAction>, method: &str, url: &str) -> Mapping {
        Mapping {
            action,
            method: method.to_string(),
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn explicit_action_wins_over_method() {
        let spec = spec_with_mappings(vec![
            mapping(None, "POST", "https://implied"),
            mapping(Some(RequestAction::Create), "PUT", "https://explicit"),
        ]);
        let found = resolve(&spec, RequestAction::Create).expect("create mapping");
        assert_eq!(found.url, "https://explicit");
    }

    #[test]
    fn falls_back_to_method() {
        let spec = spec_with_mappings(vec![
            mapping(None, "get", "https://observe"),
            mapping(None, "PATCH", "https://update"),
            mapping(None, "DELETE", "https://remove"),
        ]);
        assert_eq!(
            resolve(&spec, RequestAction::Observe).expect("observe").url,
            "https://observe"
        );
        assert_eq!(
            resolve(&spec, RequestAction::Update).expect("update").url,
            "https://update"
        );
        assert_eq!(
            resolve(&spec, RequestAction::Remove).expect("remove").url,
            "https://remove"
        );
    }

    #[test]
    fn explicitly_bound_mapping_is_not_reused_by_method() {
        let spec = spec_with_mappings(vec![mapping(
            Some(RequestAction::Update),
            "POST",
            "https://update",
        )]);
        assert!(matches!(
            resolve(&spec, RequestAction::Create),
            Err(ReconcileError::NoMapping(RequestAction::Create))
        ));
    }

    #[test]
    fn missing_mapping_is_reported() {
        let spec = spec_with_mappings(vec![]);
        assert!(matches!(
            resolve(&spec, RequestAction::Observe),
            Err(ReconcileError::NoMapping(RequestAction::Observe))
        ));
    }
}
