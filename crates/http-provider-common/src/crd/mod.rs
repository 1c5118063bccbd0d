//! Custom Resource Definitions for the HTTP provider

mod disposable_request;
mod namespaced_request;
mod request;
mod types;

pub use disposable_request::{
    DisposableRequest, DisposableRequestParameters, DisposableRequestSpec,
};
pub use namespaced_request::{NamespacedRequest, NamespacedRequestSpec};
pub use request::{Request, RequestParameters, RequestSpec};
pub use types::{
    parse_json_or_string, Cache, Headers, HttpResponse, Mapping, Payload, RequestAction,
    RequestDetails, RequestStatus, ResponseCheckSpec, SecretInjectionConfig, SecretRef,
};
