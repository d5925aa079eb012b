//! Request descriptors and the builder that derives them from API actions.

use crate::action::{ApiAction, Method, RequestBody};
use crate::config::Settings;
use crate::error::BuildError;
use bytes::Bytes;
use std::collections::BTreeMap;

const CONTENT_TYPE: &str = "content-type";
const APPLICATION_JSON: &str = "application/json";

/// An immutable, fully resolved request ready for a transport.
///
/// Header names are stored lower-cased. Cloning is cheap: the payload is
/// reference counted, so a descriptor can be kept for lifecycle records while
/// copies go out on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    method: Method,
    url: String,
    headers: BTreeMap<String, String>,
    body: Option<Bytes>,
}

impl RequestDescriptor {
    /// Create a descriptor without headers or payload
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// HTTP method
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Target URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Headers, keyed by lower-cased name
    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Look up a header case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Payload, if any
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// A copy of this descriptor with one header set
    ///
    /// This is the usual way for a retry hook to derive the next attempt,
    /// e.g. with a refreshed `authorization` header.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] if the name or value is not a valid header.
    pub fn with_header(&self, name: &str, value: impl Into<String>) -> Result<Self, BuildError> {
        let value = value.into();
        validate_header(name, &value)?;
        let mut next = self.clone();
        next.headers.insert(name.to_ascii_lowercase(), value);
        Ok(next)
    }

    /// A copy of this descriptor with a different payload
    #[must_use]
    pub fn with_body(&self, body: impl Into<Bytes>) -> Self {
        let mut next = self.clone();
        next.body = Some(body.into());
        next
    }
}

/// Build the request descriptor for an action.
///
/// - relative endpoints are joined onto [`Settings::base_url`] when set
/// - default headers are applied first, action headers override them
/// - JSON payloads get `content-type: application/json` unless one is given
///
/// # Errors
///
/// Returns [`BuildError`] for an empty endpoint, invalid headers, or a JSON
/// payload that fails to serialize.
pub fn build_request(action: &ApiAction, settings: &Settings) -> Result<RequestDescriptor, BuildError> {
    if action.endpoint.trim().is_empty() {
        return Err(BuildError::EmptyEndpoint);
    }

    let url = match (&settings.base_url, action.endpoint.starts_with('/')) {
        (Some(base), true) => format!("{}{}", base.trim_end_matches('/'), action.endpoint),
        _ => action.endpoint.clone(),
    };

    let mut headers = BTreeMap::new();
    for (name, value) in settings.default_headers.iter().chain(&action.headers) {
        validate_header(name, value)?;
        headers.insert(name.to_ascii_lowercase(), value.clone());
    }

    let body = match &action.body {
        RequestBody::None => None,
        RequestBody::Json(value) => {
            headers
                .entry(CONTENT_TYPE.to_string())
                .or_insert_with(|| APPLICATION_JSON.to_string());
            let encoded =
                serde_json::to_vec(value).map_err(|e| BuildError::Payload(e.to_string()))?;
            Some(Bytes::from(encoded))
        },
        RequestBody::Text(text) => Some(Bytes::from(text.clone())),
        RequestBody::Bytes(bytes) => Some(Bytes::from(bytes.clone())),
    };

    Ok(RequestDescriptor {
        method: action.method,
        url,
        headers,
        body,
    })
}

pub(crate) fn validate_header(name: &str, value: &str) -> Result<(), BuildError> {
    let valid_name = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));
    if !valid_name {
        return Err(BuildError::InvalidHeaderName(name.to_string()));
    }
    if value.contains(['\r', '\n', '\0']) {
        return Err(BuildError::InvalidHeaderValue(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(base: Option<&str>) -> Settings {
        Settings {
            base_url: base.map(str::to_string),
            default_headers: BTreeMap::from([
                ("Accept".to_string(), "application/json".to_string()),
                ("X-Client".to_string(), "lifecycle".to_string()),
            ]),
        }
    }

    #[test]
    fn joins_relative_endpoint_onto_base_url() {
        let request = build_request(
            &ApiAction::get("/items"),
            &settings(Some("https://api.example.com/")),
        )
        .unwrap();
        assert_eq!(request.url(), "https://api.example.com/items");
    }

    #[test]
    fn leaves_absolute_endpoint_alone() {
        let request = build_request(
            &ApiAction::get("https://other.example.com/x"),
            &settings(Some("https://api.example.com")),
        )
        .unwrap();
        assert_eq!(request.url(), "https://other.example.com/x");
    }

    #[test]
    fn action_headers_override_defaults_case_insensitively() {
        let action = ApiAction::get("/items").with_header("accept", "text/plain");
        let request = build_request(&action, &settings(None)).unwrap();

        assert_eq!(request.header("Accept"), Some("text/plain"));
        assert_eq!(request.header("x-client"), Some("lifecycle"));
        assert_eq!(request.headers().len(), 2);
    }

    #[test]
    fn json_payload_sets_content_type_once() {
        let action = ApiAction::post("/items").with_json(json!({ "id": 1 }));
        let request = build_request(&action, &Settings::default()).unwrap();
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.body().unwrap().as_ref(), br#"{"id":1}"#);

        let action = ApiAction::post("/items")
            .with_json(json!([]))
            .with_header("Content-Type", "application/vnd.api+json");
        let request = build_request(&action, &Settings::default()).unwrap();
        assert_eq!(request.header("content-type"), Some("application/vnd.api+json"));
    }

    #[test]
    fn rejects_empty_endpoint() {
        let err = build_request(&ApiAction::get("  "), &Settings::default()).unwrap_err();
        assert_eq!(err, BuildError::EmptyEndpoint);
    }

    #[test]
    fn rejects_bad_headers() {
        let action = ApiAction::get("/a").with_header("bad name", "x");
        assert_eq!(
            build_request(&action, &Settings::default()).unwrap_err(),
            BuildError::InvalidHeaderName("bad name".into())
        );

        let action = ApiAction::get("/a").with_header("x-ok", "line\r\nbreak");
        assert_eq!(
            build_request(&action, &Settings::default()).unwrap_err(),
            BuildError::InvalidHeaderValue("x-ok".into())
        );
    }

    #[test]
    fn with_header_leaves_original_untouched() {
        let original = RequestDescriptor::new(Method::Get, "/a");
        let next = original.with_header("Authorization", "Bearer t2").unwrap();
        assert_eq!(original.header("authorization"), None);
        assert_eq!(next.header("authorization"), Some("Bearer t2"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn building_is_deterministic_and_never_touches_the_action(
                path in "/[a-z0-9/]{0,24}",
                base in prop::option::of("https://[a-z]{1,10}\\.test/?"),
                name in "[A-Za-z][A-Za-z0-9-]{0,12}",
                value in "[ -~]{0,16}",
            ) {
                let action = ApiAction::get(path.clone()).with_header(name.clone(), value.clone());
                let settings = Settings { base_url: base.clone(), ..Settings::default() };
                let before = action.clone();

                let first = build_request(&action, &settings).unwrap();
                let second = build_request(&action, &settings).unwrap();

                prop_assert_eq!(&first, &second);
                prop_assert_eq!(&action, &before);
                prop_assert!(first.url().ends_with(&path));
                prop_assert_eq!(first.header(&name), Some(value.as_str()));
                if let Some(base) = base {
                    prop_assert!(first.url().starts_with(base.trim_end_matches('/')));
                }
            }
        }
    }
}
