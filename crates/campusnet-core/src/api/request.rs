use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};

use super::ClientError;

/// A serialized HTTP request as supplied by a caller.
///
/// The client never mutates a descriptor; attaching credentials produces a
/// modified copy via [`RequestDescriptor::with_bearer`].
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Absolute URL, or a path resolved against the configured base URL.
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn post_json<B: Serialize>(url: impl Into<String>, body: &B) -> Result<Self, ClientError> {
        Self::new(Method::POST, url).with_json(body)
    }

    pub fn put_json<B: Serialize>(url: impl Into<String>, body: &B) -> Result<Self, ClientError> {
        Self::new(Method::PUT, url).with_json(body)
    }

    fn with_json<B: Serialize>(mut self, body: &B) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_vec(body)?);
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(self)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, ClientError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ClientError::InvalidRequest(format!("header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ClientError::InvalidRequest(format!("header value for {}: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Copy of this request carrying `Authorization: Bearer <token>`,
    /// replacing any Authorization header already present.
    pub fn with_bearer(&self, token: &str) -> Result<Self, ClientError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ClientError::InvalidRequest("access token is not a valid header value".to_string()))?;
        value.set_sensitive(true);

        let mut copy = self.clone();
        copy.headers.insert(header::AUTHORIZATION, value);
        Ok(copy)
    }

    /// Path component of the URL, without query string.
    pub fn path(&self) -> String {
        match Url::parse(&self.url) {
            Ok(url) => url.path().to_string(),
            Err(_) => {
                let end = self.url.find(['?', '#']).unwrap_or(self.url.len());
                self.url[..end].to_string()
            }
        }
    }
}

/// A completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Return self on 2xx, otherwise a `RequestFailed` carrying the body.
    pub fn error_for_status(self) -> Result<Self, ClientError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ClientError::from_status(self.status, &self.text()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_bearer_leaves_original_untouched() {
        let original = RequestDescriptor::get("/notices");
        let authed = original.with_bearer("tok").unwrap();

        assert!(original.headers.get(header::AUTHORIZATION).is_none());
        assert_eq!(
            authed.headers.get(header::AUTHORIZATION).unwrap(),
            "Bearer tok"
        );
    }

    #[test]
    fn test_with_bearer_overwrites_existing_header() {
        let request = RequestDescriptor::get("/notices")
            .with_header("Authorization", "Basic abc")
            .unwrap()
            .with_bearer("fresh")
            .unwrap();

        let values: Vec<_> = request.headers.get_all(header::AUTHORIZATION).iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], "Bearer fresh");
    }

    #[test]
    fn test_with_bearer_rejects_invalid_token() {
        let result = RequestDescriptor::get("/notices").with_bearer("bad\ntoken");
        assert!(matches!(result, Err(ClientError::InvalidRequest(_))));
    }

    #[test]
    fn test_post_json_sets_body_and_content_type() {
        let request =
            RequestDescriptor::post_json("/attendance", &serde_json::json!({ "present": true }))
                .unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(
            request.headers.get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(request.body.as_deref(), Some(&br#"{"present":true}"#[..]));
    }

    #[test]
    fn test_path_of_absolute_and_relative_urls() {
        assert_eq!(
            RequestDescriptor::get("https://api.example.com/auth/login?x=1").path(),
            "/auth/login"
        );
        assert_eq!(RequestDescriptor::get("/groups/7?page=2").path(), "/groups/7");
        assert_eq!(RequestDescriptor::get("/groups").path(), "/groups");
    }

    #[test]
    fn test_error_for_status() {
        let ok = ApiResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: b"{}".to_vec(),
        };
        assert!(ok.error_for_status().is_ok());

        let missing = ApiResponse {
            status: StatusCode::NOT_FOUND,
            headers: HeaderMap::new(),
            body: b"no such group".to_vec(),
        };
        assert!(matches!(
            missing.error_for_status(),
            Err(ClientError::RequestFailed { status: 404, ref body }) if body == "no such group"
        ));
    }
}
