use reqwest::StatusCode;

use crate::api::{ApiResponse, RequestDescriptor};

/// Decides where bearer tokens go and which responses mean "token rejected".
///
/// Implementations must be pure: no I/O, no shared state.
pub trait AuthenticationPolicy: Send + Sync {
    fn requires_authentication(&self, request: &RequestDescriptor) -> bool;

    fn is_unauthorized_response(&self, response: &ApiResponse) -> bool {
        response.status == StatusCode::UNAUTHORIZED
    }
}

/// Attaches a token to every request except those whose path is listed
/// in `excluded_paths` (login, the refresh endpoint itself).
#[derive(Debug, Clone, Default)]
pub struct BearerPolicy {
    excluded_paths: Vec<String>,
}

impl BearerPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_excluded_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded_paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl AuthenticationPolicy for BearerPolicy {
    fn requires_authentication(&self, request: &RequestDescriptor) -> bool {
        let path = request.path();
        let path = path.trim_end_matches('/');
        !self
            .excluded_paths
            .iter()
            .any(|excluded| excluded.trim_end_matches('/') == path)
    }
}
