use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose, Engine as _};

use crate::error::{GatewayError, Result};

/// Path segment between the project id and the escaped file path
pub const REPOSITORY_FILES_ROOT: &str = "/repository/files/";

/// Suffix selecting the raw (undecorated) file contents
pub const RAW_SUFFIX: &str = "/raw";

/// Header GitLab expects the personal access token in
pub const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Inbound path split into the pieces the GitLab API needs.
///
/// `file_path` keeps nested components joined with a literal `%2F` so the
/// whole path survives as a single segment in the upstream URL; the
/// repository-files endpoint expects it pre-escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartLocation {
    pub project_id: String,
    pub file_path: String,
}

impl ChartLocation {
    /// Parse an inbound URL path of the form `/<project-id>/<path>/<to>/<file>`.
    ///
    /// The project id is taken verbatim; nothing checks that it is numeric or
    /// slug-safe, GitLab accepts both forms.
    pub fn parse(path: &str) -> Result<Self> {
        let segments: Vec<&str> = path.split('/').skip(1).collect();

        // Need at least a project id and one file component
        if segments.len() < 2 {
            return Err(GatewayError::InvalidRequest(
                "Invalid URL. Use 'http://<host>:<port>/<gitlab-project-id>/<path-to-file>'"
                    .to_string(),
            ));
        }

        Ok(Self {
            project_id: segments[0].to_string(),
            file_path: segments[1..].join("%2F"),
        })
    }

    /// Build the upstream URL for this location.
    ///
    /// Example: `https://gitlab.com/api/v4/projects/123/repository/files/charts%2Ffoo-1.0.0.tgz/raw`
    pub fn upstream_url(&self, api_url: &str) -> String {
        format!(
            "{}{}{}{}{}",
            api_url, self.project_id, REPOSITORY_FILES_ROOT, self.file_path, RAW_SUFFIX
        )
    }
}

/// Extract the GitLab token from a Basic `Authorization` header.
///
/// The decoded credential is `subject:secret`; only the secret is forwarded.
/// GitLab authenticates by token alone, so the subject is discarded.
pub fn extract_token(headers: &HeaderMap) -> Result<String> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            GatewayError::InvalidRequest(
                "Failed to convert auth token. You must provide a username and password."
                    .to_string(),
            )
        })?;

    let encoded = header.split_whitespace().nth(1).ok_or_else(|| {
        GatewayError::InvalidRequest(
            "Failed to convert auth token. You must provide a username and password.".to_string(),
        )
    })?;

    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| GatewayError::InvalidRequest(format!("Failed to convert auth token: {}", e)))?;

    let credentials = String::from_utf8(decoded).map_err(|e| {
        GatewayError::InvalidRequest(format!("Failed to convert auth token: {}", e))
    })?;

    // Everything after the first colon; tokens may themselves contain colons
    let (_subject, secret) = credentials.split_once(':').ok_or_else(|| {
        GatewayError::InvalidRequest(
            "Failed to convert auth token: missing ':' separator".to_string(),
        )
    })?;

    Ok(secret.to_string())
}
