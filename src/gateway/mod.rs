pub mod dump;
pub mod translate;

use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{GatewayError, Result as GatewayResult};
use translate::{ChartLocation, TOKEN_HEADER};

/// Translates chart-fetch requests into GitLab repository-files API calls.
///
/// One instance serves both listeners; it owns the shared outbound client and
/// carries no per-request state.
pub struct Gateway {
    config: Arc<Config>,
    client: reqwest::Client,
}

impl Gateway {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        // No timeout: a chart download takes as long as GitLab takes
        let client = reqwest::Client::builder()
            .user_agent(concat!("chartlab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self { config, client })
    }

    /// Process a single chart request end to end.
    pub async fn handle(&self, req: Request) -> GatewayResult<Response> {
        let request_id = Uuid::new_v4();

        if self.config.verbose {
            debug!(%request_id, "Incoming request:\n{}", dump::inbound(&req));
        }

        let location = ChartLocation::parse(req.uri().path())?;
        let token = translate::extract_token(req.headers())?;
        let upstream = self.build_upstream(&location, &token)?;

        if self.config.verbose {
            debug!(%request_id, "API request:\n{}", dump::upstream(&upstream));
        }

        debug!(
            %request_id,
            project_id = %location.project_id,
            file_path = %location.file_path,
            "Fetching file from GitLab"
        );

        let response = self
            .client
            .execute(upstream)
            .await
            .map_err(|e| GatewayError::UpstreamDispatch(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayError::UpstreamRead(e.to_string()))?;

        // The body is relayed byte for byte. The upstream status is propagated
        // too, so a missing chart surfaces as 404 instead of an empty success;
        // upstream headers are dropped.
        Ok(Response::builder()
            .status(StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::OK))
            .body(Body::from(body))
            .unwrap_or_else(|e| {
                error!("Failed to build response: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }))
    }

    fn build_upstream(&self, location: &ChartLocation, token: &str) -> GatewayResult<reqwest::Request> {
        let url = reqwest::Url::parse(&location.upstream_url(&self.config.api_url))
            .map_err(|e| GatewayError::UpstreamRequest(e.to_string()))?;

        let mut upstream = reqwest::Request::new(reqwest::Method::GET, url);
        let value = reqwest::header::HeaderValue::from_str(token)
            .map_err(|e| GatewayError::UpstreamRequest(e.to_string()))?;
        upstream.headers_mut().insert(TOKEN_HEADER, value);

        Ok(upstream)
    }
}

/// Build the router served by every listener.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/*path", any(fetch_chart))
        .fallback(fetch_chart)
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

async fn fetch_chart(State(gateway): State<Arc<Gateway>>, req: Request) -> Response {
    match gateway.handle(req).await {
        Ok(response) => response,
        Err(e) => {
            error!("{}", e);
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::header;
    use base64::{engine::general_purpose, Engine as _};
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Clone, Debug)]
    struct Captured {
        uri: String,
        token: Option<String>,
    }

    /// Stand-in for the GitLab API: records what it was asked and answers
    /// with a fixed status and body plus one header that must not leak
    /// through to the client.
    async fn spawn_upstream(
        status: StatusCode,
        body: &'static [u8],
    ) -> (String, Arc<Mutex<Option<Captured>>>) {
        let captured: Arc<Mutex<Option<Captured>>> = Arc::new(Mutex::new(None));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = captured.clone();
        let app = Router::new().fallback(move |req: Request| {
            let state = state.clone();
            async move {
                *state.lock().unwrap() = Some(Captured {
                    uri: req.uri().to_string(),
                    token: req
                        .headers()
                        .get(TOKEN_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .map(String::from),
                });
                (status, [("x-gitlab-feature-category", "source_code")], body)
            }
        });

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/projects/", addr), captured)
    }

    fn test_router(api_url: String) -> Router {
        let config = Arc::new(Config {
            api_url,
            ..Config::default()
        });
        router(Arc::new(Gateway::new(config).unwrap()))
    }

    fn chart_request(path: &str, credentials: Option<&str>) -> Request {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(credentials) = credentials {
            builder = builder.header(
                header::AUTHORIZATION,
                format!("Basic {}", general_purpose::STANDARD.encode(credentials)),
            );
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_relays_body_and_forwards_token() {
        let payload: &[u8] = &[0x1f, 0x8b, 0x00, 0xff, 0x00, 0x7f];
        let (api_url, captured) = spawn_upstream(StatusCode::OK, payload).await;
        let app = test_router(api_url);

        let response = app
            .oneshot(chart_request("/123/charts/foo-1.0.0.tgz", Some("user:sometoken")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-gitlab-feature-category").is_none());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], payload);

        let captured = captured.lock().unwrap().clone().unwrap();
        assert_eq!(
            captured.uri,
            "/projects/123/repository/files/charts%2Ffoo-1.0.0.tgz/raw"
        );
        assert_eq!(captured.token.as_deref(), Some("sometoken"));
    }

    #[tokio::test]
    async fn test_relays_empty_body() {
        let (api_url, _) = spawn_upstream(StatusCode::OK, b"").await;
        let app = test_router(api_url);

        let response = app
            .oneshot(chart_request("/123/index.yaml", Some("user:sometoken")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_propagates_upstream_status() {
        let (api_url, _) = spawn_upstream(StatusCode::NOT_FOUND, b"404 File Not Found").await;
        let app = test_router(api_url);

        let response = app
            .oneshot(chart_request("/123/missing.tgz", Some("user:sometoken")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"404 File Not Found");
    }

    #[tokio::test]
    async fn test_short_path_rejected_before_dispatch() {
        let (api_url, captured) = spawn_upstream(StatusCode::OK, b"unused").await;
        let app = test_router(api_url);

        let response = app
            .oneshot(chart_request("/123", Some("user:sometoken")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(captured.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected() {
        let (api_url, _) = spawn_upstream(StatusCode::OK, b"unused").await;
        let app = test_router(api_url);

        let response = app
            .oneshot(chart_request("/123/chart.tgz", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("username and password"));
    }

    #[tokio::test]
    async fn test_credential_without_colon_rejected() {
        let (api_url, _) = spawn_upstream(StatusCode::OK, b"unused").await;
        let app = test_router(api_url);

        let response = app
            .oneshot(chart_request("/123/chart.tgz", Some("tokenwithoutcolon")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_returns_500() {
        // Port 1 is never listening
        let app = test_router("http://127.0.0.1:1/projects/".to_string());

        let response = app
            .oneshot(chart_request("/123/chart.tgz", Some("user:sometoken")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("Failed to send API request"));
    }
}
