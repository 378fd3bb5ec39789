use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::api::router::{dispatch, parse_query, ApiRequest, ApiResponse};
use crate::app::AppState;

/// JSON API over HTTP/1, one task per connection
pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn bind(bind_address: &str, port: u16) -> Result<TcpListener> {
        let addr: SocketAddr =
            format!("{}:{}", bind_address, port).parse().context("Failed to parse bind address")?;
        TcpListener::bind(addr).await.context("Failed to bind API server")
    }

    /// Accept connections until the listener fails
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!("API server listening on {}", listener.local_addr()?);

        loop {
            let (stream, peer_addr) =
                listener.accept().await.context("Failed to accept connection")?;

            debug!("New connection from {}", peer_addr);

            let state = Arc::clone(&self.state);
            let io = TokioIo::new(stream);

            tokio::task::spawn(async move {
                let service =
                    service_fn(move |req| Self::handle_request(Arc::clone(&state), req));

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Connection error: {}", err);
                }
            });
        }
    }

    async fn handle_request(
        state: Arc<AppState>,
        req: Request<Incoming>,
    ) -> Result<Response<BoxBody<Bytes, Infallible>>, hyper::Error> {
        let (parts, body) = req.into_parts();

        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                error!("Failed to read request body: {}", e);
                return Ok(Self::json_response(ApiResponse {
                    status: StatusCode::BAD_REQUEST,
                    body: json!({ "error": "Failed to read request body" }),
                }));
            }
        };

        let request = ApiRequest {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(parse_query).unwrap_or_default(),
            headers: parts.headers,
            body,
        };

        let response = dispatch(&state, request).await;
        Ok(Self::json_response(response))
    }

    fn json_response(response: ApiResponse) -> Response<BoxBody<Bytes, Infallible>> {
        let payload = Bytes::from(response.body.to_string());
        let mut http = Response::new(Full::new(payload).map_err(|never| match never {}).boxed());
        *http.status_mut() = response.status;
        http.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        http
    }
}
