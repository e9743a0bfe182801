use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

use crate::api::{
    DiscretizeAllRequest, DiscretizeAllResponse, DiscretizeRequest, DiscretizeResponse,
    ErrorResponse, ImageResponse, PlotRequest, ProfileRequest,
};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Message reported by the server (or the endpoint's fallback)
    #[error("{0}")]
    Server(String),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// HTTP client of the trajectory server
#[derive(Clone)]
pub struct TrajectoryClient {
    client: Client,
    base_url: String,
}

impl TrajectoryClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        request: &Req,
        fallback: &str,
    ) -> Result<Resp, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::trace!("POST {}", url);

        let res = self.client.post(&url).json(request).send().await?;
        let status = res.status();
        let body = res.bytes().await?;

        if status != StatusCode::OK {
            let message = serde_json::from_slice::<ErrorResponse>(&body)
                .map(|e| e.error)
                .ok()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| fallback.to_owned());
            tracing::debug!("{} -> {}: {}", path, status, message);
            return Err(ClientError::Server(message));
        }

        serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// PNG of the piecewise function, base64
    pub async fn plot(&self, request: &PlotRequest) -> Result<ImageResponse, ClientError> {
        self.post("/plot", request, "Error plotting").await
    }

    /// PNG of the motor profile, base64
    pub async fn profile(&self, request: &ProfileRequest) -> Result<ImageResponse, ClientError> {
        self.post("/profile", request, "Error plotting profile").await
    }

    pub async fn discretize(
        &self,
        request: &DiscretizeRequest,
    ) -> Result<DiscretizeResponse, ClientError> {
        self.post("/discretize", request, "Discretization failed")
            .await
    }

    pub async fn discretize_all(
        &self,
        request: &DiscretizeAllRequest,
    ) -> Result<DiscretizeAllResponse, ClientError> {
        self.post(
            "/discretize_all",
            request,
            "Discretization of all axes failed",
        )
        .await
    }
}

#[cfg(test)]
mod test {
    use axum::{http::StatusCode, routing::post, Json, Router};

    use super::*;
    use crate::api::FunctionRow;

    async fn serve(app: Router) -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service());
        tokio::spawn(server);
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_server_messages() {
        let app = Router::new()
            .route(
                "/plot",
                post(|| async {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(ErrorResponse {
                            error: "Invalid domain on row 1. Use start,end".to_owned(),
                        }),
                    )
                }),
            )
            .route(
                "/profile",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            )
            .route(
                "/discretize",
                post(|Json(req): Json<DiscretizeRequest>| async move {
                    Json(DiscretizeResponse {
                        segments: vec![crate::discretize::Segment {
                            domain: req.functions[0].domain.clone(),
                            dt: 1.0,
                            angles: vec![0.0, 1.0],
                        }],
                    })
                }),
            );
        let client = TrajectoryClient::new(serve(app).await).unwrap();
        let functions = vec![FunctionRow::new("x", "0,1")];

        let err = client
            .plot(&PlotRequest {
                functions: functions.clone(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid domain on row 1. Use start,end");

        let err = client
            .profile(&ProfileRequest {
                functions: functions.clone(),
                resolution: Default::default(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Error plotting profile");

        let res = client
            .discretize(&DiscretizeRequest {
                functions,
                resolution: Default::default(),
            })
            .await
            .unwrap();
        assert_eq!(res.segments[0].domain, "0,1");

        // not routed
        let err = client
            .discretize_all(&DiscretizeAllRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Discretization of all axes failed");
    }
}
