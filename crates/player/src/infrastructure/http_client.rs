//! HTTP adapter for the game server's info, version and move endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use url::Url;

use boardsync_protocol::{
    InfoQuery, InfoResponse, MoveRequest, MoveResponse, VersionQuery, VersionResponse,
};

use crate::ports::outbound::{ApiError, GameApiPort};

/// Default request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Game API client over reqwest.
///
/// `base_url` is the game's root, `<server>/api/game/<name>/<id>/`; endpoint
/// paths are joined onto it.
#[derive(Clone)]
pub struct ReqwestGameApi {
    client: Client,
    base_url: Url,
}

impl ReqwestGameApi {
    pub fn new(base_url: Url) -> Self {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: Url, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, base_url }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::transport(format!("invalid endpoint {path}: {e}")))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        tracing::debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ApiError::transport)?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::HttpStatus {
            status: status.as_u16(),
            body,
        });
    }
    response.json().await.map_err(ApiError::decode)
}

#[async_trait]
impl GameApiPort for ReqwestGameApi {
    async fn fetch_info(&self, query: InfoQuery) -> Result<InfoResponse, ApiError> {
        self.get(&query.path()).await
    }

    async fn fetch_version(&self, query: VersionQuery) -> Result<VersionResponse, ApiError> {
        self.get(&query.path()).await
    }

    async fn submit_move(&self, request: MoveRequest) -> Result<MoveResponse, ApiError> {
        let url = self.endpoint(MoveRequest::PATH)?;
        tracing::debug!(%url, move_type = %request.move_type, "POST");
        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(ApiError::transport)?;
        decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> ReqwestGameApi {
        ReqwestGameApi::new(Url::parse("http://localhost:8888/api/game/memory/g-1/").unwrap())
    }

    #[test]
    fn endpoints_are_relative_to_the_game_root() {
        let query = VersionQuery {
            target: 5,
            player: 1,
            admin: false,
            auto_current_player: false,
            from: 3,
        };
        assert_eq!(
            api().endpoint(&query.path()).unwrap().as_str(),
            "http://localhost:8888/api/game/memory/g-1/version/5?player=1&admin=0&current=0&from=3"
        );
        assert_eq!(
            api().endpoint(MoveRequest::PATH).unwrap().as_str(),
            "http://localhost:8888/api/game/memory/g-1/move"
        );
    }
}
