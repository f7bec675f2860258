//! GoTrue互換の認証APIクライアント

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;

use super::{AdminUser, AuthProvider, Session};
use crate::config::BackendConfig;
use crate::content::rest::{build_client, check_status, transport_error};
use crate::content::BackendError;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

fn default_expires_in() -> u64 {
    3600
}

impl TryFrom<UserResponse> for AdminUser {
    type Error = BackendError;

    fn try_from(user: UserResponse) -> Result<Self, Self::Error> {
        let email = user
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| BackendError::Decode("user has no email address".to_string()))?;
        Ok(AdminUser { id: user.id, email })
    }
}

impl TryFrom<TokenResponse> for Session {
    type Error = BackendError;

    fn try_from(token: TokenResponse) -> Result<Self, Self::Error> {
        Ok(Session {
            access_token: token.access_token,
            expires_in: Duration::from_secs(token.expires_in),
            user: token.user.try_into()?,
        })
    }
}

/// `/auth/v1` 以下のエンドポイントを呼ぶ認証プロバイダー
#[derive(Debug, Clone)]
pub struct RestAuthProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestAuthProvider {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        Ok(Self {
            client: build_client()?,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn with_key(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("apikey", &self.api_key)
    }

    async fn token(&self, grant_type: &str, body: serde_json::Value) -> Result<Session, BackendError> {
        let response = self
            .with_key(self.client.post(self.endpoint("token")))
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        // 資格情報の誤りは400で返る
        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            return Err(BackendError::Unauthorized("invalid credentials".to_string()));
        }
        let token: TokenResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        token.try_into()
    }
}

#[async_trait]
impl AuthProvider for RestAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        debug!("Signing in via auth API");
        let session = self
            .token("password", json!({ "email": email, "password": password }))
            .await?;
        info!("Auth API accepted sign-in for user {}", session.user.id);
        Ok(session)
    }

    async fn exchange_code(&self, code: &str) -> Result<Session, BackendError> {
        debug!("Exchanging authorization code");
        self.token("pkce", json!({ "auth_code": code })).await
    }

    async fn get_user(&self, access_token: &str) -> Result<AdminUser, BackendError> {
        let response = self
            .with_key(self.client.get(self.endpoint("user")))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;
        let user: UserResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        user.try_into()
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let response = self
            .with_key(self.client.post(self.endpoint("logout")))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn provider_for(server: &MockServer) -> RestAuthProvider {
        RestAuthProvider::new(&BackendConfig { url: server.base_url(), api_key: "anon-key".into() }).unwrap()
    }

    #[tokio::test]
    async fn test_sign_in_success() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/v1/token")
                    .query_param("grant_type", "password")
                    .header("apikey", "anon-key")
                    .json_body(json!({ "email": "dr@example.com", "password": "pw" }));
                then.status(200).json_body(json!({
                    "access_token": "jwt-token",
                    "token_type": "bearer",
                    "expires_in": 7200,
                    "refresh_token": "r",
                    "user": { "id": "u-1", "email": "dr@example.com", "role": "authenticated" }
                }));
            })
            .await;

        let session = provider_for(&server).sign_in("dr@example.com", "pw").await.unwrap();
        mock.assert_async().await;
        assert_eq!(session.access_token, "jwt-token");
        assert_eq!(session.expires_in, Duration::from_secs(7200));
        assert_eq!(session.user, AdminUser { id: "u-1".into(), email: "dr@example.com".into() });
    }

    #[tokio::test]
    async fn test_sign_in_invalid_credentials() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/v1/token");
                then.status(400).json_body(json!({ "error": "invalid_grant" }));
            })
            .await;

        let result = provider_for(&server).sign_in("dr@example.com", "wrong").await;
        assert!(matches!(result, Err(BackendError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/v1/token")
                    .query_param("grant_type", "pkce")
                    .json_body(json!({ "auth_code": "abc123" }));
                then.status(200).json_body(json!({
                    "access_token": "from-code",
                    "user": { "id": "u-2", "email": "office@example.com" }
                }));
            })
            .await;

        let session = provider_for(&server).exchange_code("abc123").await.unwrap();
        mock.assert_async().await;
        assert_eq!(session.access_token, "from-code");
        assert_eq!(session.expires_in, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_get_user() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/auth/v1/user").header("authorization", "Bearer good");
                then.status(200).json_body(json!({ "id": "u-1", "email": "dr@example.com" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/auth/v1/user").header("authorization", "Bearer expired");
                then.status(401).json_body(json!({ "msg": "JWT expired" }));
            })
            .await;

        let provider = provider_for(&server);
        assert_eq!(provider.get_user("good").await.unwrap().email, "dr@example.com");
        assert!(matches!(provider.get_user("expired").await, Err(BackendError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_user_without_email_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/auth/v1/user");
                then.status(200).json_body(json!({ "id": "phone-user", "email": "" }));
            })
            .await;
        assert!(matches!(provider_for(&server).get_user("t").await, Err(BackendError::Decode(_))));
    }

    #[tokio::test]
    async fn test_sign_out() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/v1/logout").header("authorization", "Bearer tok");
                then.status(204);
            })
            .await;
        provider_for(&server).sign_out("tok").await.unwrap();
        mock.assert_async().await;
    }
}
