use async_trait::async_trait;
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    Client as OAuth2Client, ClientId, EndpointNotSet, EndpointSet, ExtraTokenFields, RefreshToken,
    StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::info;
use url::Url;

use crate::error::OauthError;

/// What the issuer handed back for a `refresh_token` grant.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_in: Option<u64>,
}

impl std::fmt::Debug for RefreshedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshedToken")
            .field("access_token", &"<redacted>")
            .field("rotated_refresh_token", &self.refresh_token.is_some())
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(
        &self,
        refresh_token: &str,
        client_id: &str,
    ) -> Result<RefreshedToken, OauthError>;
}

/// OpenID `id_token` plus anything else the issuer adds. Debug output is redacted.
#[derive(Clone, Deserialize, Serialize)]
struct IssuerTokenFields {
    id_token: Option<String>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

impl ExtraTokenFields for IssuerTokenFields {}

impl std::fmt::Debug for IssuerTokenFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.extra.keys().collect();
        keys.sort();
        f.debug_struct("IssuerTokenFields")
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("extra_keys", &keys)
            .finish()
    }
}

type IssuerTokenResponse = StandardTokenResponse<IssuerTokenFields, BasicTokenType>;

type IssuerClient = OAuth2Client<
    BasicErrorResponse,
    IssuerTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// `refresh_token` grant against the OpenAI token endpoint via the `oauth2` crate.
#[derive(Debug, Clone)]
pub struct OauthRefresher {
    http: reqwest::Client,
    token_url: TokenUrl,
}

impl OauthRefresher {
    /// `http` should carry the issuer timeout and must not follow redirects.
    pub fn new(http: reqwest::Client, token_url: &Url) -> Result<Self, OauthError> {
        let token_url = TokenUrl::new(token_url.to_string())
            .map_err(|e| OauthError::Endpoint(e.to_string()))?;
        Ok(Self { http, token_url })
    }

    fn client(&self, client_id: &str) -> IssuerClient {
        OAuth2Client::new(ClientId::new(client_id.to_string()))
            .set_token_uri(self.token_url.clone())
    }
}

#[async_trait]
impl TokenRefresher for OauthRefresher {
    async fn refresh(
        &self,
        refresh_token: &str,
        client_id: &str,
    ) -> Result<RefreshedToken, OauthError> {
        let token: IssuerTokenResponse = self
            .client(client_id)
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await?;

        info!(
            expires_in = ?token.expires_in().map(|d| d.as_secs()),
            rotated = token.refresh_token().is_some(),
            "Codex OAuth2 refresh completed"
        );

        Ok(RefreshedToken {
            access_token: token.access_token().secret().clone(),
            refresh_token: token.refresh_token().map(|t| t.secret().clone()),
            id_token: token.extra_fields().id_token.clone(),
            expires_in: token.expires_in().map(|d| d.as_secs()),
        })
    }
}
