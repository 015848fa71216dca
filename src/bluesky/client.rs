//! Authenticated XRPC client.
//!
//! `XrpcClient` wraps a `reqwest::Client` together with the session obtained
//! at login. All effects executed through one client act as the same account,
//! which is why `FeedEffect` variants carry no account information.

use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Credentials;
use crate::types::{Did, Handle};

use super::error::{XrpcError, XrpcErrorBody};

/// The logged-in account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub did: Did,
    pub handle: Handle,
}

#[derive(Clone)]
struct Tokens {
    access_jwt: String,
    refresh_jwt: String,
}

#[derive(Serialize)]
struct CreateSessionInput<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionOutput {
    access_jwt: String,
    refresh_jwt: String,
    handle: Handle,
    did: Did,
}

/// An XRPC client bound to one authenticated account.
pub struct XrpcClient {
    http: reqwest::Client,
    service: String,
    session: Session,
    tokens: RwLock<Tokens>,
}

impl XrpcClient {
    /// Logs in with an identifier (handle or email) and app password.
    pub async fn login(credentials: &Credentials) -> Result<Self, XrpcError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("repost-bot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(XrpcError::from_reqwest)?;
        let service = credentials.service.trim_end_matches('/').to_string();

        let url = format!("{service}/xrpc/com.atproto.server.createSession");
        let response = http
            .post(&url)
            .json(&CreateSessionInput {
                identifier: &credentials.identifier,
                password: &credentials.password,
            })
            .send()
            .await
            .map_err(XrpcError::from_reqwest)?;
        let output: SessionOutput = read_json(response).await?;

        info!(handle = %output.handle, did = %output.did, "Logged in");
        Ok(XrpcClient {
            http,
            service,
            session: Session {
                did: output.did,
                handle: output.handle,
            },
            tokens: RwLock::new(Tokens {
                access_jwt: output.access_jwt,
                refresh_jwt: output.refresh_jwt,
            }),
        })
    }

    /// The account this client acts as.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Performs an authenticated GET, refreshing the session once if it expired.
    pub(crate) async fn query<T: DeserializeOwned>(
        &self,
        nsid: &str,
        params: &[(&str, String)],
    ) -> Result<T, XrpcError> {
        match self.query_once(nsid, params).await {
            Err(e) if e.is_auth_expired() => {
                self.refresh_session().await?;
                self.query_once(nsid, params).await
            }
            other => other,
        }
    }

    /// Performs an authenticated POST, refreshing the session once if it expired.
    pub(crate) async fn procedure<I: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        nsid: &str,
        input: &I,
    ) -> Result<T, XrpcError> {
        match self.procedure_once(nsid, input).await {
            Err(e) if e.is_auth_expired() => {
                self.refresh_session().await?;
                self.procedure_once(nsid, input).await
            }
            other => other,
        }
    }

    async fn query_once<T: DeserializeOwned>(
        &self,
        nsid: &str,
        params: &[(&str, String)],
    ) -> Result<T, XrpcError> {
        debug!(nsid, "XRPC query");
        let response = self
            .http
            .get(self.endpoint(nsid))
            .bearer_auth(self.access_jwt())
            .query(params)
            .send()
            .await
            .map_err(XrpcError::from_reqwest)?;
        read_json(response).await
    }

    async fn procedure_once<I: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        nsid: &str,
        input: &I,
    ) -> Result<T, XrpcError> {
        debug!(nsid, "XRPC procedure");
        let response = self
            .http
            .post(self.endpoint(nsid))
            .bearer_auth(self.access_jwt())
            .json(input)
            .send()
            .await
            .map_err(XrpcError::from_reqwest)?;
        read_json(response).await
    }

    async fn refresh_session(&self) -> Result<(), XrpcError> {
        warn!(handle = %self.session.handle, "Access token expired, refreshing session");
        let refresh_jwt = self.read_tokens().refresh_jwt;
        let response = self
            .http
            .post(self.endpoint("com.atproto.server.refreshSession"))
            .bearer_auth(refresh_jwt)
            .send()
            .await
            .map_err(XrpcError::from_reqwest)?;
        let output: SessionOutput = read_json(response).await?;

        let mut tokens = self
            .tokens
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *tokens = Tokens {
            access_jwt: output.access_jwt,
            refresh_jwt: output.refresh_jwt,
        };
        Ok(())
    }

    fn endpoint(&self, nsid: &str) -> String {
        format!("{}/xrpc/{}", self.service, nsid)
    }

    fn access_jwt(&self) -> String {
        self.read_tokens().access_jwt
    }

    fn read_tokens(&self) -> Tokens {
        self.tokens
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl std::fmt::Debug for XrpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XrpcClient")
            .field("service", &self.service)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Decodes a successful response body, or categorizes the failure.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, XrpcError> {
    let status = response.status();
    if !status.is_success() {
        // The error body is best-effort; some proxies answer with HTML.
        let body = response
            .json::<XrpcErrorBody>()
            .await
            .unwrap_or_default();
        return Err(XrpcError::from_status(status.as_u16(), body));
    }
    let bytes = response.bytes().await.map_err(XrpcError::from_reqwest)?;
    serde_json::from_slice(&bytes).map_err(|e| XrpcError::malformed(e.to_string()))
}
