//! OCI distribution API client.
//!
//! Only manifest existence is checked: `HEAD` or `GET`
//! `/v2/<repository>/manifests/<reference>`. Requests are anonymous unless
//! credentials are configured; a `401` carrying a Bearer challenge is answered
//! once with a token from the challenge's realm.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{ACCEPT, WWW_AUTHENTICATE};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;

use super::{ImageReference, RegistryError};
use crate::config::RegistryConfig;

const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.index.v1+json, \
application/vnd.oci.image.manifest.v1+json, \
application/vnd.docker.distribution.manifest.list.v2+json, \
application/vnd.docker.distribution.manifest.v2+json";

static CHALLENGE_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\w+)="([^"]*)""#).expect("valid challenge regex"));

/// Anything that can answer manifest lookups.
#[async_trait]
pub trait ManifestStore: Send + Sync {
    async fn head_manifest(&self, image: &ImageReference) -> Result<(), RegistryError>;
    async fn get_manifest(&self, image: &ImageReference) -> Result<(), RegistryError>;
}

/// Basic credentials for the registry and its token service.
#[derive(Debug, Clone)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
enum Auth {
    Anonymous,
    Basic(RegistryCredentials),
    Bearer(String),
}

/// Parameters of a `WWW-Authenticate: Bearer ...` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

impl BearerChallenge {
    pub fn parse(header: &str) -> Option<Self> {
        let (scheme, params) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for caps in CHALLENGE_PARAM.captures_iter(params) {
            let value = caps[2].to_string();
            match &caps[1] {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }
        Some(Self {
            realm: realm?,
            service,
            scope,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// HTTP client for OCI distribution registries.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: Client,
    credentials: Option<RegistryCredentials>,
    insecure_registries: Vec<String>,
}

impl RegistryClient {
    pub fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("chart-injector/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let credentials = match (&config.username, &config.password) {
            (Some(username), Some(password)) => Some(RegistryCredentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };
        Ok(Self {
            http,
            credentials,
            insecure_registries: config.insecure_registries.clone(),
        })
    }

    pub fn with_credentials(mut self, credentials: RegistryCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Plain HTTP for loopback hosts and configured insecure registries.
    fn scheme(&self, host: &str) -> &'static str {
        let name = host.split(':').next().unwrap_or(host);
        let insecure = name == "localhost"
            || name == "127.0.0.1"
            || self.insecure_registries.iter().any(|r| r == host || r == name);
        if insecure { "http" } else { "https" }
    }

    pub fn manifest_url(&self, image: &ImageReference) -> String {
        let host = image.api_host();
        format!(
            "{}://{}/v2/{}/manifests/{}",
            self.scheme(host),
            host,
            image.repository,
            image.reference
        )
    }

    async fn send(&self, method: Method, url: &str, auth: &Auth) -> Result<Response, RegistryError> {
        let request = self.http.request(method, url).header(ACCEPT, MANIFEST_ACCEPT);
        let request = match auth {
            Auth::Anonymous => request,
            Auth::Basic(c) => request.basic_auth(&c.username, Some(&c.password)),
            Auth::Bearer(token) => request.bearer_auth(token),
        };
        Ok(request.send().await?)
    }

    async fn fetch_token(
        &self,
        challenge: &BearerChallenge,
        image: &ImageReference,
    ) -> Result<String, RegistryError> {
        let scope = challenge
            .scope
            .clone()
            .unwrap_or_else(|| format!("repository:{}:pull", image.repository));
        let mut params = Vec::new();
        if let Some(service) = &challenge.service {
            params.push(format!("service={}", urlencoding::encode(service)));
        }
        params.push(format!("scope={}", urlencoding::encode(&scope)));
        let sep = if challenge.realm.contains('?') { '&' } else { '?' };
        let url = format!("{}{}{}", challenge.realm, sep, params.join("&"));

        let mut request = self.http.get(&url);
        if let Some(c) = &self.credentials {
            request = request.basic_auth(&c.username, Some(&c.password));
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(RegistryError::Auth(format!(
                "token service returned {}",
                response.status()
            )));
        }
        let body: TokenResponse = response.json().await?;
        body.token
            .or(body.access_token)
            .ok_or_else(|| RegistryError::Auth("token response has no token".to_string()))
    }

    async fn check(&self, method: Method, image: &ImageReference) -> Result<(), RegistryError> {
        let url = self.manifest_url(image);
        let initial = match &self.credentials {
            Some(c) => Auth::Basic(c.clone()),
            None => Auth::Anonymous,
        };

        let mut response = self.send(method.clone(), &url, &initial).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            let challenge = response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .and_then(BearerChallenge::parse);
            if let Some(challenge) = challenge {
                log::debug!("Answering bearer challenge from {}", challenge.realm);
                let token = self.fetch_token(&challenge, image).await?;
                response = self.send(method, &url, &Auth::Bearer(token)).await?;
            }
        }

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::NOT_FOUND {
            Err(RegistryError::NotFound(image.to_string()))
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(RegistryError::Auth(format!("{} for {}", status, url)))
        } else {
            Err(RegistryError::Status {
                status: status.as_u16(),
                url,
            })
        }
    }
}

#[async_trait]
impl ManifestStore for RegistryClient {
    async fn head_manifest(&self, image: &ImageReference) -> Result<(), RegistryError> {
        self.check(Method::HEAD, image).await
    }

    async fn get_manifest(&self, image: &ImageReference) -> Result<(), RegistryError> {
        self.check(Method::GET, image).await
    }
}
