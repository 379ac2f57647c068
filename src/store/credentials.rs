//! Firestore 访问令牌
//!
//! 两种来源：
//! - 直接给出的 OAuth 访问令牌（`FIRESTORE_ACCESS_TOKEN`，优先）
//! - 服务账号 JSON 密钥（`FIRESTORE_CREDENTIALS`）：用私钥签一个 RS256 JWT，
//!   按 JWT bearer 流程向 `token_uri` 换取访问令牌，过期前自动刷新

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::FirestoreAuth;

/// Firestore 所需的 OAuth scope
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// 签发的断言有效期（Google 上限一小时）
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// 距过期不足该秒数时提前刷新
const REFRESH_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// 服务账号 JSON 密钥中用到的字段
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

// 私钥不进日志
impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read service account key {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid service account key {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(content)?;
        if key.client_email.trim().is_empty() {
            return Err(anyhow!("service account key has no client_email"));
        }
        Ok(key)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// 用服务账号密钥换取并缓存访问令牌
#[derive(Debug)]
pub struct ServiceAccountTokens {
    key: ServiceAccountKey,
    client: reqwest::blocking::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokens {
    pub fn new(key: ServiceAccountKey, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| anyhow!("Cannot create HTTP client: {}", e))?;

        Ok(Self {
            key,
            client,
            cached: Mutex::new(None),
        })
    }

    pub fn key(&self) -> &ServiceAccountKey {
        &self.key
    }

    /// 签发 JWT bearer 断言
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: DATASTORE_SCOPE.to_string(),
            aud: self.key.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .context("Invalid service account private key")?;
        encode(&header, &claims, &signing_key).context("Failed to sign service account assertion")
    }

    fn exchange(&self, now: DateTime<Utc>) -> Result<CachedToken> {
        let assertion = self.assertion(now)?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .with_context(|| format!("Token request to {} failed", self.key.token_uri))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(anyhow!(
                "Token endpoint returned {}: {}",
                status,
                body.trim()
            ));
        }

        let token: TokenResponse = response.json().context("Invalid token response")?;
        let lifetime = token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        info!(
            client_email = %self.key.client_email,
            expires_in = lifetime,
            "Obtained Firestore access token"
        );
        Ok(CachedToken {
            token: token.access_token,
            expires_at: now + ChronoDuration::seconds(lifetime),
        })
    }

    /// 当前可用的访问令牌（缓存未过期则复用）
    pub fn access_token(&self) -> Result<String> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| anyhow!("token cache lock poisoned"))?;

        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - ChronoDuration::seconds(REFRESH_MARGIN_SECS) > now {
                return Ok(token.token.clone());
            }
            debug!("Cached Firestore access token expiring, refreshing");
        }

        let fresh = self.exchange(now)?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

/// Firestore 请求使用的令牌来源
#[derive(Debug)]
pub enum TokenProvider {
    Static(String),
    ServiceAccount(ServiceAccountTokens),
}

impl TokenProvider {
    pub fn from_auth(auth: &FirestoreAuth, timeout_secs: u64) -> Result<Self> {
        match auth {
            FirestoreAuth::AccessToken(token) => Ok(TokenProvider::Static(token.clone())),
            FirestoreAuth::ServiceAccountFile(path) => {
                let key = ServiceAccountKey::from_file(path)?;
                debug!(client_email = %key.client_email, "Loaded service account key");
                Ok(TokenProvider::ServiceAccount(ServiceAccountTokens::new(
                    key,
                    timeout_secs,
                )?))
            }
        }
    }

    pub fn access_token(&self) -> Result<String> {
        match self {
            TokenProvider::Static(token) => Ok(token.clone()),
            TokenProvider::ServiceAccount(tokens) => tokens.access_token(),
        }
    }
}
