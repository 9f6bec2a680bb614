//! Process-wide Firebase app state and Google OAuth2 access tokens.
//!
//! [`ensure_initialized`] creates the app at most once per process; later
//! calls reuse it. The app resolves its [`Credentials`] either from an
//! explicit file or from Application Default Credentials, and caches the
//! access token it obtains until shortly before expiry.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use synaptic_core::SynapticError;

/// OAuth2 scopes requested for Firestore access.
pub const FIRESTORE_SCOPES: &str =
    "https://www.googleapis.com/auth/datastore https://www.googleapis.com/auth/cloud-platform";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const EMULATOR_TOKEN: &str = "owner";
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

const EMULATOR_HOST_ENV: &str = "FIRESTORE_EMULATOR_HOST";
const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Service account key file contents.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// `gcloud auth application-default login` credentials.
#[derive(Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub quota_project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for AuthorizedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedUser")
            .field("client_id", &self.client_id)
            .field("quota_project_id", &self.quota_project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CredentialsFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
}

/// Where access tokens come from.
#[derive(Debug, Clone)]
pub enum Credentials {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
    /// GCE / Cloud Run metadata server.
    MetadataServer { token_url: String },
    /// Local Firestore emulator; no real authentication.
    Emulator { host: String },
}

impl Credentials {
    /// Read a `service_account` or `authorized_user` credentials file.
    pub fn from_file(path: &Path) -> Result<Self, SynapticError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SynapticError::Config(format!(
                "cannot read credentials file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&raw).map_err(|e| match e {
            SynapticError::Config(msg) => {
                SynapticError::Config(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Parse credentials file contents.
    pub fn from_json(raw: &str) -> Result<Self, SynapticError> {
        let file: CredentialsFile = serde_json::from_str(raw).map_err(|e| {
            SynapticError::Config(format!("unsupported or malformed credentials: {e}"))
        })?;
        Ok(match file {
            CredentialsFile::ServiceAccount(key) => Self::ServiceAccount(key),
            CredentialsFile::AuthorizedUser(user) => Self::AuthorizedUser(user),
        })
    }

    /// Resolve Application Default Credentials from the process environment.
    pub fn application_default() -> Result<Self, SynapticError> {
        Self::application_default_from(|key| std::env::var(key).ok(), dirs::config_dir())
    }

    /// Resolve Application Default Credentials using `env` for variable
    /// lookups and `config_dir` as the gcloud configuration root.
    ///
    /// Order: `FIRESTORE_EMULATOR_HOST`, `GOOGLE_APPLICATION_CREDENTIALS`,
    /// the gcloud well-known file, then the metadata server.
    pub fn application_default_from(
        env: impl Fn(&str) -> Option<String>,
        config_dir: Option<PathBuf>,
    ) -> Result<Self, SynapticError> {
        if let Some(host) = env(EMULATOR_HOST_ENV).filter(|h| !h.is_empty()) {
            return Ok(Self::Emulator { host });
        }
        if let Some(path) = env(CREDENTIALS_ENV).filter(|p| !p.is_empty()) {
            return Self::from_file(Path::new(&path));
        }
        if let Some(dir) = config_dir {
            let well_known = dir.join("gcloud").join("application_default_credentials.json");
            if well_known.is_file() {
                return Self::from_file(&well_known);
            }
        }
        Ok(Self::MetadataServer {
            token_url: METADATA_TOKEN_URL.to_string(),
        })
    }

    /// Project recorded in the credentials, if any.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::ServiceAccount(key) => key.project_id.as_deref(),
            Self::AuthorizedUser(user) => user.quota_project_id.as_deref(),
            Self::MetadataServer { .. } | Self::Emulator { .. } => None,
        }
    }

    /// REST base URL for the emulator, when these are emulator credentials.
    pub fn emulator_base_url(&self) -> Option<String> {
        match self {
            Self::Emulator { host } => Some(format!("http://{host}/v1")),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// FirebaseApp
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Authentication context shared by every client created in the process.
pub struct FirebaseApp {
    credentials: Credentials,
    http: reqwest::Client,
    token: tokio::sync::Mutex<Option<CachedToken>>,
}

impl FirebaseApp {
    pub fn new(credentials: Credentials) -> Result<Self, SynapticError> {
        // token calls are rare; skip pooling so no connection outlives the
        // runtime that opened it
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| SynapticError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            credentials,
            http,
            token: tokio::sync::Mutex::new(None),
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Return a bearer token, fetching a new one when the cached token is
    /// missing or about to expire.
    pub async fn access_token(&self) -> Result<String, SynapticError> {
        if let Credentials::Emulator { .. } = self.credentials {
            return Ok(EMULATOR_TOKEN.to_string());
        }

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + REFRESH_MARGIN {
                return Ok(token.access_token.clone());
            }
        }

        tracing::debug!("FirebaseApp: refreshing access token");
        let response = self.fetch_token().await?;
        *cached = Some(CachedToken {
            access_token: response.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(response.expires_in),
        });
        Ok(response.access_token)
    }

    async fn fetch_token(&self) -> Result<TokenResponse, SynapticError> {
        match &self.credentials {
            Credentials::ServiceAccount(key) => {
                let assertion = sign_assertion(key)?;
                let body = format!(
                    "grant_type={}&assertion={}",
                    urlencoding::encode(JWT_BEARER_GRANT),
                    urlencoding::encode(&assertion)
                );
                self.post_form(&key.token_uri, body).await
            }
            Credentials::AuthorizedUser(user) => {
                let body = format!(
                    "grant_type=refresh_token&client_id={}&client_secret={}&refresh_token={}",
                    urlencoding::encode(&user.client_id),
                    urlencoding::encode(&user.client_secret),
                    urlencoding::encode(&user.refresh_token)
                );
                self.post_form(&user.token_uri, body).await
            }
            Credentials::MetadataServer { token_url } => {
                let resp = self
                    .http
                    .get(token_url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| SynapticError::Loader(format!("metadata server token: {e}")))?;
                parse_token_response(resp).await
            }
            Credentials::Emulator { .. } => Ok(TokenResponse {
                access_token: EMULATOR_TOKEN.to_string(),
                expires_in: default_expires_in(),
            }),
        }
    }

    async fn post_form(&self, url: &str, body: String) -> Result<TokenResponse, SynapticError> {
        let resp = self
            .http
            .post(url)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await
            .map_err(|e| SynapticError::Loader(format!("token exchange: {e}")))?;
        parse_token_response(resp).await
    }
}

async fn parse_token_response(resp: reqwest::Response) -> Result<TokenResponse, SynapticError> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(SynapticError::Loader(format!(
            "token exchange failed ({status}): {text}"
        )));
    }
    resp.json()
        .await
        .map_err(|e| SynapticError::Loader(format!("token response parse: {e}")))
}

fn sign_assertion(key: &ServiceAccountKey) -> Result<String, SynapticError> {
    let iat = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| SynapticError::Config(format!("system clock before epoch: {e}")))?
        .as_secs();
    let claims = JwtClaims {
        iss: &key.client_email,
        scope: FIRESTORE_SCOPES,
        aud: &key.token_uri,
        iat,
        exp: iat + 3600,
    };

    let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
    header.kid = key.private_key_id.clone();
    let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| SynapticError::Config(format!("invalid service account private key: {e}")))?;

    jsonwebtoken::encode(&header, &claims, &encoding_key)
        .map_err(|e| SynapticError::Config(format!("cannot sign token assertion: {e}")))
}

// ---------------------------------------------------------------------------
// Process-wide app
// ---------------------------------------------------------------------------

static DEFAULT_APP: Mutex<Option<Arc<FirebaseApp>>> = Mutex::new(None);

/// The process-wide app, if one has been initialized.
pub fn get_app() -> Option<Arc<FirebaseApp>> {
    DEFAULT_APP
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Initialize the process-wide app, or return it if it already exists.
///
/// With `credentials_path` the app authenticates with that file; otherwise
/// it uses Application Default Credentials. Once an app exists, later calls
/// return it regardless of the path they pass.
pub fn ensure_initialized(
    credentials_path: Option<&Path>,
) -> Result<Arc<FirebaseApp>, SynapticError> {
    let mut slot = DEFAULT_APP.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(app) = slot.as_ref() {
        tracing::debug!("FirebaseApp: already initialized, reusing it");
        return Ok(Arc::clone(app));
    }

    let credentials = match credentials_path {
        Some(path) => {
            tracing::debug!(
                "FirebaseApp: initializing with credentials file {}",
                path.display()
            );
            Credentials::from_file(path)?
        }
        None => {
            tracing::debug!("FirebaseApp: initializing with application default credentials");
            Credentials::application_default()?
        }
    };

    let app = Arc::new(FirebaseApp::new(credentials)?);
    *slot = Some(Arc::clone(&app));
    Ok(app)
}
