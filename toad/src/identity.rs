//! Connected identity and token-login session handling.
//!
//! An [`Identity`] is either a wallet address handed over by the wallet
//! provider or an address derived from an OpenID token (token login). The
//! token-login session is persisted as a small JSON file so the CLI can
//! reuse it between runs.
//!
//! The token-login address derivation here is a placeholder: it hashes the
//! token's `sub`/`aud` claims with the salt and is NOT a sound on-chain
//! account derivation. Treat such addresses as display identities only.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use url::Url;

use toad_proto::object::Address;

/// OpenID authorization endpoint used for token login.
pub const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// File name of the persisted login session.
pub const SESSION_FILE: &str = "session.json";

const NONCE_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const NONCE_LEN: usize = 13;

/// Errors from identity and session handling.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The token is not a three-part JWT with a JSON payload.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// A required claim is missing from the token payload.
    #[error("token is missing the `{0}` claim")]
    MissingClaim(&'static str),

    /// The authorization URL could not be built.
    #[error("invalid authorization url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The session file could not be read or written.
    #[error("session file {path}: {source}")]
    Io {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The session could not be serialized.
    #[error("failed to encode session: {0}")]
    Encode(#[from] serde_json::Error),

    /// Could not determine the user's config directory.
    #[error("could not determine config directory")]
    NoConfigDir,
}

/// How the identity was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// A connected wallet.
    Wallet,
    /// An address derived from an OpenID token.
    TokenLogin,
}

/// The account the client acts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Account address.
    pub address: Address,
    /// Where the address came from.
    pub source: IdentitySource,
}

impl Identity {
    /// A wallet identity.
    #[must_use]
    pub const fn wallet(address: Address) -> Self {
        Self {
            address,
            source: IdentitySource::Wallet,
        }
    }

    /// A token-login identity.
    #[must_use]
    pub const fn token_login(address: Address) -> Self {
        Self {
            address,
            source: IdentitySource::TokenLogin,
        }
    }
}

/// A random lower-case alphanumeric nonce for the authorization request.
#[must_use]
pub fn generate_nonce() -> String {
    let mut rng = rand::rng();
    (0..NONCE_LEN)
        .map(|_| char::from(NONCE_ALPHABET[rng.random_range(0..NONCE_ALPHABET.len())]))
        .collect()
}

/// Builds the OpenID authorization URL requesting an id token.
///
/// # Errors
///
/// Returns [`IdentityError::InvalidUrl`] if the endpoint cannot be parsed.
pub fn authorization_url(client_id: &str, redirect_uri: &str, nonce: &str) -> Result<Url, IdentityError> {
    let mut url = Url::parse(AUTH_ENDPOINT)?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "id_token")
        .append_pair("scope", "openid email profile")
        .append_pair("nonce", nonce);
    Ok(url)
}

/// Decodes the payload (second segment) of a JWT without verifying it.
///
/// # Errors
///
/// Returns [`IdentityError::MalformedToken`] if the token has no payload
/// segment or the payload is not base64-encoded JSON.
pub fn decode_claims(jwt: &str) -> Result<Value, IdentityError> {
    let payload = jwt
        .split('.')
        .nth(1)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| IdentityError::MalformedToken("no payload segment".into()))?;
    let trimmed = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .map_err(|e| IdentityError::MalformedToken(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| IdentityError::MalformedToken(e.to_string()))
}

fn claim_text(claims: &Value, name: &'static str) -> Result<String, IdentityError> {
    match claims.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(",")),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(IdentityError::MissingClaim(name)),
    }
}

/// Derives the token-login display address: `0x` followed by the first 40
/// hex characters of `sha256("{sub}:{aud}:{salt}")`.
///
/// Placeholder derivation, not a real account address scheme.
///
/// # Errors
///
/// Returns an error if the token cannot be decoded or lacks `sub` / `aud`.
pub fn derive_login_address(jwt: &str, salt: &str) -> Result<Address, IdentityError> {
    let claims = decode_claims(jwt)?;
    let sub = claim_text(&claims, "sub")?;
    let aud = claim_text(&claims, "aud")?;
    let digest = Sha256::digest(format!("{sub}:{aud}:{salt}").as_bytes());
    let hash = hex::encode(digest);
    Ok(Address::new(format!("0x{}", &hash[..40])))
}

/// A completed token login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginSession {
    /// Derived address.
    pub address: Address,
    /// The id token returned by the provider.
    pub jwt: String,
    /// Salt used for the derivation (the request nonce).
    pub salt: String,
}

impl LoginSession {
    /// Completes a login from the provider's id token and the nonce sent
    /// with the authorization request.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be derived from the token.
    pub fn complete(jwt: &str, nonce: &str) -> Result<Self, IdentityError> {
        let address = derive_login_address(jwt, nonce)?;
        tracing::info!(%address, "token login completed");
        Ok(Self {
            address,
            jwt: jwt.to_string(),
            salt: nonce.to_string(),
        })
    }

    /// The identity this session stands for.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::token_login(self.address.clone())
    }
}

/// Persists a [`LoginSession`] as a JSON file.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// A store at an explicit path.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The store at `<config dir>/toad/session.json`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NoConfigDir`] if there is no config directory.
    pub fn default_location() -> Result<Self, IdentityError> {
        let dir = dirs::config_dir().ok_or(IdentityError::NoConfigDir)?;
        Ok(Self::new(dir.join("toad").join(SESSION_FILE)))
    }

    /// Path of the session file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the saved session.
    ///
    /// A missing or unreadable file means no session; a corrupt file is
    /// logged and treated the same way.
    #[must_use]
    pub fn load(&self) -> Option<LoginSession> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), err = %e, "cannot read session file");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), err = %e, "ignoring corrupt session file");
                None
            }
        }
    }

    /// Whether a session is saved.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.load().is_some()
    }

    /// Saves `session`, creating the parent directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Io`] if the file cannot be written.
    pub fn save(&self, session: &LoginSession) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| IdentityError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, json).map_err(|source| IdentityError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Removes the saved session. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Io`] if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<(), IdentityError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(IdentityError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
