//! # Token Store
//!
//! Per-platform shared secrets, persisted as JSON:
//!
//! ```json
//! {"tokens": [{"platform": "alpha", "token": "<128 hex chars>"}]}
//! ```
//!
//! Initialization computes the desired token set (requested platforms plus
//! `"default"` when fallback is enabled), keeps every secret already on disk,
//! generates the missing ones, and persists at most once. After initialization
//! the store is read-only and shared between connections without locking.

use crate::config::TokenConfig;
use crate::error::{Result, VotifierError};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Platform name of the fallback token
pub const DEFAULT_PLATFORM: &str = "default";

/// Random bytes behind each generated secret
pub const SECRET_BYTES: usize = 64;

/// Shared secret bound to a platform
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    platform: String,
    #[serde(rename = "token")]
    secret: String,
}

impl Token {
    pub fn new(platform: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            secret: secret.into(),
        }
    }

    /// Create a token with a fresh 512-bit secret rendered as hex.
    pub fn generate(platform: impl Into<String>) -> Self {
        let mut bytes = [0u8; SECRET_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self::new(platform, hex::encode(bytes))
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// HMAC key: the secret's bytes as stored, with no decoding or derivation.
    pub fn key(&self) -> &[u8] {
        self.secret.as_bytes()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("platform", &self.platform)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// On-disk layout of the token file
#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenFile {
    tokens: Vec<Token>,
}

/// Loaded set of platform tokens
#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    tokens: Vec<Token>,
    index: HashMap<String, usize>,
    use_default_token: bool,
}

impl TokenStore {
    /// Build the store described by a [`TokenConfig`].
    pub fn from_config(config: &TokenConfig) -> Result<Self> {
        Self::initialize(
            &config.token_file,
            &config.platforms,
            config.use_default_token,
        )
    }

    /// Load or create the token file and provision every requested platform.
    ///
    /// # Errors
    /// - [`VotifierError::TokenStore`] if the file cannot be read, parsed or written
    /// - [`VotifierError::NoTokens`] if the resulting set is empty
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn initialize<P, S>(path: P, platforms: &[S], use_default_token: bool) -> Result<Self>
    where
        P: AsRef<Path>,
        S: AsRef<str>,
    {
        let path = path.as_ref().to_path_buf();
        let existed = path.exists();

        let loaded = if existed {
            Self::load(&path)?
        } else {
            info!("Token file not found, generating new tokens");
            Vec::new()
        };

        let mut store = Self {
            path,
            tokens: Vec::with_capacity(loaded.len()),
            index: HashMap::new(),
            use_default_token,
        };

        for token in loaded {
            if store.index.contains_key(token.platform()) {
                warn!(platform = %token.platform(), "Duplicate platform in token file, keeping the first entry");
                continue;
            }
            store.insert(token);
        }

        let mut desired: Vec<&str> = platforms.iter().map(|p| p.as_ref()).collect();
        if use_default_token {
            desired.push(DEFAULT_PLATFORM);
        }

        let mut added = 0usize;
        for platform in desired {
            if !store.index.contains_key(platform) {
                info!(platform = %platform, "Adding platform to the token store");
                store.insert(Token::generate(platform));
                added += 1;
            }
        }

        if store.tokens.is_empty() {
            return Err(VotifierError::NoTokens);
        }

        if !existed || added > 0 {
            store.persist()?;
        } else {
            debug!("Token file already up to date");
        }

        Ok(store)
    }

    fn load(path: &Path) -> Result<Vec<Token>> {
        let contents = fs::read_to_string(path).map_err(|e| {
            VotifierError::TokenStore(format!("Failed to read {}: {e}", path.display()))
        })?;
        let file: TokenFile = serde_json::from_str(&contents).map_err(|e| {
            VotifierError::TokenStore(format!("Failed to parse {}: {e}", path.display()))
        })?;
        Ok(file.tokens)
    }

    fn insert(&mut self, token: Token) {
        self.index.insert(token.platform().to_string(), self.tokens.len());
        self.tokens.push(token);
    }

    /// Write the whole set to disk through a temporary file and a rename.
    fn persist(&self) -> Result<()> {
        let write_err = |e: std::io::Error| {
            VotifierError::TokenStore(format!("Failed to write {}: {e}", self.path.display()))
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        let file = TokenFile {
            tokens: self.tokens.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let mut tmp_name = self.path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, json).map_err(write_err)?;
        restrict_permissions(&tmp_path).map_err(write_err)?;
        fs::rename(&tmp_path, &self.path).map_err(write_err)?;

        info!(tokens = self.tokens.len(), "Token file written");
        Ok(())
    }

    /// Resolve the signing token for a service.
    ///
    /// Exact platform match first; otherwise the `"default"` token when fallback
    /// is enabled; otherwise `None`.
    pub fn lookup(&self, service_name: &str) -> Option<&Token> {
        self.get(service_name).or_else(|| {
            if self.use_default_token {
                self.get(DEFAULT_PLATFORM)
            } else {
                None
            }
        })
    }

    /// Exact platform match, without fallback.
    pub fn get(&self, platform: &str) -> Option<&Token> {
        self.index.get(platform).map(|&i| &self.tokens[i])
    }

    /// Platform names in file order
    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(Token::platform)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn uses_default_fallback(&self) -> bool {
        self.use_default_token
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
