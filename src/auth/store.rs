use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use yup_oauth2::ApplicationSecret;

use crate::auth::scopes::{Scope, DEFAULT_SCOPE};
use crate::auth::token::TokenRecord;
use crate::error::Error;

pub const CLIENT_SECRETS_FILE: &str = "credentials.json";
pub const TOKEN_FILE: &str = "token.json";
pub const SCOPE_FILE: &str = "scope.txt";

static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// On-disk home of the client configuration, scope setting, and token cache.
/// All writes go through `write_atomic` so an interrupted process never
/// leaves a torn file behind.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// `~/.gmail_credentials`, matching where the setup instructions tell the
    /// user to place `credentials.json`.
    pub fn default_dir() -> Result<PathBuf, Error> {
        let home = dirs::home_dir().ok_or_else(|| {
            Error::LocalIo(io::Error::new(
                io::ErrorKind::NotFound,
                "unable to determine the user's home directory",
            ))
        })?;
        Ok(home.join(".gmail_credentials"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn client_config_path(&self) -> PathBuf {
        self.dir.join(CLIENT_SECRETS_FILE)
    }

    pub fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    pub fn scope_path(&self) -> PathBuf {
        self.dir.join(SCOPE_FILE)
    }

    pub fn client_config_present(&self) -> bool {
        self.client_config_path().exists()
    }

    /// Parse the Google "installed app" client secret JSON.
    pub async fn load_client_config(&self) -> Result<ApplicationSecret, Error> {
        let path = self.client_config_path();
        if !path.exists() {
            return Err(Error::ConfigurationMissing(path));
        }
        let secret = yup_oauth2::read_application_secret(&path).await?;
        Ok(secret)
    }

    /// Read the persisted scope, defaulting to `modify` when no scope has
    /// ever been set. An unrecognized persisted value is an error, never
    /// silently coerced.
    pub fn load_scope(&self) -> Result<Scope, Error> {
        let path = self.scope_path();
        if !path.exists() {
            return Ok(DEFAULT_SCOPE);
        }
        let raw = fs::read_to_string(&path)?;
        raw.trim().parse()
    }

    /// The raw scope file contents, for status reporting.
    pub fn raw_scope(&self) -> Option<String> {
        fs::read_to_string(self.scope_path())
            .ok()
            .map(|s| s.trim().to_string())
    }

    pub fn save_scope(&self, scope: Scope) -> Result<(), Error> {
        self.ensure_dir()?;
        write_atomic(&self.scope_path(), scope.as_str().as_bytes())?;
        Ok(())
    }

    pub fn load_token(&self) -> Result<Option<TokenRecord>, Error> {
        let path = self.token_path();
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)?;
        let record: TokenRecord = serde_json::from_str(&data)?;
        Ok(Some(record))
    }

    pub fn save_token(&self, record: &TokenRecord) -> Result<(), Error> {
        self.ensure_dir()?;
        let data = serde_json::to_string_pretty(record)?;
        write_atomic(&self.token_path(), data.as_bytes())?;
        Ok(())
    }

    pub fn delete_token(&self) -> Result<(), Error> {
        let path = self.token_path();
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn ensure_dir(&self) -> Result<(), Error> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }
}

/// Write to a uniquely named temp file in the same directory, then rename
/// over the target. Rename is atomic on the same filesystem, so concurrent
/// invocations degrade to last-writer-wins rather than interleaved bytes.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("state");
    let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_file_name(format!(
        ".{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        seq
    ));
    fs::write(&tmp, bytes)?;
    match fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}
