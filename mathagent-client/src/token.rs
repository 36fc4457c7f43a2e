use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::ClientError;

/// Durable storage for the session token.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, ClientError>;
    fn save(&self, token: &str) -> Result<(), ClientError>;
    /// Removing a token that is not stored is not an error.
    fn clear(&self) -> Result<(), ClientError>;
}

#[derive(Default, Clone)]
pub struct MemoryTokenStore {
    inner: Arc<RwLock<Option<String>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(token.into()))),
        }
    }
}

impl fmt::Debug for MemoryTokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTokenStore").finish_non_exhaustive()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        let guard = self
            .inner
            .read()
            .map_err(|_| ClientError::TokenStore("lock".into()))?;
        Ok(guard.clone())
    }

    fn save(&self, token: &str) -> Result<(), ClientError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| ClientError::TokenStore("lock".into()))?;
        *guard = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| ClientError::TokenStore("lock".into()))?;
        *guard = None;
        Ok(())
    }
}

/// Keeps the token in a single file, `<config dir>/mathagent/token` by default.
#[derive(Clone, Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Result<Self, ClientError> {
        let base = dirs::config_dir().ok_or_else(|| {
            ClientError::TokenStore("no configuration directory for this platform".into())
        })?;
        Ok(Self::new(base.join("mathagent").join("token")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ClientError::TokenStore(format!(
                "failed to read {}: {err}",
                self.path.display()
            ))),
        }
    }

    fn save(&self, token: &str) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                ClientError::TokenStore(format!("failed to create {}: {err}", parent.display()))
            })?;
        }
        fs::write(&self.path, token).map_err(|err| {
            ClientError::TokenStore(format!("failed to write {}: {err}", self.path.display()))
        })?;
        restrict_permissions(&self.path)
    }

    fn clear(&self) -> Result<(), ClientError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ClientError::TokenStore(format!(
                "failed to remove {}: {err}",
                self.path.display()
            ))),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), ClientError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|err| {
        ClientError::TokenStore(format!("failed to set permissions on {}: {err}", path.display()))
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), ClientError> {
    Ok(())
}
