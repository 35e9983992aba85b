use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use engine_logging::engine_debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

/// Fixed file the session id is kept in, relative to the working directory.
pub const SESSION_FILENAME: &str = ".converter_session.ron";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed session file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("cannot encode session: {0}")]
    Encode(String),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Keeps the opaque server-issued session id across restarts.
///
/// There is no expiry or invalidation; a stale id is sent anyway and the
/// server decides what to do with it.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, SessionError>;
    fn persist(&self, session_id: &str) -> Result<(), SessionError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    session_id: String,
}

#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `{dir}/.converter_session.ron`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SESSION_FILENAME))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<String>, SessionError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let session: PersistedSession =
            ron::from_str(&content).map_err(|err| SessionError::Parse {
                path: self.path.clone(),
                message: err.to_string(),
            })?;
        Ok(Some(session.session_id).filter(|id| !id.is_empty()))
    }

    fn persist(&self, session_id: &str) -> Result<(), SessionError> {
        let session = PersistedSession {
            session_id: session_id.to_string(),
        };
        let content = ron::ser::to_string_pretty(&session, ron::ser::PrettyConfig::new())
            .map_err(|err| SessionError::Encode(err.to_string()))?;

        let dir = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let filename = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| SESSION_FILENAME.to_string());

        AtomicFileWriter::new(dir).write(&filename, content.as_bytes())?;
        engine_debug!("Persisted session id to {:?}", self.path);
        Ok(())
    }
}

/// In-process store; forgets the session when dropped.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session_id: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<String>, SessionError> {
        Ok(match self.session_id.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        })
    }

    fn persist(&self, session_id: &str) -> Result<(), SessionError> {
        match self.session_id.lock() {
            Ok(mut guard) => *guard = Some(session_id.to_string()),
            Err(poisoned) => *poisoned.into_inner() = Some(session_id.to_string()),
        }
        Ok(())
    }
}
