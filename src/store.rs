use std::{collections::HashMap, path::PathBuf};

use crate::{
    error::{HeroshotError, HeroshotResult},
    model::Composition,
};

/// Persistence for abandoned-session recovery: one snapshot per session,
/// overwritten on every mutation, cleared on dismissal or successful export.
pub trait RecoveryStore {
    fn save(&mut self, session_id: &str, comp: &Composition) -> HeroshotResult<()>;

    /// `None` when no snapshot exists for the session. Recovery is offered to
    /// the caller, never applied silently.
    fn load(&self, session_id: &str) -> HeroshotResult<Option<Composition>>;

    fn clear(&mut self, session_id: &str) -> HeroshotResult<()>;
}

/// JSON snapshots in a directory, one file per session.
pub struct FsRecoveryStore {
    dir: PathBuf,
}

impl FsRecoveryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, session_id: &str) -> HeroshotResult<PathBuf> {
        if session_id.is_empty()
            || !session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(HeroshotError::validation(format!(
                "session id must be non-empty [a-zA-Z0-9_-], got \"{session_id}\""
            )));
        }
        Ok(self.dir.join(format!("{session_id}.json")))
    }
}

impl RecoveryStore for FsRecoveryStore {
    fn save(&mut self, session_id: &str, comp: &Composition) -> HeroshotResult<()> {
        let path = self.path_for(session_id)?;
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| HeroshotError::serde(format!("create recovery dir: {e}")))?;
        let json = serde_json::to_vec_pretty(comp)
            .map_err(|e| HeroshotError::serde(format!("serialize snapshot: {e}")))?;
        std::fs::write(&path, json)
            .map_err(|e| HeroshotError::serde(format!("write {}: {e}", path.display())))
    }

    fn load(&self, session_id: &str) -> HeroshotResult<Option<Composition>> {
        let path = self.path_for(session_id)?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(HeroshotError::serde(format!(
                    "read {}: {e}",
                    path.display()
                )));
            }
        };
        let comp = serde_json::from_slice(&bytes)
            .map_err(|e| HeroshotError::serde(format!("parse snapshot: {e}")))?;
        Ok(Some(comp))
    }

    fn clear(&mut self, session_id: &str) -> HeroshotResult<()> {
        let path = self.path_for(session_id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HeroshotError::serde(format!(
                "remove {}: {e}",
                path.display()
            ))),
        }
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryRecoveryStore {
    snapshots: HashMap<String, Composition>,
}

impl MemoryRecoveryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecoveryStore for MemoryRecoveryStore {
    fn save(&mut self, session_id: &str, comp: &Composition) -> HeroshotResult<()> {
        self.snapshots.insert(session_id.to_string(), comp.clone());
        Ok(())
    }

    fn load(&self, session_id: &str) -> HeroshotResult<Option<Composition>> {
        Ok(self.snapshots.get(session_id).cloned())
    }

    fn clear(&mut self, session_id: &str) -> HeroshotResult<()> {
        self.snapshots.remove(session_id);
        Ok(())
    }
}
