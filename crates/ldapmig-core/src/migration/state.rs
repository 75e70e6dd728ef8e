//! Execution journal.
//!
//! Records the progress of each run for status reporting and audit. The
//! journal is never used to resume a run: recovery is regenerating the plan
//! against the partially migrated target.

use super::current_timestamp;
use super::error::MigrationError;
use rkyv::{Archive, Deserialize, Serialize};
use std::path::Path;

/// State of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Recorded but not started.
    Pending,
    /// Apply pass in progress.
    Applying,
    /// Restarting the target between passes.
    Restarting,
    /// Post pass in progress.
    Posting,
    /// Both passes finished.
    Complete,
    /// A pass aborted.
    Failed,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Pending => write!(f, "pending"),
            ExecutionStatus::Applying => write!(f, "applying"),
            ExecutionStatus::Restarting => write!(f, "restarting"),
            ExecutionStatus::Posting => write!(f, "posting"),
            ExecutionStatus::Complete => write!(f, "complete"),
            ExecutionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Status of one pass of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum StepStatus {
    Pending,
    InProgress,
    Complete,
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::InProgress => write!(f, "in_progress"),
            StepStatus::Complete => write!(f, "complete"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Progress of one action across both passes.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub struct ActionProgress {
    /// Position in the plan.
    pub index: usize,
    /// One-line description.
    pub description: String,
    pub apply: StepStatus,
    pub post: StepStatus,
    /// When the apply started (microseconds since epoch).
    pub started_at: Option<u64>,
    /// When the post finished (microseconds since epoch).
    pub completed_at: Option<u64>,
    pub error: Option<String>,
}

impl ActionProgress {
    /// Create a pending entry.
    pub fn new(index: usize, description: impl Into<String>) -> Self {
        Self {
            index,
            description: description.into(),
            apply: StepStatus::Pending,
            post: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    pub fn start_apply(&mut self) {
        self.apply = StepStatus::InProgress;
        self.started_at = Some(current_timestamp());
    }

    pub fn complete_apply(&mut self) {
        self.apply = StepStatus::Complete;
    }

    pub fn start_post(&mut self) {
        self.post = StepStatus::InProgress;
    }

    pub fn complete_post(&mut self) {
        self.post = StepStatus::Complete;
        self.completed_at = Some(current_timestamp());
    }

    /// Mark whichever pass is in progress as failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.post == StepStatus::InProgress {
            self.post = StepStatus::Failed;
        } else {
            self.apply = StepStatus::Failed;
        }
        self.completed_at = Some(current_timestamp());
        self.error = Some(error.into());
    }
}

/// Persistent record of one run.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub struct ExecutionState {
    /// Plan ID.
    pub migration_id: [u8; 16],
    pub status: ExecutionStatus,
    /// Nothing was sent to the target.
    pub dry_run: bool,
    /// The target was restarted between passes.
    pub restarted: bool,
    /// When the run started (microseconds since epoch).
    pub started_at: Option<u64>,
    /// When the run finished (microseconds since epoch).
    pub completed_at: Option<u64>,
    pub error: Option<String>,
    pub actions: Vec<ActionProgress>,
}

impl ExecutionState {
    /// Create a pending run for the given action descriptions.
    pub fn new(migration_id: [u8; 16], descriptions: impl IntoIterator<Item = String>, dry_run: bool) -> Self {
        let actions = descriptions
            .into_iter()
            .enumerate()
            .map(|(i, d)| ActionProgress::new(i, d))
            .collect();
        Self {
            migration_id,
            status: ExecutionStatus::Pending,
            dry_run,
            restarted: false,
            started_at: None,
            completed_at: None,
            error: None,
            actions,
        }
    }

    /// Enter the apply pass.
    pub fn start(&mut self) {
        self.status = ExecutionStatus::Applying;
        self.started_at = Some(current_timestamp());
    }

    pub fn start_restart(&mut self) {
        self.status = ExecutionStatus::Restarting;
        self.restarted = true;
    }

    pub fn start_post(&mut self) {
        self.status = ExecutionStatus::Posting;
    }

    pub fn complete(&mut self) {
        self.status = ExecutionStatus::Complete;
        self.completed_at = Some(current_timestamp());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = ExecutionStatus::Failed;
        self.completed_at = Some(current_timestamp());
        self.error = Some(error.into());
    }

    /// Whether the run finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, ExecutionStatus::Complete | ExecutionStatus::Failed)
    }

    /// Number of actions whose apply completed.
    pub fn applied_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| a.apply == StepStatus::Complete)
            .count()
    }

    /// Number of actions whose post completed.
    pub fn posted_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| a.post == StepStatus::Complete)
            .count()
    }

    /// Hex form of the ID.
    pub fn id_hex(&self) -> String {
        hex::encode(self.migration_id)
    }

    /// Serialize the state to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MigrationError> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| MigrationError::Serialization(e.to_string()))
    }

    /// Deserialize state from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MigrationError> {
        // Stored values carry no alignment guarantee.
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| MigrationError::Deserialization(e.to_string()))
    }
}

/// Journal store on a sled tree.
pub struct ExecutionJournal {
    db: sled::Db,
    tree: sled::Tree,
}

impl ExecutionJournal {
    /// Tree name for run records.
    pub const TREE_NAME: &'static str = "migration:state";

    const KEY_PREFIX: &'static [u8] = b"run:";

    /// Open or create the journal in an existing database.
    pub fn open(db: &sled::Db) -> Result<Self, MigrationError> {
        let tree = db.open_tree(Self::TREE_NAME)?;
        Ok(Self {
            db: db.clone(),
            tree,
        })
    }

    /// Open or create the journal in a database directory.
    pub fn open_path(path: &Path) -> Result<Self, MigrationError> {
        let db = sled::open(path)?;
        Self::open(&db)
    }

    /// Save a run.
    pub fn save(&self, state: &ExecutionState) -> Result<(), MigrationError> {
        self.tree
            .insert(Self::run_key(&state.migration_id), state.to_bytes()?)?;
        Ok(())
    }

    /// Load a run.
    pub fn load(&self, migration_id: &[u8; 16]) -> Result<Option<ExecutionState>, MigrationError> {
        match self.tree.get(Self::run_key(migration_id))? {
            Some(bytes) => Ok(Some(ExecutionState::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete a run.
    pub fn delete(&self, migration_id: &[u8; 16]) -> Result<(), MigrationError> {
        self.tree.remove(Self::run_key(migration_id))?;
        Ok(())
    }

    /// All runs, oldest first.
    pub fn list(&self) -> Result<Vec<ExecutionState>, MigrationError> {
        let mut states = Vec::new();
        for result in self.tree.scan_prefix(Self::KEY_PREFIX) {
            let (_, value) = result?;
            states.push(ExecutionState::from_bytes(&value)?);
        }
        states.sort_by_key(|s| s.started_at);
        Ok(states)
    }

    /// The most recently started run.
    pub fn latest(&self) -> Result<Option<ExecutionState>, MigrationError> {
        Ok(self.list()?.pop())
    }

    /// Flush changes to disk.
    pub fn flush(&self) -> Result<(), MigrationError> {
        self.db.flush()?;
        Ok(())
    }

    fn run_key(id: &[u8; 16]) -> Vec<u8> {
        let mut key = Vec::with_capacity(Self::KEY_PREFIX.len() + id.len());
        key.extend_from_slice(Self::KEY_PREFIX);
        key.extend_from_slice(id);
        key
    }
}
