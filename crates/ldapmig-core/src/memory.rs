//! In-memory target directory service.
//!
//! Implements [`TargetAccessor`] over a serializable [`TargetSnapshot`] so
//! a migration can be planned and rehearsed offline. Plugin enablement is
//! only activated by [`TargetAccessor::restart`], the same way a live
//! server picks up plugin changes. Server tasks run to completion when they
//! are started.

use crate::ldif::LdifReader;
use crate::schema::{AttributeType, ObjectClass};
use crate::source::IndexDecl;
use crate::target::{
    Backend, Plugin, ServerTask, TargetAccessor, TargetError, TaskKind, UniquenessConfig,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::debug;

/// Entry stored in a backend after an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub dn: String,
    /// Lowercased attribute name to values (lossy UTF-8).
    pub attributes: BTreeMap<String, Vec<String>>,
}

/// A backend and its contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendState {
    pub name: String,
    pub suffix: String,
    pub indexes: Vec<IndexDecl>,
    /// Completed reindex runs.
    #[serde(default)]
    pub reindexed: u32,
    #[serde(default)]
    pub entries: Vec<StoredEntry>,
}

/// Configuration and runtime state of one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginState {
    pub plugin: Plugin,
    /// Enabled in configuration.
    pub enabled: bool,
    /// Running. Follows `enabled` on restart.
    pub active: bool,
    /// Multi-valued settings.
    #[serde(default)]
    pub settings: BTreeMap<String, Vec<String>>,
}

impl PluginState {
    fn new(plugin: Plugin) -> Self {
        Self {
            plugin,
            enabled: false,
            active: false,
            settings: BTreeMap::new(),
        }
    }
}

/// Log entry for a server task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub kind: TaskKind,
    /// Suffix or backend the task ran against.
    pub target: String,
    pub exit_code: i32,
    pub message: Option<String>,
}

/// Full observable state of a target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSnapshot {
    #[serde(default)]
    pub attributes: Vec<AttributeType>,
    #[serde(default)]
    pub classes: Vec<ObjectClass>,
    #[serde(default)]
    pub backends: Vec<BackendState>,
    #[serde(default)]
    pub plugins: Vec<PluginState>,
    #[serde(default)]
    pub uniqueness: Vec<UniquenessConfig>,
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
    #[serde(default)]
    pub restarts: u32,
}

impl TargetSnapshot {
    /// Load a snapshot from a JSON file.
    pub fn load(path: &Path) -> Result<Self, TargetError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Write the snapshot to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), TargetError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Backend serving a suffix (case-insensitive).
    pub fn backend(&self, suffix: &str) -> Option<&BackendState> {
        self.backends
            .iter()
            .find(|b| b.suffix.eq_ignore_ascii_case(suffix))
    }

    /// State of a plugin, if it was ever touched.
    pub fn plugin(&self, plugin: Plugin) -> Option<&PluginState> {
        self.plugins.iter().find(|p| p.plugin == plugin)
    }

    fn backend_mut(&mut self, suffix: &str) -> Result<&mut BackendState, TargetError> {
        self.backends
            .iter_mut()
            .find(|b| b.suffix.eq_ignore_ascii_case(suffix))
            .ok_or_else(|| TargetError::NotFound(format!("backend for {}", suffix)))
    }

    fn plugin_mut(&mut self, plugin: Plugin) -> &mut PluginState {
        let pos = match self.plugins.iter().position(|p| p.plugin == plugin) {
            Some(pos) => pos,
            None => {
                self.plugins.push(PluginState::new(plugin));
                self.plugins.len() - 1
            }
        };
        &mut self.plugins[pos]
    }

    fn record_task(&mut self, kind: TaskKind, target: &str, exit_code: i32, message: Option<String>) -> ServerTask {
        let id = format!("{}-{}", kind.to_string().replace(' ', "-"), self.tasks.len() + 1);
        self.tasks.push(TaskRecord {
            id: id.clone(),
            kind,
            target: target.to_string(),
            exit_code,
            message,
        });
        ServerTask { id, kind }
    }
}

/// Target backed by an in-memory snapshot.
#[derive(Debug, Default)]
pub struct InMemoryTarget {
    state: RwLock<TargetSnapshot>,
    failing_tasks: RwLock<HashSet<TaskKind>>,
}

impl InMemoryTarget {
    /// Create an empty target.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a target from a snapshot.
    pub fn from_snapshot(snapshot: TargetSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
            failing_tasks: RwLock::new(HashSet::new()),
        }
    }

    /// Load a target from a JSON snapshot file.
    pub fn load(path: &Path) -> Result<Self, TargetError> {
        Ok(Self::from_snapshot(TargetSnapshot::load(path)?))
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> TargetSnapshot {
        self.state.read().clone()
    }

    /// Make every subsequent task of `kind` complete with a failure.
    pub fn fail_tasks(&self, kind: TaskKind) {
        self.failing_tasks.write().insert(kind);
    }

    fn start_task(&self, kind: TaskKind, target: &str) -> ServerTask {
        let exit_code = if self.failing_tasks.read().contains(&kind) { 1 } else { 0 };
        let task = self
            .state
            .write()
            .record_task(kind, target, exit_code, None);
        debug!(task = %task.id, %kind, on = target, exit_code, "task finished");
        task
    }

    fn read_entries(path: &Path) -> Result<Vec<StoredEntry>, String> {
        let file = File::open(path).map_err(|e| e.to_string())?;
        LdifReader::new(BufReader::new(file))
            .map(|record| {
                let record = record.map_err(|e| e.to_string())?;
                let attributes = record
                    .attributes
                    .iter()
                    .map(|(name, values)| {
                        let values = values
                            .iter()
                            .map(|v| String::from_utf8_lossy(v).into_owned())
                            .collect();
                        (name.to_ascii_lowercase(), values)
                    })
                    .collect();
                Ok(StoredEntry {
                    dn: record.dn,
                    attributes,
                })
            })
            .collect()
    }
}

impl TargetAccessor for InMemoryTarget {
    fn attribute_types(&self) -> Result<Vec<AttributeType>, TargetError> {
        Ok(self.state.read().attributes.clone())
    }

    fn object_classes(&self) -> Result<Vec<ObjectClass>, TargetError> {
        Ok(self.state.read().classes.clone())
    }

    fn backend(&self, suffix: &str) -> Result<Backend, TargetError> {
        self.state
            .read()
            .backend(suffix)
            .map(|b| Backend {
                name: b.name.clone(),
                suffix: b.suffix.clone(),
            })
            .ok_or_else(|| TargetError::NotFound(format!("backend for {}", suffix)))
    }

    fn create_backend(&self, name: &str, suffix: &str) -> Result<Backend, TargetError> {
        let mut state = self.state.write();
        if state.backend(suffix).is_some() {
            return Err(TargetError::AlreadyExists(format!("backend for {}", suffix)));
        }
        if state.backends.iter().any(|b| b.name.eq_ignore_ascii_case(name)) {
            return Err(TargetError::AlreadyExists(format!("backend {}", name)));
        }
        state.backends.push(BackendState {
            name: name.to_string(),
            suffix: suffix.to_string(),
            indexes: Vec::new(),
            reindexed: 0,
            entries: Vec::new(),
        });
        Ok(Backend {
            name: name.to_string(),
            suffix: suffix.to_string(),
        })
    }

    fn indexes(&self, backend: &Backend) -> Result<Vec<IndexDecl>, TargetError> {
        self.state
            .read()
            .backend(&backend.suffix)
            .map(|b| b.indexes.clone())
            .ok_or_else(|| TargetError::NotFound(format!("backend {}", backend.name)))
    }

    fn add_index(&self, backend: &Backend, index: &IndexDecl) -> Result<(), TargetError> {
        let mut state = self.state.write();
        let b = state.backend_mut(&backend.suffix)?;
        if b.indexes
            .iter()
            .any(|i| i.attribute.eq_ignore_ascii_case(&index.attribute))
        {
            return Err(TargetError::AlreadyExists(format!("index {}", index.attribute)));
        }
        b.indexes.push(index.clone());
        Ok(())
    }

    fn reindex(&self, backend: &Backend) -> Result<ServerTask, TargetError> {
        self.state.write().backend_mut(&backend.suffix)?.reindexed += 1;
        Ok(self.start_task(TaskKind::Reindex, &backend.suffix))
    }

    fn add_attribute_type(&self, attr: &AttributeType) -> Result<(), TargetError> {
        let mut state = self.state.write();
        if state.attributes.iter().any(|a| a.oid == attr.oid) {
            return Err(TargetError::AlreadyExists(format!("attribute type {}", attr.oid)));
        }
        state.attributes.push(attr.clone());
        Ok(())
    }

    fn add_object_class(&self, class: &ObjectClass) -> Result<(), TargetError> {
        let mut state = self.state.write();
        if state.classes.iter().any(|c| c.oid == class.oid) {
            return Err(TargetError::AlreadyExists(format!("object class {}", class.oid)));
        }
        state.classes.push(class.clone());
        Ok(())
    }

    fn enable_plugin(&self, plugin: Plugin) -> Result<(), TargetError> {
        self.state.write().plugin_mut(plugin).enabled = true;
        Ok(())
    }

    fn plugin_enabled(&self, plugin: Plugin) -> Result<bool, TargetError> {
        Ok(self
            .state
            .read()
            .plugin(plugin)
            .is_some_and(|p| p.enabled && p.active))
    }

    fn set_plugin_attribute(&self, plugin: Plugin, attr: &str, value: &str) -> Result<(), TargetError> {
        self.state
            .write()
            .plugin_mut(plugin)
            .settings
            .insert(attr.to_string(), vec![value.to_string()]);
        Ok(())
    }

    fn add_plugin_value(&self, plugin: Plugin, attr: &str, value: &str) -> Result<(), TargetError> {
        let mut state = self.state.write();
        let values = state
            .plugin_mut(plugin)
            .settings
            .entry(attr.to_string())
            .or_default();
        if values.iter().any(|v| v.eq_ignore_ascii_case(value)) {
            return Err(TargetError::AlreadyExists(format!("{} {}", attr, value)));
        }
        values.push(value.to_string());
        Ok(())
    }

    fn add_plugin_scope(&self, plugin: Plugin, suffix: &str) -> Result<(), TargetError> {
        self.add_plugin_value(plugin, plugin.scope_attribute(), suffix)
    }

    fn memberof_fixup(&self, suffix: &str) -> Result<ServerTask, TargetError> {
        {
            let state = self.state.read();
            if state.backend(suffix).is_none() {
                return Err(TargetError::NotFound(format!("backend for {}", suffix)));
            }
            if !state.plugin(Plugin::MemberOf).is_some_and(|p| p.enabled) {
                return Err(TargetError::Protocol(format!(
                    "{} is not enabled",
                    Plugin::MemberOf
                )));
            }
        }
        Ok(self.start_task(TaskKind::MemberOfFixup, suffix))
    }

    fn create_uniqueness_plugin(&self, config: &UniquenessConfig) -> Result<(), TargetError> {
        let mut state = self.state.write();
        if state.uniqueness.iter().any(|u| u.name == config.name) {
            return Err(TargetError::AlreadyExists(format!("uniqueness plugin {}", config.name)));
        }
        state.uniqueness.push(config.clone());
        Ok(())
    }

    fn import_ldif(&self, backend: &Backend, path: &Path) -> Result<ServerTask, TargetError> {
        self.backend(&backend.suffix)?;
        let failing = self.failing_tasks.read().contains(&TaskKind::Import);

        let mut state = self.state.write();
        let (exit_code, message) = match (failing, Self::read_entries(path)) {
            (true, _) => (1, Some("import rejected".to_string())),
            (false, Err(message)) => (1, Some(message)),
            (false, Ok(entries)) => {
                let count = entries.len();
                state.backend_mut(&backend.suffix)?.entries = entries;
                (0, Some(format!("imported {} entries", count)))
            }
        };
        let task = state.record_task(TaskKind::Import, &backend.suffix, exit_code, message);
        debug!(task = %task.id, suffix = %backend.suffix, exit_code, "import finished");
        Ok(task)
    }

    fn wait_task(&self, task: &ServerTask) -> Result<(), TargetError> {
        let state = self.state.read();
        let record = state
            .tasks
            .iter()
            .find(|t| t.id == task.id)
            .ok_or_else(|| TargetError::NotFound(format!("task {}", task.id)))?;
        if record.exit_code != 0 {
            return Err(TargetError::TaskFailed {
                task: record.id.clone(),
                exit_code: record.exit_code,
            });
        }
        Ok(())
    }

    fn restart(&self) -> Result<(), TargetError> {
        let mut state = self.state.write();
        for plugin in &mut state.plugins {
            plugin.active = plugin.enabled;
        }
        state.restarts += 1;
        debug!(restarts = state.restarts, "target restarted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::IndexKind;
    use std::io::Write;

    #[test]
    fn test_backend_lifecycle() {
        let target = InMemoryTarget::new();
        assert!(target.backend("dc=test").unwrap_err().is_not_found());

        let backend = target.create_backend("test", "dc=test").unwrap();
        assert_eq!(target.backend("DC=TEST").unwrap(), backend);
        assert!(target
            .create_backend("other", "dc=test")
            .unwrap_err()
            .is_already_exists());

        let uid = IndexDecl::new("uid", [IndexKind::Equality]);
        target.add_index(&backend, &uid).unwrap();
        assert!(target.add_index(&backend, &uid).unwrap_err().is_already_exists());
        assert_eq!(target.indexes(&backend).unwrap(), vec![uid]);

        let task = target.reindex(&backend).unwrap();
        target.wait_task(&task).unwrap();
        assert_eq!(target.snapshot().backend("dc=test").unwrap().reindexed, 1);
    }

    #[test]
    fn test_plugin_activation_requires_restart() {
        let target = InMemoryTarget::new();
        target.enable_plugin(Plugin::MemberOf).unwrap();
        assert!(!target.plugin_enabled(Plugin::MemberOf).unwrap());

        target.restart().unwrap();
        assert!(target.plugin_enabled(Plugin::MemberOf).unwrap());
        assert_eq!(target.snapshot().restarts, 1);
    }

    #[test]
    fn test_plugin_values_report_duplicates() {
        let target = InMemoryTarget::new();
        let plugin = Plugin::ReferentialIntegrity;
        target
            .add_plugin_value(plugin, Plugin::REFINT_MEMBERSHIP_ATTRIBUTE, "member")
            .unwrap();
        let err = target
            .add_plugin_value(plugin, Plugin::REFINT_MEMBERSHIP_ATTRIBUTE, "MEMBER")
            .unwrap_err();
        assert!(err.is_already_exists());

        target.add_plugin_scope(plugin, "dc=test").unwrap();
        let snapshot = target.snapshot();
        let state = snapshot.plugin(plugin).unwrap();
        assert_eq!(state.settings[plugin.scope_attribute()], vec!["dc=test"]);
    }

    #[test]
    fn test_failing_task() {
        let target = InMemoryTarget::new();
        let backend = target.create_backend("test", "dc=test").unwrap();
        target.fail_tasks(TaskKind::Reindex);

        let task = target.reindex(&backend).unwrap();
        let err = target.wait_task(&task).unwrap_err();
        assert!(matches!(err, TargetError::TaskFailed { exit_code: 1, .. }));
    }

    #[test]
    fn test_import_and_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let ldif = dir.path().join("data.ldif");
        let mut file = File::create(&ldif).unwrap();
        writeln!(file, "dn: dc=test\nobjectClass: domain\ndc: test\n").unwrap();
        writeln!(file, "dn: uid=a,dc=test\nobjectClass: account\nuid: a").unwrap();
        drop(file);

        let target = InMemoryTarget::new();
        let backend = target.create_backend("test", "dc=test").unwrap();
        let task = target.import_ldif(&backend, &ldif).unwrap();
        target.wait_task(&task).unwrap();

        let path = dir.path().join("target.json");
        target.snapshot().save(&path).unwrap();
        let reloaded = InMemoryTarget::load(&path).unwrap().snapshot();
        let entries = &reloaded.backend("dc=test").unwrap().entries;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].attributes["uid"], vec!["a"]);
        assert_eq!(reloaded, target.snapshot());
    }
}
