//! per-invocation context
//!
//! Everything a command works with is loaded once, up front, into a [Context]. It is never modified afterwards.
use crate::inventory::{loader::LoadError, Inventory};
use crate::resolve::Resolver;
use crate::snapshot::{Snapshot, SnapshotError};
use std::path::PathBuf;

pub const DEFAULT_SSH_USER: &str = "root";
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Connection settings used when a host does not define its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshDefaults {
    pub user: String,
    pub port: u16,
    pub private_key_file: PathBuf,
}

impl SshDefaults {
    /// `~/.ssh/id_rsa`, or a relative `.ssh/id_rsa` when there is no home directory
    pub fn default_private_key_file() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_default()
            .join(".ssh")
            .join("id_rsa")
    }
}

impl Default for SshDefaults {
    fn default() -> Self {
        Self {
            user: DEFAULT_SSH_USER.to_string(),
            port: DEFAULT_SSH_PORT,
            private_key_file: Self::default_private_key_file(),
        }
    }
}

/// Where to load from
#[derive(Debug, Clone, derive_new::new)]
pub struct Settings {
    pub inventory: PathBuf,
    pub snapshot: Option<PathBuf>,
    pub ssh: SshDefaults,
    pub verbosity: u8,
}

#[derive(Debug)]
pub struct Context {
    pub inventory: Inventory,
    pub snapshot: Snapshot,
    pub ssh: SshDefaults,
    pub verbosity: u8,
}

impl Context {
    /// Load the snapshot (if any) and the inventory
    pub fn load(settings: Settings) -> Result<Self, ContextError> {
        let snapshot = match &settings.snapshot {
            Some(path) => Snapshot::load(path)?,
            None => Snapshot::default(),
        };

        let inventory = Inventory::load(&settings.inventory)?;
        tracing::debug!(
            hosts = inventory.host_count(),
            groups = inventory.groups().count(),
            "inventory loaded"
        );

        Ok(Self {
            inventory,
            snapshot,
            ssh: settings.ssh,
            verbosity: settings.verbosity,
        })
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.inventory, &self.snapshot)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ContextError {
    #[error(transparent)]
    Inventory(#[from] LoadError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn settings(inventory: PathBuf, snapshot: Option<PathBuf>) -> Settings {
        Settings::new(inventory, snapshot, SshDefaults::default(), 0)
    }

    #[test]
    fn default_ssh_settings() {
        let defaults = SshDefaults::default();
        assert_eq!(defaults.user, "root");
        assert_eq!(defaults.port, 22);
        assert!(defaults.private_key_file.ends_with(".ssh/id_rsa"));
    }

    #[test]
    fn load_inventory_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hosts.yml"), "all:\n  hosts:\n    web1:\n").unwrap();
        std::fs::write(dir.path().join("snapshot.yml"), "user: ci\n").unwrap();

        let context = Context::load(settings(
            dir.path().to_path_buf(),
            Some(dir.path().join("snapshot.yml")),
        ))
        .unwrap();

        let resolved = context.resolver().resolve("web1").unwrap();
        assert_eq!(resolved["user"], Value::from("ci"));
    }

    #[test]
    fn broken_snapshot_fails_before_inventory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("snapshot.yml"), "- not a mapping\n").unwrap();

        let err = Context::load(settings(
            dir.path().join("missing.yml"),
            Some(dir.path().join("snapshot.yml")),
        ))
        .unwrap_err();

        assert!(matches!(err, ContextError::Snapshot(_)));
    }

    #[test]
    fn missing_inventory() {
        let dir = tempfile::tempdir().unwrap();
        let err = Context::load(settings(dir.path().to_path_buf(), None)).unwrap_err();
        assert!(matches!(
            err,
            ContextError::Inventory(LoadError::NoFilesFound(_))
        ));
    }
}
