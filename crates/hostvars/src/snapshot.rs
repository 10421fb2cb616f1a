//! workspace snapshot (extra variables)
//!
//! A snapshot is a yaml or json document computed outside of the inventory. Its top level must be a mapping; an empty
//! document is an empty snapshot. Snapshots are loaded and validated before any host is resolved.
use crate::value::{self, ValueError, Variables};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Snapshot {
    variables: Variables,
}

impl Snapshot {
    pub fn new(variables: Variables) -> Self {
        Self { variables }
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        tracing::info!(path=%path.display(), "loading snapshot");

        let contents = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_owned(),
            source,
        })?;

        Self::from_str_with_source(&contents, Some(path))
    }

    /// Parse a snapshot from yaml or json text
    pub fn parse(contents: &str) -> Result<Self, SnapshotError> {
        Self::from_str_with_source(contents, None)
    }

    fn from_str_with_source(contents: &str, path: Option<&Path>) -> Result<Self, SnapshotError> {
        let source = || path.map(Path::to_path_buf);

        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let document: serde_yaml::Value =
            serde_yaml::from_str(contents).map_err(|error| SnapshotError::Parse {
                path: source(),
                source: error,
            })?;

        let mapping = match document {
            serde_yaml::Value::Null => serde_yaml::Mapping::new(),
            serde_yaml::Value::Mapping(mapping) => mapping,
            other => {
                return Err(SnapshotError::Malformed {
                    path: source(),
                    found: value::yaml_kind(&other),
                })
            }
        };

        let variables =
            value::variables_from_mapping(mapping).map_err(|error| SnapshotError::Value {
                path: source(),
                source: error,
            })?;

        tracing::debug!(variables = variables.len(), "snapshot loaded");
        Ok(Self { variables })
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

fn display(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<inline>".to_string())
}

#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    #[error("Unable to read snapshot {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to parse snapshot {}", display(.path))]
    Parse {
        path: Option<PathBuf>,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Malformed snapshot {}: expected a mapping at the top level, found {found}", display(.path))]
    Malformed {
        path: Option<PathBuf>,
        found: &'static str,
    },
    #[error("Malformed snapshot {}", display(.path))]
    Value {
        path: Option<PathBuf>,
        #[source]
        source: ValueError,
    },
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::vars;
    use pretty_assertions::assert_eq;

    #[test]
    fn yaml_and_json() {
        let yaml = Snapshot::parse("user: ci\nblock: {name: k8s}\n").unwrap();
        let json = Snapshot::parse(r#"{"user": "ci", "block": {"name": "k8s"}}"#).unwrap();

        assert_eq!(yaml.variables(), &vars("user: ci\nblock: {name: k8s}"));
        assert_eq!(yaml, json);
    }

    #[test]
    fn empty_document_is_empty_snapshot() {
        assert!(Snapshot::parse("").unwrap().is_empty());
        assert!(Snapshot::parse("~").unwrap().is_empty());
    }

    #[test]
    fn top_level_must_be_a_mapping() {
        let err = Snapshot::parse("- a\n- b\n").unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::Malformed {
                found: "sequence",
                ..
            }
        ));

        assert!(matches!(
            Snapshot::parse("just a string"),
            Err(SnapshotError::Malformed { found: "string", .. })
        ));
    }

    #[test]
    fn load_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.yml");
        std::fs::write(&path, "42").unwrap();

        let err = Snapshot::load(&path).unwrap_err();
        assert!(err.to_string().contains("snapshot.yml"));
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            Snapshot::load(Path::new("/nonexistent/snapshot.yml")),
            Err(SnapshotError::Io { .. })
        ));
    }
}
