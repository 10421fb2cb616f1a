//! loading [Inventory]s from yaml (or json) documents
//!
//! The document format is the one of yaml inventories:
//! ```yaml
//! all:
//!   vars:
//!     user: admin
//!   hosts:
//!     bastion:
//!       ansible_host: 10.0.0.1
//!   children:
//!     web:
//!       vars:
//!         port: 80
//!       hosts:
//!         web[01:03]:
//! ```
//! Every group entry may hold `vars`, `hosts` and `children`, any other key is an error. Top level keys other than `all` are groups below `all`.
//! Host names may contain one or more ranges (`[01:03]`, `[a:c]`, `[0:10:2]`).
//!
//! After an inventory file is loaded, `group_vars/` and `host_vars/` next to it are merged into the matching
//! groups and hosts. Each may contain `<name>.yml`, `<name>.yaml`, `<name>.json` or a `<name>/` directory of such
//! files.
use super::{GroupId, HostId, Inventory, InventoryError, Kind};
use crate::value::{self, yaml_kind, ValueError, Variables};
use serde_yaml::{Mapping, Value as Yaml};
use std::path::{Path, PathBuf};

const INVENTORY_FILE_NAMES: &[&str] = &[
    "hosts.yml",
    "hosts.yaml",
    "inventory.yml",
    "inventory.yaml",
    "hosts.json",
];

const VARS_FILE_EXTENSIONS: &[&str] = &["yml", "yaml", "json"];

impl Inventory {
    /// Load an inventory from a file or from a directory containing one
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let mut inventory = Self::new();
        if path.is_dir() {
            inventory.load_directory(path)?;
        } else {
            inventory.load_file(path)?;
        }
        Ok(inventory)
    }

    /// Merge an inventory file (and the vars directories next to it) into this inventory
    pub fn load_file(&mut self, file_path: &Path) -> Result<(), LoadError> {
        let file_path = file_path.canonicalize().map_err(|source| LoadError::Io {
            path: file_path.to_owned(),
            source,
        })?;
        tracing::info!(path=%file_path.display(), "loading inventory");

        let document = read_yaml(&file_path)?;
        self.insert_document(document)
            .map_err(|source| LoadError::InFile {
                path: file_path.clone(),
                source: Box::new(source),
            })?;

        if let Some(base) = file_path.parent() {
            self.load_vars_directories(base)?;
        }

        Ok(())
    }

    /// Load the first known inventory file found in `dir_path`
    pub fn load_directory(&mut self, dir_path: &Path) -> Result<(), LoadError> {
        let Some(file_path) = INVENTORY_FILE_NAMES
            .iter()
            .map(|name| dir_path.join(name))
            .find(|candidate| candidate.is_file())
        else {
            return Err(LoadError::NoFilesFound(dir_path.to_owned()));
        };

        self.load_file(&file_path)
    }

    /// Merge `group_vars/` and `host_vars/` below `base` into the inventory
    ///
    /// Files for groups or hosts the inventory does not know about are skipped.
    pub fn load_vars_directories(&mut self, base: &Path) -> Result<(), LoadError> {
        self.load_vars_directory(&base.join("group_vars"), Kind::Group)?;
        self.load_vars_directory(&base.join("host_vars"), Kind::Host)
    }

    fn load_vars_directory(&mut self, dir: &Path, kind: Kind) -> Result<(), LoadError> {
        if !dir.is_dir() {
            return Ok(());
        }

        for entry in sorted_entries(dir)? {
            let (name, files) = if entry.is_dir() {
                let files = sorted_entries(&entry)?
                    .into_iter()
                    .filter(|file| is_vars_file(file))
                    .collect();
                (file_name(&entry), files)
            } else if is_vars_file(&entry) {
                (file_stem(&entry), vec![entry.clone()])
            } else {
                continue;
            };

            let target = match kind {
                Kind::Group => self.group_id(&name).map(Target::Group),
                Kind::Host => self.host_id(&name).map(Target::Host),
            };
            let Some(target) = target else {
                tracing::debug!(path=%entry.display(), %kind, name=%name, "skipping vars, no such entry in inventory");
                continue;
            };

            for file in files {
                tracing::info!(path=%file.display(), "loading vars");
                let variables = read_vars_file(&file)?;
                match target {
                    Target::Group(group) => self.add_group_variables(group, variables),
                    Target::Host(host) => self.add_host_variables(host, variables),
                }
            }
        }

        Ok(())
    }

    /// Parse and merge an inline yaml inventory
    pub fn insert_yaml(&mut self, yaml: &str) -> Result<(), LoadError> {
        self.insert_document(serde_yaml::from_str(yaml)?)
    }

    /// Merge a parsed inventory document
    pub fn insert_document(&mut self, document: Yaml) -> Result<(), LoadError> {
        let root = match document {
            Yaml::Null => return Ok(()),
            Yaml::Mapping(root) => root,
            other => {
                return Err(LoadError::Malformed(format!(
                    "expected a mapping of groups, found {}",
                    yaml_kind(&other)
                )))
            }
        };

        for (key, entry) in root {
            let name = scalar_name(key, "group")?;
            self.insert_group_entry(&name, entry, None)?;
        }

        Ok(())
    }

    fn insert_group_entry(
        &mut self,
        name: &str,
        entry: Yaml,
        parent: Option<GroupId>,
    ) -> Result<GroupId, LoadError> {
        let group = self.add_group(name)?;
        if let Some(parent) = parent {
            self.add_child_group(parent, group)?;
        }

        for (key, value) in mapping_or_empty(entry, || format!("group {name:?}"))? {
            let key = scalar_name(key, "group key")?;
            match key.as_str() {
                "vars" => {
                    let variables = variables(value, || format!("vars of group {name:?}"))?;
                    self.add_group_variables(group, variables);
                }
                "hosts" => self.insert_hosts(group, name, value)?,
                "children" => {
                    for (child_key, child_entry) in
                        mapping_or_empty(value, || format!("children of group {name:?}"))?
                    {
                        let child = scalar_name(child_key, "group")?;
                        self.insert_group_entry(&child, child_entry, Some(group))?;
                    }
                }
                other => {
                    return Err(LoadError::Malformed(format!(
                        "unknown key {other:?} in group {name:?}, expected vars, hosts or children"
                    )))
                }
            }
        }

        Ok(group)
    }

    fn insert_hosts(&mut self, group: GroupId, group_name: &str, hosts: Yaml) -> Result<(), LoadError> {
        for (key, entry) in mapping_or_empty(hosts, || format!("hosts of group {group_name:?}"))? {
            let pattern = scalar_name(key, "host")?;
            let variables = variables(entry, || format!("vars of host {pattern:?}"))?;

            for name in expand_hostname(&pattern)? {
                let host: HostId = self.add_host(&name)?;
                self.add_host_to_group(host, group);
                self.add_host_variables(host, variables.clone());
            }
        }

        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Target {
    Group(GroupId),
    Host(HostId),
}

/// Expand host name ranges
///
/// `web[01:03]` becomes `web01`, `web02`, `web03`. A stride may follow the end (`[0:10:5]`), alphabetic ranges use
/// single letters (`[a:c]`). A zero padded start requires an end of the same width.
pub fn expand_hostname(pattern: &str) -> Result<Vec<String>, LoadError> {
    let literal = || Ok(vec![pattern.to_string()]);

    let Some(open) = pattern.find('[') else {
        return literal();
    };
    let Some(close) = pattern[open..].find(']').map(|offset| open + offset) else {
        return literal();
    };

    let range = &pattern[open + 1..close];
    if !range.contains(':') {
        return literal();
    }

    let invalid = |reason| LoadError::HostRange {
        pattern: pattern.to_string(),
        reason,
    };

    let parts: Vec<&str> = range.split(':').collect();
    let (begin, end, stride) = match parts.as_slice() {
        [begin, end] => (*begin, *end, 1),
        [begin, end, stride] => (
            *begin,
            *end,
            stride.parse::<usize>().map_err(|_| invalid("stride is not a number"))?,
        ),
        _ => return Err(invalid("expected [begin:end] or [begin:end:stride]")),
    };

    if stride == 0 {
        return Err(invalid("stride must be positive"));
    }

    let items: Vec<String> = if let (Some(b), Some(e)) = (single_letter(begin), single_letter(end)) {
        if b.is_ascii_lowercase() != e.is_ascii_lowercase() {
            return Err(invalid("begin and end letters must have the same case"));
        }
        if e < b {
            return Err(invalid("end is before begin"));
        }
        (b..=e).step_by(stride).map(|c| (c as char).to_string()).collect()
    } else {
        let begin = if begin.is_empty() { "0" } else { begin };
        let width = if begin.len() > 1 && begin.starts_with('0') {
            if begin.len() != end.len() {
                return Err(invalid("zero padded begin and end must have the same width"));
            }
            begin.len()
        } else {
            0
        };

        let b: u64 = begin.parse().map_err(|_| invalid("begin is not a number or letter"))?;
        let e: u64 = end.parse().map_err(|_| invalid("end is not a number or letter"))?;
        if e < b {
            return Err(invalid("end is before begin"));
        }
        (b..=e).step_by(stride).map(|n| format!("{n:0width$}")).collect()
    };

    let head = &pattern[..open];
    let tails = expand_hostname(&pattern[close + 1..])?;

    Ok(items
        .iter()
        .flat_map(|item| tails.iter().map(move |tail| format!("{head}{item}{tail}")))
        .collect())
}

fn single_letter(s: &str) -> Option<u8> {
    match s.as_bytes() {
        [c] if c.is_ascii_alphabetic() => Some(*c),
        _ => None,
    }
}

fn read_yaml(path: &Path) -> Result<Yaml, LoadError> {
    let contents = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_owned(),
        source,
    })?;

    if contents.trim().is_empty() {
        return Ok(Yaml::Null);
    }

    serde_yaml::from_str(&contents).map_err(|source| LoadError::InFile {
        path: path.to_owned(),
        source: Box::new(source.into()),
    })
}

fn read_vars_file(path: &Path) -> Result<Variables, LoadError> {
    variables(read_yaml(path)?, || path.display().to_string()).map_err(|source| {
        LoadError::InFile {
            path: path.to_owned(),
            source: Box::new(source),
        }
    })
}

/// `null` or a mapping of variables
fn variables(value: Yaml, what: impl Fn() -> String) -> Result<Variables, LoadError> {
    Ok(value::variables_from_mapping(mapping_or_empty(value, what)?)?)
}

fn mapping_or_empty(value: Yaml, what: impl Fn() -> String) -> Result<Mapping, LoadError> {
    match value {
        Yaml::Null => Ok(Mapping::new()),
        Yaml::Mapping(mapping) => Ok(mapping),
        Yaml::Tagged(tagged) => mapping_or_empty(tagged.value, what),
        other => Err(LoadError::Malformed(format!(
            "{} must be a mapping, found {}",
            what(),
            yaml_kind(&other)
        ))),
    }
}

fn scalar_name(key: Yaml, what: &str) -> Result<String, LoadError> {
    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        other => Err(LoadError::Malformed(format!(
            "{what} name must be a scalar, found {}",
            yaml_kind(&other)
        ))),
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let io_error = |source| LoadError::Io {
        path: dir.to_owned(),
        source,
    };

    let mut entries = std::fs::read_dir(dir)
        .map_err(io_error)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error)?;
    entries.sort();
    Ok(entries)
}

fn is_vars_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| VARS_FILE_EXTENSIONS.contains(&ext))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("No inventory file found in {}", .0.display())]
    NoFilesFound(PathBuf),
    #[error("Unable to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to load {}", .path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<LoadError>,
    },
    #[error("Unable to parse yaml")]
    YamlParseFailed(#[from] serde_yaml::Error),
    #[error("Malformed inventory: {0}")]
    Malformed(String),
    #[error("Invalid host range {pattern:?}: {reason}")]
    HostRange {
        pattern: String,
        reason: &'static str,
    },
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Utility macro to create an [Inventory] from inline yaml
///
/// ```
/// # use hostvars::inventory;
/// let inventory = inventory!("all: {hosts: {web1: {port: 8080}}}");
/// assert!(inventory.get_host("web1").is_some());
/// ```
///
/// Several documents are merged in order
/// ```
/// # use hostvars::inventory;
/// let inventory = inventory! {
///   "web: {hosts: {web1: null}}",
///   "db: {hosts: {db1: null}}"
/// };
/// assert_eq!(inventory.get_hosts("all").len(), 2);
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use hostvars::inventory;
/// inventory!("- not a mapping");
/// ```
#[macro_export]
macro_rules! inventory {
    { $($yaml:expr),+ $(,)? } => {{
        let mut inventory = $crate::inventory::Inventory::new();
        $(
            inventory.insert_yaml($yaml).expect("inventory must load");
        )+
        inventory
    }};
}
