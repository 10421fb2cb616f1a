//! ssh dispatch
//!
//! An [SshTarget] is derived from the resolved variables of a host:
//!
//! | target field       | variables (first match)                                        | fallback              |
//! |--------------------|----------------------------------------------------------------|-----------------------|
//! | `address`          | `ansible_host`                                                 | none, required        |
//! | `user`             | `ansible_user`                                                 | [SshDefaults::user]   |
//! | `port`             | `ansible_port`, `ansible_ssh_port`                             | [SshDefaults::port]   |
//! | `private_key_file` | `ansible_ssh_private_key_file`, `ansible_private_key_file`     | [SshDefaults::private_key_file] |
//!
//! The target is turned into an `ssh` invocation with [SshTarget::command].
use crate::context::SshDefaults;
use crate::export::{PORT_VARIABLES, USER_VARIABLE};
use crate::resolve::{ResolveError, Resolver, ANSIBLE_HOST};
use crate::value::{Value, Variables};
use serde::Serialize;
use std::path::PathBuf;
use std::process::Command;

pub const PRIVATE_KEY_VARIABLES: &[&str] =
    &["ansible_ssh_private_key_file", "ansible_private_key_file"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SshTarget {
    pub host: String,
    pub address: String,
    pub user: String,
    pub port: u16,
    pub private_key_file: PathBuf,
}

impl SshTarget {
    /// Resolve `host` and build its target
    pub fn resolve(
        resolver: &Resolver,
        host: &str,
        defaults: &SshDefaults,
    ) -> Result<Self, DispatchError> {
        let variables = resolver.resolve(host)?;
        Self::from_vars(host, &variables, defaults)
    }

    pub fn from_vars(
        host: &str,
        variables: &Variables,
        defaults: &SshDefaults,
    ) -> Result<Self, DispatchError> {
        let address = match variables.get(ANSIBLE_HOST) {
            None | Some(Value::Null) => {
                return Err(DispatchError::MissingAddress(host.to_string()))
            }
            Some(Value::String(address)) if address.trim().is_empty() => {
                return Err(DispatchError::MissingAddress(host.to_string()))
            }
            Some(Value::String(address)) => address.clone(),
            Some(other) => return Err(invalid(host, ANSIBLE_HOST, "a string", other)),
        };

        let user = match variables.get(USER_VARIABLE) {
            None | Some(Value::Null) => defaults.user.clone(),
            Some(Value::String(user)) => user.clone(),
            Some(other) => return Err(invalid(host, USER_VARIABLE, "a string", other)),
        };

        let port = match first_of(variables, PORT_VARIABLES) {
            None => defaults.port,
            Some((key, value)) => parse_port(value)
                .ok_or_else(|| invalid(host, key, "a port number", value))?,
        };

        let private_key_file = match first_of(variables, PRIVATE_KEY_VARIABLES) {
            None => defaults.private_key_file.clone(),
            Some((_, Value::String(path))) => PathBuf::from(path),
            Some((key, other)) => return Err(invalid(host, key, "a path", other)),
        };

        Ok(Self {
            host: host.to_string(),
            address,
            user,
            port,
            private_key_file,
        })
    }

    /// Arguments for `ssh`, optionally running `remote_command` instead of a login shell
    pub fn args(&self, remote_command: &[String], verbosity: u8) -> Vec<String> {
        let mut args = vec!["-t".to_string()];

        if verbosity > 0 {
            args.push(format!("-{}", "v".repeat(verbosity.into())));
        }

        args.extend([
            "-i".to_string(),
            self.private_key_file.display().to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-p".to_string(),
            self.port.to_string(),
            format!("{}@{}", self.user, self.address),
        ]);
        args.extend(remote_command.iter().cloned());

        args
    }

    pub fn command(&self, remote_command: &[String], verbosity: u8) -> Command {
        let mut command = Command::new("ssh");
        command.args(self.args(remote_command, verbosity));
        command
    }

    /// The invocation as a single shell line
    pub fn command_line(&self, remote_command: &[String], verbosity: u8) -> String {
        std::iter::once("ssh".to_string())
            .chain(self.args(remote_command, verbosity).iter().map(|a| quote(a)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn first_of<'v>(
    variables: &'v Variables,
    keys: &[&'static str],
) -> Option<(&'static str, &'v Value)> {
    keys.iter().find_map(|key| match variables.get(*key) {
        None | Some(Value::Null) => None,
        Some(value) => Some((*key, value)),
    })
}

fn parse_port(value: &Value) -> Option<u16> {
    let port = match value {
        Value::Integer(port) => u16::try_from(*port).ok()?,
        Value::String(port) => port.trim().parse().ok()?,
        _ => return None,
    };
    (port != 0).then_some(port)
}

fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=@:,+%".contains(c));

    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

fn invalid(
    host: &str,
    variable: &'static str,
    expected: &'static str,
    found: &Value,
) -> DispatchError {
    DispatchError::InvalidVariable {
        host: host.to_string(),
        variable,
        expected,
        found: found.to_string(),
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DispatchError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("Host {0} has no address (ansible_host is not set)")]
    MissingAddress(String),
    #[error("Host {host}: {variable} must be {expected}, found {found}")]
    InvalidVariable {
        host: String,
        variable: &'static str,
        expected: &'static str,
        found: String,
    },
}
