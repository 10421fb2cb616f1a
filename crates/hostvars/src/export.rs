//! listing and export of resolved hosts
//!
//! [HostSummary] is the short form used by listings (address, port and user). [InventoryExport] holds the full
//! resolved variables of every selected host together with the group topology and is meant to be serialized.
use crate::inventory::{GroupId, Inventory};
use crate::resolve::{Resolver, ANSIBLE_HOST};
use crate::value::{Value, Variables};
use indexmap::IndexMap;
use serde::Serialize;

/// Variables that may hold the ssh port, first match wins
pub const PORT_VARIABLES: &[&str] = &["ansible_port", "ansible_ssh_port"];
pub const USER_VARIABLE: &str = "ansible_user";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostSummary {
    pub name: String,
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl HostSummary {
    pub fn from_vars(name: &str, variables: &Variables) -> Self {
        let text = |key: &str| variables.get(key).and_then(Value::as_str).map(str::to_string);

        Self {
            name: name.to_string(),
            address: text(ANSIBLE_HOST),
            port: PORT_VARIABLES
                .iter()
                .find_map(|key| variables.get(*key))
                .cloned(),
            user: text(USER_VARIABLE),
        }
    }
}

impl std::fmt::Display for HostSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Host: {}, IP: {}",
            self.name,
            self.address.as_deref().unwrap_or("-")
        )?;
        if let Some(port) = &self.port {
            write!(f, ", Port: {port}")?;
        }
        if let Some(user) = &self.user {
            write!(f, ", User: {user}")?;
        }
        Ok(())
    }
}

/// Direct relations of a group, by name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub children: Vec<String>,
    pub hosts: Vec<String>,
}

/// Groups in declaration order
pub fn topology(inventory: &Inventory) -> IndexMap<String, GroupSummary> {
    let group_name = |id: &GroupId| inventory.group(*id).name.clone();

    inventory
        .groups()
        .map(|(_, group)| {
            let summary = GroupSummary {
                children: group.children().iter().map(group_name).collect(),
                hosts: group
                    .hosts()
                    .iter()
                    .map(|host| inventory.host(*host).name.clone())
                    .collect(),
            };
            (group.name.clone(), summary)
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct InventoryExport {
    pub hosts: IndexMap<String, Variables>,
    pub groups: IndexMap<String, GroupSummary>,
}

impl InventoryExport {
    /// Resolve every host matching `pattern`
    pub fn new(resolver: &Resolver, pattern: &str) -> Self {
        let inventory = resolver.inventory();
        let hosts = resolver
            .resolve_all(pattern)
            .into_iter()
            .map(|(host, variables)| (inventory.host(host).name.clone(), variables))
            .collect();

        Self {
            hosts,
            groups: topology(inventory),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::inventory;
    use crate::snapshot::Snapshot;
    use crate::value::vars;
    use pretty_assertions::assert_eq;

    #[test]
    fn summary_picks_connection_fields() {
        let summary = HostSummary::from_vars(
            "web1",
            &vars("ansible_host: 10.0.0.1\nansible_ssh_port: 2222\nansible_user: deploy"),
        );

        assert_eq!(summary.port, Some(Value::Integer(2222)));
        assert_eq!(
            summary.to_string(),
            "Host: web1, IP: 10.0.0.1, Port: 2222, User: deploy"
        );
    }

    #[test]
    fn summary_without_optional_fields() {
        let summary = HostSummary::from_vars("web1", &vars("ansible_host: web1"));
        assert_eq!(summary.to_string(), "Host: web1, IP: web1");
    }

    #[test]
    fn export_contains_hosts_and_topology() {
        let inventory = inventory! {r#"
        all:
          vars: {user: admin}
          hosts:
            bastion:
          children:
            web:
              children:
                edge:
                  hosts:
                    edge1:
        "#};
        let snapshot = Snapshot::default();
        let export = InventoryExport::new(&Resolver::new(&inventory, &snapshot), "web");

        assert_eq!(export.hosts.keys().collect::<Vec<_>>(), vec!["edge1"]);
        assert_eq!(export.hosts["edge1"]["user"], Value::from("admin"));

        assert_eq!(
            export.groups["all"],
            GroupSummary {
                children: vec!["ungrouped".into(), "web".into()],
                hosts: vec![],
            }
        );
        assert_eq!(export.groups["ungrouped"].hosts, vec!["bastion"]);
        assert_eq!(export.groups["web"].children, vec!["edge"]);
        assert_eq!(export.groups["edge"].hosts, vec!["edge1"]);
    }
}
