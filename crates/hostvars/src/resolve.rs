//! variable resolution
//!
//! The effective variables of a host are built by merging [Layer]s into an initially empty mapping, lowest
//! precedence first. Every layer is merged with [value::merge]: objects merge key by key, everything else is
//! replaced.
//!
//! | order | layer                                   | notes                                               |
//! |-------|-----------------------------------------|-----------------------------------------------------|
//! | 1     | [Layer::Group] for `all`                | depth 0                                             |
//! | 2     | [Layer::Group] for every other group    | by depth (longest distance from `all`), then by declaration order |
//! | 3     | [Layer::Host]                           | variables attached to the host                      |
//! | 4     | [Layer::Derived]                        | `inventory_hostname`, fallback `ansible_host`       |
//! | 5     | [Layer::Snapshot]                       | overrides everything                                |
//!
//! Ordering groups by their depth places every group after all of its ancestors, also when a group can be reached
//! through paths of different length.
//!
//! `ansible_host` is only derived when no other layer (including the snapshot) defines it.
//!
//! Resolution reads the [Inventory] and [Snapshot] and never modifies them. A [Resolver] may be shared between
//! threads, [Resolver::resolve_all] resolves hosts in parallel.
use crate::inventory::{Group, GroupId, Host, HostId, Inventory};
use crate::snapshot::Snapshot;
use crate::value::{self, Value, Variables};
use rayon::prelude::*;
use std::borrow::Cow;

pub const INVENTORY_HOSTNAME: &str = "inventory_hostname";
pub const ANSIBLE_HOST: &str = "ansible_host";

/// A source of variables
pub trait VariableProvider {
    fn provide(&self) -> Cow<'_, Variables>;
}

impl VariableProvider for Group {
    fn provide(&self) -> Cow<'_, Variables> {
        Cow::Borrowed(&self.variables)
    }
}

impl VariableProvider for Host {
    fn provide(&self) -> Cow<'_, Variables> {
        Cow::Borrowed(&self.variables)
    }
}

impl VariableProvider for Snapshot {
    fn provide(&self) -> Cow<'_, Variables> {
        Cow::Borrowed(self.variables())
    }
}

/// One step of the merge order
#[derive(Debug)]
pub enum Layer<'a> {
    Group(&'a Group),
    Host(&'a Host),
    /// Computed by the resolver
    Derived(Variables),
    Snapshot(&'a Snapshot),
}

impl Layer<'_> {
    pub fn describe(&self) -> String {
        match self {
            Layer::Group(group) => format!("group {}", group.name),
            Layer::Host(host) => format!("host {}", host.name),
            Layer::Derived(_) => "derived".to_string(),
            Layer::Snapshot(_) => "snapshot".to_string(),
        }
    }
}

impl VariableProvider for Layer<'_> {
    fn provide(&self) -> Cow<'_, Variables> {
        match self {
            Layer::Group(group) => group.provide(),
            Layer::Host(host) => host.provide(),
            Layer::Derived(variables) => Cow::Borrowed(variables),
            Layer::Snapshot(snapshot) => snapshot.provide(),
        }
    }
}

/// Resolves host variables of one [Inventory] with one [Snapshot]
#[derive(derive_new::new, Debug, Clone, Copy)]
pub struct Resolver<'a> {
    inventory: &'a Inventory,
    snapshot: &'a Snapshot,
}

impl<'a> Resolver<'a> {
    pub fn inventory(&self) -> &'a Inventory {
        self.inventory
    }

    /// Effective variables of the host `name`
    pub fn resolve(&self, name: &str) -> Result<Variables, ResolveError> {
        let host = self.host_id(name)?;
        Ok(self.resolve_id(host))
    }

    /// Effective variables of a host known to the inventory
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn resolve_id(&self, host: HostId) -> Variables {
        let mut resolved = Variables::new();

        for layer in self.layers_of(host) {
            tracing::trace!(layer = layer.describe(), "apply layer");
            value::merge(&mut resolved, layer.provide().into_owned());
        }

        resolved
    }

    /// Resolve every host matching `pattern`, in parallel
    ///
    /// Results are in host declaration order.
    pub fn resolve_all(&self, pattern: &str) -> Vec<(HostId, Variables)> {
        let hosts = self.inventory.get_hosts(pattern);
        tracing::debug!(hosts = hosts.len(), pattern, "resolving hosts");

        hosts
            .par_iter()
            .map(|host| (*host, self.resolve_id(*host)))
            .collect()
    }

    /// Layers of the host `name`, lowest precedence first
    pub fn layers(&self, name: &str) -> Result<Vec<Layer<'a>>, ResolveError> {
        let host = self.host_id(name)?;
        Ok(self.layers_of(host))
    }

    fn layers_of(&self, host_id: HostId) -> Vec<Layer<'a>> {
        let host = self.inventory.host(host_id);

        let mut layers: Vec<Layer<'a>> = self
            .ordered_groups(host_id)
            .into_iter()
            .map(|group| Layer::Group(self.inventory.group(group)))
            .collect();
        layers.push(Layer::Host(host));

        let mut derived = Variables::new();
        derived.insert(
            INVENTORY_HOSTNAME.to_string(),
            Value::from(host.name.as_str()),
        );
        let defines_address = layers
            .iter()
            .chain(std::iter::once(&Layer::Snapshot(self.snapshot)))
            .any(|layer| layer.provide().contains_key(ANSIBLE_HOST));
        if !defines_address {
            derived.insert(ANSIBLE_HOST.to_string(), Value::from(host.name.as_str()));
        }
        layers.push(Layer::Derived(derived));

        layers.push(Layer::Snapshot(self.snapshot));
        layers
    }

    /// Every group of `host` (including ancestors and `all`) in merge order
    pub fn ordered_groups(&self, host: HostId) -> Vec<GroupId> {
        let groups = self.inventory.all_groups_of(host);
        let depths = self.inventory.depths(&groups);

        let mut ordered: Vec<(usize, GroupId)> = depths.into_iter().zip(groups).collect();
        ordered.sort();
        ordered.into_iter().map(|(_, group)| group).collect()
    }

    fn host_id(&self, name: &str) -> Result<HostId, ResolveError> {
        self.inventory
            .host_id(name)
            .ok_or_else(|| ResolveError::HostNotFound(name.to_string()))
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ResolveError {
    #[error("Host not found: {0}")]
    HostNotFound(String),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::inventory;
    use crate::value::vars;
    use pretty_assertions::assert_eq;

    fn scenario() -> Inventory {
        inventory! {r#"
        all:
          vars:
            user: admin
          children:
            web:
              vars:
                user: deploy
                port: 80
              hosts:
                web1:
                  port: 8080
        "#}
    }

    fn resolve(inventory: &Inventory, snapshot: &Snapshot, host: &str) -> Variables {
        Resolver::new(inventory, snapshot).resolve(host).unwrap()
    }

    #[test]
    fn scenario_without_snapshot() {
        let inventory = scenario();
        let resolved = resolve(&inventory, &Snapshot::default(), "web1");

        assert_eq!(
            resolved,
            vars("user: deploy\nport: 8080\ninventory_hostname: web1\nansible_host: web1")
        );
    }

    #[test]
    fn scenario_with_snapshot() {
        let inventory = scenario();
        let snapshot = Snapshot::new(vars("user: ci"));

        assert_eq!(
            resolve(&inventory, &snapshot, "web1")["user"],
            Value::from("ci")
        );
    }

    #[test]
    fn nearer_group_wins() {
        let inventory = inventory! {r#"
        region:
          vars: {k: region}
          children:
            dc:
              vars: {k: dc}
              hosts:
                h:
        "#};

        let resolved = resolve(&inventory, &Snapshot::default(), "h");
        assert_eq!(resolved["k"], Value::from("dc"));
    }

    #[test]
    fn host_overrides_groups() {
        let inventory = inventory!("web: {vars: {k: group}, hosts: {h: {k: host}}}");
        let resolved = resolve(&inventory, &Snapshot::default(), "h");
        assert_eq!(resolved["k"], Value::from("host"));
    }

    #[test]
    fn snapshot_overrides_everything() {
        let inventory = inventory! {r#"
        all:
          vars: {k: all, ansible_host: 10.0.0.1}
        web:
          vars: {k: web}
          hosts:
            h: {k: host, inventory_hostname: other}
        "#};
        let snapshot = Snapshot::new(vars("k: snap\nansible_host: 10.9.9.9"));

        let resolved = resolve(&inventory, &snapshot, "h");
        assert_eq!(resolved["k"], Value::from("snap"));
        assert_eq!(resolved["ansible_host"], Value::from("10.9.9.9"));
    }

    #[test]
    fn nested_mappings_merge() {
        let inventory = inventory!("web: {vars: {opts: {a: 1}}, hosts: {h: {opts: {b: 2}}}}");
        let resolved = resolve(&inventory, &Snapshot::default(), "h");
        assert_eq!(resolved["opts"], Value::Object(vars("a: 1\nb: 2")));
    }

    #[test]
    fn snapshot_merges_nested_mappings() {
        let inventory = inventory!("web: {vars: {opts: {a: 1, b: 1}}, hosts: {h: null}}");
        let snapshot = Snapshot::new(vars("opts: {b: 2}"));

        let resolved = resolve(&inventory, &snapshot, "h");
        assert_eq!(resolved["opts"], Value::Object(vars("a: 1\nb: 2")));
    }

    #[test]
    fn sequences_are_replaced() {
        let inventory = inventory!("web: {vars: {tags: [x]}, hosts: {h: {tags: [y]}}}");
        let resolved = resolve(&inventory, &Snapshot::default(), "h");
        assert_eq!(resolved["tags"], Value::from(vec!["y"]));
    }

    #[test]
    fn derived_address() {
        let inventory = inventory!("web: {hosts: {plain: null, explicit: {ansible_host: 10.0.0.5}}}");
        let snapshot = Snapshot::default();

        assert_eq!(
            resolve(&inventory, &snapshot, "plain")["ansible_host"],
            Value::from("plain")
        );
        assert_eq!(
            resolve(&inventory, &snapshot, "explicit")["ansible_host"],
            Value::from("10.0.0.5")
        );
    }

    #[test]
    fn derived_address_respects_group_definition() {
        let inventory = inventory!("web: {vars: {ansible_host: lb.example.org}, hosts: {h: null}}");
        let resolved = resolve(&inventory, &Snapshot::default(), "h");
        assert_eq!(resolved["ansible_host"], Value::from("lb.example.org"));
    }

    #[test]
    fn unknown_host() {
        let inventory = scenario();
        let snapshot = Snapshot::default();
        assert_eq!(
            Resolver::new(&inventory, &snapshot).resolve("ghost"),
            Err(ResolveError::HostNotFound("ghost".into()))
        );
    }

    #[test]
    fn siblings_follow_declaration_order() {
        // `a` is declared first, so `b` is applied after it even though the host lists `b` first
        let inventory = inventory! {r#"
        a:
          vars: {k: a}
        b:
          vars: {k: b}
          hosts:
            h:
        "#, "a: {hosts: {h: null}}"};

        let resolved = resolve(&inventory, &Snapshot::default(), "h");
        assert_eq!(resolved["k"], Value::from("b"));
    }

    #[test]
    fn deepest_path_decides_order() {
        // `mid` is reached both directly from `all` and through `top`; it must still win over `top`
        let mut inventory = inventory! {r#"
        mid:
          vars: {k: mid}
          hosts:
            h:
        top:
          vars: {k: top}
        "#};
        let top = inventory.group_id("top").unwrap();
        let mid = inventory.group_id("mid").unwrap();
        inventory.add_child_group(GroupId::ALL, mid).unwrap();
        inventory.add_child_group(top, mid).unwrap();
        inventory.add_child_group(GroupId::ALL, mid).unwrap();

        let snapshot = Snapshot::default();
        let resolver = Resolver::new(&inventory, &snapshot);
        let host = inventory.host_id("h").unwrap();

        assert_eq!(
            resolver.ordered_groups(host),
            vec![GroupId::ALL, top, mid]
        );
        assert_eq!(resolver.resolve_id(host)["k"], Value::from("mid"));
    }

    #[test]
    fn layers_in_order() {
        let inventory = scenario();
        let snapshot = Snapshot::default();
        let layers = Resolver::new(&inventory, &snapshot).layers("web1").unwrap();

        let described: Vec<String> = layers.iter().map(Layer::describe).collect();
        assert_eq!(
            described,
            vec!["group all", "group web", "host web1", "derived", "snapshot"]
        );
    }

    #[test]
    fn resolve_all_matches_sequential() {
        let inventory = inventory! {r#"
        all:
          vars: {user: admin}
          children:
            web:
              vars: {port: 80}
              hosts:
                "web[01:20]":
            db:
              hosts:
                db1: {port: 5432}
        "#};
        let snapshot = Snapshot::new(vars("env: test"));
        let resolver = Resolver::new(&inventory, &snapshot);

        let parallel = resolver.resolve_all("all");
        let sequential: Vec<_> = inventory
            .host_ids()
            .map(|host| (host, resolver.resolve_id(host)))
            .collect();

        assert_eq!(parallel.len(), 21);
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn resolver_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Resolver<'static>>();
    }
}
