//! inventory graph ([Group]s, [Host]s and the edges between them)
//!
//! [Inventory] owns every group and host. Both are addressed by a stable id ([GroupId], [HostId]) handed out on
//! insertion; removal is not possible. Relations are stored as ids on both ends of an edge:
//! - group -> child group (a group may have several parents, the groups form a DAG)
//! - group -> host (many-to-many)
//!
//! Two groups always exist:
//! - `all`: root of the graph, implicit ancestor of every group and implicit group of every host
//! - `ungrouped`: holds hosts that are not a member of any other group
//!
//! Edges that would create a cycle are rejected when they are added, so a finished [Inventory] is always acyclic.
use crate::value::{self, Variables};
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};

pub mod loader;
pub mod pattern;

pub const ALL: &str = "all";
pub const UNGROUPED: &str = "ungrouped";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(usize);

impl GroupId {
    pub const ALL: GroupId = GroupId(0);
    pub const UNGROUPED: GroupId = GroupId(1);

    /// Declaration order
    pub fn index(self) -> usize {
        self.0
    }
}

impl HostId {
    /// Declaration order
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
pub struct Group {
    pub name: String,
    pub variables: Variables,
    children: Vec<GroupId>,
    parents: Vec<GroupId>,
    hosts: Vec<HostId>,
    /// The edge from `all` was added by [Inventory::add_group], not requested
    implicit_root: bool,
}

impl Group {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            variables: Default::default(),
            children: Default::default(),
            parents: Default::default(),
            hosts: Default::default(),
            implicit_root: false,
        }
    }

    pub fn children(&self) -> &[GroupId] {
        &self.children
    }

    pub fn parents(&self) -> &[GroupId] {
        &self.parents
    }

    /// Direct members
    pub fn hosts(&self) -> &[HostId] {
        &self.hosts
    }
}

#[derive(Debug)]
pub struct Host {
    pub name: String,
    pub variables: Variables,
    groups: Vec<GroupId>,
}

impl Host {
    /// Direct memberships
    pub fn groups(&self) -> &[GroupId] {
        &self.groups
    }
}

#[derive(Debug)]
pub struct Inventory {
    groups: IndexMap<String, Group>,
    hosts: IndexMap<String, Host>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    pub fn new() -> Self {
        let mut groups = IndexMap::new();
        groups.insert(ALL.to_string(), Group::new(ALL));
        groups.insert(UNGROUPED.to_string(), Group::new(UNGROUPED));

        let mut inventory = Self {
            groups,
            hosts: Default::default(),
        };
        inventory.link(GroupId::ALL, GroupId::UNGROUPED);
        inventory
    }

    /// Returns the id of the group `name`, creating it if needed
    ///
    /// New groups start out as children of `all` until they get an explicit parent.
    pub fn add_group(&mut self, name: &str) -> Result<GroupId, InventoryError> {
        if self.hosts.contains_key(name) {
            return Err(InventoryError::DuplicateDefinition {
                name: name.to_string(),
                existing: Kind::Host,
            });
        }

        if let Some(index) = self.groups.get_index_of(name) {
            return Ok(GroupId(index));
        }

        let (index, _) = self.groups.insert_full(name.to_string(), Group::new(name));
        let id = GroupId(index);
        self.link(GroupId::ALL, id);
        self.group_mut(id).implicit_root = true;

        tracing::trace!(group = name, "add group");
        Ok(id)
    }

    /// Returns the id of the host `name`, creating it if needed
    ///
    /// New hosts are members of `ungrouped` until they join another group.
    pub fn add_host(&mut self, name: &str) -> Result<HostId, InventoryError> {
        if self.groups.contains_key(name) {
            return Err(InventoryError::DuplicateDefinition {
                name: name.to_string(),
                existing: Kind::Group,
            });
        }

        if let Some(index) = self.hosts.get_index_of(name) {
            return Ok(HostId(index));
        }

        let (index, _) = self.hosts.insert_full(
            name.to_string(),
            Host {
                name: name.to_string(),
                variables: Default::default(),
                groups: Default::default(),
            },
        );
        let id = HostId(index);
        self.join(id, GroupId::UNGROUPED);

        tracing::trace!(host = name, "add host");
        Ok(id)
    }

    /// Merge `variables` into the variables of a group (see [value::merge])
    pub fn add_group_variables(&mut self, group: GroupId, variables: Variables) {
        value::merge(&mut self.group_mut(group).variables, variables);
    }

    /// Merge `variables` into the variables of a host (see [value::merge])
    pub fn add_host_variables(&mut self, host: HostId, variables: Variables) {
        value::merge(&mut self.host_mut(host).variables, variables);
    }

    /// Add edge `parent` -> `child`
    ///
    /// The edge is rejected when `child` is `parent`, `all` or already an ancestor of `parent`.
    /// A rejected edge leaves the inventory unchanged, adding an existing edge does nothing.
    ///
    /// The implicit edge from `all` is replaced by the first explicit parent. An edge from `all` that was added
    /// explicitly is kept.
    pub fn add_child_group(&mut self, parent: GroupId, child: GroupId) -> Result<(), InventoryError> {
        if self.group(parent).children.contains(&child) {
            if parent == GroupId::ALL {
                self.group_mut(child).implicit_root = false;
            }
            return Ok(());
        }

        if parent == child || child == GroupId::ALL || self.ancestors_of(parent).contains(&child) {
            return Err(InventoryError::Cycle {
                parent: self.group(parent).name.clone(),
                child: self.group(child).name.clone(),
            });
        }

        if parent != GroupId::ALL && self.group(child).implicit_root {
            self.unlink(GroupId::ALL, child);
        }
        self.group_mut(child).implicit_root = false;

        self.link(parent, child);
        Ok(())
    }

    /// Add `host` to `group`
    ///
    /// Membership in `all` is implicit, adding a host to `all` does nothing.
    pub fn add_host_to_group(&mut self, host: HostId, group: GroupId) {
        if group == GroupId::ALL {
            return;
        }

        if group != GroupId::UNGROUPED {
            self.leave(host, GroupId::UNGROUPED);
        }

        self.join(host, group);
    }

    /// All ancestors of `group`, nearest first (breadth-first)
    ///
    /// Every ancestor is listed once. `all` is always the last element (and absent for `all` itself).
    pub fn ancestors_of(&self, group: GroupId) -> Vec<GroupId> {
        let mut visited = HashSet::new();
        let mut ancestors = vec![];
        let mut queue: VecDeque<GroupId> = self.group(group).parents.iter().copied().collect();

        while let Some(current) = queue.pop_front() {
            if current == GroupId::ALL || !visited.insert(current) {
                continue;
            }

            ancestors.push(current);
            queue.extend(self.group(current).parents.iter().copied());
        }

        if group != GroupId::ALL {
            ancestors.push(GroupId::ALL);
        }

        ancestors
    }

    /// Direct group memberships of `host`
    pub fn groups_of(&self, host: HostId) -> &[GroupId] {
        &self.host(host).groups
    }

    /// Every group `host` belongs to, directly or transitively, including `all`
    pub fn all_groups_of(&self, host: HostId) -> Vec<GroupId> {
        let mut seen = HashSet::new();
        let mut groups = vec![];

        for direct in self.groups_of(host) {
            for group in std::iter::once(*direct).chain(self.ancestors_of(*direct)) {
                if seen.insert(group) {
                    groups.push(group);
                }
            }
        }

        if seen.insert(GroupId::ALL) {
            groups.push(GroupId::ALL);
        }

        groups
    }

    /// Longest distance from `all` (which has depth 0)
    ///
    /// A group is always deeper than each of its parents.
    pub fn depth(&self, group: GroupId) -> usize {
        self.depths(&[group])[0]
    }

    /// [Inventory::depth] for several groups, sharing intermediate results
    pub fn depths(&self, groups: &[GroupId]) -> Vec<usize> {
        let mut memo = vec![None; self.groups.len()];
        groups
            .iter()
            .map(|group| self.depth_memo(*group, &mut memo))
            .collect()
    }

    fn depth_memo(&self, group: GroupId, memo: &mut [Option<usize>]) -> usize {
        if group == GroupId::ALL {
            return 0;
        }

        if let Some(depth) = memo[group.0] {
            return depth;
        }

        let mut depth = 1;
        for parent in &self.group(group).parents {
            depth = depth.max(self.depth_memo(*parent, memo) + 1);
        }

        memo[group.0] = Some(depth);
        depth
    }

    /// Hosts that are members of `group` directly or through a descendant group, in declaration order
    pub fn hosts_in_group(&self, group: GroupId) -> Vec<HostId> {
        if group == GroupId::ALL {
            return self.host_ids().collect();
        }

        let mut descendants = HashSet::from([group]);
        let mut queue = VecDeque::from([group]);
        while let Some(current) = queue.pop_front() {
            for child in &self.group(current).children {
                if descendants.insert(*child) {
                    queue.push_back(*child);
                }
            }
        }

        self.hosts()
            .filter(|(_, host)| host.groups.iter().any(|g| descendants.contains(g)))
            .map(|(id, _)| id)
            .collect()
    }

    /// Hosts matching a host pattern, in declaration order (see [pattern])
    pub fn get_hosts(&self, pattern: &str) -> Vec<HostId> {
        pattern::HostPattern::parse(pattern).select(self)
    }

    pub fn get_host(&self, name: &str) -> Option<&Host> {
        self.hosts.get(name)
    }

    pub fn host_id(&self, name: &str) -> Option<HostId> {
        self.hosts.get_index_of(name).map(HostId)
    }

    pub fn group_id(&self, name: &str) -> Option<GroupId> {
        self.groups.get_index_of(name).map(GroupId)
    }

    /// # Panic
    /// Panics if `id` was not handed out by this inventory
    pub fn host(&self, id: HostId) -> &Host {
        &self.hosts[id.0]
    }

    /// # Panic
    /// Panics if `id` was not handed out by this inventory
    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id.0]
    }

    pub fn hosts(&self) -> impl Iterator<Item = (HostId, &Host)> {
        self.hosts.values().enumerate().map(|(i, h)| (HostId(i), h))
    }

    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &Group)> {
        self.groups.values().enumerate().map(|(i, g)| (GroupId(i), g))
    }

    pub fn host_ids(&self) -> impl Iterator<Item = HostId> {
        (0..self.hosts.len()).map(HostId)
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    fn host_mut(&mut self, id: HostId) -> &mut Host {
        &mut self.hosts[id.0]
    }

    fn group_mut(&mut self, id: GroupId) -> &mut Group {
        &mut self.groups[id.0]
    }

    fn link(&mut self, parent: GroupId, child: GroupId) {
        if self.group(parent).children.contains(&child) {
            return;
        }

        tracing::trace!(parent = %self.group(parent).name, child = %self.group(child).name, "add child group");
        self.group_mut(parent).children.push(child);
        self.group_mut(child).parents.push(parent);
    }

    fn unlink(&mut self, parent: GroupId, child: GroupId) {
        self.group_mut(parent).children.retain(|g| *g != child);
        self.group_mut(child).parents.retain(|g| *g != parent);
    }

    fn join(&mut self, host: HostId, group: GroupId) {
        if self.host(host).groups.contains(&group) {
            return;
        }

        self.host_mut(host).groups.push(group);
        self.group_mut(group).hosts.push(host);
    }

    fn leave(&mut self, host: HostId, group: GroupId) {
        self.host_mut(host).groups.retain(|g| *g != group);
        self.group_mut(group).hosts.retain(|h| *h != host);
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum InventoryError {
    #[error("{name:?} is already defined as a {existing}")]
    DuplicateDefinition { name: String, existing: Kind },
    #[error("rejected edge {parent:?} -> {child:?}: group {child:?} would become its own ancestor")]
    Cycle { parent: String, child: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Group,
    Host,
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::Group => f.write_str("group"),
            Kind::Host => f.write_str("host"),
        }
    }
}
