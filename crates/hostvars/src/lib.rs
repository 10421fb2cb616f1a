//! # hostvars - inventory variable resolution
//!
//! `hostvars` loads a yaml inventory of hosts and groups, resolves the effective variables of each host and uses
//! them to list, export or connect to hosts via ssh.
//!
//! ## Introduction for developers
//!
//! Read this to understand how `hostvars` works internally.
//!
//! ### Inventory
//!
//! An inventory is a directed graph of groups with hosts attached to them ([inventory::Inventory]).
//!
//! - groups and hosts are stored in declaration order and addressed by index ([inventory::GroupId],
//!   [inventory::HostId])
//! - `all` and `ungrouped` always exist; every group is (transitively) a child of `all`
//! - a host that is not placed in any other group is in `ungrouped`
//! - a name is either a host or a group, never both
//! - edges that would form a cycle are rejected when they are added
//!
//! ```yaml
//! all:
//!   vars:
//!     user: admin
//!   children:
//!     web:
//!       vars:
//!         user: deploy
//!         port: 80
//!       hosts:
//!         web1:
//!           port: 8080
//! ```
//!
//! Loading files is implemented in [inventory::loader]: an inventory file, and the `group_vars/` and `host_vars/`
//! directories next to it. Host patterns (`web:&prod:!web3`) are in [inventory::pattern].
//!
//! ### Snapshot
//!
//! A [snapshot::Snapshot] is an extra mapping of variables that takes precedence over the inventory. It is loaded
//! and validated before anything is resolved.
//!
//! ### Resolving
//!
//! see [resolve::Resolver]
//!
//! For the inventory above `web1` resolves to
//!
//! ```yaml
//! user: deploy
//! port: 8080
//! inventory_hostname: web1
//! ansible_host: web1
//! ```
//!
//! Layers are merged lowest precedence first: `all`, the other groups of the host ordered by depth, the host itself,
//! derived variables and finally the snapshot. Mappings merge key by key, any other value is replaced.
//!
//! ### Using resolved variables
//!
//! - [export] lists hosts and exports resolved variables together with the group topology
//! - [ssh] turns resolved variables into an `ssh` invocation
//! - [context::Context] bundles what a single cli invocation loaded
pub mod context;
pub mod export;
pub mod inventory;
pub mod resolve;
pub mod snapshot;
pub mod ssh;
pub mod value;
