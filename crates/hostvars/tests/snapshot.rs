//! Snapshot tests
//!
//! Loads each inventories/*.yml file individually, resolves every host and compares the exported document. A
//! `<name>.snapshot.json` next to an inventory is used as its workspace snapshot.

use hostvars::export::InventoryExport;
use hostvars::inventory::Inventory;
use hostvars::resolve::Resolver;
use hostvars::snapshot::Snapshot;

#[test]
fn snapshots() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("HOSTVARS_LOG"))
        .with_writer(std::io::stderr)
        .init();

    insta::glob!("inventories/*.yml", |path| {
        let inventory = Inventory::load(path).expect("must be a valid inventory");

        let snapshot_path = path.with_extension("snapshot.json");
        let snapshot = if snapshot_path.exists() {
            Snapshot::load(&snapshot_path).expect("must be a valid snapshot")
        } else {
            Snapshot::default()
        };

        let export = InventoryExport::new(&Resolver::new(&inventory, &snapshot), "all");

        insta::assert_yaml_snapshot!(export);
    });
}
