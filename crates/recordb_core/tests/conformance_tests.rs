//! Bundled backends opened through their plugins pass the conformance suite.

use recordb_storage::{ConnectionPlugin, KvPlugin, MemoryPlugin};
use recordb_testkit::conformance;

#[test]
fn memory_plugin_conforms() {
    conformance::run_all(&|config| MemoryPlugin.setup(&config).unwrap());
}

#[test]
fn kv_plugin_conforms() {
    let plugin = KvPlugin::in_memory();
    conformance::run_all(&|config| plugin.setup(&config).unwrap());
}
