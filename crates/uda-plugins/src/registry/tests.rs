//! Unit tests for the plugin registry.

use rstest::{fixture, rstest};

use super::*;
use crate::descriptor::PluginClass;
use crate::tests::{NamedPlugin, register_named};

fn request(text: &str, source: &str) -> RequestModel {
    RequestModel::parse(text, source).expect("request parses")
}

#[fixture]
fn populated_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    register_named(&mut registry, "NETCDF", Some("nc"));
    register_named(&mut registry, "HDF5", Some("h5"));
    registry
        .register(
            PluginDescriptor::new("REMOTE", PluginClass::Device).with_device("JET"),
            NamedPlugin::new("REMOTE"),
        )
        .expect("register device plugin");
    registry
}

#[test]
fn new_registry_is_empty() {
    let registry = PluginRegistry::new();
    assert!(registry.is_empty());
    assert_eq!(registry.len(), 0);
}

#[test]
fn register_rejects_duplicate_names_ignoring_case() {
    let mut registry = PluginRegistry::new();
    register_named(&mut registry, "BYTES", None);
    let error = registry
        .register(
            PluginDescriptor::new("bytes", PluginClass::File),
            NamedPlugin::new("bytes"),
        )
        .expect_err("duplicate should fail");
    assert!(matches!(error, PluginError::Manifest { .. }));
    assert!(error.to_string().contains("already registered"));
}

#[test]
fn register_rejects_invalid_descriptor() {
    let mut registry = PluginRegistry::new();
    let error = registry
        .register(
            PluginDescriptor::new("", PluginClass::File),
            NamedPlugin::new(""),
        )
        .expect_err("empty name should fail");
    assert!(matches!(error, PluginError::Manifest { .. }));
}

#[rstest]
fn format_takes_priority_over_extension(populated_registry: PluginRegistry) {
    let resolved = populated_registry
        .resolve(&request("HDF5::read(path=/data/a.nc)", ""))
        .expect("resolves");
    assert_eq!(resolved.descriptor().name(), "HDF5");
}

#[rstest]
fn device_is_tried_after_format(populated_registry: PluginRegistry) {
    let resolved = populated_registry
        .resolve(&request("ip", "JET::UNKNOWN::/data/run.nc"))
        .expect("resolves");
    assert_eq!(resolved.descriptor().name(), "REMOTE");
}

#[rstest]
fn extension_is_the_last_resort(populated_registry: PluginRegistry) {
    let resolved = populated_registry
        .resolve(&request("ip", "/data/run.NC"))
        .expect("resolves");
    assert_eq!(resolved.descriptor().name(), "NETCDF");
}

#[rstest]
fn unknown_request_has_no_plugin(populated_registry: PluginRegistry) {
    let error = populated_registry
        .resolve(&request("MDS::get(node=x)", ""))
        .expect_err("no plugin");
    assert!(matches!(error, PluginError::NoPlugin { .. }));
}

#[test]
fn shared_extension_is_ambiguous() {
    let mut registry = PluginRegistry::new();
    register_named(&mut registry, "NETCDF", Some("nc"));
    register_named(&mut registry, "NC4", Some("nc"));

    let error = registry
        .resolve(&request("ip", "/data/run.nc"))
        .expect_err("ambiguous");
    let PluginError::Ambiguous {
        stage, candidates, ..
    } = error
    else {
        panic!("expected an ambiguous match");
    };
    assert_eq!(stage, "extension");
    assert_eq!(candidates, ["NETCDF", "NC4"]);
}

#[rstest]
#[case::a_first(&["A", "B"])]
#[case::b_first(&["B", "A"])]
fn resolution_ignores_registration_order(#[case] order: &[&str]) {
    let mut registry = PluginRegistry::new();
    for name in order {
        register_named(&mut registry, name, None);
    }
    let resolved = registry.resolve(&request("A::read()", "")).expect("resolves");
    assert_eq!(resolved.descriptor().name(), "A");
}

#[rstest]
fn lookups_ignore_case(populated_registry: PluginRegistry) {
    assert!(populated_registry.get("netcdf").is_some());
    assert_eq!(populated_registry.find_by_device("jet").len(), 1);
    assert_eq!(populated_registry.find_by_extension("H5").len(), 1);
    assert!(populated_registry.find_by_format("IDA").is_empty());
}

#[rstest]
fn descriptors_keep_registration_order(populated_registry: PluginRegistry) {
    let names: Vec<String> = populated_registry
        .descriptors()
        .iter()
        .map(|descriptor| descriptor.name().to_owned())
        .collect();
    assert_eq!(names, ["NETCDF", "HDF5", "REMOTE"]);
}
