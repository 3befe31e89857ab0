//! Unit tests for plugin descriptors.

use std::str::FromStr;

use rstest::rstest;

use super::*;

#[test]
fn defaults_are_public_and_uncached() {
    let descriptor = PluginDescriptor::new("BYTES", PluginClass::File);
    assert_eq!(descriptor.entry(), "bytes");
    assert_eq!(descriptor.cache(), CachePolicy::None);
    assert!(!descriptor.is_private());
    assert_eq!(descriptor.interface_version(), INTERFACE_VERSION);
    assert!(descriptor.validate().is_ok());
}

#[test]
fn extensions_are_normalised() {
    let descriptor = PluginDescriptor::new("NETCDF", PluginClass::File)
        .with_extension(".NC")
        .with_extension("cdf");
    assert_eq!(descriptor.extensions(), ["nc", "cdf"]);
    assert!(descriptor.matches_extension("Nc"));
    assert!(!descriptor.matches_extension("h5"));
}

#[test]
fn lookups_ignore_case() {
    let descriptor = PluginDescriptor::new("Mast", PluginClass::Server).with_device("Jet");
    assert!(descriptor.matches_format("MAST"));
    assert!(descriptor.matches_device("JET"));
    assert!(!descriptor.matches_device("ITER"));
}

#[rstest]
#[case::empty("")]
#[case::spaces("BAD NAME")]
#[case::separator("A::B")]
fn invalid_names_are_rejected(#[case] name: &str) {
    let error = PluginDescriptor::new(name, PluginClass::Other)
        .validate()
        .unwrap_err();
    assert!(matches!(error, PluginError::Manifest { .. }));
}

#[rstest]
#[case::zero(0)]
#[case::future(INTERFACE_VERSION + 1)]
fn unsupported_interface_versions_are_rejected(#[case] version: u32) {
    let descriptor =
        PluginDescriptor::new("X", PluginClass::Function).with_interface_version(version);
    assert!(descriptor.validate().is_err());
}

#[rstest]
#[case::lower("file", PluginClass::File)]
#[case::upper("SERVER", PluginClass::Server)]
#[case::mixed("Function", PluginClass::Function)]
fn classes_parse_case_insensitively(#[case] text: &str, #[case] expected: PluginClass) {
    assert_eq!(PluginClass::from_str(text).unwrap(), expected);
}

#[test]
fn class_displays_lower_case() {
    assert_eq!(PluginClass::Device.to_string(), "device");
    assert_eq!(CachePolicy::Ok.as_ref(), "ok");
}
