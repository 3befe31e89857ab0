//! Unit tests for the registry file and plugin catalogue.

use std::io::Write;

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use tempfile::NamedTempFile;

use super::*;
use crate::tests::NamedPlugin;

#[fixture]
fn catalogue() -> PluginCatalogue {
    PluginCatalogue::new()
        .with("bytes", || NamedPlugin::new("bytes"))
        .with("help", || NamedPlugin::new("help"))
}

#[test]
fn full_line_populates_every_field() {
    let descriptors = parse_registry(
        "RAW, file, bytes, libbytes.so, raw, 1, Y, N, Raw byte reader, RAW::read(path=/x, y=1)\n",
    )
    .expect("parses");
    let [raw] = descriptors.as_slice() else {
        panic!("expected one descriptor");
    };
    assert_eq!(raw.name(), "RAW");
    assert_eq!(raw.class(), PluginClass::File);
    assert_eq!(raw.entry(), "bytes");
    assert_eq!(raw.library(), Some("libbytes.so"));
    assert_eq!(raw.extensions(), ["raw"]);
    assert_eq!(raw.cache(), CachePolicy::Ok);
    assert!(raw.is_private());
    assert_eq!(raw.description(), "Raw byte reader");
    assert_eq!(raw.example(), "RAW::read(path=/x,y=1)");
}

#[test]
fn comments_and_blank_lines_are_skipped() {
    let text = "# header\n\n  \n   # indented comment\nHELP2, function, help\n";
    let descriptors = parse_registry(text).expect("parses");
    assert_eq!(descriptors.len(), 1);
    let help = descriptors.first().expect("descriptor");
    assert_eq!(help.cache(), CachePolicy::None);
    assert!(!help.is_private());
    assert_eq!(help.interface_version(), INTERFACE_VERSION);
}

#[test]
fn hash_inside_a_field_is_kept() {
    let descriptors = parse_registry(
        "TAG, function, help, , , , N, N, Channel #3 reader, TAG::get(name=#3)\n",
    )
    .expect("parses");
    let tag = descriptors.first().expect("descriptor");
    assert_eq!(tag.entry(), "help");
    assert_eq!(tag.description(), "Channel #3 reader");
    assert_eq!(tag.example(), "TAG::get(name=#3)");
}

#[rstest]
#[case::yes("Y", true)]
#[case::lower_true("t", true)]
#[case::one("1", true)]
#[case::no("N", false)]
#[case::word("yes", false)]
fn cache_flags(#[case] text: &str, #[case] cached: bool) {
    let line = format!("X, other, help, , , , {text}");
    let descriptors = parse_registry(&line).expect("parses");
    let expected = if cached { CachePolicy::Ok } else { CachePolicy::None };
    assert_eq!(descriptors.first().expect("descriptor").cache(), expected);
}

#[rstest]
#[case::missing_entry("X, file", "line 1")]
#[case::bad_class("X, archive, bytes", "unknown plugin class 'archive'")]
#[case::bad_version("X, file, bytes, , , one", "invalid interface version 'one'")]
fn malformed_lines_name_the_problem(#[case] line: &str, #[case] fragment: &str) {
    let error = parse_registry(line).expect_err("rejects");
    assert!(matches!(error, PluginError::Manifest { .. }));
    assert!(error.to_string().contains(fragment), "{error}");
}

#[rstest]
fn install_builds_from_the_catalogue(catalogue: PluginCatalogue) {
    let descriptors = parse_registry("RAW, file, BYTES\nINFO, function, help").expect("parses");
    let mut registry = PluginRegistry::new();
    registry.install(descriptors, &catalogue).expect("installs");
    assert_eq!(registry.len(), 2);
    assert!(registry.get("info").is_some());
}

#[rstest]
fn unknown_entry_is_rejected(catalogue: PluginCatalogue) {
    let descriptors = parse_registry("MDS, server, mdsplus").expect("parses");
    let mut registry = PluginRegistry::new();
    let error = registry
        .install(descriptors, &catalogue)
        .expect_err("unknown entry");
    assert!(error.to_string().contains("unknown entry point 'mdsplus'"));
    assert!(registry.is_empty());
}

#[test]
fn registry_file_is_read_from_disk() {
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(file, "RAW, file, bytes, , raw").expect("write");
    let path = Utf8PathBuf::from_path_buf(file.path().to_path_buf()).expect("utf-8 path");
    let descriptors = load_registry_file(&path).expect("loads");
    assert_eq!(descriptors.len(), 1);
}

#[test]
fn missing_registry_file_is_an_io_error() {
    let error = load_registry_file(Utf8Path::new("/nonexistent/uda/plugins.cfg"))
        .expect_err("missing file");
    assert!(matches!(error, PluginError::Io { .. }));
}

#[rstest]
fn catalogue_lookup_ignores_case(catalogue: PluginCatalogue) {
    assert!(catalogue.contains("BYTES"));
    assert!(catalogue.build("Help").is_some());
    assert_eq!(catalogue.entries().collect::<Vec<_>>(), ["bytes", "help"]);
}
