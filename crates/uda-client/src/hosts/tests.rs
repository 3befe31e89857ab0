//! Tests for hosts file parsing and alias resolution.

use std::io::Write;

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use tempfile::NamedTempFile;
use uda_config::HostPort;
use uda_protocol::StatusCode;

use super::*;

const HOSTS: &str = "\
# production archive
host_name SSL://archive.example.org:56000
host_alias Archive
certificate /etc/uda/client.pem
PrivateKey=/etc/uda/client.key
ca-certificate /etc/uda/ca.pem

host_name   mirror.example.org
HOST_ALIAS  mirror   # trailing comment
port 56566

host_name local.example.org
colour blue
";

#[fixture]
fn registry() -> HostRegistry {
    HostRegistry::parse(HOSTS).expect("hosts parse")
}

#[rstest]
fn reads_every_entry(registry: HostRegistry) {
    assert_eq!(registry.len(), 3);
    let names: Vec<&str> = registry.entries().iter().map(HostEntry::name).collect();
    assert_eq!(
        names,
        vec!["archive.example.org", "mirror.example.org", "local.example.org"]
    );
}

#[rstest]
#[case::alias("archive")]
#[case::alias_upper("ARCHIVE")]
#[case::host_name("Archive.Example.Org")]
fn lookup_ignores_case(registry: HostRegistry, #[case] name: &str) {
    let entry = registry.find(name).expect("entry matches");
    assert_eq!(entry.name(), "archive.example.org");
}

#[rstest]
fn tls_prefix_and_port_suffix_are_split_off(registry: HostRegistry) {
    let endpoint = registry.resolve("archive", 56565).expect("alias resolves");
    assert_eq!(endpoint.primary(), &HostPort::new("archive.example.org", 56000));
    let tls = endpoint.tls().expect("tls material");
    assert!(tls.is_complete());
    assert_eq!(
        tls.private_key.as_deref(),
        Some(Utf8PathBuf::from("/etc/uda/client.key").as_path())
    );
}

#[rstest]
fn port_key_and_default_port_apply(registry: HostRegistry) {
    let mirror = registry.resolve("mirror", 56565).expect("mirror resolves");
    assert_eq!(mirror.primary().port(), 56566);
    assert!(mirror.tls().is_none());

    let local = registry
        .resolve("local.example.org", 56565)
        .expect("host name resolves");
    assert_eq!(local.primary().port(), 56565);
}

#[rstest]
fn unknown_alias_is_reported(registry: HostRegistry) {
    let error = registry.resolve("nowhere", 56565).expect_err("no such alias");
    assert_eq!(error.status(), StatusCode::UNKNOWN_HOST_ALIAS);
}

#[rstest]
#[case::bare("db.example.org", HostPort::new("db.example.org", 56565))]
#[case::with_port("db.example.org:7000", HostPort::new("db.example.org", 7000))]
#[case::alias("mirror", HostPort::new("mirror.example.org", 56566))]
fn literal_fallback_only_when_asked(
    registry: HostRegistry,
    #[case] text: &str,
    #[case] expected: HostPort,
) {
    let endpoint = registry
        .resolve_or_literal(text, 56565)
        .expect("text resolves");
    assert_eq!(endpoint.primary(), &expected);
}

#[test]
fn all_three_tls_paths_imply_tls() {
    let text = "host_name plain.example.org\ncertificate a\nprivate_key b\nca_certificate c\n";
    let registry = HostRegistry::parse(text).expect("hosts parse");
    let entry = registry.find("plain.example.org").expect("entry");
    assert!(entry.is_tls());
}

#[rstest]
#[case::orphan_key("host_alias lonely\n", 1)]
#[case::bad_port("host_name a\nport eighty\n", 2)]
#[case::bad_suffix("host_name a:99999\n", 1)]
fn malformed_lines_name_their_line(#[case] text: &str, #[case] line: usize) {
    let error = HostRegistry::parse(text).expect_err("text is malformed");
    assert!(matches!(error, HostFileError::Malformed { line: found, .. } if found == line));
}

#[test]
fn missing_file_is_an_empty_registry() {
    let directory = tempfile::tempdir().expect("temp dir");
    let path = Utf8PathBuf::from_path_buf(directory.path().join("hosts.cfg")).expect("utf8 path");
    let registry = HostRegistry::load(&path).expect("missing file is fine");
    assert!(registry.is_empty());
}

#[test]
fn loads_from_disk() {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(HOSTS.as_bytes()).expect("write hosts");
    let path = Utf8PathBuf::from_path_buf(file.path().to_path_buf()).expect("utf8 path");
    let registry = HostRegistry::load(&path).expect("file loads");
    assert_eq!(registry.len(), 3);
}
