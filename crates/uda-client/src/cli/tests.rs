//! Tests for argument splitting and the `uda` runner.

use std::ffi::OsString;
use std::process::ExitCode;
use std::sync::Arc;

use ortho_config::OrthoError;
use rstest::rstest;
use uda_config::Config;
use uda_protocol::{ClientMessage, Response, Value};

use super::config::{ConfigArgumentSplit, split_config_arguments};
use super::*;
use crate::tests::FakeServer;

struct StaticLoader(Config);

impl ConfigLoader for StaticLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, Arc<OrthoError>> {
        Ok(self.0.clone())
    }
}

fn os_args(args: &[&str]) -> Vec<OsString> {
    args.iter().map(OsString::from).collect()
}

#[rstest]
#[case::separate_values(
    &["uda", "--server-host", "db", "--timeout", "5", "get", "HELP::ping()"],
    &["uda", "--server-host", "db", "--timeout", "5"],
    &["uda", "get", "HELP::ping()"]
)]
#[case::inline_value(
    &["uda", "--server-port=7000", "get", "X::y()"],
    &["uda", "--server-port=7000"],
    &["uda", "get", "X::y()"]
)]
#[case::flags_after_the_command_stay_there(
    &["uda", "get", "--timeout", "5", "X::y()"],
    &["uda"],
    &["uda", "get", "--timeout", "5", "X::y()"]
)]
#[case::no_arguments(&["uda"], &["uda"], &["uda"])]
fn splits_configuration_from_the_command(
    #[case] args: &[&str],
    #[case] config: &[&str],
    #[case] command: &[&str],
) {
    let split = split_config_arguments(&os_args(args));
    assert_eq!(
        split,
        ConfigArgumentSplit {
            config_arguments: os_args(config),
            command_arguments: os_args(command),
        }
    );
}

#[test]
fn usage_errors_go_to_stderr() {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let code = run_with_loader(
        os_args(&["uda", "fetch"]),
        &mut stdout,
        &mut stderr,
        &StaticLoader(Config::default()),
    );
    assert_eq!(code, ExitCode::FAILURE);
    assert!(stdout.is_empty());
    assert!(String::from_utf8_lossy(&stderr).starts_with("uda: "));
}

#[test]
fn help_goes_to_stdout() {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let code = run_with_loader(
        os_args(&["uda", "--help"]),
        &mut stdout,
        &mut stderr,
        &StaticLoader(Config::default()),
    );
    assert_eq!(code, ExitCode::SUCCESS);
    assert!(String::from_utf8_lossy(&stdout).contains("get"));
}

#[test]
fn get_prints_a_json_summary() {
    let server = FakeServer::spawn(|message| match message {
        ClientMessage::Get(_) => Some(Response::Data(
            Value::text("ready")
                .expect("text value")
                .with_label("status")
                .with_units("none"),
        )),
        _ => None,
    })
    .expect("server starts");
    let address = server.host_port();
    let config = Config {
        server_host: Some(address.host().to_owned()),
        server_port: Some(address.port()),
        max_socket_attempts: Some(0),
        ..Config::default()
    };
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let code = run_with_loader(
        os_args(&["uda", "get", "--property", "verbose", "STATUS::read()"]),
        &mut stdout,
        &mut stderr,
        &StaticLoader(config),
    );

    assert_eq!(code, ExitCode::SUCCESS, "stderr: {}", String::from_utf8_lossy(&stderr));
    let summary: serde_json::Value = serde_json::from_slice(&stdout).expect("stdout is JSON");
    assert_eq!(summary["type"], "text");
    assert_eq!(summary["label"], "status");
    assert_eq!(summary["units"], "none");
    assert_eq!(summary["handle"], 0);
    assert!(summary.get("description").is_none());
}
