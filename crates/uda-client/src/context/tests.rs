//! Tests for the client context against an in-process server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rstest::rstest;
use uda_config::{Config, Endpoint};
use uda_protocol::{ClientMessage, Response, StatusCode, Value};

use super::*;
use crate::tests::FakeServer;

fn context_for(server: &FakeServer) -> ClientContext {
    let config = Config {
        max_socket_attempts: Some(0),
        max_socket_delay: Some(0),
        timeout: Some(5),
        ..Config::default()
    };
    ClientContext::new(config).with_endpoint(Endpoint::new(server.host_port()))
}

fn echo_target(message: &ClientMessage) -> Option<Response> {
    match message {
        ClientMessage::Get(request) => {
            let text = request.target().unwrap_or("none").to_owned();
            Some(Response::Data(Value::text(text).expect("text value")))
        }
        ClientMessage::Put { .. } => Some(Response::Acknowledged),
        ClientMessage::Close => None,
    }
}

#[rstest]
fn get_stores_results_under_fresh_handles() {
    let server = FakeServer::spawn(echo_target).expect("server starts");
    let context = context_for(&server);

    let first = context.get("ALPHA::read()", "").expect("first get");
    let second = context.get("BETA::read()", "").expect("second get");

    assert_eq!((first.value(), second.value()), (0, 1));
    let text = context
        .with_value(second, |value| value.as_text().map(<[String]>::to_vec))
        .expect("handle is live");
    assert_eq!(text, Some(vec![String::from("BETA")]));
    assert_eq!(
        context.request(first).expect("request kept").target(),
        Some("ALPHA")
    );
    assert_eq!(server.accepted(), 1);
    assert_eq!(context.error_code(), StatusCode::OK);
}

#[rstest]
fn server_errors_reach_the_stack_and_keep_the_session() {
    let server = FakeServer::spawn(|message| match message {
        ClientMessage::Get(request) if request.target() == Some("BROKEN") => Some(
            Response::failure(StatusCode::PLUGIN_FAILED, "BROKEN", "instrument offline"),
        ),
        other => echo_target(other),
    })
    .expect("server starts");
    let context = context_for(&server);

    let error = context.get("BROKEN::read()", "").expect_err("server fails");

    assert!(matches!(error, ClientError::Server { .. }));
    assert_eq!(context.error_code(), StatusCode::PLUGIN_FAILED);
    assert_eq!(context.error_message(), "instrument offline");
    let errors = context.errors();
    assert_eq!(errors.last().map(|record| record.location.as_str()), Some("BROKEN"));
    assert_eq!(context.handle_count(), 0);

    context.get("ALPHA::read()", "").expect("session still usable");
    assert_eq!(context.error_code(), StatusCode::OK);
    assert_eq!(server.accepted(), 1);
}

#[rstest]
fn a_dropped_session_is_replaced_on_the_next_call() {
    let calls = AtomicUsize::new(0);
    let server = FakeServer::spawn(move |message| {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            None
        } else {
            echo_target(message)
        }
    })
    .expect("server starts");
    let context = context_for(&server);

    let error = context.get("ALPHA::read()", "").expect_err("server hangs up");
    assert!(matches!(error, ClientError::Protocol(_)));
    assert_eq!(context.open_sessions(), 0);

    context.get("ALPHA::read()", "").expect("reconnects");
    assert_eq!(server.accepted(), 2);
}

#[rstest]
fn get_meta_travels_as_an_extra_argument() {
    let server = FakeServer::spawn(echo_target).expect("server starts");
    let context = context_for(&server);

    context.set_property("GET_META").expect("property is known");
    context.get("ALPHA::read()", "").expect("get succeeds");
    context.reset_property("get_meta").expect("property resets");
    context.get("ALPHA::read()", "").expect("get succeeds");

    let extras: Vec<Option<String>> = server
        .received()
        .iter()
        .map(|message| match message {
            ClientMessage::Get(request) => request.extra().get(GET_META_KEY).cloned(),
            _ => None,
        })
        .collect();
    assert_eq!(extras, vec![Some(String::from("true")), None]);
}

#[rstest]
#[case::unknown_name("colour")]
#[case::missing_value("timeout")]
#[case::bad_value("timeout=soon")]
#[case::unexpected_value("verbose=yes")]
fn unknown_properties_are_rejected(#[case] text: &str) {
    let context = ClientContext::new(Config::default());
    let error = context.set_property(text).expect_err("property rejected");
    assert_eq!(error.status(), StatusCode::BAD_PROPERTY);
    assert_eq!(context.error_code(), StatusCode::BAD_PROPERTY);
}

#[test]
fn timeout_property_overrides_and_resets() {
    let context = ClientContext::new(Config::default());
    context.set_property("timeout=30").expect("timeout accepted");
    assert_eq!(context.properties().timeout, Some(Duration::from_secs(30)));
    context.reset_property("timeout").expect("timeout resets");
    assert_eq!(context.properties().timeout, None);
}

#[rstest]
fn put_delivers_data_to_the_server() {
    let server = FakeServer::spawn(echo_target).expect("server starts");
    let context = context_for(&server);
    let data = Value::bytes(vec![1, 2, 3]).expect("blob value");

    let status = context.put("STORE::write(name=x)", data.clone()).expect("put succeeds");

    assert_eq!(status, StatusCode::OK);
    let received = server.received();
    assert!(matches!(
        received.first(),
        Some(ClientMessage::Put { data: sent, .. }) if *sent == data
    ));
}

#[rstest]
fn freeing_updates_the_table_and_the_stack() {
    let server = FakeServer::spawn(echo_target).expect("server starts");
    let context = context_for(&server);
    let handle = context.get("ALPHA::read()", "").expect("get succeeds");

    context.free(handle).expect("first free");
    let error = context.free(handle).expect_err("second free");

    assert!(matches!(error, ClientError::UnknownHandle { .. }));
    assert_eq!(context.error_code(), StatusCode::UNKNOWN_HANDLE);
    assert_eq!(context.free_all(), 0);
}

#[test]
fn empty_requests_fail_to_parse() {
    let context = ClientContext::new(Config::default());
    let error = context.get("", "").expect_err("nothing to send");
    assert!(matches!(error, ClientError::Parse(_)));
    assert_eq!(context.error_code(), StatusCode::REQUEST_PARSE);
}
