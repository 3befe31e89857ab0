//! Behaviour-driven tests for request dispatch.

use std::sync::Arc;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use uda_protocol::RequestModel;

use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::PluginError;
use crate::registry::{PluginRegistry, SessionKey};

use super::{produced_by, register_named};

// ---------------------------------------------------------------------------
// Test world
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TestWorld {
    registry: PluginRegistry,
    outcome: Option<Result<DispatchOutcome, PluginError>>,
}

#[fixture]
fn world() -> TestWorld {
    TestWorld::default()
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

#[given("a plugin {name} claiming extension {extension}")]
fn given_plugin(world: &mut TestWorld, name: String, extension: String) {
    register_named(
        &mut world.registry,
        name.trim_matches('"'),
        Some(extension.trim_matches('"')),
    );
}

#[when("the request {text} is dispatched")]
fn when_dispatched(world: &mut TestWorld, text: String) {
    let request = RequestModel::parse(text.trim_matches('"'), "").expect("request parses");
    let registry = Arc::new(std::mem::take(&mut world.registry));
    let dispatcher = Dispatcher::new(registry);
    world.outcome = Some(dispatcher.dispatch(SessionKey(1), &request, None));
}

#[then("the call is served by {name}")]
fn then_served_by(world: &mut TestWorld, name: String) {
    let outcome = world
        .outcome
        .as_ref()
        .expect("no dispatch recorded")
        .as_ref()
        .expect("dispatch should succeed");
    let expected = name.trim_matches('"');
    assert_eq!(outcome.plugin, expected);
    assert_eq!(produced_by(outcome.value.as_ref().expect("value")), expected);
}

#[then("the dispatch fails because {reason}")]
fn then_fails(world: &mut TestWorld, reason: String) {
    let error = world
        .outcome
        .as_ref()
        .expect("no dispatch recorded")
        .as_ref()
        .expect_err("dispatch should fail");
    match reason.trim_matches('"') {
        "the match is ambiguous" => assert!(
            matches!(error, PluginError::Ambiguous { .. }),
            "expected Ambiguous, got: {error}"
        ),
        "no plugin matches" => assert!(
            matches!(error, PluginError::NoPlugin { .. }),
            "expected NoPlugin, got: {error}"
        ),
        other => panic!("unsupported failure reason: '{other}'"),
    }
}

// ---------------------------------------------------------------------------
// Scenario registration
// ---------------------------------------------------------------------------

#[scenario(path = "tests/features/dispatch_resolution.feature")]
fn dispatch_resolution_behaviour(world: TestWorld) {
    let _ = world;
}
