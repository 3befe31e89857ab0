use rstest::rstest;

use super::*;

#[test]
fn function_form_routes_known_arguments() {
    let model = RequestModel::parse(
        "BYTES::read(path=/tmp/shot.dat, shot=42, pass=2, colour=blue)",
        "",
    )
    .unwrap();

    assert_eq!(model.target(), Some("BYTES"));
    assert_eq!(model.function(), Some("read"));
    assert_eq!(model.path(), Some("/tmp/shot.dat"));
    assert_eq!(model.shot(), Some(42));
    assert_eq!(model.pass(), Some("2"));
    assert_eq!(model.extra().get("colour").map(String::as_str), Some("blue"));
    assert_eq!(model.arguments().len(), 4);
    assert_eq!(model.extension().as_deref(), Some("dat"));
}

#[test]
fn unknown_arguments_pass_through_verbatim() {
    let model = RequestModel::parse("NEWPLUGIN::fetch(Window='0, 1', /raw)", "").unwrap();

    assert_eq!(model.extra().get("Window").map(String::as_str), Some("'0, 1'"));
    assert_eq!(model.extra().get("raw").map(String::as_str), Some(KEYWORD_VALUE));
    assert_eq!(model.argument("window"), Some("'0, 1'"));
}

#[test]
fn device_prefix_is_recognised() {
    let model = RequestModel::parse("REMOTE::HELP::ping()", "").unwrap();

    assert_eq!(model.device(), Some("REMOTE"));
    assert_eq!(model.target(), Some("HELP"));
    assert_eq!(model.function(), Some("ping"));
    assert!(model.arguments().is_empty());
}

#[test]
fn bare_function_has_no_target() {
    let model = RequestModel::parse("ping()", "").unwrap();
    assert_eq!(model.target(), None);
    assert_eq!(model.function(), Some("ping"));
}

#[test]
fn duplicate_arguments_keep_first_value() {
    let model = RequestModel::parse("X::f(path=/a, path=/b, k=1, k=2)", "").unwrap();

    assert_eq!(model.path(), Some("/a"));
    assert_eq!(model.extra().get("k").map(String::as_str), Some("1"));
    assert_eq!(model.arguments().len(), 4);
}

#[test]
fn legacy_signal_with_shot_and_pass() {
    let model = RequestModel::parse("EFIT::psi", "MAST::12345/2").unwrap();

    assert_eq!(model.archive(), Some("EFIT"));
    assert_eq!(model.target(), Some("EFIT"));
    assert_eq!(model.signal(), Some("psi"));
    assert_eq!(model.format(), Some("MAST"));
    assert_eq!(model.shot(), Some(12345));
    assert_eq!(model.pass(), Some("2"));
    assert_eq!(model.function(), None);
}

#[test]
fn legacy_source_with_device_and_path() {
    let model = RequestModel::parse("ip", "JET::NETCDF::/data/run.NC").unwrap();

    assert_eq!(model.signal(), Some("ip"));
    assert_eq!(model.device(), Some("JET"));
    assert_eq!(model.format(), Some("NETCDF"));
    assert_eq!(model.path(), Some("/data/run.NC"));
    assert_eq!(model.extension().as_deref(), Some("nc"));
    assert_eq!(model.format_key(), Some("NETCDF"));
}

#[test]
fn legacy_source_may_hold_a_call() {
    let model = RequestModel::parse("", "BYTES::read(path=/tmp/a.bin)").unwrap();

    assert_eq!(model.target(), Some("BYTES"));
    assert_eq!(model.function(), Some("read"));
    assert_eq!(model.path(), Some("/tmp/a.bin"));
}

#[test]
fn format_key_falls_back_to_target() {
    let model = RequestModel::parse("HELP::services()", "").unwrap();
    assert_eq!(model.format_key(), Some("HELP"));
}

#[rstest]
#[case::no_extension("/tmp/data", None)]
#[case::hidden_file("/tmp/.profile", None)]
#[case::dotted_directory("/tmp/v1.2/data", None)]
#[case::upper("/tmp/x.CDF", Some("cdf"))]
fn extension_comes_from_the_file_name(#[case] path: &str, #[case] expected: Option<&str>) {
    let model = RequestModel::parse(&format!("X::f(path={path})"), "").unwrap();
    assert_eq!(model.extension().as_deref(), expected);
}

#[rstest]
#[case::empty("", "", ParseError::Empty)]
#[case::whitespace("  ", " ", ParseError::Empty)]
#[case::bad_shot("X::f(shot=abc)", "", ParseError::InvalidShot { value: "abc".to_owned() })]
#[case::bad_function("X::f g()", "", ParseError::InvalidFunction { function: "f g".to_owned() })]
#[case::too_many_segments("A::B::C::f()", "", ParseError::InvalidTarget { target: "A::B::C::f".to_owned() })]
#[case::empty_target("::f()", "", ParseError::InvalidTarget { target: String::new() })]
#[case::empty_prefix("sig", "::12", ParseError::InvalidSource { source_text: "::12".to_owned() })]
#[case::deep_source("sig", "A::B::C::12", ParseError::InvalidSource { source_text: "A::B::C::12".to_owned() })]
#[case::empty_name("X::f(a=1, =2)", "", ParseError::EmptyArgumentName { position: 1 })]
fn malformed_requests_are_rejected(
    #[case] text: &str,
    #[case] source: &str,
    #[case] expected: ParseError,
) {
    let error = RequestModel::parse(text, source).unwrap_err();
    assert_eq!(error, expected);
    assert_eq!(error.status(), StatusCode::REQUEST_PARSE);
}

#[test]
fn unbalanced_call_is_rejected() {
    let error = RequestModel::parse("X::f(a=(1)", "").unwrap_err();
    assert!(matches!(error, ParseError::UnbalancedBrackets { .. }));
}

#[test]
fn parsed_models_compare_by_content() {
    let first = RequestModel::parse("X::f(a=1)", "").unwrap();
    let second = RequestModel::parse("  X::f(a=1) ", "").unwrap();
    assert_eq!(first, second);
}

#[test]
fn client_supplied_extras_never_override_the_request() {
    let model = RequestModel::parse("X::f(get_meta=false)", "")
        .unwrap()
        .with_extra("get_meta", "true")
        .with_extra("verbose", "true");
    assert_eq!(model.extra().get("get_meta").map(String::as_str), Some("false"));
    assert_eq!(model.extra().get("verbose").map(String::as_str), Some("true"));
}
