//! Integration tests for the dab-common library.

use dab_common::{parse, parse_topic, topic, DabError, JsonError, Value};

#[test]
fn test_parse_serialize_roundtrip() {
    let documents = [
        r#"{"a":1,"b":[true,false,null],"c":{"d":"x"}}"#,
        r#"[1,2,3]"#,
        r#""plain string""#,
        r#"{"nested":{"deep":{"deeper":[{"leaf":-42}]}}}"#,
        "null",
        "true",
        "-9223372036854775808",
    ];

    for text in documents {
        let value = parse(text).unwrap();
        assert_eq!(value.serialize(true), text);
        assert_eq!(parse(&value.serialize(true)).unwrap(), value);
    }
}

#[test]
fn test_roundtrip_normalizes_relaxed_input() {
    // bare keys and whitespace parse, but serialize in canonical form
    let value = parse("{ zeta : 1, alpha : 2 }").unwrap();
    assert_eq!(value.serialize(true), r#"{"alpha":2,"zeta":1}"#);
}

#[test]
fn test_mutation_then_has_invariant() {
    let mut object = Value::default();

    object.set("key", "value");
    assert!(object.has("key"));
    assert_eq!(object.get("key").unwrap().as_str().unwrap(), "value");

    *object.entry("key") = Value::Null;
    assert!(!object.has("key"));
    assert!(object.get("key").is_err());
}

#[test]
fn test_envelope_construction_matches_wire_form() {
    let mut payload = Value::default();
    payload.set("appId", "netflix");

    let envelope = Value::from_literal(vec![
        Value::pair("topic", "dab/tv1/applications/launch"),
        Value::pair("payload", payload),
    ]);

    assert_eq!(
        envelope.serialize(true),
        r#"{"payload":{"appId":"netflix"},"topic":"dab/tv1/applications/launch"}"#
    );
}

#[test]
fn test_error_reply_wire_shape() {
    let reply = DabError::bad_request("deviceId does not exist").to_reply();
    assert_eq!(
        reply.serialize(true),
        r#"{"error":"deviceId does not exist","status":400}"#
    );
}

#[test]
fn test_topic_grammar_end_to_end() {
    let device_topic = topic::operation_topic("tv1", "/applications/launch");
    let parsed = parse_topic(&device_topic).unwrap();
    assert_eq!(parsed.device_id, "tv1");
    assert_eq!(parsed.suffix, "applications/launch");

    assert!(parse_topic(topic::DISCOVERY_TOPIC).is_none());
}

#[test]
fn test_percent_escapes_are_lossy_by_design() {
    let value = Value::from("Hi\u{1}!");
    let serialized = value.serialize(true);
    assert_eq!(serialized, "\"Hi%01!\"");

    // reparsing keeps the escaped text, not the original byte
    let reparsed = parse(&serialized).unwrap();
    assert_eq!(reparsed.as_str().unwrap(), "Hi%01!");
}

#[test]
fn test_parse_error_diagnostics_are_short_strings() {
    let err = parse("{\"a\" 1}").unwrap_err();
    assert_eq!(err, JsonError::Parse("missing name/value separator"));

    let err = parse("[1 2]").unwrap_err();
    assert_eq!(err, JsonError::Parse("missing comma"));
}
