//! Query event, engine message and filter decoding.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use hostbridge_core::protocol::event::{EngineMessage, MessageKind, QueryEvent, Source};
use hostbridge_core::protocol::filter::{Comparison, Datum, Filter};
use hostbridge_core::protocol::wire;
use hostbridge_core::{BridgeError, Operator, Symbol, Value};

#[test]
fn none_is_a_bare_string() {
    let ev: QueryEvent = wire::from_str(r#""None""#).unwrap();
    assert!(matches!(ev, QueryEvent::None));
    assert_eq!(wire::encode(&ev).unwrap(), serde_json::json!("None"));
}

#[test]
fn external_call_without_args_is_a_field_read() {
    let ev: QueryEvent = wire::from_str(
        r#"{"ExternalCall":{"call_id":5,"instance":{"value":{"ExternalInstance":{"instance_id":1}}},"attribute":"name"}}"#,
    )
    .unwrap();
    match ev {
        QueryEvent::ExternalCall {
            call_id,
            attribute,
            args,
            kwargs,
            ..
        } => {
            assert_eq!(call_id, 5);
            assert_eq!(attribute.as_str(), "name");
            assert!(args.is_none());
            assert!(kwargs.is_none());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn external_call_with_empty_args_is_a_method_call() {
    let ev: QueryEvent = wire::from_str(
        r#"{"ExternalCall":{"call_id":5,"instance":{"value":{"ExternalInstance":{"instance_id":1}}},"attribute":"name","args":[]}}"#,
    )
    .unwrap();
    assert!(matches!(ev, QueryEvent::ExternalCall { args: Some(ref a), .. } if a.is_empty()));
    assert_eq!(ev.call_id(), Some(5));
}

#[test]
fn external_op_carries_operator() {
    let ev: QueryEvent = wire::from_str(
        r#"{"ExternalOp":{"call_id":9,"operator":"Lt","args":[{"value":{"Number":{"Integer":1}}},{"value":{"Number":{"Integer":2}}}]}}"#,
    )
    .unwrap();
    assert!(matches!(
        ev,
        QueryEvent::ExternalOp { operator: Operator::Lt, ref args, .. } if args.len() == 2
    ));
}

#[test]
fn result_keeps_trace_raw() {
    let ev: QueryEvent = wire::from_str(
        r#"{"Result":{"bindings":{"x":{"value":{"String":"a"}}},"trace":{"node":1}}}"#,
    )
    .unwrap();
    match ev {
        QueryEvent::Result { bindings, trace } => {
            assert_eq!(
                bindings.get(&Symbol::new("x")).map(|t| t.value()),
                Some(&Value::String("a".into()))
            );
            assert_eq!(trace.unwrap().get(), r#"{"node":1}"#);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn done_result_defaults_to_false() {
    let ev: QueryEvent = wire::from_str(r#"{"Done":{}}"#).unwrap();
    assert!(matches!(ev, QueryEvent::Done { result: false }));
}

#[test]
fn unknown_event_tag() {
    let e = wire::from_str::<QueryEvent>(r#"{"Teleport":{}}"#).unwrap_err();
    assert!(matches!(e, BridgeError::UnknownVariant { ty: "QueryEvent", .. }));
}

#[test]
fn event_missing_call_id_is_malformed() {
    let e = wire::from_str::<QueryEvent>(
        r#"{"NextExternal":{"iterable":{"value":{"List":[]}}}}"#,
    )
    .unwrap_err();
    assert!(matches!(e, BridgeError::MalformedValue(_)));
}

#[test]
fn engine_messages_are_strict() {
    let m = EngineMessage::from_json(r#"{"kind":"Warning","msg":"unused rule"}"#).unwrap();
    assert_eq!(m.kind, MessageKind::Warning);
    assert_eq!(m.msg, "unused rule");
    assert!(EngineMessage::from_json(r#"{"kind":"Warning","msg":"x","extra":1}"#).is_err());
}

#[test]
fn sources_serialize_with_optional_filename() {
    let s = serde_json::to_string(&[Source::with_filename("allow(_, _, _);", "a.polar")]).unwrap();
    assert_eq!(s, r#"[{"src":"allow(_, _, _);","filename":"a.polar"}]"#);
}

#[test]
fn filter_decodes_conditions_and_relations() {
    let f: Filter = wire::from_str(
        r#"{
            "root": "Repo",
            "relations": [["Repo", "org", "Org"]],
            "conditions": [[
                [{"Field": ["Org", "name"]}, "Eq", {"Immediate": {"String": "acme"}}],
                [{"Field": ["Repo", null]}, "Neq", {"Imm": {"Boolean": false}}]
            ]]
        }"#,
    )
    .unwrap();
    assert_eq!(f.root, "Repo");
    assert_eq!(f.relations[0].to_type, "Org");
    let conj = &f.conditions[0];
    assert_eq!(conj[0].cmp, Comparison::Eq);
    assert!(matches!(&conj[0].right, Datum::Immediate(Value::String(s)) if s == "acme"));
    assert!(matches!(&conj[1].left, Datum::Field(p) if p.field_name.is_none()));
    assert_eq!(conj[1].cmp, Comparison::Neq);
}

#[test]
fn filter_condition_arity_is_checked() {
    let e = wire::from_str::<Filter>(
        r#"{"root":"Repo","relations":[],"conditions":[[[{"Field":["Repo","id"]},"Eq"]]]}"#,
    )
    .unwrap_err();
    assert!(matches!(e, BridgeError::MalformedValue(_)));
}

#[test]
fn unknown_nested_tags_name_their_enum() {
    let e = wire::from_str::<QueryEvent>(
        r#"{"ExternalOp":{"call_id":1,"operator":"Frob","args":[]}}"#,
    )
    .unwrap_err();
    assert!(matches!(e, BridgeError::UnknownVariant { ty: "Operator", ref tag } if tag == "Frob"));

    let e = wire::from_str::<Filter>(
        r#"{"root":"Repo","relations":[],"conditions":[[[{"Field":["Repo","id"]},"Like",{"Imm":{"Boolean":true}}]]]}"#,
    )
    .unwrap_err();
    assert!(matches!(e, BridgeError::UnknownVariant { ty: "Comparison", .. }));
}

#[test]
fn filter_projection_may_omit_the_field() {
    let f: Filter = wire::from_str(
        r#"{"root":"Repo","relations":[],"conditions":[[[{"Field":["Repo"]},"Eq",{"Field":["Repo","id"]}]]]}"#,
    )
    .unwrap();
    assert!(matches!(&f.conditions[0][0].left, Datum::Field(p) if p.field_name.is_none()));
    let encoded = wire::encode(&f).unwrap();
    assert_eq!(encoded["conditions"][0][0][0], serde_json::json!({"Field": ["Repo", null]}));
    assert_eq!(wire::decode::<Filter>(&encoded).unwrap(), f);
}
