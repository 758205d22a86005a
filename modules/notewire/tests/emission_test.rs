//! Emission and response rendering. No runtime state beyond one dispatcher.

use notewire::{note, Context, Dispatcher, Handler, Note, NoteKind, Payload};
use serde_json::json;

note! {
    #[derive(Debug, Clone)]
    struct MyNote { foo: i64, bar: String }
}

note! {
    #[derive(Debug, Clone)]
    struct Empty {}
}

async fn handled() -> notewire::Emission {
    let dispatcher = Dispatcher::new();
    dispatcher.declare::<MyNote>().unwrap();
    dispatcher.subscribe_to::<MyNote>(Handler::context("handler", |note, payload, ctx| {
        Ok(format!(
            "handled {} {}, user={}, flag={}",
            note.field("foo").unwrap_or_default(),
            note.field("bar").and_then(|v| v.as_str().map(String::from)).unwrap_or_default(),
            payload.get("user").and_then(|v| v.as_str()).unwrap_or("none"),
            ctx.get("flag").unwrap_or_default(),
        ))
    }));

    let ctx = Context::new();
    ctx.insert("flag", true);
    dispatcher
        .dispatch(
            MyNote {
                foo: 42,
                bar: "baz".into(),
            },
            Payload::new().with("user", "bob"),
            Some(ctx),
        )
        .await
        .unwrap()
}

// =========================================================================
// Note rendering
// =========================================================================

#[test]
fn note_renders_type_and_fields() {
    let note = MyNote {
        foo: 42,
        bar: "baz".into(),
    };
    assert_eq!(note.render(), r#"MyNote(foo=42, bar="baz")"#);
    assert_eq!(Empty {}.render(), "Empty()");
    assert_eq!(MyNote::FIELDS, &["foo", "bar"]);
}

#[test]
fn dyn_note_debug_uses_canonical_rendering() {
    let note: Box<dyn Note> = Box::new(MyNote {
        foo: 1,
        bar: "x".into(),
    });
    assert_eq!(format!("{note:?}"), r#"MyNote(foo=1, bar="x")"#);
}

// =========================================================================
// Response / Emission rendering
// =========================================================================

#[tokio::test]
async fn response_display_and_debug() {
    let emission = handled().await;
    let response = &emission[0];

    assert_eq!(
        response.to_string(),
        r#"Response from `handler` to MyNote(foo=42, bar="baz"): "handled 42 baz, user=bob, flag=true""#
    );
    assert_eq!(
        format!("{response:?}"),
        r#"<Response handler=handler note=MyNote(foo=42, bar="baz") result="handled 42 baz, user=bob, flag=true">"#
    );
}

#[tokio::test]
async fn emission_display_lists_each_response() {
    let emission = handled().await;

    assert_eq!(emission.to_string(), emission[0].to_string());
    let debug = format!("{emission:?}");
    assert!(debug.starts_with("Emission(len=1, responses=[<Response handler=handler"));
    assert!(debug.contains("user=bob"));
    assert!(debug.ends_with(">])"));
}

#[tokio::test]
async fn response_exposes_its_parts() {
    let emission = handled().await;
    let response = emission.get(0).unwrap();

    assert_eq!(response.handler_name(), "handler");
    assert_eq!(response.handler_id(), response.handler().id());
    assert_eq!(response.note().render(), r#"MyNote(foo=42, bar="baz")"#);
    assert_eq!(response.payload().get("user"), Some(&json!("bob")));
    assert_eq!(response.context().get("flag"), Some(json!(true)));
    assert!(emission.get(1).is_none());
}

#[tokio::test]
async fn multi_response_display_is_line_per_response() {
    let dispatcher = Dispatcher::new();
    dispatcher.declare::<Empty>().unwrap();
    dispatcher.subscribe_to::<Empty>(Handler::note("first", |_note| Ok(1)));
    dispatcher.subscribe_to::<Empty>(Handler::note("second", |_note| Ok(())));

    let emission = dispatcher.dispatch(Empty {}, Payload::new(), None).await.unwrap();

    assert_eq!(
        emission.to_string(),
        "Response from `first` to Empty(): 1\nResponse from `second` to Empty(): null"
    );
    let handlers: Vec<&str> = emission.iter().map(|r| r.handler_name()).collect();
    assert_eq!(handlers, vec!["first", "second"]);

    let owned: Vec<_> = emission.into_iter().map(|r| r.result().clone()).collect();
    assert_eq!(owned, vec![json!(1), json!(null)]);
}
