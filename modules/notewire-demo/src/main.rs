use std::time::Duration;

use anyhow::Result;
use notewire::{
    note, Context, Dispatcher, DispatcherConfig, Filter, Handler, Note, NoteExt, NoteKind,
    NoteType,
};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

note! {
    #[derive(Debug, Clone)]
    pub struct Greet { pub name: String }
}

note! {
    #[derive(Debug, Clone)]
    pub struct Alert { pub level: u8, pub message: String }
}

note! {
    #[derive(Debug, Clone)]
    pub struct DiskAlert: Alert { pub level: u8, pub message: String, pub mount: String }
}

fn alert_level(note: &dyn Note) -> u64 {
    note.field("level").and_then(|v| v.as_u64()).unwrap_or(0)
}

fn build_dispatcher(config: DispatcherConfig) -> Result<Dispatcher> {
    let dispatcher = Dispatcher::with_config(config);
    dispatcher.declare::<Greet>()?;
    dispatcher.declare::<Alert>()?;
    dispatcher.declare::<DiskAlert>()?;

    // Sees every note; counts deliveries in the shared context.
    dispatcher.subscribe(
        NoteType::ROOT,
        Handler::context("audit", |note, _payload, ctx| {
            let seen = ctx.update(|map| {
                let next = map.get("seen").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
                map.insert("seen".into(), json!(next));
                next
            });
            Ok(format!("audited {} (#{seen})", note.note_type()))
        }),
    );

    dispatcher.subscribe_to::<Greet>(Handler::note("greet", |note| {
        let name = note
            .downcast_ref::<Greet>()
            .map(|g| g.name.as_str())
            .unwrap_or("stranger");
        Ok(format!("hi {name}"))
    }));

    dispatcher.subscribe_filtered(
        Alert::TYPE,
        Filter::note(|note| alert_level(note) >= 3),
        Handler::payload_async("page_oncall", |note, payload| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let who = payload
                .get("oncall")
                .and_then(|v| v.as_str())
                .unwrap_or("nobody")
                .to_string();
            Ok::<_, anyhow::Error>(format!("paged {who} for {}", note.render()))
        }),
    );

    dispatcher.subscribe_to::<DiskAlert>(Handler::note("disk_cleanup", |note| {
        let mount = note
            .downcast_ref::<DiskAlert>()
            .map(|d| d.mount.clone())
            .unwrap_or_default();
        Ok(json!({ "cleaned": mount }))
    }));

    Ok(dispatcher)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("notewire=info".parse()?))
        .init();

    let config = DispatcherConfig::from_env()?;
    info!(label = config.label.as_str(), "notewire demo starting");

    let dispatcher = build_dispatcher(config)?;
    let context = Context::new();

    let greeting = Greet { name: "World".into() }
        .emit(&dispatcher)
        .with_context(context.clone())
        .await?;
    info!(responses = greeting.len(), "Greet dispatched");
    println!("{greeting}");

    let disk = DiskAlert {
        level: 4,
        message: "disk almost full".into(),
        mount: "/var".into(),
    }
    .dispatch(&dispatcher)
    .with("oncall", "ada")
    .with_context(context.clone())
    .await?;
    info!(responses = disk.len(), "DiskAlert dispatched");
    println!("{disk}");

    let quiet = Alert {
        level: 1,
        message: "fan speed nominal".into(),
    }
    .emit(&dispatcher)
    .with_context(context.clone())
    .await?;
    info!(responses = quiet.len(), "Alert dispatched");
    println!("{quiet}");

    info!(
        seen = context.get("seen").and_then(|v| v.as_u64()).unwrap_or(0),
        "notewire demo finished"
    );
    Ok(())
}
