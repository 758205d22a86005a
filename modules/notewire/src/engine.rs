//! The dispatch loop.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::config::DispatcherConfig;
use crate::emission::{Emission, Response};
use crate::error::NoteResult;
use crate::handler::{Filter, Handler};
use crate::invocation::{Context, Invocation, Payload};
use crate::note::{Note, NoteKind, NoteType};
use crate::registry::SubscriptionRegistry;

/// Resolves and invokes handlers for dispatched notes.
///
/// Resolve → invoke each handler in order, awaiting suspending ones →
/// collect responses. The first failure aborts the dispatch and is returned
/// as-is; no partial emission is produced.
pub struct Dispatcher {
    registry: Arc<SubscriptionRegistry>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    pub fn with_config(config: DispatcherConfig) -> Self {
        Self::with_registry(Arc::new(SubscriptionRegistry::new()), config)
    }

    /// Share an existing registry, e.g. between dispatchers with different settings.
    pub fn with_registry(registry: Arc<SubscriptionRegistry>, config: DispatcherConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    // -- setup ------------------------------------------------------------

    pub fn register_type(&self, ty: NoteType, parent: NoteType) -> NoteResult<()> {
        self.registry.register_type(ty, parent)
    }

    /// Register a declared note struct under its declared parent.
    pub fn declare<T: NoteKind>(&self) -> NoteResult<()> {
        self.registry.declare::<T>()
    }

    /// Subscribe `handler` to `ty` and its descendants. Returns the handler.
    pub fn subscribe(&self, ty: NoteType, handler: Handler) -> Handler {
        self.registry.subscribe(ty, handler, None)
    }

    pub fn subscribe_filtered(&self, ty: NoteType, filter: Filter, handler: Handler) -> Handler {
        self.registry.subscribe(ty, handler, Some(filter))
    }

    pub fn subscribe_to<T: NoteKind>(&self, handler: Handler) -> Handler {
        self.subscribe(T::TYPE, handler)
    }

    pub fn clear_subscriptions(&self) {
        self.registry.clear();
    }

    // -- dispatch ---------------------------------------------------------

    /// Dispatch `note` to every matching handler.
    ///
    /// Without a context a fresh empty one is created; either way the same
    /// context object is handed to every handler of this call.
    pub async fn dispatch(
        &self,
        note: impl Note,
        payload: Payload,
        context: Option<Context>,
    ) -> NoteResult<Emission> {
        self.dispatch_shared(Arc::new(note), payload, context).await
    }

    /// Same operation as [`Dispatcher::dispatch`].
    pub async fn emit(
        &self,
        note: impl Note,
        payload: Payload,
        context: Option<Context>,
    ) -> NoteResult<Emission> {
        self.dispatch(note, payload, context).await
    }

    /// Dispatch an already shared note.
    pub async fn dispatch_shared(
        &self,
        note: Arc<dyn Note>,
        payload: Payload,
        context: Option<Context>,
    ) -> NoteResult<Emission> {
        let dispatch_id = Uuid::new_v4();
        let note_type = note.note_type();
        let invocation = Invocation::new(Arc::clone(&note), payload, context.unwrap_or_default());

        let handlers = self.registry.resolve(&invocation)?;
        debug!(
            label = %self.config.label,
            %dispatch_id,
            note_type = note_type.name(),
            handlers = handlers.len(),
            "Dispatching note"
        );

        let mut responses = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let started = Instant::now();
            let result: Value = match handler.call(&invocation).await {
                Ok(value) => value,
                Err(err) => {
                    warn!(
                        label = %self.config.label,
                        %dispatch_id,
                        note_type = note_type.name(),
                        handler = handler.name(),
                        completed = responses.len(),
                        error = %err,
                        "Handler failed, aborting dispatch"
                    );
                    return Err(err.into());
                }
            };
            let elapsed = started.elapsed();

            if let Some(threshold) = self.config.slow_handler_threshold {
                if elapsed > threshold {
                    warn!(
                        label = %self.config.label,
                        %dispatch_id,
                        handler = handler.name(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Slow handler"
                    );
                }
            }
            trace!(
                %dispatch_id,
                handler = handler.name(),
                suspending = handler.is_suspending(),
                "Handler completed"
            );

            responses.push(Response::new(
                handler,
                Arc::clone(&note),
                invocation.payload().clone(),
                invocation.context().clone(),
                result,
                elapsed,
            ));
        }

        Ok(Emission::new(dispatch_id, responses))
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Instance-level emission
// ---------------------------------------------------------------------------

/// A pending dispatch of one note. Await it directly or call [`send`](Self::send).
#[must_use = "an emit request does nothing until awaited"]
pub struct EmitRequest<'d> {
    dispatcher: &'d Dispatcher,
    note: Arc<dyn Note>,
    payload: Payload,
    context: Option<Context>,
}

impl<'d> EmitRequest<'d> {
    pub fn new(dispatcher: &'d Dispatcher, note: Arc<dyn Note>) -> Self {
        Self {
            dispatcher,
            note,
            payload: Payload::new(),
            context: None,
        }
    }

    /// Add one keyword value to the payload.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload = self.payload.with(key, value);
        self
    }

    /// Replace the payload.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    pub async fn send(self) -> NoteResult<Emission> {
        self.dispatcher
            .dispatch_shared(self.note, self.payload, self.context)
            .await
    }
}

impl<'d> IntoFuture for EmitRequest<'d> {
    type Output = NoteResult<Emission>;
    type IntoFuture = BoxFuture<'d, NoteResult<Emission>>;

    fn into_future(self) -> Self::IntoFuture {
        self.send().boxed()
    }
}

/// `emit` / `dispatch` on the note itself.
pub trait NoteExt: Note + Sized {
    fn emit(self, dispatcher: &Dispatcher) -> EmitRequest<'_> {
        EmitRequest::new(dispatcher, Arc::new(self))
    }

    fn dispatch(self, dispatcher: &Dispatcher) -> EmitRequest<'_> {
        self.emit(dispatcher)
    }
}

impl<T: Note> NoteExt for T {}
