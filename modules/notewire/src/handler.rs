//! Handlers, filters and their calling conventions.
//!
//! A calling convention ([`CallShape`]) is chosen explicitly when a handler
//! or filter is built: `note` receives only the note, `payload` adds the
//! payload, `context` adds the shared context. Synchronous handlers run
//! inline; suspending handlers are awaited by the dispatcher before the next
//! one starts.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;

use crate::error::NoteError;
use crate::invocation::{Context, Invocation, Payload};
use crate::note::Note;

// ---------------------------------------------------------------------------
// Calling convention
// ---------------------------------------------------------------------------

/// Which of {note, payload, context} a handler or filter receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallShape {
    NoteOnly,
    NoteAndPayload,
    NoteAndPayloadAndContext,
}

impl CallShape {
    /// Number of positional arguments this shape passes.
    pub fn arity(self) -> usize {
        match self {
            CallShape::NoteOnly => 1,
            CallShape::NoteAndPayload => 2,
            CallShape::NoteAndPayloadAndContext => 3,
        }
    }
}

impl TryFrom<usize> for CallShape {
    type Error = NoteError;

    fn try_from(arity: usize) -> Result<Self, Self::Error> {
        match arity {
            1 => Ok(CallShape::NoteOnly),
            2 => Ok(CallShape::NoteAndPayload),
            3 => Ok(CallShape::NoteAndPayloadAndContext),
            _ => Err(NoteError::InvalidHandlerSignature { arity }),
        }
    }
}

/// One positional argument of an arity-declared callable.
#[derive(Clone, Copy)]
pub enum Arg<'a> {
    Note(&'a dyn Note),
    Payload(&'a Payload),
    Context(&'a Context),
}

impl<'a> Arg<'a> {
    pub fn as_note(&self) -> Option<&'a dyn Note> {
        match *self {
            Arg::Note(note) => Some(note),
            _ => None,
        }
    }

    pub fn as_payload(&self) -> Option<&'a Payload> {
        match *self {
            Arg::Payload(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn as_context(&self) -> Option<&'a Context> {
        match *self {
            Arg::Context(context) => Some(context),
            _ => None,
        }
    }
}

impl Invocation {
    /// The positional argument list for `shape`.
    pub fn args(&self, shape: CallShape) -> Vec<Arg<'_>> {
        let all = [
            Arg::Note(self.note()),
            Arg::Payload(self.payload()),
            Arg::Context(self.context()),
        ];
        all[..shape.arity()].to_vec()
    }
}

// ---------------------------------------------------------------------------
// HandleNote trait
// ---------------------------------------------------------------------------

/// Suspending handler implemented on a type, for handlers that carry state.
///
/// Receives the full invocation; the dispatcher awaits it to completion
/// before invoking the next handler.
#[async_trait]
pub trait HandleNote: Send + Sync + 'static {
    async fn handle(&self, invocation: &Invocation) -> Result<Value>;

    /// Name used in responses and logs. Override the verbose default.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

struct AsyncFn<F> {
    name: Arc<str>,
    f: F,
}

#[async_trait]
impl<F> HandleNote for AsyncFn<F>
where
    F: Fn(&Invocation) -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static,
{
    async fn handle(&self, invocation: &Invocation) -> Result<Value> {
        (self.f)(invocation).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Identity of a handler. Clones of a [`Handler`] share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

type SyncBody = dyn Fn(&Invocation) -> Result<Value> + Send + Sync;

#[derive(Clone)]
enum Body {
    Sync(Arc<SyncBody>),
    Suspending(Arc<dyn HandleNote>),
}

/// A named, shaped callable subscribed to one or more note types.
#[derive(Clone)]
pub struct Handler {
    id: HandlerId,
    name: Arc<str>,
    shape: CallShape,
    body: Body,
}

fn to_result_value<R: Into<Value>>(result: Result<R>) -> Result<Value> {
    result.map(Into::into)
}

impl Handler {
    fn sync(
        name: impl Into<Arc<str>>,
        shape: CallShape,
        body: impl Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: HandlerId::next(),
            name: name.into(),
            shape,
            body: Body::Sync(Arc::new(body)),
        }
    }

    fn suspending<F>(name: impl Into<Arc<str>>, shape: CallShape, f: F) -> Self
    where
        F: Fn(&Invocation) -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static,
    {
        let name = name.into();
        let handler = AsyncFn {
            name: Arc::clone(&name),
            f,
        };
        Self {
            id: HandlerId::next(),
            name,
            shape,
            body: Body::Suspending(Arc::new(handler)),
        }
    }

    /// Synchronous handler that receives only the note.
    pub fn note<F, R>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(&dyn Note) -> Result<R> + Send + Sync + 'static,
        R: Into<Value>,
    {
        Self::sync(name, CallShape::NoteOnly, move |inv| {
            to_result_value(f(inv.note()))
        })
    }

    /// Synchronous handler that receives the note and the payload.
    pub fn payload<F, R>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(&dyn Note, &Payload) -> Result<R> + Send + Sync + 'static,
        R: Into<Value>,
    {
        Self::sync(name, CallShape::NoteAndPayload, move |inv| {
            to_result_value(f(inv.note(), inv.payload()))
        })
    }

    /// Synchronous handler that receives the note, payload and context.
    pub fn context<F, R>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(&dyn Note, &Payload, &Context) -> Result<R> + Send + Sync + 'static,
        R: Into<Value>,
    {
        Self::sync(name, CallShape::NoteAndPayloadAndContext, move |inv| {
            to_result_value(f(inv.note(), inv.payload(), inv.context()))
        })
    }

    /// Suspending handler that receives only the note.
    pub fn note_async<F, Fut, R>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(Arc<dyn Note>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        R: Into<Value> + 'static,
    {
        Self::suspending(name, CallShape::NoteOnly, move |inv| {
            f(Arc::clone(inv.note_arc())).map(to_result_value).boxed()
        })
    }

    /// Suspending handler that receives the note and the payload.
    pub fn payload_async<F, Fut, R>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(Arc<dyn Note>, Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        R: Into<Value> + 'static,
    {
        Self::suspending(name, CallShape::NoteAndPayload, move |inv| {
            f(Arc::clone(inv.note_arc()), inv.payload().clone())
                .map(to_result_value)
                .boxed()
        })
    }

    /// Suspending handler that receives the note, payload and context.
    pub fn context_async<F, Fut, R>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(Arc<dyn Note>, Payload, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        R: Into<Value> + 'static,
    {
        Self::suspending(name, CallShape::NoteAndPayloadAndContext, move |inv| {
            f(
                Arc::clone(inv.note_arc()),
                inv.payload().clone(),
                inv.context().clone(),
            )
            .map(to_result_value)
            .boxed()
        })
    }

    /// Synchronous handler with a declared positional arity of 1, 2 or 3.
    ///
    /// `f` receives exactly `arity` arguments, in note, payload, context order.
    pub fn with_arity<F, R>(name: impl Into<Arc<str>>, arity: usize, f: F) -> Result<Self, NoteError>
    where
        F: Fn(&[Arg<'_>]) -> Result<R> + Send + Sync + 'static,
        R: Into<Value>,
    {
        let shape = CallShape::try_from(arity)?;
        Ok(Self::sync(name, shape, move |inv| {
            to_result_value(f(inv.args(shape).as_slice()))
        }))
    }

    /// Wrap a [`HandleNote`] implementation.
    pub fn from_impl(handler: impl HandleNote) -> Self {
        let name: Arc<str> = Arc::from(handler.name());
        Self {
            id: HandlerId::next(),
            name,
            shape: CallShape::NoteAndPayloadAndContext,
            body: Body::Suspending(Arc::new(handler)),
        }
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> CallShape {
        self.shape
    }

    pub fn is_suspending(&self) -> bool {
        matches!(self.body, Body::Suspending(_))
    }

    /// Invoke once. Synchronous bodies run now and return a completed future.
    pub(crate) fn call<'a>(&'a self, invocation: &'a Invocation) -> BoxFuture<'a, Result<Value>> {
        match &self.body {
            Body::Sync(body) => future::ready(body(invocation)).boxed(),
            Body::Suspending(handler) => handler.handle(invocation),
        }
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Handler {}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("suspending", &self.is_suspending())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Values a filter may return: a plain `bool`, or a fallible `Result<bool>`.
pub trait IntoVerdict {
    fn into_verdict(self) -> Result<bool>;
}

impl IntoVerdict for bool {
    fn into_verdict(self) -> Result<bool> {
        Ok(self)
    }
}

impl<E> IntoVerdict for std::result::Result<bool, E>
where
    E: Into<anyhow::Error>,
{
    fn into_verdict(self) -> Result<bool> {
        self.map_err(Into::into)
    }
}

type Check = dyn Fn(&Invocation) -> Result<bool> + Send + Sync;

/// Admission predicate evaluated before a handler is selected.
#[derive(Clone)]
pub struct Filter {
    shape: CallShape,
    check: Arc<Check>,
}

impl Filter {
    fn build(
        shape: CallShape,
        check: impl Fn(&Invocation) -> Result<bool> + Send + Sync + 'static,
    ) -> Self {
        Self {
            shape,
            check: Arc::new(check),
        }
    }

    pub fn note<F, O>(f: F) -> Self
    where
        F: Fn(&dyn Note) -> O + Send + Sync + 'static,
        O: IntoVerdict,
    {
        Self::build(CallShape::NoteOnly, move |inv| f(inv.note()).into_verdict())
    }

    pub fn payload<F, O>(f: F) -> Self
    where
        F: Fn(&dyn Note, &Payload) -> O + Send + Sync + 'static,
        O: IntoVerdict,
    {
        Self::build(CallShape::NoteAndPayload, move |inv| {
            f(inv.note(), inv.payload()).into_verdict()
        })
    }

    pub fn context<F, O>(f: F) -> Self
    where
        F: Fn(&dyn Note, &Payload, &Context) -> O + Send + Sync + 'static,
        O: IntoVerdict,
    {
        Self::build(CallShape::NoteAndPayloadAndContext, move |inv| {
            f(inv.note(), inv.payload(), inv.context()).into_verdict()
        })
    }

    /// Filter with a declared positional arity; same rule as
    /// [`Handler::with_arity`].
    pub fn with_arity<F, O>(arity: usize, f: F) -> Result<Self, NoteError>
    where
        F: Fn(&[Arg<'_>]) -> O + Send + Sync + 'static,
        O: IntoVerdict,
    {
        let shape = CallShape::try_from(arity)?;
        Ok(Self::build(shape, move |inv| f(inv.args(shape).as_slice()).into_verdict()))
    }

    pub fn shape(&self) -> CallShape {
        self.shape
    }

    pub fn evaluate(&self, invocation: &Invocation) -> Result<bool> {
        (self.check)(invocation)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").field("shape", &self.shape).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_maps_to_shape() {
        assert_eq!(CallShape::try_from(1).unwrap(), CallShape::NoteOnly);
        assert_eq!(CallShape::try_from(2).unwrap(), CallShape::NoteAndPayload);
        assert_eq!(
            CallShape::try_from(3).unwrap(),
            CallShape::NoteAndPayloadAndContext
        );
        for arity in [0, 4, 7] {
            assert!(matches!(
                CallShape::try_from(arity),
                Err(NoteError::InvalidHandlerSignature { arity: a }) if a == arity
            ));
        }
    }

    #[test]
    fn invalid_arity_rejected_for_handler_and_filter_independently() {
        assert!(Handler::with_arity("h", 0, |_args| Ok(())).is_err());
        assert!(Filter::with_arity(4, |_args| true).is_err());
        assert!(Handler::with_arity("h", 3, |_args| Ok(())).is_ok());
        assert!(Filter::with_arity(2, |_args| true).is_ok());
    }

    #[test]
    fn clones_share_identity() {
        let h = Handler::note("h", |_note| Ok(()));
        let other = Handler::note("h", |_note| Ok(()));
        assert_eq!(h, h.clone());
        assert_ne!(h, other);
        assert!(!h.is_suspending());
        assert!(Handler::note_async("a", |_note| async { Ok::<_, anyhow::Error>(()) }).is_suspending());
    }
}
