//! The inspectable outcome of one dispatch.

use std::fmt;
use std::ops::Index;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use crate::handler::{Handler, HandlerId};
use crate::invocation::{Context, Payload};
use crate::note::Note;

/// One handler's recorded outcome.
#[derive(Clone)]
pub struct Response {
    handler: Handler,
    note: Arc<dyn Note>,
    payload: Payload,
    context: Context,
    result: Value,
    elapsed: Duration,
}

impl Response {
    pub(crate) fn new(
        handler: Handler,
        note: Arc<dyn Note>,
        payload: Payload,
        context: Context,
        result: Value,
        elapsed: Duration,
    ) -> Self {
        Self {
            handler,
            note,
            payload,
            context,
            result,
            elapsed,
        }
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn handler_name(&self) -> &str {
        self.handler.name()
    }

    pub fn handler_id(&self) -> HandlerId {
        self.handler.id()
    }

    pub fn note(&self) -> &dyn Note {
        &*self.note
    }

    /// The value the handler returned; `Null` for handlers returning `()`.
    pub fn result(&self) -> &Value {
        &self.result
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Response from `{}` to {}: {}",
            self.handler.name(),
            self.note.render(),
            self.result
        )
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Response handler={} note={} result={}>",
            self.handler.name(),
            self.note.render(),
            self.result
        )
    }
}

/// Ordered responses of exactly one dispatch call.
#[derive(Clone)]
pub struct Emission {
    id: Uuid,
    responses: Vec<Response>,
}

impl Emission {
    pub(crate) fn new(id: Uuid, responses: Vec<Response>) -> Self {
        Self { id, responses }
    }

    /// Identifier of the dispatch that produced this emission.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Response> {
        self.responses.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Response> {
        self.responses.iter()
    }

    /// Handler results in invocation order.
    pub fn results(&self) -> impl Iterator<Item = &Value> {
        self.responses.iter().map(Response::result)
    }

    pub fn responses(&self) -> &[Response] {
        &self.responses
    }
}

impl Index<usize> for Emission {
    type Output = Response;

    fn index(&self, index: usize) -> &Response {
        &self.responses[index]
    }
}

impl<'a> IntoIterator for &'a Emission {
    type Item = &'a Response;
    type IntoIter = std::slice::Iter<'a, Response>;

    fn into_iter(self) -> Self::IntoIter {
        self.responses.iter()
    }
}

impl IntoIterator for Emission {
    type Item = Response;
    type IntoIter = std::vec::IntoIter<Response>;

    fn into_iter(self) -> Self::IntoIter {
        self.responses.into_iter()
    }
}

impl fmt::Display for Emission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, response) in self.responses.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{response}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Emission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Emission(len={}, responses=[", self.responses.len())?;
        for (i, response) in self.responses.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{response:?}")?;
        }
        f.write_str("])")
    }
}
