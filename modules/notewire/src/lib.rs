//! In-process note dispatcher.
//!
//! Producers dispatch typed notes; consumers subscribe handlers to a note
//! type or any of its ancestors, optionally behind a filter. One dispatch
//! resolves the handlers across the type hierarchy (most specific type
//! first, registration order within a type, each handler at most once),
//! invokes them one at a time, and returns an [`Emission`] of responses.
//!
//! ```
//! use notewire::{note, Dispatcher, Handler, NoteExt, NoteKind};
//!
//! note! {
//!     #[derive(Debug, Clone)]
//!     pub struct Greet { pub name: String }
//! }
//!
//! # futures::executor::block_on(async {
//! let dispatcher = Dispatcher::new();
//! dispatcher.declare::<Greet>()?;
//! dispatcher.subscribe(
//!     Greet::TYPE,
//!     Handler::note("greet", |note| {
//!         let greet = note.downcast_ref::<Greet>().map(|g| g.name.clone()).unwrap_or_default();
//!         Ok(format!("hi {greet}"))
//!     }),
//! );
//!
//! let emission = Greet { name: "World".into() }.emit(&dispatcher).await?;
//! assert_eq!(emission.len(), 1);
//! assert_eq!(emission[0].result(), "hi World");
//! # Ok::<_, notewire::NoteError>(())
//! # }).unwrap();
//! ```

pub mod config;
pub mod emission;
pub mod engine;
pub mod error;
pub mod graph;
pub mod handler;
pub mod invocation;
pub mod note;
pub mod registry;

pub use config::DispatcherConfig;
pub use emission::{Emission, Response};
pub use engine::{Dispatcher, EmitRequest, NoteExt};
pub use error::{NoteError, NoteResult};
pub use graph::TypeGraph;
pub use handler::{Arg, CallShape, Filter, HandleNote, Handler, HandlerId, IntoVerdict};
pub use invocation::{Context, Invocation, Payload, RESERVED_CONTEXT_KEY};
pub use note::{AsAny, Note, NoteKind, NoteType};

#[doc(hidden)]
pub use serde_json;
