//! Subscription registry.
//!
//! Holds the type graph and one ordered bucket of subscriptions per note
//! type, and turns a dispatched note into the ordered, deduplicated list of
//! handlers to invoke.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, trace, warn};

use crate::error::NoteResult;
use crate::graph::TypeGraph;
use crate::handler::{Filter, Handler, HandlerId};
use crate::invocation::Invocation;
use crate::note::{NoteKind, NoteType};

/// A handler bound to a note type, optionally guarded by a filter.
#[derive(Debug, Clone)]
pub struct Subscription {
    target: NoteType,
    filter: Option<Filter>,
    handler: Handler,
}

impl Subscription {
    pub fn target(&self) -> NoteType {
        self.target
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

/// Type graph plus per-type subscription buckets.
///
/// Written during setup and read on every dispatch. Locks are released
/// before any filter runs, so filters may read the registry.
pub struct SubscriptionRegistry {
    graph: RwLock<TypeGraph>,
    buckets: RwLock<HashMap<NoteType, Vec<Subscription>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::with_graph(TypeGraph::new())
    }

    pub fn with_graph(graph: TypeGraph) -> Self {
        Self {
            graph: RwLock::new(graph),
            buckets: RwLock::new(HashMap::new()),
        }
    }

    // -- hierarchy --------------------------------------------------------

    pub fn register_type(&self, ty: NoteType, parent: NoteType) -> NoteResult<()> {
        write(&self.graph).register(ty, parent)
    }

    pub fn declare<T: NoteKind>(&self) -> NoteResult<()> {
        write(&self.graph).declare::<T>()
    }

    pub fn ancestors_of(&self, ty: NoteType) -> Arc<[NoteType]> {
        read(&self.graph).ancestors_of(ty)
    }

    pub fn parent_of(&self, ty: NoteType) -> Option<NoteType> {
        read(&self.graph).parent_of(ty)
    }

    // -- subscriptions ----------------------------------------------------

    /// Append `handler` to `ty`'s bucket and hand it back unchanged.
    pub fn subscribe(&self, ty: NoteType, handler: Handler, filter: Option<Filter>) -> Handler {
        debug!(
            ty = ty.name(),
            handler = handler.name(),
            shape = ?handler.shape(),
            filtered = filter.is_some(),
            "Subscribed handler"
        );
        write(&self.buckets).entry(ty).or_default().push(Subscription {
            target: ty,
            filter,
            handler: handler.clone(),
        });
        handler
    }

    /// Handlers subscribed directly to `ty`, in registration order.
    pub fn handlers_for(&self, ty: NoteType) -> Vec<Handler> {
        read(&self.buckets)
            .get(&ty)
            .map(|bucket| bucket.iter().map(|s| s.handler.clone()).collect())
            .unwrap_or_default()
    }

    pub fn subscription_count(&self) -> usize {
        read(&self.buckets).values().map(Vec::len).sum()
    }

    /// Drop every subscription. Registered types are kept.
    pub fn clear(&self) {
        let mut buckets = write(&self.buckets);
        let removed: usize = buckets.values().map(Vec::len).sum();
        buckets.clear();
        debug!(removed, "Cleared subscriptions");
    }

    // -- resolution -------------------------------------------------------

    /// Ordered, deduplicated handlers for the note in `invocation`.
    ///
    /// Walks the ancestor chain most specific first and each bucket in
    /// registration order. A handler already selected is skipped; otherwise
    /// its filter decides. A failing filter aborts resolution.
    pub fn resolve(&self, invocation: &Invocation) -> NoteResult<Vec<Handler>> {
        let note = invocation.note();
        let chain = read(&self.graph).ancestors_through(note.note_type(), note.parent_type());

        let candidates: Vec<Subscription> = {
            let buckets = read(&self.buckets);
            chain
                .iter()
                .filter_map(|ancestor| buckets.get(ancestor))
                .flat_map(|bucket| bucket.iter().cloned())
                .collect()
        };

        let mut seen: HashSet<HandlerId> = HashSet::new();
        let mut selected = Vec::new();

        for sub in candidates {
            if seen.contains(&sub.handler.id()) {
                trace!(handler = sub.handler.name(), via = sub.target.name(), "Already selected");
                continue;
            }

            let admitted = match &sub.filter {
                None => true,
                Some(filter) => filter.evaluate(invocation).map_err(|err| {
                    warn!(
                        handler = sub.handler.name(),
                        via = sub.target.name(),
                        error = %err,
                        "Filter failed"
                    );
                    err
                })?,
            };

            if admitted {
                seen.insert(sub.handler.id());
                selected.push(sub.handler);
            } else {
                trace!(handler = sub.handler.name(), via = sub.target.name(), "Filtered out");
            }
        }

        Ok(selected)
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
