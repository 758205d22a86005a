//! Static note-type hierarchy.
//!
//! An explicit parent-pointer table. Every registered type stores its full
//! ancestor chain, computed once from its parent's chain, so lookups never
//! walk the table.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{NoteError, NoteResult};
use crate::note::{NoteKind, NoteType};

struct Entry {
    parent: Option<NoteType>,
    chain: Arc<[NoteType]>,
}

/// Single-inheritance hierarchy rooted at [`NoteType::ROOT`].
pub struct TypeGraph {
    entries: HashMap<NoteType, Entry>,
}

impl TypeGraph {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            NoteType::ROOT,
            Entry {
                parent: None,
                chain: Arc::from(vec![NoteType::ROOT]),
            },
        );
        Self { entries }
    }

    /// Register `ty` as a child of `parent`.
    ///
    /// The parent must already be registered, which keeps the graph acyclic.
    /// Registering the same pair twice is a no-op.
    pub fn register(&mut self, ty: NoteType, parent: NoteType) -> NoteResult<()> {
        if ty == parent {
            return Err(NoteError::CycleOrDuplicate {
                ty,
                parent,
                reason: "a type cannot be its own parent".into(),
            });
        }

        if let Some(existing) = self.entries.get(&ty) {
            return match existing.parent {
                Some(current) if current == parent => Ok(()),
                Some(current) => Err(NoteError::CycleOrDuplicate {
                    ty,
                    parent,
                    reason: format!("already registered under {current}"),
                }),
                None => Err(NoteError::CycleOrDuplicate {
                    ty,
                    parent,
                    reason: "the root type cannot be re-parented".into(),
                }),
            };
        }

        let parent_chain = match self.entries.get(&parent) {
            Some(entry) => Arc::clone(&entry.chain),
            None => return Err(NoteError::UnknownParent { ty, parent }),
        };

        let mut chain = Vec::with_capacity(parent_chain.len() + 1);
        chain.push(ty);
        chain.extend(parent_chain.iter().copied());

        debug!(ty = ty.name(), parent = parent.name(), depth = chain.len(), "Registered note type");
        self.entries.insert(
            ty,
            Entry {
                parent: Some(parent),
                chain: Arc::from(chain),
            },
        );
        Ok(())
    }

    /// Register a statically declared note struct under its declared parent.
    pub fn declare<T: NoteKind>(&mut self) -> NoteResult<()> {
        self.register(T::TYPE, T::PARENT)
    }

    /// `ty` itself, then each ancestor up to and including the root.
    ///
    /// An unregistered type is treated as a direct child of the root.
    pub fn ancestors_of(&self, ty: NoteType) -> Arc<[NoteType]> {
        match self.entries.get(&ty) {
            Some(entry) => Arc::clone(&entry.chain),
            None => {
                debug!(ty = ty.name(), "Unregistered note type, resolving as child of root");
                Arc::from(vec![ty, NoteType::ROOT])
            }
        }
    }

    /// Like [`ancestors_of`](Self::ancestors_of), but an unregistered `ty`
    /// is placed under its declared `parent` instead of directly under the
    /// root. The graph itself is left unchanged.
    pub fn ancestors_through(&self, ty: NoteType, parent: NoteType) -> Arc<[NoteType]> {
        if let Some(entry) = self.entries.get(&ty) {
            return Arc::clone(&entry.chain);
        }
        if parent == ty || ty.is_root() {
            return self.ancestors_of(ty);
        }
        debug!(
            ty = ty.name(),
            parent = parent.name(),
            "Unregistered note type, resolving through declared parent"
        );
        std::iter::once(ty)
            .chain(self.ancestors_of(parent).iter().copied())
            .collect()
    }

    pub fn parent_of(&self, ty: NoteType) -> Option<NoteType> {
        self.entries.get(&ty).and_then(|entry| entry.parent)
    }

    pub fn contains(&self, ty: NoteType) -> bool {
        self.entries.contains_key(&ty)
    }

    /// Number of registered types, root included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TypeGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: NoteType = NoteType::new("A");
    const B: NoteType = NoteType::new("B");
    const C: NoteType = NoteType::new("C");

    fn chain_graph() -> TypeGraph {
        let mut graph = TypeGraph::new();
        graph.register(A, NoteType::ROOT).unwrap();
        graph.register(B, A).unwrap();
        graph.register(C, B).unwrap();
        graph
    }

    #[test]
    fn ancestors_run_from_most_specific_to_root() {
        let graph = chain_graph();
        assert_eq!(&*graph.ancestors_of(C), &[C, B, A, NoteType::ROOT]);
        assert_eq!(&*graph.ancestors_of(A), &[A, NoteType::ROOT]);
        assert_eq!(&*graph.ancestors_of(NoteType::ROOT), &[NoteType::ROOT]);
    }

    #[test]
    fn unregistered_type_resolves_through_declared_parent() {
        let graph = chain_graph();
        let d = NoteType::new("D");
        assert_eq!(&*graph.ancestors_through(d, B), &[d, B, A, NoteType::ROOT]);
        assert_eq!(&*graph.ancestors_through(d, NoteType::ROOT), &[d, NoteType::ROOT]);
        assert_eq!(&*graph.ancestors_through(d, d), &[d, NoteType::ROOT]);
        assert_eq!(&*graph.ancestors_through(C, A), &[C, B, A, NoteType::ROOT]);
        assert!(!graph.contains(d));
    }

    #[test]
    fn reregistering_same_parent_is_idempotent() {
        let mut graph = chain_graph();
        graph.register(B, A).unwrap();
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.parent_of(B), Some(A));
    }

    #[test]
    fn reparenting_is_rejected() {
        let mut graph = chain_graph();
        let err = graph.register(C, A).unwrap_err();
        assert!(matches!(err, NoteError::CycleOrDuplicate { ty, .. } if ty == C));
        assert_eq!(graph.parent_of(C), Some(B));
    }

    #[test]
    fn self_parent_and_root_reparent_are_cycles() {
        let mut graph = chain_graph();
        assert!(matches!(
            graph.register(A, A),
            Err(NoteError::CycleOrDuplicate { .. })
        ));
        assert!(matches!(
            graph.register(NoteType::ROOT, C),
            Err(NoteError::CycleOrDuplicate { .. })
        ));
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut graph = TypeGraph::new();
        let err = graph.register(B, A).unwrap_err();
        assert!(matches!(err, NoteError::UnknownParent { parent, .. } if parent == A));
        assert!(!graph.contains(B));
    }

    #[test]
    fn unregistered_type_resolves_under_root() {
        let graph = TypeGraph::new();
        assert_eq!(&*graph.ancestors_of(A), &[A, NoteType::ROOT]);
    }
}
