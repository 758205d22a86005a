//! Per-dispatch data handed to handlers and filters.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};
use tracing::warn;

use crate::note::Note;

/// Key reserved for the context argument; never part of a payload.
pub const RESERVED_CONTEXT_KEY: &str = "context";

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Caller-supplied keyword values for one dispatch. Immutable once built.
#[derive(Clone, Default)]
pub struct Payload {
    values: Arc<Map<String, Value>>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a map, dropping the reserved `context` key.
    pub fn from_map(mut values: Map<String, Value>) -> Self {
        if values.remove(RESERVED_CONTEXT_KEY).is_some() {
            warn!("Dropped reserved `context` key from payload");
        }
        Self {
            values: Arc::new(values),
        }
    }

    /// Returns a new payload with `key` set.
    pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key == RESERVED_CONTEXT_KEY {
            warn!("Ignored reserved `context` key in payload");
            return self;
        }
        let mut values = Arc::unwrap_or_clone(self.values);
        values.insert(key, value.into());
        Self {
            values: Arc::new(values),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.values.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// True when both handles point at the same payload.
    pub fn ptr_eq(&self, other: &Payload) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(values: Map<String, Value>) -> Self {
        Self::from_map(values)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Payload {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({})", Value::Object((*self.values).clone()))
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Mutable scratch mapping shared by identity.
///
/// Clones share the same underlying map, so a write by one handler is seen
/// by every later handler of the same dispatch.
#[derive(Clone, Default)]
pub struct Context {
    inner: Arc<Mutex<Map<String, Value>>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: Map<String, Value>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(values)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.lock().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Run `f` with exclusive access to the map. Do not hold across `.await`.
    pub fn update<R>(&self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        f(&mut *self.lock())
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.lock().clone()
    }

    /// True when both handles share the same underlying map.
    pub fn ptr_eq(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl From<Map<String, Value>> for Context {
    fn from(values: Map<String, Value>) -> Self {
        Self::from_map(values)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context({})", Value::Object(self.snapshot()))
    }
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// Everything one dispatch offers a handler. Each calling convention picks
/// the parts it declared.
#[derive(Clone)]
pub struct Invocation {
    note: Arc<dyn Note>,
    payload: Payload,
    context: Context,
}

impl Invocation {
    pub fn new(note: Arc<dyn Note>, payload: Payload, context: Context) -> Self {
        Self {
            note,
            payload,
            context,
        }
    }

    pub fn note(&self) -> &dyn Note {
        &*self.note
    }

    pub fn note_arc(&self) -> &Arc<dyn Note> {
        &self.note
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn context(&self) -> &Context {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_drops_reserved_context_key() {
        let payload = Payload::new()
            .with("user", "bob")
            .with(RESERVED_CONTEXT_KEY, json!({"flag": true}));
        assert_eq!(payload.len(), 1);
        assert_eq!(payload.get("user"), Some(&json!("bob")));

        let map = json!({"ok": true, "context": 1});
        let payload = Payload::from(map.as_object().cloned().unwrap_or_default());
        assert!(!payload.contains_key(RESERVED_CONTEXT_KEY));
        assert!(payload.contains_key("ok"));
    }

    #[test]
    fn context_clones_share_identity() {
        let ctx = Context::new();
        let other = ctx.clone();
        other.insert("seen", true);
        assert!(ctx.ptr_eq(&other));
        assert_eq!(ctx.get("seen"), Some(json!(true)));
        assert!(!ctx.ptr_eq(&Context::new()));
    }

    #[test]
    fn context_update_runs_under_one_lock() {
        let ctx = Context::new();
        for _ in 0..3 {
            ctx.update(|map| {
                let next = map.get("count").and_then(Value::as_u64).unwrap_or(0) + 1;
                map.insert("count".into(), json!(next));
            });
        }
        assert_eq!(ctx.get("count"), Some(json!(3)));
    }
}
