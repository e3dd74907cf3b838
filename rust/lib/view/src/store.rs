use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

use crate::error::ViewError;
use crate::topic::topic_matches;

/// A published piece of view state, shared by every reader of its path.
///
/// Remembers the Rust type it was published as so a mistyped read can say
/// what is actually there.
#[derive(Clone)]
pub struct ViewValue {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ViewValue {
    fn of<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Type name of the published value, e.g. `secrets_feed::model::LikeState`.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for ViewValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ViewValue").field(&self.type_name).finish()
    }
}

/// Handle returned by [`ViewStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback invoked with `(path, value)` after a matching publish.
pub type ChangeHandler = Arc<dyn Fn(&str, &ViewValue) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    pattern: String,
    handler: ChangeHandler,
}

/// Path-addressed view state with pattern subscriptions.
///
/// `publish` replaces the value at a path and synchronously notifies every
/// subscriber whose pattern matches. Handlers run after the store's locks are
/// released, so a handler may read from (or publish to) the same store.
pub struct ViewStore {
    values: RwLock<BTreeMap<String, ViewValue>>,
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl ViewStore {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(BTreeMap::new()),
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Store `value` at `path` and notify matching subscribers.
    pub fn publish<T: Any + Send + Sync>(&self, path: &str, value: T) {
        let value = ViewValue::of(value);
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), value.clone());

        let handlers: Vec<ChangeHandler> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| topic_matches(&s.pattern, path))
            .map(|s| Arc::clone(&s.handler))
            .collect();

        trace!(path, subscribers = handlers.len(), "view published");
        for handler in handlers {
            handler(path, &value);
        }
    }

    pub fn get(&self, path: &str) -> Option<ViewValue> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Read the value at `path` as `T`, cloned out of the shared allocation.
    pub fn try_read<T: Any + Clone>(&self, path: &str) -> Result<T, ViewError> {
        let value = self.get(path).ok_or_else(|| ViewError::Missing {
            path: path.to_string(),
        })?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| ViewError::TypeMismatch {
                path: path.to_string(),
                expected: type_name::<T>(),
                found: value.type_name(),
            })
    }

    /// [`try_read`](Self::try_read), treating every failure as absent.
    pub fn read<T: Any + Clone>(&self, path: &str) -> Option<T> {
        self.try_read(path).ok()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    /// Remove the value at `path`. Subscribers are not notified.
    pub fn remove(&self, path: &str) -> Option<ViewValue> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
    }

    /// Remove `prefix` itself and everything below `{prefix}/`.
    ///
    /// Returns the number of removed paths. Subscribers are not notified.
    pub fn remove_tree(&self, prefix: &str) -> usize {
        let child_prefix = format!("{prefix}/");
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        let before = values.len();
        values.retain(|k, _| k != prefix && !k.starts_with(&child_prefix));
        before - values.len()
    }

    /// All `(path, value)` pairs strictly below `{prefix}/`, ordered by path.
    pub fn scan(&self, prefix: &str) -> Vec<(String, ViewValue)> {
        let child_prefix = format!("{prefix}/");
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .range(child_prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&child_prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn paths(&self) -> Vec<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observe publishes whose path matches `pattern` (`+` and `#` wildcards).
    pub fn subscribe<F>(&self, pattern: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&str, &ViewValue) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                id,
                pattern: pattern.to_string(),
                handler: Arc::new(handler),
            });
        id
    }

    /// Returns `true` if the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }
}

impl Default for ViewStore {
    fn default() -> Self {
        Self::new()
    }
}
