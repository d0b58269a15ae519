//! Order-independent instance sharing.
//!
//! A [`Registry`] decouples producer and consumer initialization order: a
//! consumer can `observe` a (scope, name) key before or after the producer
//! `provide`s it, with identical observable results. This is an explicit
//! object with process-wide lifetime, passed by reference to whoever needs
//! it; there is no ambient global.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;

/// Opaque scope token with identity semantics: two scopes compare equal only
/// if one is a clone of the other. Entries under different scopes with the
/// same name are independent.
#[derive(Clone, Debug, Default)]
pub struct Scope(Arc<()>);

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Scope {}

impl Hash for Scope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

type Key = (Scope, String);
type Waiter<T> = Box<dyn FnOnce(T) + Send>;

/// Name-keyed directory of published instances plus FIFO queues of consumers
/// awaiting a key.
///
/// Entries are never removed once published, and no callback ever runs more
/// than once. Observing a key that is never provided waits indefinitely;
/// that is deliberate, not an error.
pub struct Registry<T> {
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    entries: HashMap<Key, T>,
    pending: HashMap<Key, Vec<Waiter<T>>>,
}

impl<T: Clone> Registry<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                pending: HashMap::new(),
            }),
        }
    }

    /// Publish `instance` under (scope, name). Every consumer queued for the
    /// key is invoked exactly once, in enqueue order, synchronously, before
    /// this returns. Re-providing a key overwrites the entry without
    /// re-notifying consumers that already resolved.
    pub fn provide(&self, scope: &Scope, name: &str, instance: T) {
        let key = (scope.clone(), name.to_string());
        let waiters = {
            let mut inner = self.inner.lock();
            inner.entries.insert(key.clone(), instance.clone());
            inner.pending.remove(&key).unwrap_or_default()
        };
        // Invoked outside the lock: a callback may call back into the
        // registry.
        for waiter in waiters {
            waiter(instance.clone());
        }
    }

    /// Resolve (scope, name): immediately and synchronously when the entry
    /// exists, otherwise once a matching `provide` happens.
    pub fn observe(&self, scope: &Scope, name: &str, on_resolved: impl FnOnce(T) + Send + 'static) {
        let key = (scope.clone(), name.to_string());
        let mut inner = self.inner.lock();
        match inner.entries.get(&key).cloned() {
            Some(instance) => {
                // Invoked outside the lock, same as provide's waiters.
                drop(inner);
                on_resolved(instance);
            }
            None => {
                inner
                    .pending
                    .entry(key)
                    .or_default()
                    .push(Box::new(on_resolved));
            }
        }
    }

    /// Current entry for (scope, name), if published.
    pub fn get(&self, scope: &Scope, name: &str) -> Option<T> {
        let key = (scope.clone(), name.to_string());
        self.inner.lock().entries.get(&key).cloned()
    }
}

impl<T: Clone> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn FnOnce(String) + Send>) {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_for_cb = seen.clone();
        let make = move |tag: &str| {
            let seen = seen_for_cb.clone();
            let tag = tag.to_string();
            Box::new(move |value: String| {
                seen.lock().push(format!("{tag}:{value}"));
            }) as Box<dyn FnOnce(String) + Send>
        };
        (seen, make)
    }

    #[test]
    fn observe_after_provide_is_immediate() {
        let registry = Registry::new();
        let scope = Scope::new();
        let (seen, make) = recorder();
        registry.provide(&scope, "X", "inst".to_string());
        registry.observe(&scope, "X", make("a"));
        assert_eq!(*seen.lock(), vec!["a:inst"]);
    }

    #[test]
    fn observe_before_provide_queues_fifo() {
        let registry = Registry::new();
        let scope = Scope::new();
        let (seen, make) = recorder();
        registry.observe(&scope, "X", make("first"));
        registry.observe(&scope, "X", make("second"));
        assert!(seen.lock().is_empty());

        registry.provide(&scope, "X", "inst".to_string());
        assert_eq!(*seen.lock(), vec!["first:inst", "second:inst"]);
    }

    #[test]
    fn mixed_resolved_and_queued_observers_both_fire() {
        let registry = Registry::new();
        let scope = Scope::new();
        let (seen, make) = recorder();
        registry.provide(&scope, "ready", "inst".to_string());
        registry.observe(&scope, "ready", make("eager"));
        registry.observe(&scope, "later", make("patient"));
        assert_eq!(*seen.lock(), vec!["eager:inst"]);

        registry.provide(&scope, "later", "inst".to_string());
        assert_eq!(*seen.lock(), vec!["eager:inst", "patient:inst"]);
    }

    #[test]
    fn reprovide_overwrites_without_renotifying() {
        let registry = Registry::new();
        let scope = Scope::new();
        let (seen, make) = recorder();
        registry.observe(&scope, "X", make("a"));
        registry.provide(&scope, "X", "one".to_string());
        registry.provide(&scope, "X", "two".to_string());
        assert_eq!(*seen.lock(), vec!["a:one"]);
        assert_eq!(registry.get(&scope, "X"), Some("two".to_string()));
    }

    #[test]
    fn scopes_are_independent() {
        let registry = Registry::new();
        let s1 = Scope::new();
        let s2 = Scope::new();
        let (seen, make) = recorder();
        registry.observe(&s2, "X", make("other-scope"));
        registry.provide(&s1, "X", "inst".to_string());
        assert!(seen.lock().is_empty());
        assert_eq!(registry.get(&s1, "X"), Some("inst".to_string()));
        assert_eq!(registry.get(&s2, "X"), None);

        // A clone of a scope is the same scope.
        registry.observe(&s1.clone(), "X", make("cloned"));
        assert_eq!(*seen.lock(), vec!["cloned:inst"]);
    }

    #[test]
    fn callback_may_reenter_registry() {
        let registry = Arc::new(Registry::new());
        let scope = Scope::new();
        let (seen, make) = recorder();
        let inner_cb = make("inner");
        let reentrant = registry.clone();
        let reentrant_scope = scope.clone();
        registry.observe(&scope, "X", move |_: String| {
            reentrant.observe(&reentrant_scope, "X", inner_cb);
        });
        registry.provide(&scope, "X", "inst".to_string());
        assert_eq!(*seen.lock(), vec!["inner:inst"]);
    }
}
