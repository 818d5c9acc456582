use std::{
    collections::{hash_map::Entry, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio_util::sync::CancellationToken;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ServiceTaskId(pub u64);
impl ServiceTaskId {
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

#[derive(Debug)]
struct Registry {
    /// Each live task's token is cancelled when that task finishes.
    live: HashMap<ServiceTaskId, CancellationToken>,
    next_id: ServiceTaskId,
}

/// The set of service tasks a skeleton currently has running.
///
/// Tasks enter through [`ServiceTasks::register`] and leave when the returned
/// guard is dropped, however the task ends.
#[derive(Debug, Clone)]
pub struct ServiceTasks(Arc<Mutex<Registry>>);

/// Membership of one task in [`ServiceTasks`].
#[derive(Debug)]
pub struct ServiceTaskGuard {
    id: ServiceTaskId,
    done: CancellationToken,
    tasks: ServiceTasks,
}

impl ServiceTasks {
    pub(crate) fn new() -> Self {
        ServiceTasks(Arc::new(Mutex::new(Registry {
            live: HashMap::new(),
            next_id: ServiceTaskId(0),
        })))
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a task to the set, and returns the guard that removes it again.
    #[must_use]
    pub fn register(&self) -> ServiceTaskGuard {
        let mut registry = self.lock();
        let done = CancellationToken::new();
        // Keep trying new ids until one is free. Wrapping all the way around
        // would take longer than any skeleton lives.
        loop {
            let id = registry.next_id;
            registry.next_id.increment();
            if let Entry::Vacant(entry) = registry.live.entry(id) {
                entry.insert(done.clone());
                return ServiceTaskGuard {
                    id,
                    done,
                    tasks: self.clone(),
                };
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().live.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().live.is_empty()
    }

    /// Waits until the set is empty, one live task at a time. Tasks that join
    /// while waiting are waited for as well.
    pub async fn wait_all(&self) {
        loop {
            let next = self.lock().live.values().next().cloned();
            match next {
                Some(done) => done.cancelled().await,
                None => return,
            }
        }
    }
}

impl ServiceTaskGuard {
    #[must_use]
    pub fn id(&self) -> ServiceTaskId {
        self.id
    }
}

impl Drop for ServiceTaskGuard {
    fn drop(&mut self) {
        self.tasks.lock().live.remove(&self.id);
        self.done.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_register_and_drop() {
        let tasks = ServiceTasks::new();
        assert!(tasks.is_empty());

        let first = tasks.register();
        let second = tasks.register();
        assert_ne!(first.id(), second.id());
        assert_eq!(tasks.len(), 2);

        drop(first);
        assert_eq!(tasks.len(), 1);
        drop(second);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_wait_all() {
        let tasks = ServiceTasks::new();
        tasks.wait_all().await;

        let guards: Vec<_> = (0..3).map(|_| tasks.register()).collect();
        let handle = tokio::spawn(async move {
            for guard in guards {
                tokio::time::sleep(Duration::from_millis(10)).await;
                drop(guard);
            }
        });

        tasks.wait_all().await;
        assert!(tasks.is_empty());
        handle.await.unwrap();
    }
}
