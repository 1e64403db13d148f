//! Owned, lazily constructed model handle.
//!
//! Building a finite-element assembly (mesh loading, element creation) is
//! expensive and only needs to happen once per process, while the modal
//! decomposition runs once per design update. [`ModelHandle`] owns the
//! initializer and the constructed model, guards construction so it runs
//! exactly once, and serializes access through a mutex because setting
//! design variables mutates the model.

use std::sync::{Mutex, MutexGuard, OnceLock};

use crate::{ModelError, Result};

type Initializer<M> = Box<dyn Fn() -> Result<M> + Send + Sync>;

pub struct ModelHandle<M> {
    init: Initializer<M>,
    init_guard: Mutex<()>,
    model: OnceLock<Mutex<M>>,
}

impl<M> ModelHandle<M> {
    /// Create a handle that builds its model on first access.
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> Result<M> + Send + Sync + 'static,
    {
        Self {
            init: Box::new(init),
            init_guard: Mutex::new(()),
            model: OnceLock::new(),
        }
    }

    /// Create a handle around an already constructed model.
    pub fn from_model(model: M) -> Self {
        let handle = Self::new(|| {
            Err(ModelError::Initialization(
                "handle was created from an existing model".into(),
            ))
        });
        // A fresh OnceLock cannot already be set.
        let _ = handle.model.set(Mutex::new(model));
        handle
    }

    pub fn is_initialized(&self) -> bool {
        self.model.get().is_some()
    }

    /// Exclusive access to the model, constructing it on first call.
    ///
    /// A failed initialization leaves the handle empty; the next call
    /// retries the initializer.
    pub fn lock(&self) -> Result<MutexGuard<'_, M>> {
        let cell = match self.model.get() {
            Some(cell) => cell,
            None => {
                let _guard = self.init_guard.lock().map_err(|_| ModelError::Poisoned)?;
                if self.model.get().is_none() {
                    let model = (self.init)()?;
                    tracing::debug!("model handle initialized");
                    let _ = self.model.set(Mutex::new(model));
                }
                self.model.get().ok_or_else(|| {
                    ModelError::Initialization("model missing after initialization".into())
                })?
            }
        };
        cell.lock().map_err(|_| ModelError::Poisoned)
    }
}

impl<M> std::fmt::Debug for ModelHandle<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn initializes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = ModelHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0, 2.0])
        });

        assert!(!handle.is_initialized());
        {
            let mut model = handle.lock().unwrap();
            model.push(3.0);
        }
        let model = handle.lock().unwrap();
        assert_eq!(*model, vec![1.0, 2.0, 3.0]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_first_access_builds_one_model() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = ModelHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(0usize)
        });

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    *handle.lock().unwrap() += 1;
                });
            }
        });

        assert_eq!(*handle.lock().unwrap(), 8);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_initialization_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = ModelHandle::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ModelError::Initialization("mesh not ready".into()))
            } else {
                Ok(42)
            }
        });

        assert!(handle.lock().is_err());
        assert!(!handle.is_initialized());
        assert_eq!(*handle.lock().unwrap(), 42);
    }

    #[test]
    fn wraps_existing_model() {
        let handle = ModelHandle::from_model(7u32);
        assert!(handle.is_initialized());
        assert_eq!(*handle.lock().unwrap(), 7);
    }
}
