// src/handle.rs
//! Shared access to one `VaultService` with a single in-flight operation
//!
//! The loading flag is claimed before the service mutex is taken, so a
//! second caller gets `Busy` immediately instead of queueing behind a long
//! import or re-key.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::service::VaultService;

#[derive(Clone)]
pub struct VaultHandle {
    service: Arc<Mutex<VaultService>>,
    loading: Arc<AtomicBool>,
}

/// Clears the loading flag on drop, including during unwinding
struct LoadingGuard(Arc<AtomicBool>);

impl LoadingGuard {
    fn claim(flag: &Arc<AtomicBool>) -> CoreResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CoreError::Busy)?;
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl VaultHandle {
    pub fn new(service: VaultService) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
            loading: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True while an operation holds the vault
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    fn execute<T, F>(
        service: &Mutex<VaultService>,
        _guard: LoadingGuard,
        f: F,
    ) -> CoreResult<T>
    where
        F: FnOnce(&mut VaultService) -> CoreResult<T>,
    {
        let mut svc = match service.lock() {
            Ok(svc) => svc,
            Err(poisoned) => {
                warn!("an earlier vault operation panicked; discarding its transaction");
                let mut svc = poisoned.into_inner();
                svc.abort_pending();
                svc
            }
        };
        f(&mut svc)
    }

    /// Run `f` on the calling thread
    pub fn run<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut VaultService) -> CoreResult<T>,
    {
        let guard = LoadingGuard::claim(&self.loading)?;
        Self::execute(&self.service, guard, f)
    }

    /// Run `f` on a worker thread. The flag is claimed before this returns,
    /// so `Busy` is reported synchronously.
    pub fn spawn<T, F>(&self, f: F) -> CoreResult<JoinHandle<CoreResult<T>>>
    where
        T: Send + 'static,
        F: FnOnce(&mut VaultService) -> CoreResult<T> + Send + 'static,
    {
        let guard = LoadingGuard::claim(&self.loading)?;
        let service = Arc::clone(&self.service);
        let handle = thread::Builder::new()
            .name("passvault-worker".into())
            .spawn(move || {
                debug!("background vault operation started");
                Self::execute(&service, guard, f)
            })?;
        Ok(handle)
    }
}
