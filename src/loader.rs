//! Background loading with last-request-wins semantics.
//!
//! Loads run one at a time on a dedicated worker thread. Submitting a new
//! request cancels the one in flight; a cancelled load never replaces the
//! published model.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn};

use crate::error::{ProfilerError, Result};
use crate::source_model::{LoadRequest, SourceModel};

pub struct LoadService {
    pool: ThreadPool,
    active: Arc<Mutex<Option<Arc<AtomicBool>>>>,
    current: Arc<RwLock<Option<Arc<SourceModel>>>>,
}

impl LoadService {
    pub fn new() -> std::result::Result<Self, rayon::ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(1)
            .thread_name(|_| "basprof-loader".to_owned())
            .build()?;
        Ok(Self {
            pool,
            active: Arc::new(Mutex::new(None)),
            current: Arc::new(RwLock::new(None)),
        })
    }

    /// Queues `request`, cancelling whatever load is still pending.
    ///
    /// Exactly one callback runs on the worker thread when the load ends.
    /// A successful model is published before `on_success` sees it.
    pub fn submit<S, F>(&self, request: LoadRequest, on_success: S, on_failure: F)
    where
        S: FnOnce(Arc<SourceModel>) + Send + 'static,
        F: FnOnce(ProfilerError) + Send + 'static,
    {
        let token = request.cancel_token();
        {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = active.replace(Arc::clone(&token)) {
                previous.store(true, Ordering::Relaxed);
                debug!("superseded pending load");
            }
        }

        let active = Arc::clone(&self.active);
        let current = Arc::clone(&self.current);
        self.pool.spawn(move || {
            let outcome = SourceModel::load(&request).and_then(|model| {
                if request.is_cancelled() {
                    Err(ProfilerError::Cancelled)
                } else {
                    Ok(Arc::new(model))
                }
            });

            {
                let mut slot = active.lock().unwrap_or_else(PoisonError::into_inner);
                if slot.as_ref().is_some_and(|t| Arc::ptr_eq(t, &token)) {
                    *slot = None;
                }
            }

            match outcome {
                Ok(model) => {
                    *current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&model));
                    on_success(model);
                }
                Err(e) => {
                    if !matches!(e, ProfilerError::Cancelled) {
                        warn!(program = %request.base_name, error = %e, "load failed");
                    }
                    on_failure(e);
                }
            }
        });
    }

    /// Submits `request` and waits for it to finish.
    pub fn load_blocking(&self, request: LoadRequest) -> Result<Arc<SourceModel>> {
        let (tx, rx) = mpsc::channel();
        let tx_err = tx.clone();
        self.submit(
            request,
            move |model| {
                tx.send(Ok(model)).ok();
            },
            move |e| {
                tx_err.send(Err(e)).ok();
            },
        );
        rx.recv().unwrap_or(Err(ProfilerError::Cancelled))
    }

    /// Most recently published model, if any load has succeeded.
    pub fn current(&self) -> Option<Arc<SourceModel>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn cancel_active(&self) {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = active.as_ref() {
            token.store(true, Ordering::Relaxed);
        }
    }
}
