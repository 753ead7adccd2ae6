use crate::cache::VerifyCache;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Stop flag plus the condvar the sweep loop parks on. The loop's wait is
/// interruptible: a stop request wakes it immediately instead of letting
/// the remainder of a period elapse.
struct Shutdown {
    requested: Mutex<bool>,
    cv: Condvar,
}

/// Background thread that runs the cache's expiry sweep on a fixed cadence.
///
/// `start` and `stop` are both idempotent and may be called from any
/// thread. `stop` signals the loop and then joins the thread — once it
/// returns, no sweep is running or will run, so the cache can be torn down
/// immediately afterwards. Dropping the sweeper stops it.
pub struct ExpirySweeper {
    cache: Arc<VerifyCache>,
    period: Duration,
    shutdown: Arc<Shutdown>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ExpirySweeper {
    pub fn new(cache: Arc<VerifyCache>, period: Duration) -> Self {
        Self {
            cache,
            period,
            shutdown: Arc::new(Shutdown {
                requested: Mutex::new(false),
                cv: Condvar::new(),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the sweep thread. No-op if it is already running.
    pub fn start(&self) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return;
        }
        *self.shutdown.requested.lock() = false;

        let cache = Arc::clone(&self.cache);
        let shutdown = Arc::clone(&self.shutdown);
        let period = self.period;
        *handle = Some(std::thread::spawn(move || {
            sweep_loop(&cache, &shutdown, period);
        }));

        tracing::debug!(period_ms = self.period.as_millis() as u64, "expiry sweeper started");
    }

    /// Request shutdown and block until the sweep loop has exited. No-op if
    /// the sweeper is not running.
    pub fn stop(&self) {
        // Hold the handle lock for the whole shutdown so a concurrent
        // `start` cannot clear the stop flag before the loop observes it.
        let mut slot = self.handle.lock();
        let Some(handle) = slot.take() else {
            return;
        };

        {
            let mut requested = self.shutdown.requested.lock();
            *requested = true;
            self.shutdown.cv.notify_one();
        }

        // Joining is the shutdown handshake: by the time this returns the
        // loop has observed the request and fully exited.
        if handle.join().is_err() {
            tracing::error!("expiry sweeper thread panicked");
        }

        tracing::debug!("expiry sweeper stopped");
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

fn sweep_loop(cache: &VerifyCache, shutdown: &Shutdown, period: Duration) {
    loop {
        {
            let mut requested = shutdown.requested.lock();
            if !*requested {
                shutdown.cv.wait_for(&mut requested, period);
            }
            if *requested {
                return;
            }
        }

        cache.expire(Instant::now());
    }
}
