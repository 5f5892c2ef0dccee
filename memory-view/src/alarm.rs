// Single-shot debounced alarm with a mutable delay
//
// Every request cancels the pending one, so a burst of requests collapses
// into one firing `delay` after the last request.

use crate::error::{MemoryViewError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

type AlarmAction = Box<dyn Fn() + Send + Sync>;

struct AlarmInner {
    delay_ms: AtomicU64,
    pending: Mutex<Option<JoinHandle<()>>>,
    action: AlarmAction,
    runtime: Handle,
}

#[derive(Clone)]
pub struct AdaptiveAlarm {
    inner: Arc<AlarmInner>,
}

impl AdaptiveAlarm {
    /// Create an alarm bound to the current tokio runtime
    pub fn new(delay: Duration, action: impl Fn() + Send + Sync + 'static) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| MemoryViewError::NoRuntime)?;
        Ok(Self::with_runtime(runtime, delay, action))
    }

    pub fn with_runtime(
        runtime: Handle,
        delay: Duration,
        action: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(AlarmInner {
                delay_ms: AtomicU64::new(delay.as_millis() as u64),
                pending: Mutex::new(None),
                action: Box::new(action),
                runtime,
            }),
        }
    }

    /// Takes effect for the next request; a pending firing keeps its delay
    pub fn set_delay(&self, delay: Duration) {
        self.inner
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.inner.delay_ms.load(Ordering::Relaxed))
    }

    /// Cancel any pending firing and fire once after the current delay
    pub fn request_fire(&self) {
        self.request_after(self.delay());
    }

    /// Cancel any pending firing and fire as soon as possible
    pub fn request_fire_now(&self) {
        self.request_after(Duration::ZERO);
    }

    fn request_after(&self, delay: Duration) {
        let weak = Arc::downgrade(&self.inner);
        let mut pending = self.inner.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        trace!("Alarm requested in {:?}", delay);
        *pending = Some(self.inner.runtime.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Some(inner) = weak.upgrade() {
                (inner.action)();
            }
        }));
    }

    pub fn cancel_all(&self) {
        if let Some(previous) = self.inner.pending.lock().take() {
            previous.abort();
        }
    }

    pub fn has_pending(&self) -> bool {
        self.inner
            .pending
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for AlarmInner {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.get_mut().take() {
            pending.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_alarm(delay: Duration) -> (AdaptiveAlarm, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let alarm = AdaptiveAlarm::new(delay, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        (alarm, fired)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_firing() {
        let (alarm, fired) = counting_alarm(Duration::from_millis(100));

        for _ in 0..5 {
            alarm.request_fire();
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!alarm.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_drops_pending_request() {
        let (alarm, fired) = counting_alarm(Duration::from_millis(50));

        alarm.request_fire();
        assert!(alarm.has_pending());
        alarm.cancel_all();
        assert!(!alarm.has_pending());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_change_applies_to_next_request() {
        let (alarm, fired) = counting_alarm(Duration::from_millis(10));
        alarm.set_delay(Duration::from_millis(500));
        assert_eq!(alarm.delay(), Duration::from_millis(500));

        alarm.request_fire();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(101)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_now_skips_delay() {
        let (alarm, fired) = counting_alarm(Duration::from_secs(60));
        alarm.request_fire_now();
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
