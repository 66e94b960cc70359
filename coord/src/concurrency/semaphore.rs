//! Counting semaphore with scoped permits and checked manual release.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Semaphore as TokioSemaphore, TryAcquireError};

use crate::bail;
use crate::config::SemaphoreConfig;
use crate::error::{CoordResult, ErrorKind};

#[derive(Debug)]
struct SemaphoreInner {
    gate: TokioSemaphore,
    permits: usize,
    /// Acquisitions not yet returned, scoped or detached.
    held: AtomicUsize,
    /// Acquisitions detached with [`Permit::forget`] and awaiting [`Semaphore::release`].
    detached: AtomicUsize,
}

impl SemaphoreInner {
    fn on_acquired(&self) {
        self.held.fetch_add(1, Ordering::AcqRel);
    }

    fn on_released(&self) {
        self.held.fetch_sub(1, Ordering::AcqRel);
        self.gate.add_permits(1);
    }

    /// Claims one detached acquisition, refusing when none is outstanding.
    fn claim_detached(&self) -> bool {
        self.detached
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |detached| {
                detached.checked_sub(1)
            })
            .is_ok()
    }
}

/// Admission gate bounding how many tasks may run a critical section at once.
///
/// A [`Semaphore`] created with `N` permits never has more than `N` acquisitions outstanding.
/// With `N = 1` it behaves as a mutual-exclusion lock. Cloning returns another handle to the
/// same gate.
///
/// The preferred way to use it is the scoped [`Permit`] returned by [`Semaphore::acquire`],
/// which returns the permit when dropped: on normal exit, on `?` propagation, when the owning
/// future is cancelled and while unwinding from a panic. [`Permit::forget`] detaches a permit so
/// that it can be returned later with [`Semaphore::release`], which reports an over-release as
/// [`ErrorKind::SemaphoreOverRelease`] instead of inflating the permit count.
#[derive(Debug, Clone)]
pub struct Semaphore {
    inner: Arc<SemaphoreInner>,
}

impl Semaphore {
    /// Creates a semaphore holding `permits` permits.
    ///
    /// Counts above [`TokioSemaphore::MAX_PERMITS`] are clamped to it.
    pub fn new(permits: usize) -> Self {
        let permits = permits.min(TokioSemaphore::MAX_PERMITS);

        Self {
            inner: Arc::new(SemaphoreInner {
                gate: TokioSemaphore::new(permits),
                permits,
                held: AtomicUsize::new(0),
                detached: AtomicUsize::new(0),
            }),
        }
    }

    /// Creates a semaphore from validated configuration.
    pub fn from_config(config: &SemaphoreConfig) -> CoordResult<Self> {
        config.validate()?;

        Ok(Self::new(config.permits))
    }

    /// Waits until a permit is free and takes it.
    ///
    /// Fails with [`ErrorKind::SemaphoreClosed`] once [`Semaphore::close`] has been called.
    pub async fn acquire(&self) -> CoordResult<Permit> {
        let permit = self.inner.gate.acquire().await?;
        permit.forget();
        self.inner.on_acquired();

        Ok(Permit::new(self.inner.clone()))
    }

    /// Takes a permit if one is immediately available.
    ///
    /// Returns `Ok(None)` when every permit is held.
    pub fn try_acquire(&self) -> CoordResult<Option<Permit>> {
        match self.inner.gate.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.inner.on_acquired();

                Ok(Some(Permit::new(self.inner.clone())))
            }
            Err(TryAcquireError::NoPermits) => Ok(None),
            Err(TryAcquireError::Closed) => {
                bail!(ErrorKind::SemaphoreClosed, "Semaphore was closed")
            }
        }
    }

    /// Waits at most `duration` for a permit.
    ///
    /// Elapsing yields [`ErrorKind::OperationTimedOut`], which is retriable.
    pub async fn acquire_timeout(&self, duration: Duration) -> CoordResult<Permit> {
        tokio::time::timeout(duration, self.acquire()).await?
    }

    /// Returns one permit previously detached with [`Permit::forget`].
    pub fn release(&self) -> CoordResult<()> {
        if !self.inner.claim_detached() {
            bail!(
                ErrorKind::SemaphoreOverRelease,
                "Semaphore released without a matching acquire",
                format!("permits: {}, held: {}", self.inner.permits, self.held())
            );
        }

        self.inner.on_released();

        Ok(())
    }

    /// Closes the semaphore so that pending and future acquisitions fail.
    ///
    /// Permits already held stay valid and can still be released.
    pub fn close(&self) {
        self.inner.gate.close();
    }

    /// Returns whether [`Semaphore::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.gate.is_closed()
    }

    /// Returns the configured number of permits.
    pub fn permits(&self) -> usize {
        self.inner.permits
    }

    /// Returns the number of permits currently free.
    pub fn available_permits(&self) -> usize {
        self.inner.gate.available_permits()
    }

    /// Returns the number of outstanding acquisitions.
    pub fn held(&self) -> usize {
        self.inner.held.load(Ordering::Acquire)
    }
}

/// Scoped acquisition of one [`Semaphore`] permit, returned on drop.
#[must_use = "the permit is released as soon as it is dropped"]
#[derive(Debug)]
pub struct Permit {
    semaphore: Option<Arc<SemaphoreInner>>,
}

impl Permit {
    fn new(semaphore: Arc<SemaphoreInner>) -> Self {
        Self {
            semaphore: Some(semaphore),
        }
    }

    /// Detaches the permit from this guard without returning it.
    ///
    /// The acquisition stays outstanding until [`Semaphore::release`] is called.
    pub fn forget(mut self) {
        if let Some(semaphore) = self.semaphore.take() {
            semaphore.detached.fetch_add(1, Ordering::AcqRel);
        }
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(semaphore) = self.semaphore.take() {
            semaphore.on_released();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ConcurrencyProbe;

    #[tokio::test]
    async fn permit_is_returned_on_drop() {
        let semaphore = Semaphore::new(2);

        let first = semaphore.acquire().await.unwrap();
        let second = semaphore.acquire().await.unwrap();
        assert_eq!(semaphore.available_permits(), 0);
        assert_eq!(semaphore.held(), 2);
        assert!(semaphore.try_acquire().unwrap().is_none());

        drop(first);
        assert_eq!(semaphore.available_permits(), 1);
        drop(second);
        assert_eq!(semaphore.available_permits(), 2);
        assert_eq!(semaphore.held(), 0);
    }

    #[tokio::test]
    async fn release_without_acquire_is_a_contract_violation() {
        let semaphore = Semaphore::new(1);

        let err = semaphore.release().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SemaphoreOverRelease);
        assert!(err.kind().is_contract_violation());
        assert_eq!(semaphore.available_permits(), 1);
    }

    #[tokio::test]
    async fn manual_release_cannot_steal_a_scoped_permit() {
        let semaphore = Semaphore::new(2);
        let _scoped = semaphore.acquire().await.unwrap();

        assert!(semaphore.release().is_err());
        assert_eq!(semaphore.held(), 1);
        assert_eq!(semaphore.available_permits(), 1);
    }

    #[tokio::test]
    async fn forgotten_permit_is_released_manually_once() {
        let semaphore = Semaphore::new(1);

        semaphore.acquire().await.unwrap().forget();
        assert_eq!(semaphore.available_permits(), 0);

        semaphore.release().unwrap();
        assert_eq!(semaphore.available_permits(), 1);
        assert!(semaphore.release().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_timeout_reports_retriable_timeout() {
        let semaphore = Semaphore::new(1);
        let _held = semaphore.acquire().await.unwrap();

        let err = semaphore
            .acquire_timeout(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OperationTimedOut);
        assert!(err.kind().is_retriable());
        assert_eq!(semaphore.held(), 1);
    }

    #[tokio::test]
    async fn closed_semaphore_rejects_acquire_but_accepts_release() {
        let semaphore = Semaphore::new(1);
        let permit = semaphore.acquire().await.unwrap();

        semaphore.close();
        assert!(semaphore.is_closed());
        let err = semaphore.acquire().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SemaphoreClosed);

        drop(permit);
        assert_eq!(semaphore.held(), 0);
    }

    #[tokio::test]
    async fn permit_is_returned_when_task_fails() {
        let semaphore = Semaphore::new(1);

        async fn failing(semaphore: &Semaphore) -> CoordResult<()> {
            let _permit = semaphore.acquire().await?;
            bail!(ErrorKind::JobFailed, "Job failed");
        }

        assert!(failing(&semaphore).await.is_err());
        assert_eq!(semaphore.available_permits(), 1);

        let cloned = semaphore.clone();
        let handle = tokio::spawn(async move {
            let _permit = cloned.acquire().await.unwrap();
            panic!("job exploded while holding the permit");
        });
        assert!(handle.await.unwrap_err().is_panic());
        assert_eq!(semaphore.available_permits(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_permit_count_under_contention() {
        for permits in 1..=8 {
            let semaphore = Semaphore::new(permits);
            let probe = ConcurrencyProbe::new();
            let mut handles = Vec::with_capacity(100);

            for _ in 0..100 {
                let semaphore = semaphore.clone();
                let probe = probe.clone();
                handles.push(tokio::spawn(async move {
                    for _ in 0..1000 {
                        let _permit = semaphore.acquire().await.unwrap();
                        let _entered = probe.enter();
                    }
                }));
            }

            for handle in handles {
                handle.await.unwrap();
            }

            assert!(probe.max_observed() <= permits);
            assert_eq!(semaphore.available_permits(), permits);
            assert_eq!(semaphore.held(), 0);
        }
    }

    #[test]
    fn from_config_rejects_zero_permits() {
        let config = SemaphoreConfig {
            permits: 0,
            acquire_timeout_ms: None,
        };

        let err = Semaphore::from_config(&config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

        let semaphore = Semaphore::from_config(&SemaphoreConfig::default()).unwrap();
        assert_eq!(semaphore.permits(), SemaphoreConfig::DEFAULT_PERMITS);
    }

    #[test]
    fn oversized_permit_count_is_clamped_or_rejected() {
        let semaphore = Semaphore::new(usize::MAX);
        assert_eq!(semaphore.permits(), TokioSemaphore::MAX_PERMITS);
        assert_eq!(semaphore.available_permits(), TokioSemaphore::MAX_PERMITS);

        let config = SemaphoreConfig {
            permits: usize::MAX,
            acquire_timeout_ms: None,
        };
        let err = Semaphore::from_config(&config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

        let config = SemaphoreConfig {
            permits: SemaphoreConfig::MAX_PERMITS,
            acquire_timeout_ms: None,
        };
        assert_eq!(
            Semaphore::from_config(&config).unwrap().permits(),
            TokioSemaphore::MAX_PERMITS
        );
    }
}
