use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct ProbeState {
    current: AtomicUsize,
    max_observed: AtomicUsize,
    entries: AtomicUsize,
}

/// Records how many tasks are inside a section simultaneously.
///
/// Each task calls [`ConcurrencyProbe::enter`] when it enters the section and keeps the returned
/// guard until it leaves. The probe remembers the highest number of simultaneous holders.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyProbe {
    state: Arc<ProbeState>,
}

impl ConcurrencyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the caller as inside the section until the guard is dropped.
    pub fn enter(&self) -> ProbeGuard {
        let current = self.state.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_observed.fetch_max(current, Ordering::SeqCst);
        self.state.entries.fetch_add(1, Ordering::SeqCst);

        ProbeGuard {
            state: self.state.clone(),
        }
    }

    /// Number of tasks currently inside the section.
    pub fn current(&self) -> usize {
        self.state.current.load(Ordering::SeqCst)
    }

    /// Highest number of tasks seen inside the section at the same time.
    pub fn max_observed(&self) -> usize {
        self.state.max_observed.load(Ordering::SeqCst)
    }

    /// Total number of entries so far.
    pub fn entries(&self) -> usize {
        self.state.entries.load(Ordering::SeqCst)
    }
}

/// Guard returned by [`ConcurrencyProbe::enter`].
#[must_use = "the section is left as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ProbeGuard {
    state: Arc<ProbeState>,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.state.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_peak_of_nested_entries() {
        let probe = ConcurrencyProbe::new();

        let first = probe.enter();
        let second = probe.enter();
        assert_eq!(probe.current(), 2);
        drop(first);
        drop(second);
        let _third = probe.enter();

        assert_eq!(probe.current(), 1);
        assert_eq!(probe.max_observed(), 2);
        assert_eq!(probe.entries(), 3);
    }
}
