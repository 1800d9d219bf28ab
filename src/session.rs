//! Measurement sessions and scoped region guards
//!
//! A [`Session`] installs a [`Profiler`] as the active session of the current
//! thread. [`ProfileBlock`] guards created on that thread record into it; on
//! any other thread, or when no session is open, they do nothing.
//!
//! Sessions are strictly per thread. Regions on other threads are not
//! measured and nothing is merged across threads. One session may be open per
//! thread at a time: opening a second one fails with
//! [`ProfilerError::SessionActive`].

use std::cell::RefCell;
use std::marker::PhantomData;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::block_id::CallSite;
use crate::call_stack::OpenBlock;
use crate::config::SessionConfig;
use crate::error::ProfilerError;
use crate::profiler::Profiler;
use crate::report::Report;
use crate::timer::{estimate_cpu_freq, read_cpu_timer};

thread_local! {
    static ACTIVE: RefCell<Option<Profiler>> = const { RefCell::new(None) };
}

/// Run `f` against the active profiler of this thread, if any
///
/// Returns `None` when no session is open, or when called re-entrantly from
/// inside another `with_active` closure.
pub fn with_active<R>(f: impl FnOnce(&mut Profiler) -> R) -> Option<R> {
    ACTIVE
        .try_with(|active| {
            let mut guard = active.try_borrow_mut().ok()?;
            guard.as_mut().map(f)
        })
        .ok()
        .flatten()
}

/// Whether a session is open on this thread
pub fn is_active() -> bool {
    ACTIVE
        .try_with(|active| active.try_borrow().map(|p| p.is_some()).unwrap_or(true))
        .unwrap_or(false)
}

/// An open measurement session on the current thread
///
/// Closing (explicitly or by drop) ends the session, calibrates the cycle
/// counter and writes the report to the configured destination.
///
/// # Example
/// ```
/// use cycleprof::config::SessionConfig;
/// use cycleprof::session::Session;
///
/// let session = Session::open(SessionConfig::in_memory().with_cpu_freq(1_000_000_000)).unwrap();
/// {
///     cycleprof::profile_scope!("setup");
///     let _v: Vec<u32> = (0..100).collect();
/// }
/// let report = session.close().unwrap();
/// assert!(report.block("setup").map_or(true, |b| b.hits == 1));
/// ```
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    generation: u64,
    closed: bool,
    _not_send: PhantomData<*const ()>,
}

impl Session {
    /// Open a session and publish it as this thread's active session
    pub fn open(config: SessionConfig) -> Result<Self, ProfilerError> {
        let profiler = Profiler::new(config.capacity)?;
        let generation = profiler.generation();

        ACTIVE
            .try_with(|active| {
                let mut slot = active
                    .try_borrow_mut()
                    .map_err(|_| ProfilerError::SessionActive)?;
                if slot.is_some() {
                    return Err(ProfilerError::SessionActive);
                }
                *slot = Some(profiler);
                Ok(())
            })
            .map_err(|_| ProfilerError::Config("thread is shutting down".to_string()))??;

        tracing::debug!(
            generation,
            capacity = config.capacity,
            output = ?config.output,
            "profiling session opened"
        );

        Ok(Session {
            config,
            generation,
            closed: false,
            _not_send: PhantomData,
        })
    }

    /// Open a session, reporting failure on stderr instead of returning it
    ///
    /// Used by `profile_session!` so a misuse never reaches the host program.
    pub fn open_or_warn(config: SessionConfig) -> Option<Self> {
        match Self::open(config) {
            Ok(session) => Some(session),
            Err(e) => {
                eprintln!("cycleprof: could not open profiling session: {}", e);
                tracing::error!(error = %e, "session open failed");
                None
            }
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Close the session and produce its report
    ///
    /// The report is written to the configured output if one is set. Write
    /// failures are reported on stderr and do not prevent the report from
    /// being returned. Returns `None` only if the thread's session state was
    /// already torn down.
    pub fn close(mut self) -> Option<Report> {
        self.closed = true;
        self.finish()
    }

    fn take_profiler(&self) -> Option<Profiler> {
        ACTIVE
            .try_with(|active| {
                let mut slot = active.try_borrow_mut().ok()?;
                let ours = slot
                    .as_ref()
                    .is_some_and(|p| p.generation() == self.generation);
                if ours {
                    slot.take()
                } else {
                    None
                }
            })
            .ok()
            .flatten()
    }

    fn finish(&mut self) -> Option<Report> {
        let end = read_cpu_timer();
        let mut profiler = self.take_profiler()?;
        profiler.finish_at(end);

        if profiler.open_regions() > 0 {
            tracing::warn!(
                open = profiler.open_regions(),
                "session closed with regions still open; their blocks are incomplete"
            );
        }
        if profiler.dropped_regions() > 0 {
            tracing::warn!(
                dropped = profiler.dropped_regions(),
                "regions skipped because the statistics table was full"
            );
        }

        let cpu_freq = match self.config.cpu_freq {
            Some(freq) => freq,
            None => estimate_cpu_freq(Duration::from_millis(self.config.calibration_ms)),
        };
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let report = Report::from_profiler(&profiler, cpu_freq, timestamp);
        tracing::debug!(
            generation = self.generation,
            blocks = report.blocks.len(),
            total_cycles = report.total_cycles,
            "profiling session closed"
        );

        if let Some(path) = &self.config.output {
            let format = self.config.resolved_format();
            match report.write_to(path, format) {
                Ok(()) => println!("Profile results saved to {}", path.display()),
                Err(e) => {
                    eprintln!("cycleprof: {}", e);
                    tracing::error!(error = %e, "report not written");
                }
            }
        }

        Some(report)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.finish();
        }
    }
}

/// Scoped guard for one profiled region
///
/// The region ends when the guard drops, so early returns, `?` and panics
/// all close it. Guards must drop in reverse creation order, which lexical
/// scoping gives for free.
#[derive(Debug)]
#[must_use = "a region ends as soon as its guard is dropped"]
pub struct ProfileBlock {
    open: Option<OpenBlock>,
    _not_send: PhantomData<*const ()>,
}

impl ProfileBlock {
    /// Begin a region on the active session; a no-op without one
    #[inline]
    pub fn new(site: &CallSite, bytes: u64) -> Self {
        ProfileBlock {
            open: with_active(|profiler| profiler.begin(site, bytes)).flatten(),
            _not_send: PhantomData,
        }
    }

    /// Whether this region is being measured
    pub fn is_recording(&self) -> bool {
        self.open.is_some()
    }
}

impl Drop for ProfileBlock {
    #[inline]
    fn drop(&mut self) {
        if let Some(open) = self.open.take() {
            let now = read_cpu_timer();
            with_active(|profiler| profiler.end_at(open, now));
        }
    }
}
