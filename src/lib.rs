//! cycleprof - Low-overhead instrumentation profiler
//!
//! Measures the CPU cycle cost of nested code regions during a single run and
//! reports, per call site, how often it ran, its inclusive cycles (including
//! nested regions) and its exclusive cycles (its own work only).
//!
//! The engine is a fixed-capacity open-addressing table keyed by a
//! compile-time hash of each call site, plus a call-stack tracker that
//! debits a parent's exclusive time whenever a child region closes. Regions
//! are opened with the `profile_*` macros and closed by scope exit.
//!
//! Sessions are per thread: regions record into the session open on their
//! own thread and are no-ops everywhere else.

pub mod block_id;
pub mod call_stack;
pub mod cli;
pub mod config;
pub mod demo;
pub mod error;
pub mod macros;
pub mod profiler;
pub mod report;
pub mod session;
pub mod table;
pub mod timer;

pub use block_id::{BlockId, CallSite};
pub use config::SessionConfig;
pub use error::ProfilerError;
pub use profiler::Profiler;
pub use report::{Report, ReportFormat};
pub use session::{ProfileBlock, Session};
