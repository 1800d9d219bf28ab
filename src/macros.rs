//! Call-site annotation macros
//!
//! ```
//! use cycleprof::{profile_function, profile_scope, profile_session};
//!
//! fn fib(n: u64) -> u64 {
//!     profile_function!();
//!     if n < 2 { n } else { fib(n - 1) + fib(n - 2) }
//! }
//!
//! fn main() {
//!     profile_session!(cycleprof::config::SessionConfig::in_memory());
//!     {
//!         profile_scope!("warmup");
//!         fib(10);
//!     }
//! }
//! ```
//!
//! Each macro binds a guard in the caller's scope, so the region lasts until
//! the end of the enclosing block. With the `profile` feature disabled the
//! macros expand to nothing and their arguments are not evaluated.
//!
//! Each expansion keeps its [`CallSite`] in a `static`, filled on first
//! entry, so later entries pay only for the lookup.

use crate::block_id::{BlockId, CallSite};

/// Strip the `::__f` probe and any closure frames from a `type_name` path
#[doc(hidden)]
pub fn __function_path(probe: &'static str) -> &'static str {
    let mut path = probe.strip_suffix("::__f").unwrap_or(probe);
    while let Some(outer) = path.strip_suffix("::{{closure}}") {
        path = outer;
    }
    path
}

/// Last segment of a function path
#[doc(hidden)]
pub fn __function_name(path: &'static str) -> &'static str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Call site of a `profile_function!` region in the function at `path`
#[doc(hidden)]
pub fn __function_site(path: &'static str, file: &'static str, line: u32) -> CallSite {
    CallSite::with_id(
        BlockId::from_site(file, path, line),
        __function_name(path),
        path,
        file,
        line,
    )
}

/// Full path of the enclosing function, e.g. `my_crate::parser::parse`
#[doc(hidden)]
#[macro_export]
macro_rules! __function_path {
    () => {{
        fn __f() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::macros::__function_path(__type_name_of(__f))
    }};
}

#[doc(hidden)]
#[cfg(feature = "profile")]
#[macro_export]
macro_rules! __profile_block {
    ($label:expr, $bytes:expr) => {
        let __cycleprof_block = {
            const __CYCLEPROF_ID: $crate::block_id::BlockId =
                $crate::block_id::BlockId::from_site(file!(), $label, line!());
            static __CYCLEPROF_SITE: ::std::sync::OnceLock<$crate::block_id::CallSite> =
                ::std::sync::OnceLock::new();
            let __site = __CYCLEPROF_SITE.get_or_init(|| {
                $crate::block_id::CallSite::with_id(
                    __CYCLEPROF_ID,
                    $label,
                    $crate::__function_path!(),
                    file!(),
                    line!(),
                )
            });
            $crate::session::ProfileBlock::new(__site, $bytes as u64)
        };
    };
}

/// Open a profiling session for the rest of the enclosing scope
///
/// - `profile_session!()` writes `profile_results.txt`
/// - `profile_session!("out.json")` writes to the given path
/// - `profile_session!(config)` takes a [`SessionConfig`](crate::config::SessionConfig)
///
/// The report is produced when the scope ends.
#[cfg(feature = "profile")]
#[macro_export]
macro_rules! profile_session {
    () => {
        let __cycleprof_session =
            $crate::session::Session::open_or_warn($crate::config::SessionConfig::default());
    };
    ($output:literal) => {
        let __cycleprof_session = $crate::session::Session::open_or_warn(
            $crate::config::SessionConfig::default().with_output($output),
        );
    };
    ($config:expr) => {
        let __cycleprof_session = $crate::session::Session::open_or_warn($config);
    };
}

/// Profile the rest of the enclosing scope under `label`
#[cfg(feature = "profile")]
#[macro_export]
macro_rules! profile_scope {
    ($label:expr) => {
        $crate::__profile_block!($label, 0u64);
    };
}

/// Profile the rest of the enclosing scope and record `bytes` processed
///
/// The report shows the block's throughput over its inclusive time.
#[cfg(feature = "profile")]
#[macro_export]
macro_rules! profile_bandwidth {
    ($label:expr, $bytes:expr) => {
        $crate::__profile_block!($label, $bytes);
    };
}

/// Profile the rest of the enclosing function, labelled with its name
///
/// The key is hashed from the file, the full function path and the line, so
/// functions stamped out by one macro invocation stay separate.
#[cfg(feature = "profile")]
#[macro_export]
macro_rules! profile_function {
    () => {
        let __cycleprof_block = {
            static __CYCLEPROF_SITE: ::std::sync::OnceLock<$crate::block_id::CallSite> =
                ::std::sync::OnceLock::new();
            let __site = __CYCLEPROF_SITE.get_or_init(|| {
                $crate::macros::__function_site($crate::__function_path!(), file!(), line!())
            });
            $crate::session::ProfileBlock::new(__site, 0)
        };
    };
}

#[cfg(not(feature = "profile"))]
#[macro_export]
macro_rules! profile_session {
    ($($tt:tt)*) => {};
}

#[cfg(not(feature = "profile"))]
#[macro_export]
macro_rules! profile_scope {
    ($($tt:tt)*) => {};
}

#[cfg(not(feature = "profile"))]
#[macro_export]
macro_rules! profile_bandwidth {
    ($($tt:tt)*) => {};
}

#[cfg(not(feature = "profile"))]
#[macro_export]
macro_rules! profile_function {
    ($($tt:tt)*) => {};
}
