//! Bundled workloads for `cycleprof demo`
//!
//! Small instrumented programs that show nesting, recursion and bandwidth
//! measurement. They run against whatever session is active on the calling
//! thread.

use std::hint::black_box;
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

use clap::ValueEnum;

use crate::{profile_bandwidth, profile_function, profile_scope};

/// Available demo workloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DemoKind {
    /// Nested functions and scopes with sleeps
    Nested,
    /// Recursive Fibonacci measured as one call site
    Recursion,
    /// Reading a file or buffer with byte throughput
    Bandwidth,
}

fn short_work() -> f64 {
    profile_function!();

    let mut result = 0.0;
    for i in 0..5000 {
        result += black_box(i as f64).sqrt();
    }
    result
}

fn long_work() -> f64 {
    profile_function!();

    let mut total = 0.0;
    {
        profile_scope!("Inner Loop");
        for _ in 0..100 {
            total += short_work();
        }
    }

    // Counts toward long_work's exclusive time
    thread::sleep(Duration::from_millis(10));
    total
}

fn another_function() -> f64 {
    profile_function!();

    {
        profile_scope!("Waiting");
        thread::sleep(Duration::from_millis(25));
    }
    short_work()
}

/// Nested functions and scopes, roughly 40ms of sleeping in total
pub fn nested() -> f64 {
    profile_function!();

    let total = long_work() + another_function();
    {
        profile_scope!("Final Cleanup");
        thread::sleep(Duration::from_millis(5));
    }
    total
}

/// Naive recursive Fibonacci; every level hits the same call site
pub fn fib(n: u32) -> u64 {
    profile_function!();

    if n < 2 {
        n as u64
    } else {
        fib(n - 1) + fib(n - 2)
    }
}

/// Number of calls `fib(n)` makes, itself included
pub fn fib_calls(n: u32) -> u64 {
    let (mut a, mut b) = (1u64, 1u64);
    for _ in 0..n {
        let next = a + b + 1;
        a = b;
        b = next;
    }
    a
}

/// Read `path` fully, recording its size as processed bytes
pub fn read_file(path: &Path) -> io::Result<Vec<u8>> {
    profile_function!();

    let size = std::fs::metadata(path)?.len();
    let data = {
        profile_bandwidth!("ReadFile", size);
        std::fs::read(path)?
    };
    Ok(data)
}

/// Copy an in-memory buffer of `bytes` bytes, recording throughput
pub fn copy_buffer(bytes: usize) -> u64 {
    profile_function!();

    let source = vec![0xA5u8; bytes];
    let mut dest = vec![0u8; bytes];
    {
        profile_bandwidth!("CopyBuffer", bytes);
        dest.copy_from_slice(black_box(&source));
    }
    dest.iter().map(|&b| b as u64).sum()
}
