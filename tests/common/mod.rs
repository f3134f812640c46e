#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use yaml_binder::{Allocator, Config, LogLevel};

/// Counts live blocks and fails the `fail_at`th allocation request.
pub struct TestAllocator {
    live: AtomicUsize,
    requests: AtomicUsize,
    fail_at: usize,
}

impl TestAllocator {
    pub fn new() -> Arc<Self> {
        Self::failing_at(usize::MAX)
    }

    pub fn failing_at(fail_at: usize) -> Arc<Self> {
        Arc::new(TestAllocator {
            live: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
            fail_at,
        })
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Allocations and reallocations requested so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn admit(&self) -> bool {
        self.requests.fetch_add(1, Ordering::SeqCst) != self.fail_at
    }
}

impl Allocator for TestAllocator {
    fn allocate(&self, size: usize) -> Option<Vec<u8>> {
        if !self.admit() {
            return None;
        }
        self.live.fetch_add(1, Ordering::SeqCst);
        Some(vec![0; size])
    }

    fn reallocate(&self, block: &mut Vec<u8>, size: usize) -> bool {
        if !self.admit() {
            return false;
        }
        block.resize(size, 0);
        true
    }

    fn release(&self, _block: Vec<u8>) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn config_with(allocator: &Arc<TestAllocator>) -> Config {
    Config::new().with_allocator(allocator.clone())
}

/// A config whose log messages are collected instead of traced.
pub fn capturing(config: Config) -> (Config, Arc<Mutex<Vec<(LogLevel, String)>>>) {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = messages.clone();
    let config = config
        .with_log_level(LogLevel::Debug)
        .with_log_fn(move |level, message| {
            sink.lock().unwrap().push((level, message.to_owned()));
        });
    (config, messages)
}
