// Common test utilities for integration tests
//
// Resources that record when they are destroyed and deleters that count how
// often they run.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared counter observed by tests after handles are gone.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    /// A deleter that bumps this counter and then drops the value.
    pub fn deleter<T: 'static>(&self) -> impl FnOnce(T) + Send + 'static {
        let counter = self.clone();
        move |value| {
            counter.bump();
            drop(value);
        }
    }
}

/// A named resource that bumps a counter when it is destroyed.
pub struct Tracked {
    pub name: String,
    drops: Counter,
}

impl Tracked {
    pub fn new(name: &str, drops: &Counter) -> Self {
        Tracked {
            name: name.to_string(),
            drops: drops.clone(),
        }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.bump();
    }
}
