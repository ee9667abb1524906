//! Phase timing for long-running admin steps.

use std::time::{Duration, Instant};

/// Measures one step of a procedure and reports it when finished.
pub struct Timer {
    name: String,
    start: Instant,
}

impl Timer {
    /// Start a new timer with the given step name.
    pub fn start(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start: Instant::now(),
        }
    }

    /// Time elapsed so far.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Finish the timer and print the elapsed time.
    pub fn finish(self) {
        let secs = self.elapsed().as_secs_f64();
        tracing::debug!(step = %self.name, secs, "step finished");
        if secs >= 60.0 {
            println!("  [{:.1}m] {}", secs / 60.0, self.name);
        } else {
            println!("  [{:.1}s] {}", secs, self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_is_monotonic() {
        let timer = Timer::start("snapshot");
        let first = timer.elapsed();
        let second = timer.elapsed();
        assert!(second >= first);
        timer.finish();
    }
}
