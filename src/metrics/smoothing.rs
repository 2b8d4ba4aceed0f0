//! Sensor smoothing.

use std::collections::VecDeque;

/// Sliding window average over the most recent samples.
#[derive(Debug)]
pub struct RollingAverage {
    /// Buffer of recent values
    buffer: VecDeque<f64>,
    /// Window size in samples
    window_size: usize,
    /// Running sum for efficient calculation
    sum: f64,
}

impl RollingAverage {
    /// Create a new rolling average with the given window size (at least 1).
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            buffer: VecDeque::with_capacity(window_size),
            window_size,
            sum: 0.0,
        }
    }

    /// Add a new value and return the current average.
    pub fn add(&mut self, value: f64) -> f64 {
        self.buffer.push_back(value);
        self.sum += value;

        if self.buffer.len() > self.window_size {
            if let Some(old) = self.buffer.pop_front() {
                self.sum -= old;
            }
        }

        self.sum / self.buffer.len() as f64
    }

    /// Check if the buffer holds a full window.
    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.window_size
    }
}

/// Averages of every full window of `values`, `len - window + 1` of them.
pub fn windowed_averages(values: &[f64], window_size: usize) -> Vec<f64> {
    let mut rolling = RollingAverage::new(window_size);
    values
        .iter()
        .filter_map(|&value| {
            let average = rolling.add(value);
            rolling.is_full().then_some(average)
        })
        .collect()
}
