use std::collections::VecDeque;

/// Number of completed batches the running average covers.
pub const STATS_WINDOW: usize = 100;

/// Sliding window over the notification counts of recent batches.
#[derive(Debug, Clone)]
pub struct RunningStats {
    window: VecDeque<usize>,
    sum: usize,
    capacity: usize,
}

impl Default for RunningStats {
    fn default() -> Self {
        Self::with_window(STATS_WINDOW)
    }
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity + 1),
            sum: 0,
            capacity,
        }
    }

    /// Add one batch and return the new average.
    pub fn record(&mut self, notifications: usize) -> f64 {
        self.window.push_back(notifications);
        self.sum += notifications;

        if self.window.len() > self.capacity {
            if let Some(evicted) = self.window.pop_front() {
                self.sum -= evicted;
            }
        }

        self.average()
    }

    pub fn average(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.sum as f64 / self.window.len() as f64
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_average_is_zero() {
        assert_eq!(RunningStats::new().average(), 0.0);
    }

    #[test]
    fn test_average_of_partial_window() {
        let mut stats = RunningStats::new();
        stats.record(2);
        assert_eq!(stats.record(4), 3.0);
        assert_eq!(stats.len(), 2);
    }

    #[test]
    fn test_only_last_hundred_batches_count() {
        let mut stats = RunningStats::new();
        for _ in 0..50 {
            stats.record(1000);
        }
        let mut average = 0.0;
        for _ in 0..100 {
            average = stats.record(10);
        }

        assert_eq!(stats.len(), STATS_WINDOW);
        assert_eq!(average, 10.0);
    }
}
