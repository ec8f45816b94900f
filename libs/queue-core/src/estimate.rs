//! Wait-time estimation

use crate::priority::Priority;

/// Inputs to a single wait estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitEstimateInput {
    pub queue_position: i32,
    pub avg_service_minutes: f64,
    pub active_counters: i64,
    pub priority: Priority,
}

/// Mean of recent service times, or `default_minutes` when there are none.
pub fn average_service_time(samples: &[i32], default_minutes: f64) -> f64 {
    if samples.is_empty() {
        return default_minutes;
    }
    samples.iter().map(|&s| f64::from(s)).sum::<f64>() / samples.len() as f64
}

/// Estimated minutes until a ticket is called. Never less than one.
pub fn estimate_wait_minutes(input: WaitEstimateInput) -> i32 {
    let counters = input.active_counters.max(1) as f64;
    let position = f64::from(input.queue_position.max(0));
    let base = position * input.avg_service_minutes.max(0.0) / counters;
    let adjusted = (base * input.priority.wait_multiplier()).round() as i32;
    adjusted.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(priority: Priority) -> WaitEstimateInput {
        WaitEstimateInput {
            queue_position: 5,
            avg_service_minutes: 10.0,
            active_counters: 2,
            priority,
        }
    }

    #[test]
    fn normal_and_emergency() {
        assert_eq!(estimate_wait_minutes(input(Priority::Normal)), 25);
        // 25 * 0.1 = 2.5 rounds up
        assert_eq!(estimate_wait_minutes(input(Priority::Emergency)), 3);
        assert_eq!(estimate_wait_minutes(input(Priority::Low)), 30);
    }

    #[test]
    fn floors_at_one_minute() {
        let mut i = input(Priority::Emergency);
        i.queue_position = 0;
        assert_eq!(estimate_wait_minutes(i), 1);

        i.active_counters = 0;
        i.queue_position = 1;
        assert_eq!(estimate_wait_minutes(i), 1);
    }

    #[test]
    fn averages_samples() {
        assert_eq!(average_service_time(&[], 10.0), 10.0);
        assert_eq!(average_service_time(&[4, 8, 12], 10.0), 8.0);
    }
}
