//! Behavioural tests for learning rate schedulers.

use super::*;
use std::sync::Arc;
use std::thread;

// ============================================================================
// CONSTANT LR TESTS
// ============================================================================

mod constant_lr_tests {
    use super::*;

    #[test]
    fn should_return_same_lr_for_any_step() {
        let sched = ConstantLR::new(0.001);
        assert_eq!(sched.get_lr(0), 0.001);
        assert_eq!(sched.get_lr(1), 0.001);
        assert_eq!(sched.get_lr(u64::MAX), 0.001);
        assert_eq!(sched.lr(), 0.001);
    }

    #[test]
    fn should_allow_zero_lr() {
        assert_eq!(ConstantLR::new(0.0).get_lr(10), 0.0);
    }
}

// ============================================================================
// LINEAR DECAY TESTS
// ============================================================================

mod linear_decay_tests {
    use super::*;

    #[test]
    fn should_start_at_start_lr() {
        let sched = LinearDecay::new(1e-3, 1e-4, 1000);
        assert!((sched.get_lr(0) - 1e-3).abs() < 1e-12);
    }

    #[test]
    fn should_reach_midpoint_halfway() {
        let sched = LinearDecay::new(1.0, 0.0, 100);
        assert!((sched.get_lr(50) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn should_clamp_after_total_steps() {
        let sched = LinearDecay::to_zero(0.5, 100);
        assert_eq!(sched.get_lr(100), 0.0);
        assert_eq!(sched.get_lr(101), 0.0);
        assert_eq!(sched.get_lr(u64::MAX), 0.0);
    }

    #[test]
    fn should_match_fractional_decay_formula() {
        let total = 1_000u64;
        let sched = LinearDecay::to_zero(2.0, total);
        for step in [0u64, 1, 250, 999, 1000, 5000] {
            let expected = 2.0 * (1.0 - (step.min(total) as f64) / total as f64);
            assert!((sched.get_lr(step) - expected).abs() < 1e-12, "step={}", step);
        }
    }

    #[test]
    fn should_be_monotonically_non_increasing() {
        let sched = LinearDecay::new(3e-4, 1e-5, 500);
        let mut prev = f64::INFINITY;
        for step in (0..600).step_by(7) {
            let lr = sched.get_lr(step);
            assert!(lr <= prev);
            assert!(lr.is_finite());
            prev = lr;
        }
    }
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[test]
fn schedulers_are_shareable_across_threads() {
    let sched: Arc<dyn LRScheduler> = Arc::new(LinearDecay::to_zero(1.0, 1000));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let s = Arc::clone(&sched);
            thread::spawn(move || s.get_lr(i * 250))
        })
        .collect();
    let lrs: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(lrs, vec![1.0, 0.75, 0.5, 0.25]);
}
