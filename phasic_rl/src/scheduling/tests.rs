//! Behavioral tests for the progress schedulers.
//!
//! # Test Categories
//!
//! 1. **Progress types**: parsing and reading each progress measure
//! 2. **Construction errors**: ordering and length requirements
//! 3. **Values**: breakpoints, interpolation, warm-up, decay
//! 4. **Index cache**: repeated and backwards queries stay correct
//! 5. **Property-based tests**: boundedness and monotonicity

use super::*;
use crate::core::TrainingProgress;
use crate::error::PhasicError;
use proptest::prelude::*;

fn at(counter: u64) -> TrainingProgress {
    TrainingProgress::at_counter(counter)
}

fn at_percent(percent: f64) -> TrainingProgress {
    TrainingProgress {
        percent,
        ..Default::default()
    }
}

// ============================================================================
// PROGRESS TYPE TESTS
// ============================================================================

mod progress_type_tests {
    use super::*;

    #[test]
    fn should_parse_known_progress_types() {
        assert_eq!("percent".parse::<ProgressType>().unwrap(), ProgressType::Percent);
        assert_eq!("iterations".parse::<ProgressType>().unwrap(), ProgressType::Iterations);
        assert_eq!("env_steps".parse::<ProgressType>().unwrap(), ProgressType::EnvSteps);
        assert_eq!(
            "global_counter".parse::<ProgressType>().unwrap(),
            ProgressType::GlobalCounter
        );
    }

    #[test]
    fn should_reject_unknown_progress_type() {
        let err = "epochs".parse::<ProgressType>().unwrap_err();
        assert!(matches!(err, PhasicError::UnknownProgressType(ref s) if s == "epochs"));
    }

    #[test]
    fn should_read_matching_progress_field() {
        let progress = TrainingProgress {
            percent: 0.25,
            iterations: 10,
            env_steps: 2_000,
            global_counter: 7,
        };
        assert_eq!(ProgressType::Percent.read(&progress), 0.25);
        assert_eq!(ProgressType::Iterations.read(&progress), 10.0);
        assert_eq!(ProgressType::EnvSteps.read(&progress), 2_000.0);
        assert_eq!(ProgressType::GlobalCounter.read(&progress), 7.0);
    }

    #[test]
    fn should_display_as_parsed_string() {
        for s in ["percent", "iterations", "env_steps", "global_counter"] {
            assert_eq!(s.parse::<ProgressType>().unwrap().to_string(), s);
        }
    }
}

// ============================================================================
// STEP SCHEDULER TESTS
// ============================================================================

mod step_scheduler_tests {
    use super::*;

    #[test]
    fn should_return_value_of_next_breakpoint() {
        let sched = StepScheduler::new(
            ProgressType::GlobalCounter,
            &[(10.0, 1.0), (20.0, 2.0), (30.0, 3.0)],
            0.0,
            0.0,
        )
        .unwrap();

        assert_eq!(sched.value(&at(0)), 1.0);
        assert_eq!(sched.value(&at(9)), 1.0);
        assert_eq!(sched.value(&at(10)), 2.0);
        assert_eq!(sched.value(&at(25)), 3.0);
        assert_eq!(sched.value(&at(1_000)), 3.0);
    }

    #[test]
    fn should_warm_up_linearly_from_start() {
        let sched =
            StepScheduler::new(ProgressType::GlobalCounter, &[(100.0, 2.0)], 10.0, 5.0).unwrap();

        assert_eq!(sched.value(&at(0)), 0.0);
        assert_eq!(sched.value(&at(5)), 0.0);
        assert!((sched.value(&at(10)) - 1.0).abs() < 1e-12);
        assert_eq!(sched.value(&at(15)), 2.0);
    }

    #[test]
    fn should_stay_correct_when_progress_moves_backwards() {
        let sched = StepScheduler::new(
            ProgressType::GlobalCounter,
            &[(10.0, 1.0), (20.0, 2.0), (30.0, 3.0)],
            0.0,
            0.0,
        )
        .unwrap();

        assert_eq!(sched.value(&at(25)), 3.0);
        assert_eq!(sched.value(&at(3)), 1.0);
        assert_eq!(sched.value(&at(15)), 2.0);
    }

    #[test]
    fn should_reject_warm_up_past_first_breakpoint() {
        let result = StepScheduler::new(ProgressType::Iterations, &[(10.0, 1.0)], 5.0, 5.0);
        assert!(matches!(result, Err(PhasicError::InvalidSchedule(_))));
    }

    #[test]
    fn should_reject_empty_and_unordered_schedules() {
        assert!(StepScheduler::new(ProgressType::Iterations, &[], 0.0, 0.0).is_err());
        assert!(StepScheduler::new(
            ProgressType::Iterations,
            &[(20.0, 1.0), (10.0, 2.0)],
            0.0,
            0.0
        )
        .is_err());
    }

    #[test]
    fn should_allow_breakpoint_at_zero_without_warm_up() {
        let sched =
            StepScheduler::without_warm_up(ProgressType::GlobalCounter, &[(0.0, 1.0), (5.0, 2.0)])
                .unwrap();
        assert_eq!(sched.value(&at(0)), 2.0);
        assert_eq!(sched.value(&at(5)), 2.0);
    }
}

// ============================================================================
// LINEAR SCHEDULER TESTS
// ============================================================================

mod linear_scheduler_tests {
    use super::*;

    #[test]
    fn should_interpolate_between_breakpoints() {
        let sched =
            LinearScheduler::new(ProgressType::Percent, &[(0.0, 1.0), (0.5, 0.0), (1.0, 0.5)])
                .unwrap();

        assert_eq!(sched.value(&at_percent(0.0)), 1.0);
        assert!((sched.value(&at_percent(0.25)) - 0.5).abs() < 1e-12);
        assert!((sched.value(&at_percent(0.5)) - 0.0).abs() < 1e-12);
        assert!((sched.value(&at_percent(0.75)) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn should_hold_last_value_past_end() {
        let sched = LinearScheduler::new(ProgressType::GlobalCounter, &[(0.0, 1.0), (10.0, 3.0)])
            .unwrap();
        assert_eq!(sched.value(&at(10)), 3.0);
        assert_eq!(sched.value(&at(500)), 3.0);
    }

    #[test]
    fn should_stay_correct_when_progress_moves_backwards() {
        let sched = LinearScheduler::new(
            ProgressType::GlobalCounter,
            &[(0.0, 0.0), (10.0, 10.0), (20.0, 0.0)],
        )
        .unwrap();

        assert_eq!(sched.value(&at(100)), 0.0);
        assert!((sched.value(&at(5)) - 5.0).abs() < 1e-12);
        assert!((sched.value(&at(15)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn should_reject_first_breakpoint_not_at_zero() {
        let result = LinearScheduler::new(ProgressType::Percent, &[(0.1, 1.0), (1.0, 0.0)]);
        assert!(matches!(result, Err(PhasicError::InvalidSchedule(_))));
    }

    #[test]
    fn should_reject_single_pair() {
        let result = LinearScheduler::new(ProgressType::Percent, &[(0.0, 1.0)]);
        assert!(matches!(result, Err(PhasicError::InvalidSchedule(_))));
    }

    #[test]
    fn should_reject_repeated_breakpoint() {
        let result =
            LinearScheduler::new(ProgressType::Percent, &[(0.0, 1.0), (0.5, 0.0), (0.5, 1.0)]);
        assert!(result.is_err());
    }
}

// ============================================================================
// EXPONENTIAL AND CONSTANT TESTS
// ============================================================================

mod exponential_scheduler_tests {
    use super::*;

    #[test]
    fn should_decay_by_rate_every_decay_time() {
        let sched = ExponentialScheduler::new(ProgressType::GlobalCounter, 1.0, 0.5, 10.0).unwrap();
        assert_eq!(sched.value(&at(0)), 1.0);
        assert!((sched.value(&at(10)) - 0.5).abs() < 1e-12);
        assert!((sched.value(&at(20)) - 0.25).abs() < 1e-12);
        assert!((sched.value(&at(5)) - 0.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn should_reject_non_positive_decay_time() {
        assert!(ExponentialScheduler::new(ProgressType::Iterations, 1.0, 0.5, 0.0).is_err());
        assert!(ExponentialScheduler::new(ProgressType::Iterations, 1.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn should_wrap_constants_and_schedules() {
        let constant: ScheduledValue = 0.3.into();
        assert_eq!(constant.value(&at(1_000)), 0.3);
        assert_eq!(ConstantScheduler::new(0.7).value(&at(9)), 0.7);

        let scheduled = as_scheduler(
            LinearScheduler::new(ProgressType::GlobalCounter, &[(0.0, 0.0), (4.0, 1.0)]).unwrap(),
        );
        assert!((scheduled.value(&at(2)) - 0.5).abs() < 1e-12);
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

proptest! {
    #[test]
    fn prop_linear_stays_within_breakpoint_values(
        v0 in -10.0f64..10.0,
        v1 in -10.0f64..10.0,
        v2 in -10.0f64..10.0,
        queries in proptest::collection::vec(0u64..300, 1..50),
    ) {
        let sched = LinearScheduler::new(
            ProgressType::GlobalCounter,
            &[(0.0, v0), (100.0, v1), (200.0, v2)],
        ).unwrap();
        let lo = v0.min(v1).min(v2) - 1e-9;
        let hi = v0.max(v1).max(v2) + 1e-9;

        for q in queries {
            let v = sched.value(&at(q));
            prop_assert!(v >= lo && v <= hi);
        }
    }

    #[test]
    fn prop_step_cached_matches_fresh(queries in proptest::collection::vec(0u64..50, 1..40)) {
        let schedule = [(10.0, 1.0), (20.0, 2.0), (30.0, 3.0)];
        let cached = StepScheduler::new(ProgressType::GlobalCounter, &schedule, 0.0, 0.0).unwrap();

        for q in queries {
            let fresh = StepScheduler::new(ProgressType::GlobalCounter, &schedule, 0.0, 0.0).unwrap();
            prop_assert_eq!(cached.value(&at(q)), fresh.value(&at(q)));
        }
    }

    #[test]
    fn prop_exponential_decay_is_monotone(a in 0u64..1_000, b in 0u64..1_000) {
        let sched = ExponentialScheduler::new(ProgressType::GlobalCounter, 2.0, 0.9, 50.0).unwrap();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(sched.value(&at(lo)) >= sched.value(&at(hi)));
    }
}
