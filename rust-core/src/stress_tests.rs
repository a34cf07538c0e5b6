/// Stress testing for the step engine.
///
/// Long sessions, hostile input and misbehaving collaborators: the failure
/// modes that only show up after hours in a pocket.

#[cfg(test)]
mod stress_tests {
    use std::sync::Arc;

    use crate::cadence::{CadenceClassifier, CADENCE_WINDOW_LEN};
    use crate::error::StoreError;
    use crate::pipeline::*;
    use crate::step_detection::{StepSource, STEP_DEBOUNCE_MS};
    use crate::store::{
        BackgroundStore, InMemoryStore, SharedSettings, StaticSettings, StepTotalStore,
    };
    use crate::types::*;

    const REST: [f32; 3] = [0.0, 0.0, 9.81];

    struct FailingStore;

    impl StepTotalStore for FailingStore {
        fn read_total(&self) -> std::result::Result<u32, StoreError> {
            Ok(0)
        }

        fn increment_total(&self, delta: u32) -> std::result::Result<(), StoreError> {
            Err(StoreError::write_failed(delta, "storage offline"))
        }
    }

    // ============================================================================
    // CATEGORY 1: EXTREME DURATION & THROUGHPUT
    // ============================================================================

    /// Ten minutes of 50Hz accelerometer data (30000 samples)
    #[test]
    fn stress_ten_minutes_accelerometer_50hz() {
        let store = InMemoryStore::new(0);
        let mut engine = StepEngine::new(
            EngineConfig::for_source(StepSource::Accelerometer),
            store.clone(),
            StaticSettings::default(),
        )
        .unwrap();

        let mut last_event: Option<u64> = None;
        let mut previous_total = 0;

        for i in 0..30_000u64 {
            let timestamp = i * 20;
            // Alternate walking and running every minute
            let period = if (timestamp / 60_000) % 2 == 0 { 1000 } else { 500 };
            let accel = if timestamp % period == 0 { [3.0, 0.5, 9.81] } else { REST };

            let sample = RawSample::accelerometer(timestamp, accel);
            if let Some(event) = engine.process_sample(&sample) {
                if let Some(last) = last_event {
                    assert!(event.timestamp_ms() - last >= STEP_DEBOUNCE_MS);
                }
                last_event = Some(event.timestamp_ms());
            }

            let total = engine.total_steps();
            assert!(total >= previous_total, "total went backwards at {timestamp}");
            previous_total = total;

            assert!(engine.detector().last_magnitude().is_finite());
            assert!(engine.pace().speed_mps.is_finite());
        }

        // 5 walking minutes at 60 steps plus 5 running minutes at 120 steps.
        // The start-up transient coincides with the first jolt.
        assert_eq!(engine.total_steps(), 5 * 60 + 5 * 120);
        assert_eq!(store.total(), engine.total_steps());
        assert_eq!(engine.samples_processed(), 30_000);
    }

    /// An hour of pulses never grows the cadence window
    #[test]
    fn stress_cadence_window_stays_bounded() {
        let mut classifier = CadenceClassifier::new();

        for i in 0..7_200u64 {
            let pace = classifier.on_step_event(&StepEvent::single(i * 500));
            assert!(classifier.window().len() <= CADENCE_WINDOW_LEN);
            assert!(pace.cadence_hz <= 2.0 + 1e-3);
        }

        assert_eq!(classifier.window().len(), CADENCE_WINDOW_LEN);
        assert_eq!(classifier.current().activity, ActivityState::Running);
    }

    // ============================================================================
    // CATEGORY 2: HOSTILE INPUT
    // ============================================================================

    /// Flood of malformed samples changes nothing
    #[test]
    fn stress_garbage_flood() {
        let mut engine = StepEngine::new(
            EngineConfig::for_source(StepSource::Accelerometer),
            InMemoryStore::new(42),
            StaticSettings::default(),
        )
        .unwrap();

        let before = engine.outputs();
        let garbage = [
            RawSample::accelerometer(0, [f32::NAN, 0.0, 9.81]),
            RawSample::accelerometer(0, [0.0, f32::INFINITY, 9.81]),
            RawSample::accelerometer(0, [0.0, 0.0, f32::NEG_INFINITY]),
            RawSample::light(0, -1.0),
            RawSample::light(0, f32::NAN),
            RawSample::proximity(0, Some(0.0), 0.0),
            RawSample::proximity(0, Some(f32::NAN), 5.0),
            RawSample::proximity(0, Some(1.0), -5.0),
        ];

        for round in 0..1_000u64 {
            for sample in &garbage {
                let mut sample = *sample;
                sample.timestamp_ms = round * 10;
                assert!(engine.process_sample(&sample).is_none());
            }
        }

        assert_eq!(engine.outputs(), before);
        assert_eq!(engine.detector().gravity_filter().sample_count(), 0);
        assert_eq!(engine.samples_processed(), 8_000);
    }

    /// Counter that reboots over and over
    #[test]
    fn stress_repeated_counter_reboots() {
        let store = InMemoryStore::new(0);
        let mut engine = StepEngine::new(
            EngineConfig::default(),
            store.clone(),
            StaticSettings::default(),
        )
        .unwrap();

        let mut timestamp = 0;
        for boot in 0..200u32 {
            // Each boot restarts low and climbs by 25
            let start = boot % 7;
            for step in 0..=25 {
                engine.process_sample(&RawSample::step_counter(timestamp, start + step));
                timestamp += 100;
            }
        }

        // The drop at each reboot only re-seeds; every climb counts.
        assert_eq!(engine.total_steps(), 200 * 25);
        assert_eq!(store.total(), 200 * 25);
    }

    /// Cover toggling on every sample
    #[test]
    fn stress_rapid_cover_toggling() {
        let settings = Arc::new(SharedSettings::with_defaults());
        let mut engine = StepEngine::new(
            EngineConfig::for_source(StepSource::HardwarePulse),
            InMemoryStore::new(0),
            Arc::clone(&settings),
        )
        .unwrap();

        for i in 0..10_000u64 {
            let covered = i % 2 == 0;
            let distance = if covered { 0.0 } else { 5.0 };
            engine.process_sample(&RawSample::proximity(i * 10, Some(distance), 5.0));
            let event = engine.process_sample(&RawSample::step_pulse(i * 10 + 5));
            assert_eq!(event.is_some(), !covered);
        }

        assert_eq!(engine.total_steps(), 5_000);
    }

    // ============================================================================
    // CATEGORY 3: COLLABORATOR FAILURE
    // ============================================================================

    /// Store that rejects every write never disturbs the in-memory total
    #[test]
    fn stress_store_always_failing() {
        let mut engine = StepEngine::new(
            EngineConfig::for_source(StepSource::HardwarePulse),
            FailingStore,
            StaticSettings::default(),
        )
        .unwrap();

        for i in 0..5_000u64 {
            engine.process_sample(&RawSample::step_pulse(i * 400));
        }

        assert_eq!(engine.total_steps(), 5_000);
    }

    /// Background writer keeps up with a burst of increments
    #[test]
    fn stress_background_store_burst() {
        let inner = InMemoryStore::new(0);
        {
            let mut engine = StepEngine::new(
                EngineConfig::for_source(StepSource::HardwarePulse),
                BackgroundStore::spawn(inner.clone()),
                StaticSettings::default(),
            )
            .unwrap();

            for i in 0..20_000u64 {
                engine.process_sample(&RawSample::step_pulse(i * 300));
            }
            assert_eq!(engine.total_steps(), 20_000);
        }

        // Dropping the engine drains the writer
        assert_eq!(inner.total(), 20_000);
    }

    /// Snapshot subscribers that fall away are pruned
    #[test]
    fn stress_many_dropped_subscribers() {
        let mut engine = StepEngine::new(
            EngineConfig::for_source(StepSource::HardwarePulse),
            InMemoryStore::new(0),
            StaticSettings::default(),
        )
        .unwrap();

        for i in 0..500u64 {
            let rx = engine.subscribe();
            engine.process_sample(&RawSample::step_pulse(i * 400));
            drop(rx);
        }

        let rx = engine.subscribe();
        assert_eq!(rx.try_recv().map(|o| o.total_steps), Ok(500));
        engine.process_sample(&RawSample::step_pulse(500 * 400));
        assert_eq!(rx.try_recv().map(|o| o.total_steps), Ok(501));
    }
}
