/// Light reminder example: background persistence and the dim-light prompt
use std::sync::Arc;

use stepx_sensing::{
    BackgroundStore, EngineConfig, InMemoryStore, RawSample, SharedSettings, StepEngine,
    StepSource,
};

fn main() -> Result<(), stepx_sensing::EngineError> {
    tracing_subscriber::fmt().with_target(false).init();

    println!("=== StepX Sensing Engine: Light Reminder ===\n");

    let durable = InMemoryStore::new(0);
    let settings = Arc::new(SharedSettings::with_defaults());

    {
        let mut engine = StepEngine::new(
            EngineConfig::for_source(StepSource::HardwareCounter),
            BackgroundStore::spawn(durable.clone()),
            Arc::clone(&settings),
        )?;
        let snapshots = engine.snapshot_handle();

        // Evening walk: the room dims while the counter climbs
        for second in 0..30u64 {
            let now_ms = second * 1_000;
            let lux = if second < 5 { 800.0 } else { 40.0 };

            engine.process_sample(&RawSample::light(now_ms, lux));
            engine.process_sample(&RawSample::step_counter(now_ms, 3_000 + second as u32 * 2));

            if engine.check_light_reminder(now_ms) {
                println!("[{:>2}s] reminder: it's getting dark, consider a light", second);
            }

            // The host turns the reminder off after it has been shown twice
            if second == 25 {
                settings.set_light_reminder(false);
                println!("[{:>2}s] reminder disabled", second);
            }
        }

        let latest = snapshots.latest();
        println!(
            "\nSession: {} steps, {:.1} m, {:?} light",
            latest.total_steps,
            latest.distance_m,
            latest.light_level()
        );
    }

    // The engine is dropped: the writer has drained every increment
    println!("Persisted total: {}", durable.total());
    Ok(())
}
