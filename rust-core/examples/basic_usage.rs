/// Basic usage example: feed sensor samples, read step metrics
use stepx_sensing::{
    EngineConfig, InMemoryStore, RawSample, SensorAvailability, SharedSettings, StepEngine,
    StepSource,
};

fn main() -> Result<(), stepx_sensing::EngineError> {
    println!("=== StepX Sensing Engine: Basic Example ===\n");

    // Pick the best source this device offers
    let available = SensorAvailability {
        step_counter: false,
        step_detector: true,
        accelerometer: true,
        activity_permission: true,
    };
    let Some(source) = StepSource::select(available) else {
        println!("No step source available");
        return Ok(());
    };
    println!("Selected source: {:?}\n", source);

    let store = InMemoryStore::new(1_200);
    let mut engine = StepEngine::new(
        EngineConfig::for_source(source),
        store.clone(),
        SharedSettings::with_defaults(),
    )?;

    let updates = engine.subscribe();

    // Simulated stream: bright room, a brisk walk, then the phone goes in a pocket
    let mut samples = vec![RawSample::light(0, 1_500.0)];
    samples.extend((1..=8).map(|i| RawSample::step_pulse(i * 420)));
    samples.push(RawSample::proximity(4_000, Some(0.0), 5.0));
    samples.extend((0..4).map(|i| RawSample::step_pulse(4_200 + i * 420)));

    let mut changes = 0;
    for sample in &samples {
        let event = engine.process_sample(sample);
        if updates.try_recv().is_ok() {
            changes += 1;
        }
        if let Some(event) = event {
            println!(
                "step @ {:>5}ms  total={}",
                event.timestamp_ms(),
                engine.total_steps()
            );
        }
    }

    let outputs = engine.outputs();
    println!("\n--- Final State ---");
    println!("Total steps:   {}", outputs.total_steps);
    println!("Activity:      {}", outputs.activity.as_str());
    println!("Speed:         {:.2} m/s", outputs.speed_mps);
    println!("Distance:      {:.1} m", outputs.distance_m);
    println!("Calories:      {:.1} kcal", outputs.calories_kcal);
    println!("Light:         {:?} ({:.0} lx)", outputs.light_level(), outputs.ambient_lux);
    println!("In pocket:     {}", outputs.is_covered);
    println!("Goal progress: {:.1}%", engine.goal_progress() * 100.0);
    println!("Persisted:     {}", store.total());
    println!("Snapshots seen: {}", changes);

    Ok(())
}
