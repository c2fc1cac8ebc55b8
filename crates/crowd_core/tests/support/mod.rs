#![allow(dead_code)]

use crowd_core::course::{Course, EventField, Runner};
use crowd_core::scenario::{build_scenario, ScenarioParams};

/// Shared seed so every integration test reuses the same synthetic field.
pub const SEED: u64 = 42;

/// A seeded two-event scenario (marathon + half) of `runners` per event.
pub fn seeded_scenario(runners: usize) -> (Course, Vec<EventField>) {
    build_scenario(
        &ScenarioParams::default()
            .with_seed(SEED)
            .with_runners_per_event(runners),
    )
}

/// A hand-built field with explicit paces, gun time in minutes from
/// midnight, everyone starting on the gun.
pub fn explicit_field(name: &str, start_minutes: f64, paces: &[f64]) -> EventField {
    let mut field = EventField::new(name, start_minutes);
    for (i, &pace) in paces.iter().enumerate() {
        field.runners.push(Runner::new(i as u32, pace, 0.0));
    }
    field
}
