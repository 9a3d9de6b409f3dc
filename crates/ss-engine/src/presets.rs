//! Built-in sound shaders for the reference backend.
//!
//! Parameter slot 0 is a master gain on every preset (0 means the preset's
//! default level).

use std::f64::consts::TAU;

use ss_ir::StateSnapshot;

use crate::backend::ShaderInput;
use crate::fn_backend::ProgramRegistry;

pub const SINE: &str = "sine";
pub const STEREO_BEAT: &str = "stereo-beat";
pub const SAW: &str = "saw";
pub const INSTRUMENT: &str = "instrument";
pub const SILENCE: &str = "silence";

fn gain(state: &StateSnapshot, default: f32) -> f32 {
    match state.params.get(0) {
        g if g > 0.0 => g,
        _ => default,
    }
}

fn sine(input: &ShaderInput, frequency: f64) -> f32 {
    (input.phase(frequency) * TAU).sin() as f32
}

/// Register every preset into `registry`.
pub fn register_all(registry: &mut ProgramRegistry) {
    registry.register(SINE, |input, state| {
        let v = sine(input, 440.0) * gain(state, 0.5);
        (v, v)
    });

    registry.register(STEREO_BEAT, |input, state| {
        let g = gain(state, 0.4);
        (sine(input, 440.0) * g, sine(input, 442.0) * g)
    });

    registry.register(SAW, |input, state| {
        let v = (input.phase(110.0) * 2.0 - 1.0) as f32 * gain(state, 0.3);
        (v, v)
    });

    // Sums held notes; each note decays over how long it has been held.
    registry.register(INSTRUMENT, |input, state| {
        let notes = &state.notes;
        if notes.active_count() == 0 {
            return (0.0, 0.0);
        }
        let mut sum = 0.0f32;
        for slot in notes.active() {
            let env = (-1.5 * slot.duration_seconds).exp();
            sum += sine(input, slot.frequency as f64) * slot.velocity * env;
        }
        let v = sum / notes.active_count() as f32 * gain(state, 0.8);
        (v, v)
    });

    registry.register(SILENCE, |_, _| (0.0, 0.0));
}
