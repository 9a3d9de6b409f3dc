//! Uniform parameters and the combined state snapshot.

use crate::note::NoteState;

/// Number of numeric uniforms a shader can read.
pub const MAX_PARAMS: usize = 16;

/// Numeric uniform values driven by UI controls.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ParameterState {
    values: [f32; MAX_PARAMS],
}

impl ParameterState {
    pub const fn new() -> Self {
        Self { values: [0.0; MAX_PARAMS] }
    }

    pub fn from_values(values: [f32; MAX_PARAMS]) -> Self {
        Self { values }
    }

    /// Copy with one value replaced. Out-of-range indices are ignored.
    pub fn with_value(mut self, index: usize, value: f32) -> Self {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
        self
    }

    pub fn get(&self, index: usize) -> f32 {
        self.values.get(index).copied().unwrap_or(0.0)
    }

    pub fn values(&self) -> &[f32; MAX_PARAMS] {
        &self.values
    }
}

/// Everything a shader evaluation depends on besides the sample index.
///
/// `Copy` on purpose: every request to a compute context carries its own
/// snapshot by value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StateSnapshot {
    pub notes: NoteState,
    pub params: ParameterState,
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

struct Fnv(u64);

impl Fnv {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }

    fn write_f32(&mut self, v: f32) {
        self.write(&v.to_bits().to_le_bytes());
    }
}

impl StateSnapshot {
    pub fn new(notes: NoteState, params: ParameterState) -> Self {
        Self { notes, params }
    }

    /// FNV-1a over every observable numeric field.
    pub fn hash(&self) -> u64 {
        let mut h = Fnv(FNV_OFFSET);
        h.write(&(self.notes.active_count() as u32).to_le_bytes());
        for slot in self.notes.slots() {
            h.write(&slot.note_number.to_le_bytes());
            h.write_f32(slot.frequency);
            h.write_f32(slot.velocity);
            h.write_f32(slot.duration_seconds);
        }
        for &v in self.params.values() {
            h.write_f32(v);
        }
        h.0
    }
}
