//! Active-note slots for instrument-style shaders.

/// Capacity of the note array handed to a shader.
pub const MAX_NOTES: usize = 10;

/// MIDI note number of A4.
const A4_NOTE: f64 = 69.0;
const A4_FREQUENCY: f64 = 440.0;

/// Equal-tempered frequency for a MIDI note number (A4 = 440 Hz).
pub fn note_to_frequency(note: i32) -> f32 {
    (A4_FREQUENCY * libm::pow(2.0, (note as f64 - A4_NOTE) / 12.0)) as f32
}

/// One held note as seen by a shader.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteSlot {
    /// MIDI note number, or -1 for an empty slot.
    pub note_number: i32,
    pub frequency: f32,
    /// 0.0..=1.0
    pub velocity: f32,
    /// How long the note has been held.
    pub duration_seconds: f32,
}

impl NoteSlot {
    pub const EMPTY: Self = Self {
        note_number: -1,
        frequency: 0.0,
        velocity: 0.0,
        duration_seconds: 0.0,
    };

    /// A held note with its frequency derived from the note number.
    pub fn held(note_number: i32, velocity: f32, duration_seconds: f32) -> Self {
        Self {
            note_number,
            frequency: note_to_frequency(note_number),
            velocity,
            duration_seconds,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.note_number < 0
    }
}

impl Default for NoteSlot {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// The full note array.
///
/// Always replaced as a whole; consumers receive copies, so there is never a
/// half-updated array visible to a compute context.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteState {
    slots: [NoteSlot; MAX_NOTES],
    active_count: usize,
}

impl NoteState {
    /// All slots empty.
    pub const fn empty() -> Self {
        Self {
            slots: [NoteSlot::EMPTY; MAX_NOTES],
            active_count: 0,
        }
    }

    /// Pack held notes into the front of the array. Empty slots in the input
    /// are skipped and anything past [`MAX_NOTES`] is dropped.
    pub fn from_notes<I: IntoIterator<Item = NoteSlot>>(notes: I) -> Self {
        let mut state = Self::empty();
        for slot in notes.into_iter().filter(|s| !s.is_empty()).take(MAX_NOTES) {
            state.slots[state.active_count] = slot;
            state.active_count += 1;
        }
        state
    }

    pub fn slots(&self) -> &[NoteSlot; MAX_NOTES] {
        &self.slots
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    /// Held notes only.
    pub fn active(&self) -> impl Iterator<Item = &NoteSlot> {
        self.slots[..self.active_count].iter()
    }
}

impl Default for NoteState {
    fn default() -> Self {
        Self::empty()
    }
}
