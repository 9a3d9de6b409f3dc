//! Held-note bookkeeping for keyboard and MIDI input.

use arrayvec::ArrayVec;
use log::debug;
use ss_ir::{NoteSlot, NoteState, SampleIndex, MAX_NOTES};

#[derive(Clone, Copy, Debug, PartialEq)]
struct HeldNote {
    note_number: i32,
    velocity: f32,
    onset: SampleIndex,
}

/// Notes currently held, oldest first.
#[derive(Debug, Default)]
pub struct NoteTracker {
    held: ArrayVec<HeldNote, MAX_NOTES>,
}

impl NoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Press `note` at `at`. Pressing a held note retriggers it; when every
    /// slot is taken the oldest note is released to make room.
    pub fn note_on(&mut self, note: i32, velocity: f32, at: SampleIndex) {
        if note < 0 {
            return;
        }
        self.held.retain(|h| h.note_number != note);
        if self.held.is_full() {
            let stolen = self.held.remove(0);
            debug!("note {} stolen by {}", stolen.note_number, note);
        }
        self.held.push(HeldNote {
            note_number: note,
            velocity: velocity.clamp(0.0, 1.0),
            onset: at,
        });
    }

    /// Returns false if `note` was not held.
    pub fn note_off(&mut self, note: i32) -> bool {
        let before = self.held.len();
        self.held.retain(|h| h.note_number != note);
        self.held.len() != before
    }

    /// Hold exactly the active notes of `notes`, back-dating each onset by
    /// its reported duration so it keeps aging from `now`.
    pub fn replace(&mut self, notes: &NoteState, now: SampleIndex, sample_rate: f64) {
        self.held.clear();
        for slot in notes.active() {
            let held_samples = (slot.duration_seconds.max(0.0) as f64 * sample_rate).round() as u64;
            let onset = SampleIndex::new(now.get().saturating_sub(held_samples));
            self.note_on(slot.note_number, slot.velocity, onset);
        }
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// The note array as of `now`, with hold durations measured from each
    /// note's onset.
    pub fn snapshot(&self, now: SampleIndex, sample_rate: f64) -> NoteState {
        NoteState::from_notes(self.held.iter().map(|h| {
            let held_samples = now.get().saturating_sub(h.onset.get());
            let duration = held_samples as f64 / sample_rate.max(1.0);
            NoteSlot::held(h.note_number, h.velocity, duration as f32)
        }))
    }
}
