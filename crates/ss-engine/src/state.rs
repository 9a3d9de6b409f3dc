//! Note and parameter state shared with both compute contexts.

use ss_ir::{NoteState, ParameterState, StateSnapshot, MAX_PARAMS};

/// Owner of the current [`StateSnapshot`].
///
/// Every change replaces the snapshot; the session pushes copies to the audio
/// and waveform contexts. [`StateHub::tick`] paces the hash checks that decide
/// waveform-cache invalidation.
#[derive(Debug)]
pub struct StateHub {
    snapshot: StateSnapshot,
    hash_interval: u32,
    ticks: u32,
    dirty: bool,
}

impl StateHub {
    pub fn new(hash_interval_ticks: u32) -> Self {
        Self {
            snapshot: StateSnapshot::default(),
            hash_interval: hash_interval_ticks.max(1),
            ticks: 0,
            dirty: false,
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.snapshot
    }

    pub fn set_notes(&mut self, notes: NoteState) {
        self.replace(StateSnapshot::new(notes, self.snapshot.params));
    }

    /// Set one parameter. Out-of-range indices are ignored.
    pub fn set_param(&mut self, index: usize, value: f32) {
        if index >= MAX_PARAMS {
            return;
        }
        let params = self.snapshot.params.with_value(index, value);
        self.replace(StateSnapshot::new(self.snapshot.notes, params));
    }

    pub fn set_params(&mut self, params: ParameterState) {
        self.replace(StateSnapshot::new(self.snapshot.notes, params));
    }

    pub fn replace(&mut self, snapshot: StateSnapshot) {
        self.snapshot = snapshot;
        self.dirty = true;
    }

    /// True when the snapshot changed since the last [`Self::take_dirty`].
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Advance the tick counter; true on every `hash_interval`th tick.
    pub fn tick(&mut self) -> bool {
        self.ticks += 1;
        if self.ticks >= self.hash_interval {
            self.ticks = 0;
            true
        } else {
            false
        }
    }
}

impl Default for StateHub {
    fn default() -> Self {
        Self::new(6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ss_ir::NoteSlot;

    #[test]
    fn hash_check_every_nth_tick() {
        let mut hub = StateHub::new(6);
        let due: Vec<bool> = (0..12).map(|_| hub.tick()).collect();
        let hits: Vec<usize> = due.iter().enumerate().filter(|(_, d)| **d).map(|(i, _)| i).collect();
        assert_eq!(hits, vec![5, 11]);
    }

    #[test]
    fn zero_interval_checks_every_tick() {
        let mut hub = StateHub::new(0);
        assert!(hub.tick());
        assert!(hub.tick());
    }

    #[test]
    fn notes_and_params_are_replaced_independently() {
        let mut hub = StateHub::default();
        hub.set_param(2, 0.25);
        hub.set_notes(NoteState::from_notes([NoteSlot::held(60, 0.5, 0.0)]));
        let snap = hub.snapshot();
        assert_eq!(snap.params.get(2), 0.25);
        assert_eq!(snap.notes.active_count(), 1);
        assert!(hub.take_dirty());
        assert!(!hub.take_dirty());
    }

    #[test]
    fn out_of_range_param_is_ignored() {
        let mut hub = StateHub::default();
        hub.set_param(MAX_PARAMS, 1.0);
        assert_eq!(hub.snapshot(), StateSnapshot::default());
        assert!(!hub.take_dirty());
    }
}
