//! Core value types for the soundshader audio core.
//!
//! Everything here is plain data: the sample timebase, stereo buffers and
//! blocks, the note/parameter snapshot handed to compute contexts, and the
//! per-column waveform data produced by decimation. The engine crate owns
//! all behaviour.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod audio_buffer;
mod block;
mod compile_state;
mod frame;
mod note;
mod params;
mod sample_index;
mod view;

pub use audio_buffer::StereoBuffer;
pub use block::AudioBlock;
pub use compile_state::CompileState;
pub use frame::StereoFrame;
pub use note::{note_to_frequency, NoteSlot, NoteState, MAX_NOTES};
pub use params::{ParameterState, StateSnapshot, MAX_PARAMS};
pub use sample_index::{SampleClock, SampleIndex};
pub use view::{ColumnMinMax, RequestId, ViewKey, WaveformView};
