//! Output sinks for soundshader.
//!
//! Both sinks place scheduled blocks on a frame-accurate [`Timeline`] and
//! expose the device clock the scheduler positions blocks against.

mod cpal_backend;
mod offline;
mod timeline;
mod traits;

pub use cpal_backend::{fill_device_buffer, skip_flushed, CpalOutput};
pub use offline::OfflineSink;
pub use timeline::Timeline;
pub use traits::AudioError;
