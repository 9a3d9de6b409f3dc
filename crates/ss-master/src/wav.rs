//! RIFF/WAVE export of rendered stereo frames.
//!
//! Frames are f32 in [-1, 1]. `Pcm16` quantizes them; `Float32` keeps the
//! rendered values bit for bit (IEEE float format with a `fact` chunk).

use serde::Deserialize;
use ss_engine::StereoFrame;
use std::io::{self, Write};

const CHANNELS: u16 = 2;

const FORMAT_PCM: u16 = 1;
const FORMAT_IEEE_FLOAT: u16 = 3;

/// Sample encoding of an exported file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WavFormat {
    #[default]
    Pcm16,
    Float32,
}

impl WavFormat {
    fn bytes_per_sample(self) -> u16 {
        match self {
            WavFormat::Pcm16 => 2,
            WavFormat::Float32 => 4,
        }
    }

    fn format_tag(self) -> u16 {
        match self {
            WavFormat::Pcm16 => FORMAT_PCM,
            WavFormat::Float32 => FORMAT_IEEE_FLOAT,
        }
    }

    /// Size of everything before the sample data.
    pub fn header_len(self) -> usize {
        match self {
            // RIFF + fmt(16) + data
            WavFormat::Pcm16 => 12 + 24 + 8,
            // RIFF + fmt(18) + fact + data
            WavFormat::Float32 => 12 + 26 + 12 + 8,
        }
    }
}

/// Write `frames` as a complete WAV file.
pub fn write_wav(
    w: &mut impl Write,
    frames: &[StereoFrame],
    sample_rate: u32,
    format: WavFormat,
) -> io::Result<()> {
    let block_align = CHANNELS * format.bytes_per_sample();
    let data_len = u32::try_from(frames.len() as u64 * block_align as u64)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many frames for a WAV file"))?;
    let riff_len = (format.header_len() - 8) as u32 + data_len;

    w.write_all(b"RIFF")?;
    w.write_all(&riff_len.to_le_bytes())?;
    w.write_all(b"WAVE")?;

    let fmt_len: u32 = if format == WavFormat::Pcm16 { 16 } else { 18 };
    w.write_all(b"fmt ")?;
    w.write_all(&fmt_len.to_le_bytes())?;
    w.write_all(&format.format_tag().to_le_bytes())?;
    w.write_all(&CHANNELS.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&(sample_rate * block_align as u32).to_le_bytes())?;
    w.write_all(&block_align.to_le_bytes())?;
    w.write_all(&(format.bytes_per_sample() * 8).to_le_bytes())?;

    if format == WavFormat::Float32 {
        // cbSize
        w.write_all(&0u16.to_le_bytes())?;
        w.write_all(b"fact")?;
        w.write_all(&4u32.to_le_bytes())?;
        w.write_all(&(frames.len() as u32).to_le_bytes())?;
    }

    w.write_all(b"data")?;
    w.write_all(&data_len.to_le_bytes())?;
    for frame in frames {
        match format {
            WavFormat::Pcm16 => {
                let (left, right) = frame.to_i16();
                w.write_all(&left.to_le_bytes())?;
                w.write_all(&right.to_le_bytes())?;
            }
            WavFormat::Float32 => {
                let c = frame.clamped();
                w.write_all(&c.left.to_le_bytes())?;
                w.write_all(&c.right.to_le_bytes())?;
            }
        }
    }
    Ok(())
}

/// Encode `frames` into an in-memory WAV file.
pub fn frames_to_wav(frames: &[StereoFrame], sample_rate: u32, format: WavFormat) -> io::Result<Vec<u8>> {
    let frame_len = (CHANNELS * format.bytes_per_sample()) as usize;
    let mut buf = Vec::with_capacity(format.header_len() + frames.len() * frame_len);
    write_wav(&mut buf, frames, sample_rate, format)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(wav: &[u8], at: usize) -> u32 {
        u32::from_le_bytes(wav[at..at + 4].try_into().unwrap())
    }

    fn u16_at(wav: &[u8], at: usize) -> u16 {
        u16::from_le_bytes(wav[at..at + 2].try_into().unwrap())
    }

    #[test]
    fn pcm16_header_and_samples() {
        let frames = [StereoFrame::new(1.0, -1.0), StereoFrame::silence()];
        let wav = frames_to_wav(&frames, 48000, WavFormat::Pcm16).unwrap();

        assert_eq!(wav.len(), 44 + 8);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32_at(&wav, 4), 36 + 8);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(u16_at(&wav, 20), FORMAT_PCM);
        assert_eq!(u32_at(&wav, 24), 48000);
        assert_eq!(u16_at(&wav, 34), 16);
        assert_eq!(u32_at(&wav, 40), 8);

        let left = i16::from_le_bytes([wav[44], wav[45]]);
        let right = i16::from_le_bytes([wav[46], wav[47]]);
        assert_eq!(left, i16::MAX);
        assert!(right <= -i16::MAX);
        assert_eq!(&wav[48..52], &[0, 0, 0, 0]);
    }

    #[test]
    fn float32_keeps_rendered_values() {
        let frames = [StereoFrame::new(0.123, -0.5), StereoFrame::new(f32::NAN, 2.0)];
        let wav = frames_to_wav(&frames, 44100, WavFormat::Float32).unwrap();

        let header = WavFormat::Float32.header_len();
        assert_eq!(wav.len(), header + 16);
        assert_eq!(u32_at(&wav, 4) as usize, wav.len() - 8);
        assert_eq!(u32_at(&wav, 16), 18);
        assert_eq!(u16_at(&wav, 20), FORMAT_IEEE_FLOAT);
        assert_eq!(u32_at(&wav, 28), 44100 * 8);
        assert_eq!(u16_at(&wav, 34), 32);
        assert_eq!(&wav[38..42], b"fact");
        assert_eq!(u32_at(&wav, 46), 2);
        assert_eq!(&wav[50..54], b"data");
        assert_eq!(u32_at(&wav, 54), 16);

        let sample = |i: usize| f32::from_le_bytes(wav[header + i * 4..header + i * 4 + 4].try_into().unwrap());
        assert_eq!(sample(0), 0.123);
        assert_eq!(sample(1), -0.5);
        // Out-of-range input is clamped like the PCM path
        assert_eq!(sample(2), 0.0);
        assert_eq!(sample(3), 1.0);
    }

    #[test]
    fn write_errors_propagate() {
        struct Full;
        impl Write for Full {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::WriteZero, "disk full"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let err = write_wav(&mut Full, &[StereoFrame::silence()], 48000, WavFormat::Pcm16).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
    }
}
