//! Audio file decoding for the offline renderer.
//!
//! Decodes with Symphonia into the interleaved stereo `i16` layout the
//! effect processes natively. The reverb core is fixed at 44.1 kHz, so files
//! at any other rate are rejected rather than resampled.

use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Sample rate the reverb core expects.
pub const ENGINE_SAMPLE_RATE: u32 = 44100;

/// Errors that can occur while decoding the input file.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Unsupported sample rate {0} Hz (engine runs at 44100 Hz)")]
    UnsupportedSampleRate(u32),
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Decode a file to interleaved stereo `i16` at the engine rate.
///
/// Mono input is duplicated to both channels; for anything wider than
/// stereo only the first two channels are kept.
pub fn load_stereo(path: &Path) -> Result<Vec<i16>, LoadError> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| LoadError::Decode(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(LoadError::NoAudioTrack)?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params.sample_rate.unwrap_or(ENGINE_SAMPLE_RATE);
    if sample_rate != ENGINE_SAMPLE_RATE {
        return Err(LoadError::UnsupportedSampleRate(sample_rate));
    }
    let channels = codec_params.channels.map(|c| c.count()).unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| LoadError::Decode(e.to_string()))?;

    let mut samples: Vec<i16> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(_) => break,
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(_) => continue,
        };

        let spec = *decoded.spec();
        let duration = decoded.capacity() as u64;

        let mut sample_buf = SampleBuffer::<i16>::new(duration, spec);
        sample_buf.copy_interleaved_ref(decoded);

        match channels {
            1 => {
                for &s in sample_buf.samples() {
                    samples.push(s);
                    samples.push(s);
                }
            }
            2 => samples.extend_from_slice(sample_buf.samples()),
            n => {
                for frame in sample_buf.samples().chunks_exact(n) {
                    samples.push(frame[0]);
                    samples.push(frame[1]);
                }
            }
        }
    }

    Ok(samples)
}
