//! Load a rendered TTS file into an `AudioBuffer` at its native sample rate.
//!
//! WAV goes through `hound` (the format the TTS pipeline renders); anything else
//! (mp3/flac/ogg) is probed with Symphonia.

use crate::buffer::AudioBuffer;
use crate::error::{AudioError, AudioResult};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Decode `path` to interleaved f32 samples. No resampling, no channel changes.
pub fn load_audio_file<P: AsRef<Path>>(path: P) -> AudioResult<AudioBuffer> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AudioError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("audio file not found: {}", path.display()),
        )));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let buffer = if ext == "wav" || ext == "wave" {
        decode_wav(path)?
    } else {
        decode_with_symphonia(path)?
    };

    if buffer.is_empty() {
        return Err(AudioError::Decode(format!(
            "decoded zero samples from {}",
            path.display()
        )));
    }
    info!(
        "📊 Audio file: {} ({} ch, {} Hz, {:.2}s)",
        path.display(),
        buffer.channels,
        buffer.sample_rate,
        buffer.duration().as_secs_f32()
    );
    Ok(buffer)
}

fn decode_wav(path: &Path) -> AudioResult<AudioBuffer> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    debug!(?spec, "wav header");

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };
    Ok(AudioBuffer::new(samples, spec.channels, spec.sample_rate))
}

fn decode_with_symphonia(path: &Path) -> AudioResult<AudioBuffer> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::errors::Error as SymphoniaError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AudioError::Decode(format!("probe failed: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| AudioError::Decode("no supported audio track".to_string()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AudioError::Decode("unknown sample rate".to_string()))?;
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::Decode(format!("decoder init failed: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(e) => return Err(AudioError::Decode(format!("read error: {}", e))),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => {
                if channels == 0 {
                    channels = decoded.spec().channels.count();
                }
                let mut interleaved =
                    SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
                interleaved.copy_interleaved_ref(decoded);
                samples.extend_from_slice(interleaved.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(AudioError::Decode(format!("decode error: {}", e))),
        }
    }

    Ok(AudioBuffer::new(samples, channels.max(1) as u16, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_int16_wav_to_normalized_floats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tts.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(16_384_i16).unwrap();
            writer.write_sample(-32_768_i16).unwrap();
        }
        writer.finalize().unwrap();

        let buf = load_audio_file(&path).unwrap();
        assert_eq!(buf.channels, 2);
        assert_eq!(buf.sample_rate, 44_100);
        assert_eq!(buf.frames(), 100);
        assert!((buf.samples[0] - 0.5).abs() < 1e-6);
        assert!((buf.samples[1] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_audio_file("definitely/not/here.wav").unwrap_err();
        assert!(matches!(err, AudioError::Io(_)));
    }
}
