//! Mono 16-bit PCM WAV reading and writing, plus in-process normalization
//! of WAV uploads (multichannel downmix). Anything that is not already a
//! 16-bit PCM WAV goes through ffmpeg instead.

use crate::error::{AppError, AppResult};
use std::io::Cursor;
use std::path::Path;

/// A decoded mono PCM buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct MonoPcm {
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

impl MonoPcm {
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Read a mono 16-bit PCM WAV file. Fails with `AudioFormat` for anything
/// else; callers decide whether that means bad input or a corrupt artifact.
pub fn read_mono_wav(path: &Path) -> AppResult<MonoPcm> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| AppError::AudioFormat(format!("failed to open {}: {}", path.display(), e)))?;

    let spec = reader.spec();
    if spec.channels != 1 || spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int
    {
        return Err(AppError::AudioFormat(format!(
            "{} is not mono 16-bit PCM ({} ch, {}-bit {:?})",
            path.display(),
            spec.channels,
            spec.bits_per_sample,
            spec.sample_format
        )));
    }

    let samples = reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::AudioFormat(format!("failed to read samples: {}", e)))?;

    Ok(MonoPcm {
        sample_rate: spec.sample_rate,
        samples,
    })
}

/// Write a mono 16-bit PCM WAV file.
pub fn write_mono_wav(path: &Path, pcm: &MonoPcm) -> AppResult<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: pcm.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| AppError::Storage(format!("failed to create {}: {}", path.display(), e)))?;
    for &sample in &pcm.samples {
        writer
            .write_sample(sample)
            .map_err(|e| AppError::Storage(format!("failed to write sample: {}", e)))?;
    }
    writer
        .finalize()
        .map_err(|e| AppError::Storage(format!("failed to finalize {}: {}", path.display(), e)))?;
    Ok(())
}

/// Try to normalize uploaded bytes as a 16-bit PCM WAV, downmixing
/// multichannel audio to mono by averaging channels.
///
/// Returns `None` when the payload is not a 16-bit PCM WAV at all; the
/// caller then falls back to ffmpeg transcoding.
pub fn normalize_wav_bytes(bytes: &[u8]) -> Option<MonoPcm> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).ok()?;
    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return None;
    }
    if spec.channels == 0 {
        return None;
    }

    let raw: Vec<i16> = reader.samples::<i16>().collect::<Result<Vec<_>, _>>().ok()?;

    let channels = spec.channels as usize;
    let samples = if channels == 1 {
        raw
    } else {
        raw.chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect()
    };

    Some(MonoPcm {
        sample_rate: spec.sample_rate,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_normalize_mono_passes_through() {
        let pcm = normalize_wav_bytes(&wav_bytes(16000, 1, &[100, 200, 300])).unwrap();
        assert_eq!(pcm.sample_rate, 16000);
        assert_eq!(pcm.samples, vec![100, 200, 300]);
    }

    #[test]
    fn test_normalize_stereo_downmixes() {
        // Pairs (100, 200), (300, 400) -> 150, 350
        let pcm = normalize_wav_bytes(&wav_bytes(44100, 2, &[100, 200, 300, 400])).unwrap();
        assert_eq!(pcm.sample_rate, 44100);
        assert_eq!(pcm.samples, vec![150, 350]);
    }

    #[test]
    fn test_normalize_rejects_non_wav() {
        assert!(normalize_wav_bytes(b"not a wav").is_none());
        assert!(normalize_wav_bytes(&[]).is_none());
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        let pcm = MonoPcm {
            sample_rate: 16000,
            samples: vec![1, -2, 3, -4, 5],
        };

        write_mono_wav(&path, &pcm).unwrap();
        let back = read_mono_wav(&path).unwrap();
        assert_eq!(back, pcm);
    }

    #[test]
    fn test_read_rejects_missing_file() {
        let err = read_mono_wav(Path::new("/nonexistent.wav")).unwrap_err();
        assert!(matches!(err, AppError::AudioFormat(_)));
    }

    #[test]
    fn test_duration_seconds() {
        let pcm = MonoPcm {
            sample_rate: 16000,
            samples: vec![0; 40000],
        };
        assert!((pcm.duration_seconds() - 2.5).abs() < 1e-9);
    }
}
