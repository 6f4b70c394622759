//! # Media Reconstruction
//!
//! Turns an ordered list of selected time ranges back into playable media by
//! extracting each range from the session's source and concatenating the
//! pieces in selection order.
//!
//! Audio output is spliced sample-exactly in process: ranges are converted
//! to sample indices against the normalized mono PCM, so the output duration
//! equals the sum of the selected durations to within one sample per range.
//! Video output goes through ffmpeg segment cuts plus the concat demuxer.
//!
//! ## Invariants:
//! - Selection order is preserved exactly; ranges are never re-sorted
//! - A range ending past the source end is clamped, never an error; a range
//!   starting at or past the end is rejected as `InvalidRange`
//! - The output artifact is replaced atomically, so a failed generation
//!   leaves any previous output intact

use crate::error::{AppError, AppResult};
use crate::media::ffmpeg;
use crate::media::wav::{read_mono_wav, write_mono_wav, MonoPcm};
use crate::session::store::{ArtifactKind, SessionHandle, SessionStore};
use crate::transcription::word::TimeRange;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Which container a generation request wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Audio,
    Video,
}

impl OutputKind {
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputKind::Audio => "audio/wav",
            OutputKind::Video => "video/mp4",
        }
    }

    fn artifact(&self) -> ArtifactKind {
        match self {
            OutputKind::Audio => ArtifactKind::OutputAudio,
            OutputKind::Video => ArtifactKind::OutputVideo,
        }
    }
}

/// Validate a selection against the source duration.
///
/// Rejects an empty selection and any degenerate or out-of-bounds range, and
/// clamps range ends that overshoot the source. Order is untouched.
pub fn validate_ranges(ranges: &[TimeRange], source_duration: f64) -> AppResult<Vec<TimeRange>> {
    if ranges.is_empty() {
        return Err(AppError::EmptySelection);
    }

    ranges
        .iter()
        .map(|range| {
            if !(range.end > range.start) || range.start < 0.0 {
                return Err(AppError::InvalidRange {
                    start: range.start,
                    end: range.end,
                });
            }
            if range.start >= source_duration {
                return Err(AppError::InvalidRange {
                    start: range.start,
                    end: range.end,
                });
            }
            Ok(TimeRange {
                start: range.start,
                end: range.end.min(source_duration),
            })
        })
        .collect()
}

/// Splice the selected ranges out of `pcm` in order. Pure function; range
/// offsets are rounded to the nearest sample index the same way on both
/// ends, so each piece is off by at most one sample from its nominal
/// duration and `t * rate` values sitting just under an integer (floating
/// point artifacts like `2.3 * 16000`) land on the intended sample.
pub fn splice_samples(pcm: &MonoPcm, ranges: &[TimeRange]) -> MonoPcm {
    let rate = pcm.sample_rate as f64;
    let total = pcm.samples.len();

    let mut samples = Vec::new();
    for range in ranges {
        let from = ((range.start * rate).round() as usize).min(total);
        let to = ((range.end * rate).round() as usize).min(total).max(from);
        samples.extend_from_slice(&pcm.samples[from..to]);
    }

    MonoPcm {
        sample_rate: pcm.sample_rate,
        samples,
    }
}

/// Rebuilds output artifacts from a session's source media.
pub struct MediaReconstructor {
    store: Arc<SessionStore>,
}

impl MediaReconstructor {
    pub fn new(store: Arc<SessionStore>) -> Self {
        MediaReconstructor { store }
    }

    /// Generate the requested output for `session` from `ranges`, publish it
    /// as the session's output artifact, and return its bytes.
    pub fn reconstruct(
        &self,
        session: &SessionHandle,
        ranges: &[TimeRange],
        kind: OutputKind,
    ) -> AppResult<Vec<u8>> {
        match kind {
            OutputKind::Audio => self.reconstruct_audio(session, ranges),
            OutputKind::Video => self.reconstruct_video(session, ranges),
        }
    }

    fn reconstruct_audio(&self, session: &SessionHandle, ranges: &[TimeRange]) -> AppResult<Vec<u8>> {
        let source_path = self.store.artifact_path(session, ArtifactKind::NormalizedAudio);
        if !source_path.is_file() {
            return Err(AppError::SourceUnavailable(format!(
                "session {} has no normalized audio",
                session.key()
            )));
        }
        let pcm = read_mono_wav(&source_path)
            .map_err(|e| AppError::SourceUnavailable(e.to_string()))?;

        let ranges = validate_ranges(ranges, pcm.duration_seconds())?;
        let spliced = splice_samples(&pcm, &ranges);

        // Write to a temp path first; the previous output survives any
        // failure up to the final rename.
        let temp = self.store.temp_path(session, ".wav");
        write_mono_wav(&temp, &spliced)?;
        let target = self
            .store
            .promote_artifact(session, ArtifactKind::OutputAudio, &temp)?;

        tracing::debug!(
            session = session.key(),
            ranges = ranges.len(),
            duration = spliced.duration_seconds(),
            "spliced audio output"
        );
        fs::read(&target).map_err(AppError::from)
    }

    fn reconstruct_video(&self, session: &SessionHandle, ranges: &[TimeRange]) -> AppResult<Vec<u8>> {
        let source_path = self.store.artifact_path(session, ArtifactKind::SourceVideo);
        if !source_path.is_file() {
            return Err(AppError::SourceUnavailable(format!(
                "session {} has no video source",
                session.key()
            )));
        }

        // The normalized audio track was derived from this video at ingest
        // and shares its timeline, so its duration bounds the selection.
        let audio_path = self.store.artifact_path(session, ArtifactKind::NormalizedAudio);
        let duration = read_mono_wav(&audio_path)
            .map_err(|e| AppError::SourceUnavailable(e.to_string()))?
            .duration_seconds();
        let ranges = validate_ranges(ranges, duration)?;

        let mut parts: Vec<PathBuf> = Vec::with_capacity(ranges.len());
        let result = (|| {
            for range in &ranges {
                let part = self.store.temp_path(session, ".mp4");
                ffmpeg::cut_segment(&source_path, range.start, range.duration(), &part)?;
                parts.push(part);
            }

            let list = self.store.temp_path(session, ".txt");
            fs::write(&list, ffmpeg::concat_list_body(&parts))?;

            let temp_out = self.store.temp_path(session, ".mp4");
            let concat = ffmpeg::concat_segments(&list, &temp_out);
            let _ = fs::remove_file(&list);
            concat?;

            self.store
                .promote_artifact(session, ArtifactKind::OutputVideo, &temp_out)
        })();

        // Segment temps are scratch either way.
        for part in &parts {
            let _ = fs::remove_file(part);
        }

        let target = result?;
        tracing::debug!(
            session = session.key(),
            ranges = ranges.len(),
            "concatenated video output"
        );
        fs::read(&target).map_err(AppError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: f64, end: f64) -> TimeRange {
        TimeRange { start, end }
    }

    fn pcm_counting(sample_rate: u32, seconds: f64) -> MonoPcm {
        let n = (sample_rate as f64 * seconds) as usize;
        MonoPcm {
            sample_rate,
            samples: (0..n).map(|i| (i % 1000) as i16).collect(),
        }
    }

    #[test]
    fn test_validate_rejects_empty_selection() {
        let err = validate_ranges(&[], 10.0).unwrap_err();
        assert!(matches!(err, AppError::EmptySelection));
    }

    #[test]
    fn test_validate_rejects_degenerate_ranges() {
        for bad in [range(2.0, 2.0), range(3.0, 1.0), range(-1.0, 1.0)] {
            let err = validate_ranges(&[bad], 10.0).unwrap_err();
            assert!(matches!(err, AppError::InvalidRange { .. }), "{:?}", bad);
        }
    }

    #[test]
    fn test_validate_rejects_start_past_source_end() {
        let err = validate_ranges(&[range(10.0, 11.0)], 10.0).unwrap_err();
        assert!(matches!(err, AppError::InvalidRange { .. }));
    }

    #[test]
    fn test_validate_clamps_overshooting_end() {
        let ranges = validate_ranges(&[range(9.5, 12.0)], 10.0).unwrap();
        assert_eq!(ranges, vec![range(9.5, 10.0)]);
    }

    #[test]
    fn test_validate_preserves_order() {
        let input = [range(4.0, 5.0), range(0.0, 1.0), range(2.0, 3.0)];
        let out = validate_ranges(&input, 10.0).unwrap();
        assert_eq!(out, input.to_vec());
    }

    #[test]
    fn test_splice_duration_is_sum_of_ranges() {
        // 0.5s + 1.0s + 1.0s of a 16 kHz source = 2.5s.
        let pcm = pcm_counting(16000, 10.0);
        let out = splice_samples(&pcm, &[range(0.0, 0.5), range(2.0, 3.0), range(5.0, 6.0)]);
        assert!((out.duration_seconds() - 2.5).abs() < 1e-4);
    }

    #[test]
    fn test_splice_preserves_selection_order() {
        let pcm = MonoPcm {
            sample_rate: 4,
            // One second per value at 4 Hz: [0,0,0,0, 1,1,1,1, 2,2,2,2]
            samples: vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2],
        };
        // Select second 2, then second 0, then second 1.
        let out = splice_samples(&pcm, &[range(2.0, 3.0), range(0.0, 1.0), range(1.0, 2.0)]);
        assert_eq!(out.samples, vec![2, 2, 2, 2, 0, 0, 0, 0, 1, 1, 1, 1]);
    }

    #[test]
    fn test_splice_rounds_offsets_to_nearest_sample() {
        // 2.3 * 16000 is 36799.999... in binary floating point; the end
        // index must land on 36800, not truncate to 36799.
        let pcm = pcm_counting(16000, 3.0);
        let out = splice_samples(&pcm, &[range(0.0, 2.3)]);
        assert_eq!(out.samples.len(), 36800);
    }

    #[test]
    fn test_splice_same_word_twice() {
        let pcm = MonoPcm {
            sample_rate: 4,
            samples: vec![5, 5, 5, 5, 7, 7, 7, 7],
        };
        let out = splice_samples(&pcm, &[range(1.0, 2.0), range(1.0, 2.0)]);
        assert_eq!(out.samples, vec![7, 7, 7, 7, 7, 7, 7, 7]);
    }

    fn audio_session(samples_seconds: f64) -> (tempfile::TempDir, Arc<SessionStore>, SessionHandle) {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::new(tmp.path().join("storage")).unwrap());
        let session = store.create_or_open("1700000000000").unwrap();
        let pcm = pcm_counting(16000, samples_seconds);
        write_mono_wav(
            &store.artifact_path(&session, ArtifactKind::NormalizedAudio),
            &pcm,
        )
        .unwrap();
        (tmp, store, session)
    }

    #[test]
    fn test_reconstruct_audio_reorders_words() {
        let (_tmp, store, session) = audio_session(10.0);
        let reconstructor = MediaReconstructor::new(store.clone());

        let bytes = reconstructor
            .reconstruct(
                &session,
                &[range(4.0, 5.0), range(0.0, 1.0), range(2.0, 3.0)],
                OutputKind::Audio,
            )
            .unwrap();

        // Output artifact was published and matches the returned bytes.
        assert_eq!(
            store.read_artifact(&session, ArtifactKind::OutputAudio).unwrap(),
            bytes
        );
        let out = read_mono_wav(&store.artifact_path(&session, ArtifactKind::OutputAudio)).unwrap();
        assert!((out.duration_seconds() - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_reconstruct_audio_clamps_to_source_end() {
        let (_tmp, store, session) = audio_session(2.0);
        let reconstructor = MediaReconstructor::new(store.clone());

        reconstructor
            .reconstruct(&session, &[range(1.5, 99.0)], OutputKind::Audio)
            .unwrap();

        let out = read_mono_wav(&store.artifact_path(&session, ArtifactKind::OutputAudio)).unwrap();
        assert!((out.duration_seconds() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_reconstruct_audio_empty_selection() {
        let (_tmp, store, session) = audio_session(2.0);
        let reconstructor = MediaReconstructor::new(store);
        let err = reconstructor
            .reconstruct(&session, &[], OutputKind::Audio)
            .unwrap_err();
        assert!(matches!(err, AppError::EmptySelection));
    }

    #[test]
    fn test_failed_generation_preserves_previous_output() {
        let (_tmp, store, session) = audio_session(2.0);
        let reconstructor = MediaReconstructor::new(store.clone());

        reconstructor
            .reconstruct(&session, &[range(0.0, 1.0)], OutputKind::Audio)
            .unwrap();
        let first = store.read_artifact(&session, ArtifactKind::OutputAudio).unwrap();

        // Invalid selection fails before any write.
        let err = reconstructor
            .reconstruct(&session, &[range(5.0, 6.0)], OutputKind::Audio)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRange { .. }));
        assert_eq!(
            store.read_artifact(&session, ArtifactKind::OutputAudio).unwrap(),
            first
        );
    }

    #[test]
    fn test_reconstruct_audio_missing_source() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::new(tmp.path().join("storage")).unwrap());
        let session = store.create_or_open("1700000000000").unwrap();
        let reconstructor = MediaReconstructor::new(store);

        let err = reconstructor
            .reconstruct(&session, &[range(0.0, 1.0)], OutputKind::Audio)
            .unwrap_err();
        assert!(matches!(err, AppError::SourceUnavailable(_)));
    }

    #[test]
    fn test_reconstruct_video_rejects_start_past_source_end() {
        let (_tmp, store, session) = audio_session(2.0);
        // Video source present; the fake bytes are never touched because
        // validation fails first.
        std::fs::write(
            store.artifact_path(&session, ArtifactKind::SourceVideo),
            b"mp4",
        )
        .unwrap();
        let reconstructor = MediaReconstructor::new(store);

        let err = reconstructor
            .reconstruct(&session, &[range(1000.0, 1001.0)], OutputKind::Video)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRange { .. }));
    }

    #[test]
    fn test_reconstruct_video_missing_source() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::new(tmp.path().join("storage")).unwrap());
        let session = store.create_or_open("1700000000000").unwrap();
        let reconstructor = MediaReconstructor::new(store);

        let err = reconstructor
            .reconstruct(&session, &[range(0.0, 1.0)], OutputKind::Video)
            .unwrap_err();
        assert!(matches!(err, AppError::SourceUnavailable(_)));
    }

    #[test]
    fn test_output_kind_content_types() {
        assert_eq!(OutputKind::Audio.content_type(), "audio/wav");
        assert_eq!(OutputKind::Video.content_type(), "video/mp4");
    }
}
