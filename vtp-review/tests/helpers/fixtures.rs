//! Segment, page and job builders

use vtp_review::models::{Job, JobOutputs, JobSteps, Segment, SegmentPage};

pub fn segment(index: u32, start: f64, end: f64) -> Segment {
    Segment::new(index, start, end)
}

/// Segment with quality signals, starting at `index` seconds
pub fn scored(index: u32, duration: f64, snr_db: f64, speech_ratio: f64) -> Segment {
    let start = f64::from(index) * 10.0;
    let mut segment = Segment::new(index, start, start + duration);
    segment.snr_db = Some(snr_db);
    segment.speech_ratio = Some(speech_ratio);
    segment.clean_start = Some(start);
    segment.clean_end = Some(start + duration);
    segment
}

/// Single page holding every given segment
pub fn page(segments: Vec<Segment>) -> SegmentPage {
    let total = segments.len();
    SegmentPage {
        limit: total.max(1),
        segments,
        total,
        offset: 0,
        has_more: false,
        clean_track_ref: Some("out/clean.wav".to_string()),
        original_track_ref: Some("out/audio.wav".to_string()),
    }
}

pub fn job(id: &str, vod_url: &str, updated_at: &str) -> Job {
    Job {
        id: id.to_string(),
        vod_url: vod_url.to_string(),
        streamer: Some("someone".to_string()),
        title: Some("stream".to_string()),
        created_at: Some(updated_at.to_string()),
        updated_at: Some(updated_at.to_string()),
        steps: JobSteps::default(),
        outputs: JobOutputs::default(),
    }
}
