//! Pipeline metrics.

use metrics::{counter, histogram};

pub mod names {
    pub const JOBS_ACCEPTED: &str = "vidgen_jobs_accepted_total";
    pub const JOBS_FINALIZED: &str = "vidgen_jobs_finalized_total";
    pub const JOBS_FAILED: &str = "vidgen_jobs_failed_total";
    pub const INTAKE_REJECTED: &str = "vidgen_intake_rejected_total";
    pub const UPLOAD_ATTEMPTS: &str = "vidgen_upload_attempts_total";
    pub const UPLOAD_FAILURES: &str = "vidgen_upload_failures_total";
    pub const RENDER_DURATION: &str = "vidgen_render_duration_seconds";
    pub const BACKGROUND_DEGRADED: &str = "vidgen_background_degraded_total";
    pub const NOTIFICATION_FAILURES: &str = "vidgen_notification_failures_total";
    pub const SPEECH_SEGMENTS: &str = "vidgen_speech_segments_total";
}

pub fn record_job_accepted(variant: &'static str) {
    counter!(names::JOBS_ACCEPTED, "variant" => variant).increment(1);
}

pub fn record_job_finalized(variant: &'static str) {
    counter!(names::JOBS_FINALIZED, "variant" => variant).increment(1);
}

pub fn record_job_failed(variant: &'static str, kind: &'static str) {
    counter!(names::JOBS_FAILED, "variant" => variant, "kind" => kind).increment(1);
}

pub fn record_intake_rejected(reason: &'static str) {
    counter!(names::INTAKE_REJECTED, "reason" => reason).increment(1);
}

pub fn record_upload_attempt(success: bool) {
    counter!(names::UPLOAD_ATTEMPTS).increment(1);
    if !success {
        counter!(names::UPLOAD_FAILURES).increment(1);
    }
}

pub fn record_render_duration(variant: &'static str, seconds: f64) {
    histogram!(names::RENDER_DURATION, "variant" => variant).record(seconds);
}

pub fn record_background_degraded(reason: &'static str) {
    counter!(names::BACKGROUND_DEGRADED, "reason" => reason).increment(1);
}

pub fn record_notification_failure(kind: &'static str) {
    counter!(names::NOTIFICATION_FAILURES, "kind" => kind).increment(1);
}

pub fn record_speech_segment(measured: bool) {
    let source = if measured { "probe" } else { "estimate" };
    counter!(names::SPEECH_SEGMENTS, "duration_source" => source).increment(1);
}
