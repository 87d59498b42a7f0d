//! Render orchestration: bundle, pick the composition, fix its length, render.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use vidgen_models::{frame_count, JobId, VideoVariant};
use vidgen_render::{RenderEngine, RenderRequest};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics::record_render_duration;
use crate::temp::TempFiles;

/// A rendered video on local disk.
#[derive(Debug, Clone)]
pub struct RenderedVideo {
    pub path: PathBuf,
    pub frames: u32,
    /// Seconds of content the frame count was computed from
    pub duration: f64,
}

pub struct RenderOrchestrator {
    engine: Arc<dyn RenderEngine>,
    work_dir: PathBuf,
    render_timeout: Duration,
    fps: u32,
}

impl RenderOrchestrator {
    pub fn new(
        engine: Arc<dyn RenderEngine>,
        work_dir: impl Into<PathBuf>,
        render_timeout: Duration,
        fps: u32,
    ) -> Self {
        Self {
            engine,
            work_dir: work_dir.into(),
            render_timeout,
            fps,
        }
    }

    pub fn output_path(&self, job_id: &JobId) -> PathBuf {
        self.work_dir.join(format!("video-{job_id}.mp4"))
    }

    fn bundle_dir(&self, job_id: &JobId) -> PathBuf {
        self.work_dir.join(format!("bundle-{job_id}"))
    }

    /// Render `props` into a video of `duration` seconds (at least the minimum).
    ///
    /// The render call is abandoned after the configured timeout, which kills
    /// the renderer process and fails the job.
    pub async fn render(
        &self,
        job_id: &JobId,
        variant: VideoVariant,
        props: &serde_json::Value,
        duration: f64,
        temp: &TempFiles,
    ) -> WorkerResult<RenderedVideo> {
        tokio::fs::create_dir_all(&self.work_dir).await?;

        let bundle_dir = self.bundle_dir(job_id);
        temp.track(&bundle_dir);
        let bundle = self.engine.bundle(&bundle_dir).await?;

        let composition_id = variant.composition().as_str();
        let composition = self
            .engine
            .select_composition(&bundle, composition_id, props)
            .await?;

        let frames = frame_count(duration, self.fps);
        let composition = composition.with_duration_in_frames(frames);
        let output = self.output_path(job_id);
        temp.track(&output);

        let request = RenderRequest {
            composition,
            props: props.clone(),
            preset: variant.preset(),
            output,
        };

        info!(
            job_id = %job_id,
            composition = composition_id,
            frames,
            duration,
            "Rendering video"
        );
        let started = Instant::now();
        let path = tokio::time::timeout(self.render_timeout, self.engine.render(&bundle, &request))
            .await
            .map_err(|_| WorkerError::RenderTimeout(self.render_timeout.as_secs()))??;

        let elapsed = started.elapsed().as_secs_f64();
        record_render_duration(variant.as_str(), elapsed);
        info!(job_id = %job_id, elapsed_secs = elapsed, "Render finished");

        Ok(RenderedVideo {
            path,
            frames,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use vidgen_render::{Bundle, Composition, RenderError, RenderResult};

    struct StubEngine {
        compositions: Vec<&'static str>,
        render_delay: Duration,
        requests: Mutex<Vec<RenderRequest>>,
    }

    impl StubEngine {
        fn new(compositions: Vec<&'static str>, render_delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                compositions,
                render_delay,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RenderEngine for StubEngine {
        async fn bundle(&self, out_dir: &Path) -> RenderResult<Bundle> {
            tokio::fs::create_dir_all(out_dir).await?;
            Ok(Bundle {
                dir: out_dir.to_path_buf(),
            })
        }

        async fn list_compositions(
            &self,
            _bundle: &Bundle,
            _props: &serde_json::Value,
        ) -> RenderResult<Vec<Composition>> {
            Ok(self
                .compositions
                .iter()
                .map(|id| Composition {
                    id: id.to_string(),
                    fps: 60,
                    width: 1080,
                    height: 1920,
                    duration_in_frames: 1,
                })
                .collect())
        }

        async fn render(&self, _bundle: &Bundle, request: &RenderRequest) -> RenderResult<PathBuf> {
            self.requests.lock().unwrap().push(request.clone());
            tokio::time::sleep(self.render_delay).await;
            tokio::fs::write(&request.output, b"mp4").await?;
            Ok(request.output.clone())
        }
    }

    #[tokio::test]
    async fn test_short_narration_renders_minimum_length() {
        let dir = tempfile::tempdir().unwrap();
        let engine = StubEngine::new(vec!["SampleVideo", "QuizVideo"], Duration::ZERO);
        let orchestrator =
            RenderOrchestrator::new(engine.clone(), dir.path(), Duration::from_secs(120), 60);
        let temp = TempFiles::new();
        let job_id = JobId::from_string("job-a");

        let video = orchestrator
            .render(&job_id, VideoVariant::Narration, &serde_json::json!({}), 0.8, &temp)
            .await
            .unwrap();

        assert_eq!(video.frames, 300);
        assert_eq!(video.path, dir.path().join("video-job-a.mp4"));
        let request = engine.requests.lock().unwrap()[0].clone();
        assert_eq!(request.composition.id, "SampleVideo");
        assert_eq!(request.composition.duration_in_frames, 300);
        assert_eq!(request.preset.audio_bitrate, "320k");
        assert!(temp.paths().contains(&dir.path().join("bundle-job-a")));
        assert!(temp.paths().contains(&video.path));
    }

    #[tokio::test]
    async fn test_missing_composition_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let engine = StubEngine::new(vec!["SampleVideo"], Duration::ZERO);
        let orchestrator = RenderOrchestrator::new(engine, dir.path(), Duration::from_secs(120), 60);

        let err = orchestrator
            .render(
                &JobId::new(),
                VideoVariant::Quiz,
                &serde_json::json!({}),
                10.0,
                &TempFiles::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::CompositionNotFound(ref id) if id == "QuizVideo"));
        assert!(err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_past_timeout_fails() {
        let dir = tempfile::tempdir().unwrap();
        let engine = StubEngine::new(vec!["SampleVideo"], Duration::from_secs(600));
        let orchestrator = RenderOrchestrator::new(engine, dir.path(), Duration::from_secs(120), 60);

        let err = orchestrator
            .render(
                &JobId::new(),
                VideoVariant::Narration,
                &serde_json::json!({}),
                30.0,
                &TempFiles::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::RenderTimeout(120)));
    }

    #[test]
    fn test_render_error_keeps_stderr_context() {
        let err: WorkerError =
            RenderError::command_failed("npx", "render exited with 1", Some("boom".into()), Some(1))
                .into();
        assert_eq!(err.kind(), "render");
        assert!(err.to_string().ends_with("render exited with 1: boom"), "{err}");
    }
}
