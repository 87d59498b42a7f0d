//! Rendering engine seam and the Remotion CLI implementation.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info};

use vidgen_models::RenderPreset;

use crate::command::{ProcessRunner, RemotionCommand};
use crate::composition::{self, parse_compositions, Composition};
use crate::error::{RenderError, RenderResult};

/// A bundled render project ready to be served to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    /// Directory produced by the bundler
    pub dir: PathBuf,
}

impl Bundle {
    fn props_path(&self) -> PathBuf {
        self.dir.join("input-props.json")
    }
}

/// One render to a local file.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Composition with its frame count already overridden
    pub composition: Composition,
    pub props: serde_json::Value,
    pub preset: RenderPreset,
    pub output: PathBuf,
}

/// Bundle, list compositions, render.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Bundle the project into `out_dir`.
    async fn bundle(&self, out_dir: &Path) -> RenderResult<Bundle>;

    /// Compositions available in `bundle` given these input props.
    async fn list_compositions(
        &self,
        bundle: &Bundle,
        props: &serde_json::Value,
    ) -> RenderResult<Vec<Composition>>;

    /// Render to `request.output` and return the written path.
    async fn render(&self, bundle: &Bundle, request: &RenderRequest) -> RenderResult<PathBuf>;

    /// Look up one composition; `CompositionNotFound` if it is absent.
    async fn select_composition(
        &self,
        bundle: &Bundle,
        id: &str,
        props: &serde_json::Value,
    ) -> RenderResult<Composition> {
        let all = self.list_compositions(bundle, props).await?;
        composition::select(&all, id)
    }
}

/// Configuration for the Remotion CLI engine.
#[derive(Debug, Clone)]
pub struct RemotionConfig {
    /// Program and leading args, e.g. `npx remotion`
    pub launcher: Vec<String>,
    /// Remotion project directory (where `node_modules` lives)
    pub project_dir: PathBuf,
    /// Entry point relative to the project directory
    pub entry_point: PathBuf,
    pub bundle_timeout: Duration,
    pub compositions_timeout: Duration,
}

impl RemotionConfig {
    pub fn new(project_dir: impl Into<PathBuf>, entry_point: impl Into<PathBuf>) -> Self {
        Self {
            launcher: vec!["npx".to_string(), "remotion".to_string()],
            project_dir: project_dir.into(),
            entry_point: entry_point.into(),
            bundle_timeout: Duration::from_secs(120),
            compositions_timeout: Duration::from_secs(60),
        }
    }
}

/// Renders through the `remotion` CLI.
pub struct RemotionEngine {
    config: RemotionConfig,
}

impl RemotionEngine {
    pub fn new(config: RemotionConfig) -> Self {
        Self { config }
    }

    fn runner(&self) -> ProcessRunner {
        ProcessRunner::new().in_dir(&self.config.project_dir)
    }

    async fn write_props(bundle: &Bundle, props: &serde_json::Value) -> RenderResult<PathBuf> {
        let path = bundle.props_path();
        tokio::fs::write(&path, serde_json::to_vec(props)?).await?;
        Ok(path)
    }
}

/// Input props with the composition's frame count injected.
fn props_with_duration(props: &serde_json::Value, frames: u32) -> serde_json::Value {
    let mut props = props.clone();
    if let Some(map) = props.as_object_mut() {
        map.insert("durationInFrames".to_string(), frames.into());
    }
    props
}

/// Render flags for a request.
fn render_flags(cmd: RemotionCommand, request: &RenderRequest, props_file: &Path) -> RemotionCommand {
    let preset = &request.preset;
    let cmd = cmd
        .flag("props", props_file.to_string_lossy())
        .flag("codec", &preset.codec)
        .flag("pixel-format", &preset.pixel_format)
        .flag("audio-bitrate", &preset.audio_bitrate)
        .flag("concurrency", preset.concurrency)
        .flag("gl", &preset.gl_renderer)
        .flag("every-nth-frame", preset.every_nth_frame)
        .flag("frames", request.composition.frame_range());
    if preset.muted {
        cmd.flag("muted", true)
    } else {
        cmd
    }
}

#[async_trait]
impl RenderEngine for RemotionEngine {
    async fn bundle(&self, out_dir: &Path) -> RenderResult<Bundle> {
        let start = Instant::now();
        let cmd = RemotionCommand::bundle(&self.config.launcher, &self.config.entry_point, out_dir);
        self.runner()
            .with_timeout(self.config.bundle_timeout)
            .run(&cmd)
            .await?;

        info!(
            dir = %out_dir.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Bundled render project"
        );
        Ok(Bundle {
            dir: out_dir.to_path_buf(),
        })
    }

    async fn list_compositions(
        &self,
        bundle: &Bundle,
        props: &serde_json::Value,
    ) -> RenderResult<Vec<Composition>> {
        let props_file = Self::write_props(bundle, props).await?;
        let cmd = RemotionCommand::compositions(&self.config.launcher, &bundle.dir, &props_file);
        let output = self
            .runner()
            .with_timeout(self.config.compositions_timeout)
            .run(&cmd)
            .await?;

        let compositions = parse_compositions(&output.stdout);
        debug!(count = compositions.len(), "Listed compositions");
        Ok(compositions)
    }

    async fn render(&self, bundle: &Bundle, request: &RenderRequest) -> RenderResult<PathBuf> {
        let props = props_with_duration(&request.props, request.composition.duration_in_frames);
        let props_file = Self::write_props(bundle, &props).await?;

        let cmd = RemotionCommand::render(
            &self.config.launcher,
            &bundle.dir,
            &request.composition.id,
            &request.output,
        );
        let cmd = render_flags(cmd, request, &props_file);

        let composition_id = request.composition.id.clone();
        self.runner()
            .run_with_progress(&cmd, move |p| {
                let step = (p.total / 10).max(1);
                if p.done % step == 0 {
                    debug!(
                        composition = %composition_id,
                        stage = ?p.stage,
                        percent = p.percentage(),
                        "Render progress"
                    );
                }
            })
            .await?;

        if !request.output.exists() {
            return Err(RenderError::FileNotFound(request.output.clone()));
        }
        Ok(request.output.clone())
    }
}
