//! Render progress parsed from Remotion CLI output.

/// Render stage reported on a progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Rendering,
    Encoding,
}

/// One progress report, e.g. `Rendered 120/300`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderProgress {
    pub stage: RenderStage,
    pub done: u32,
    pub total: u32,
}

impl RenderProgress {
    /// Parse lines such as `Rendered 45/300, time remaining: 10s` or
    /// `Encoded 300/300`. Other lines yield `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        let (stage, rest) = if let Some(rest) = line.strip_prefix("Rendered ") {
            (RenderStage::Rendering, rest)
        } else if let Some(rest) = line.strip_prefix("Encoded ") {
            (RenderStage::Encoding, rest)
        } else {
            return None;
        };

        let fraction = rest.split([',', ' ']).next()?;
        let (done, total) = fraction.split_once('/')?;
        Some(Self {
            stage,
            done: done.parse().ok()?,
            total: total.parse().ok()?,
        })
    }

    /// Percentage complete, 0 when the total is unknown.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.done as f64 / self.total as f64 * 100.0).min(100.0)
    }
}
