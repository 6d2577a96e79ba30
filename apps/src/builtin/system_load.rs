use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ledmatrix::prelude::*;
use parking_lot::Mutex;

use super::common::{GLYPH_HEIGHT, draw_text};

pub static DESCRIPTOR: AppDescriptor = AppDescriptor {
    id: "system-load",
    name: "System Load",
    frame_rate: 5,
};

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const LOADAVG_PATH: &str = "/proc/loadavg";

#[derive(Debug, Default)]
struct Samples {
    latest: Option<[f32; 3]>,
    history: VecDeque<f32>,
}

impl Samples {
    fn push(&mut self, load: [f32; 3], capacity: usize) {
        self.latest = Some(load);
        self.history.push_back(load[0]);
        while self.history.len() > capacity {
            self.history.pop_front();
        }
    }
}

/// Polls the kernel load averages in the background and draws the 1 minute
/// value plus a scrolling bar history.
pub struct SystemLoad {
    lifecycle: AppLifecycle,
    source: PathBuf,
    samples: Arc<Mutex<Samples>>,
}

pub fn init() -> Result<Box<dyn MatrixApp>, AppError> {
    Ok(Box::new(SystemLoad::with_source(LOADAVG_PATH)))
}

impl SystemLoad {
    fn with_source(source: impl Into<PathBuf>) -> Self {
        Self {
            lifecycle: AppLifecycle::new(DESCRIPTOR.id),
            source: source.into(),
            samples: Arc::new(Mutex::new(Samples::default())),
        }
    }
}

/// First three fields of `/proc/loadavg`.
fn parse_loadavg(text: &str) -> Option<[f32; 3]> {
    let mut fields = text.split_whitespace().map(str::parse::<f32>);
    let one = fields.next()?.ok()?;
    let five = fields.next()?.ok()?;
    let fifteen = fields.next()?.ok()?;
    Some([one, five, fifteen])
}

async fn poll_loadavg(
    source: PathBuf,
    samples: Arc<Mutex<Samples>>,
    capacity: usize,
    cancel: CancelToken,
) -> Result<(), AppError> {
    loop {
        let text = tokio::fs::read_to_string(&source).await?;
        let load = parse_loadavg(&text).ok_or_else(|| {
            AppError::msg(format!("unexpected {} contents", source.display()))
        })?;
        samples.lock().push(load, capacity);

        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    }
}

fn load_color(load: f32) -> Pixel {
    // Green at idle through red at 2.0 and above.
    let hue = 120.0 * (1.0 - (load / 2.0).clamp(0.0, 1.0));
    Pixel::from_hsv(hue, 1.0, 1.0)
}

#[async_trait]
impl MatrixApp for SystemLoad {
    fn descriptor(&self) -> &'static AppDescriptor {
        &DESCRIPTOR
    }

    fn lifecycle(&self) -> Option<&AppLifecycle> {
        Some(&self.lifecycle)
    }

    async fn activate(
        &mut self,
        dimensions: Dimensions,
        _config: &AppConfig,
    ) -> Result<(), AppError> {
        let samples = self.samples.clone();
        let source = self.source.clone();
        let capacity = dimensions.width;

        self.lifecycle.run_in_background(move |cancel| {
            poll_loadavg(source, samples, capacity, cancel)
        });

        Ok(())
    }

    fn update(&mut self, _delta: Duration) -> Result<(), AppError> {
        Ok(())
    }

    fn render(&self, frame: &mut PixelBuffer) -> Result<(), AppError> {
        let samples = self.samples.lock();
        let Some(latest) = samples.latest else {
            draw_text(frame, "...", 1, 1, 1, Pixel::WHITE);
            return Ok(());
        };

        let label = format!("{:.2}", latest[0]);
        draw_text(frame, &label, 1, 1, 1, load_color(latest[0]));

        let top = GLYPH_HEIGHT + 2;
        let graph_height = frame.height() as i32 - top;
        if graph_height <= 0 {
            return Ok(());
        }

        let width = frame.width() as i32;
        let start = width - samples.history.len() as i32;
        for (i, load) in samples.history.iter().enumerate() {
            let level = (load / 4.0).clamp(0.0, 1.0);
            let bar = (level * graph_height as f32).ceil() as i32;
            let x = start + i as i32;
            let y = top + graph_height - bar;
            frame.fill_rect(x, y, 1, bar, load_color(*load));
        }

        Ok(())
    }
}
