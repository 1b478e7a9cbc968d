use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Args;
use ganymede_core::config::ViewerConfig;
use ganymede_core::geometry::Orientation;
use ganymede_core::gesture::GestureEvent;
use ganymede_core::render::SoftwareCanvas;
use ganymede_core::viewer::{Viewer, ViewerEvent};
use image::Rgba;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use crate::commands::{parse_point, parse_size};

const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);
const TICK: Duration = Duration::from_millis(4);

#[derive(Args)]
pub struct RenderArgs {
    /// Input image file
    pub file: PathBuf,

    /// Output PNG file
    #[arg(short, long)]
    pub output: PathBuf,

    /// View size in pixels
    #[arg(long, default_value = "800x600", value_parser = parse_size)]
    pub window: (u32, u32),

    /// Clockwise rotation in degrees (0, 90, 180, 270)
    #[arg(long, default_value_t = 0)]
    pub orientation: u32,

    /// Absolute scale to zoom to, around --focus
    #[arg(long)]
    pub zoom: Option<f32>,

    /// Zoom focus in view pixels (default: view center)
    #[arg(long, value_parser = parse_point)]
    pub focus: Option<(f32, f32)>,

    /// Drag the image by this many view pixels
    #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
    pub pan: Option<(f32, f32)>,

    /// Double tap at a view point and let the zoom animation finish
    #[arg(long, value_parser = parse_point)]
    pub double_tap: Option<(f32, f32)>,

    /// Viewer config TOML file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Give up waiting for decodes after this many seconds
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,
}

/// Headless host: real clock, software canvas, polling instead of a frame loop.
struct Host {
    viewer: Viewer,
    started: Instant,
    deadline: Instant,
}

impl Host {
    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn tick(&mut self) -> Result<()> {
        if Instant::now() > self.deadline {
            bail!("Timed out waiting for the image to settle");
        }
        std::thread::sleep(TICK);
        let now = self.now_ms();
        self.viewer.advance(now);
        Ok(())
    }

    fn wait_ready(&mut self, pb: &ProgressBar) -> Result<(u32, u32)> {
        pb.set_message("Probing image");
        loop {
            for event in self.viewer.take_events() {
                match event {
                    ViewerEvent::ImageReady { width, height } => return Ok((width, height)),
                    ViewerEvent::ImageFailed => bail!("Image could not be decoded"),
                    _ => {}
                }
            }
            self.tick()?;
            pb.tick();
        }
    }

    fn finish_animation(&mut self) -> Result<()> {
        while self.viewer.is_animating() {
            self.tick()?;
        }
        Ok(())
    }

    /// Draw until nothing is pending: every draw may request finer tiles.
    fn settle(&mut self, scratch: &mut SoftwareCanvas, pb: &ProgressBar) -> Result<()> {
        loop {
            self.viewer.draw(scratch);
            let pending = self
                .viewer
                .source()
                .map_or(0, |s| s.pending_decodes());
            if pending == 0 && self.viewer.is_idle() {
                return Ok(());
            }
            pb.set_message(format!("Decoding {pending} tile(s)"));
            pb.tick();
            self.tick()?;
        }
    }
}

pub fn run(args: &RenderArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => ViewerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ViewerConfig::default(),
    };
    let Some(orientation) = Orientation::from_degrees(args.orientation) else {
        bail!("orientation must be 0, 90, 180 or 270, got {}", args.orientation);
    };
    let (view_w, view_h) = args.window;

    let mut viewer = Viewer::new(config)?;
    viewer.resize(view_w, view_h);
    viewer.set_orientation(orientation);
    viewer.open(&args.file);

    let started = Instant::now();
    let mut host = Host {
        viewer,
        started,
        deadline: started + Duration::from_secs(args.timeout),
    };

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner} {msg} [{elapsed}]")?);

    let (width, height) = host.wait_ready(&pb)?;
    debug!(width, height, "Image ready");

    if let Some(zoom) = args.zoom {
        let (x, y) = args
            .focus
            .unwrap_or((view_w as f32 / 2.0, view_h as f32 / 2.0));
        let factor = zoom / host.viewer.viewport().scale();
        let now = host.now_ms();
        host.viewer.on_gesture(
            GestureEvent::Scale {
                focus_x: x,
                focus_y: y,
                factor,
            },
            now,
        );
    }
    if let Some((dx, dy)) = args.pan {
        let now = host.now_ms();
        host.viewer.on_gesture(GestureEvent::Down, now);
        host.viewer.on_gesture(GestureEvent::Scroll { dx, dy }, now);
        host.viewer.on_gesture(GestureEvent::Up, now);
    }
    if let Some((x, y)) = args.double_tap {
        let now = host.now_ms();
        host.viewer.on_gesture(GestureEvent::DoubleTap { x, y }, now);
        host.finish_animation()?;
    }

    let mut canvas = SoftwareCanvas::new(view_w, view_h);
    host.settle(&mut canvas, &pb)?;
    pb.finish_and_clear();

    canvas.clear(BACKGROUND);
    host.viewer.draw(&mut canvas);
    let scale = host.viewer.viewport().scale();
    let sample = host.viewer.source().and_then(|s| s.current_sample());

    canvas
        .into_image()
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!(
        "{}x{} image at scale {:.4}{} saved to {}",
        width,
        height,
        scale,
        sample.map_or(String::new(), |s| format!(" (sample 1/{s})")),
        args.output.display()
    );

    Ok(())
}
