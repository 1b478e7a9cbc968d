use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use ganymede_core::config::ViewerConfig;
use ganymede_core::geometry::PointF;
use ganymede_core::scheduler::DecodePool;
use ganymede_core::viewer::{Viewer, ViewerEvent};
use tracing::{debug, info};

use crate::canvas::TextureCache;
use crate::panels;
use crate::state::UIState;

const CONFIG_FILE: &str = "ganymede.toml";

pub struct GanymedeApp {
    pub viewer: Viewer,
    /// File picker threads send chosen paths here.
    pub open_tx: mpsc::Sender<PathBuf>,
    open_rx: mpsc::Receiver<PathBuf>,
    pub ui_state: UIState,
    pub textures: TextureCache,
    started: Instant,
    pub show_about: bool,
}

impl GanymedeApp {
    pub fn new(ctx: &egui::Context) -> Result<Self> {
        let config = load_config(Path::new(CONFIG_FILE))?;

        // Decode results wake the UI so they are drained without input.
        let repaint = ctx.clone();
        let pool = DecodePool::new(config.decode_threads)?.with_waker(move || repaint.request_repaint());
        let viewer = Viewer::with_pool(config, pool)?;

        let (open_tx, open_rx) = mpsc::channel();
        Ok(Self {
            viewer,
            open_tx,
            open_rx,
            ui_state: UIState::default(),
            textures: TextureCache::default(),
            started: Instant::now(),
            show_about: false,
        })
    }

    pub fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn open(&mut self, path: PathBuf) {
        self.ui_state.add_log(format!("Opening: {}", path.display()));
        self.viewer.open(&path);
        self.ui_state.file_path = Some(path);
        self.ui_state.image_size = None;
        self.ui_state.loading = true;
    }

    pub fn rotate(&mut self) {
        let orientation = self.viewer.viewport().orientation().rotated_cw();
        self.viewer.set_orientation(orientation);
        self.ui_state.add_log(format!("Rotated to {orientation}"));
    }

    fn poll_open_requests(&mut self) {
        while let Ok(path) = self.open_rx.try_recv() {
            self.open(path);
        }
    }

    fn poll_events(&mut self) {
        for event in self.viewer.take_events() {
            match event {
                ViewerEvent::ImageReady { width, height } => {
                    self.ui_state.loading = false;
                    self.ui_state.image_size = Some((width, height));
                    self.ui_state.add_log(format!(
                        "Opened: {} ({}x{})",
                        self.ui_state.file_name().unwrap_or_default(),
                        width,
                        height
                    ));
                }
                ViewerEvent::ImageFailed => {
                    self.ui_state.loading = false;
                    self.ui_state.add_log(format!(
                        "ERROR: cannot decode {}",
                        self.ui_state.file_name().unwrap_or_default()
                    ));
                }
                ViewerEvent::SingleTap { x, y } => debug!(x, y, "Tap"),
                ViewerEvent::LongPress { x, y } => {
                    let p = self.viewer.viewport().transform_point(PointF::new(x, y));
                    self.ui_state
                        .add_log(format!("Long press at ({x:.0}, {y:.0}), frame ({:.0}, {:.0})", p.x, p.y));
                }
            }
        }
    }

    /// Ask egui for the next frame only when something is due.
    fn schedule_repaint(&self, ctx: &egui::Context, now: u64) {
        if self.viewer.is_animating() || self.viewer.needs_redraw() {
            ctx.request_repaint();
        } else if let Some(due) = self.viewer.next_wakeup() {
            ctx.request_repaint_after(Duration::from_millis(due.saturating_sub(now)));
        }
    }
}

impl eframe::App for GanymedeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_open_requests();
        let now = self.now_ms();
        self.viewer.advance(now);
        self.poll_events();

        panels::menu_bar::show(ctx, self);
        panels::status::show(ctx, self);
        panels::viewport::show(ctx, self);
        self.poll_events();

        if self.show_about {
            egui::Window::new("About Ganymede")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.heading("Ganymede");
                        ui.label("Progressive Large Image Viewer");
                        ui.add_space(8.0);
                        ui.label(format!("Version {}", env!("CARGO_PKG_VERSION")));
                        ui.add_space(8.0);
                        if ui.button("Close").clicked() {
                            self.show_about = false;
                        }
                    });
                });
        }

        self.schedule_repaint(ctx, now);
    }
}

fn load_config(path: &Path) -> Result<ViewerConfig> {
    if !path.exists() {
        return Ok(ViewerConfig::default());
    }
    let config = ViewerConfig::load(path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    info!(path = %path.display(), "Loaded viewer config");
    Ok(config)
}
