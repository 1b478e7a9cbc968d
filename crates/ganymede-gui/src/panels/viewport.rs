use ganymede_core::gesture::GestureEvent;

use crate::app::GanymedeApp;
use crate::canvas::EguiCanvas;

/// Pointer speed (points/s) below which a released drag does not fling.
const MIN_FLING_SPEED: f32 = 50.0;
const WHEEL_ZOOM_RATE: f32 = 0.005;

pub fn show(ctx: &egui::Context, app: &mut GanymedeApp) {
    egui::CentralPanel::default()
        .frame(egui::Frame::NONE)
        .show(ctx, |ui| {
            let rect = ui.available_rect_before_wrap();
            paint_background(ui, rect);
            sync_size(app, rect);

            if app.viewer.source().is_none() {
                show_placeholder(ui);
                return;
            }

            let response = ui.allocate_rect(rect, egui::Sense::click_and_drag());
            let now = app.now_ms();
            for event in collect_gestures(ui, &response, rect) {
                app.viewer.on_gesture(event, now);
            }

            let painter = ui.painter_at(rect);
            let mut canvas = EguiCanvas::new(ctx, &painter, rect, &mut app.textures);
            app.viewer.draw(&mut canvas);
            app.textures.prune();

            if app.ui_state.loading {
                draw_label(ui, rect, "Loading...");
            }
        });
}

fn paint_background(ui: &egui::Ui, rect: egui::Rect) {
    ui.painter()
        .rect_filled(rect, 0.0, egui::Color32::from_gray(30));
}

fn sync_size(app: &mut GanymedeApp, rect: egui::Rect) {
    let size = (rect.width().max(1.0) as u32, rect.height().max(1.0) as u32);
    if app.ui_state.view_size != Some(size) {
        app.ui_state.view_size = Some(size);
        app.viewer.resize(size.0, size.1);
    }
}

/// Translate egui pointer input into viewer gestures, in panel coordinates.
fn collect_gestures(ui: &egui::Ui, response: &egui::Response, rect: egui::Rect) -> Vec<GestureEvent> {
    let mut events = Vec::new();
    let local = |p: egui::Pos2| p - rect.min;

    if response.drag_started() {
        events.push(GestureEvent::Down);
    }
    if response.dragged() {
        let d = response.drag_delta();
        if d != egui::Vec2::ZERO {
            events.push(GestureEvent::Scroll { dx: d.x, dy: d.y });
        }
    }
    if response.drag_stopped() {
        let v = ui.input(|i| i.pointer.velocity());
        if v.length() > MIN_FLING_SPEED {
            events.push(GestureEvent::Fling { vx: v.x, vy: v.y });
        }
        events.push(GestureEvent::Up);
    }

    if let Some(pos) = response.interact_pointer_pos() {
        let p = local(pos);
        if response.double_clicked() {
            events.push(GestureEvent::DoubleTap { x: p.x, y: p.y });
        } else if response.long_touched() || response.secondary_clicked() {
            events.push(GestureEvent::LongPress { x: p.x, y: p.y });
        } else if response.clicked() {
            events.push(GestureEvent::SingleTap { x: p.x, y: p.y });
        }
    }

    if response.hovered() {
        let (scroll, pinch, hover) = ui.input(|i| (i.smooth_scroll_delta.y, i.zoom_delta(), i.pointer.hover_pos()));
        let factor = pinch * (scroll * WHEEL_ZOOM_RATE).exp();
        if let Some(pos) = hover {
            if (factor - 1.0).abs() > f32::EPSILON {
                let p = local(pos);
                events.push(GestureEvent::Scale {
                    focus_x: p.x,
                    focus_y: p.y,
                    factor,
                });
            }
        }
    }
    events
}

fn draw_label(ui: &egui::Ui, rect: egui::Rect, label: &str) {
    let label_pos = rect.left_top() + egui::vec2(8.0, 8.0);
    ui.painter().text(
        label_pos,
        egui::Align2::LEFT_TOP,
        label,
        egui::FontId::proportional(14.0),
        egui::Color32::from_white_alpha(200),
    );
}

fn show_placeholder(ui: &mut egui::Ui) {
    ui.centered_and_justified(|ui| {
        ui.label(
            egui::RichText::new("Open an image to begin")
                .size(18.0)
                .color(egui::Color32::from_gray(100)),
        );
    });
}
