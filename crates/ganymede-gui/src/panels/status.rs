use crate::app::GanymedeApp;

pub fn show(ctx: &egui::Context, app: &mut GanymedeApp) {
    egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
        ui.add_space(2.0);

        // Log area, fixed height for 3 lines.
        let line_height = ui.text_style_height(&egui::TextStyle::Body);
        let spacing = ui.spacing().item_spacing.y;
        let log_height = line_height * 3.0 + spacing * 2.0;

        egui::ScrollArea::vertical()
            .max_height(log_height)
            .min_scrolled_height(log_height)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                if app.ui_state.log_messages.is_empty() {
                    for _ in 0..3 {
                        ui.label("");
                    }
                } else {
                    for msg in &app.ui_state.log_messages {
                        ui.label(msg);
                    }
                }
            });

        ui.horizontal(|ui| {
            if let Some((w, h)) = app.ui_state.image_size {
                ui.label(format!("{w}x{h}"));
                ui.separator();
            }
            let viewport = app.viewer.viewport();
            if viewport.is_ready() {
                ui.label(format!("Zoom: {:.1}%", viewport.scale() * 100.0));
                ui.separator();
                ui.label(format!("Rotation: {}", viewport.orientation()));
                ui.separator();
            }
            if let Some(source) = app.viewer.source() {
                if let Some(sample) = source.current_sample() {
                    ui.label(format!("Sample: 1/{sample}"));
                    ui.separator();
                }
                let pending = source.pending_decodes();
                if pending > 0 {
                    ui.label(format!("Decoding {pending}"));
                    ui.separator();
                }
            }
            ui.label(format!("Textures: {}", app.textures.len()));
        });

        ui.add_space(2.0);
    });
}
