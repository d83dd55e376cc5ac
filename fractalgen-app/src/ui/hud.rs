use eframe::egui;

use fractalgen_core::ExplorerControls;

use crate::app::{FractalGenApp, HUD_CORNER_RADIUS, HUD_MARGIN};

const HUD_ALPHA: u8 = 170;

impl FractalGenApp {
    pub(crate) fn show_hud(&mut self, ctx: &egui::Context) {
        if !self.show_hud {
            return;
        }

        // -- Bottom-left: view read-outs --
        egui::Area::new(egui::Id::new("hud_params"))
            .anchor(egui::Align2::LEFT_BOTTOM, [HUD_MARGIN, -HUD_MARGIN])
            .show(ctx, |ui| {
                egui::Frame::NONE
                    .fill(egui::Color32::from_black_alpha(HUD_ALPHA))
                    .inner_margin(egui::Margin::same(8))
                    .corner_radius(HUD_CORNER_RADIUS)
                    .show(ui, |ui| {
                        ui.style_mut().visuals.override_text_color =
                            Some(egui::Color32::from_rgb(220, 220, 220));
                        ui.style_mut().spacing.item_spacing.y = 2.0;

                        let vp = self.explorer.viewport();
                        let target = self.explorer.current_target();
                        ui.label(format!("Magnification: {:.4e}", vp.magnitude()));
                        ui.label(format!("R: {:.4e}", vp.scale()));
                        ui.label(format!("Center: {:.10} {:+.10}", target.x, target.y));
                        ui.label(format!(
                            "Iterations: {}  {}",
                            vp.iterations(),
                            vp.fractal_variant().label()
                        ));
                        ui.label(format!(
                            "Precision: {}",
                            self.explorer.active_precision().label()
                        ));
                        if self.explorer.precision_hint() {
                            ui.colored_label(
                                egui::Color32::from_rgb(255, 180, 50),
                                "Single precision exhausted, enable double precision",
                            );
                        }
                    });
            });

        // -- Bottom-right: timing and mode --
        egui::Area::new(egui::Id::new("hud_render"))
            .anchor(egui::Align2::RIGHT_BOTTOM, [-HUD_MARGIN, -HUD_MARGIN])
            .show(ctx, |ui| {
                egui::Frame::NONE
                    .fill(egui::Color32::from_black_alpha(HUD_ALPHA))
                    .inner_margin(egui::Margin::same(8))
                    .corner_radius(HUD_CORNER_RADIUS)
                    .show(ui, |ui| {
                        ui.set_min_width(140.0);
                        ui.style_mut().visuals.override_text_color =
                            Some(egui::Color32::from_rgb(200, 200, 200));
                        ui.style_mut().spacing.item_spacing.y = 2.0;

                        match self.explorer.average_frame_time() {
                            Some(avg) => {
                                ui.label(format!("{:.1} ms / frame", avg.as_secs_f64() * 1000.0))
                            }
                            None => ui.label("-- ms / frame"),
                        };

                        let (color, text) = if self.explorer.is_capturing() {
                            (egui::Color32::YELLOW, "Capturing")
                        } else if self.explorer.single_mode() {
                            (egui::Color32::GRAY, "Single dispatch")
                        } else {
                            (egui::Color32::from_rgb(100, 255, 100), "Continuous")
                        };
                        ui.colored_label(color, text);

                        if let Some(p) = self.explorer.capture_progress() {
                            ui.label(format!("Frame {} / {}", p.frame_index, p.total_frames));
                        }
                    });
            });
    }
}
