use eframe::egui;

use fractalgen_core::viewport::{MAX_ITERATIONS, MIN_ITERATIONS};
use fractalgen_core::ExplorerControls;

use crate::app::FractalGenApp;

impl FractalGenApp {
    pub(crate) fn show_settings_window(&mut self, ctx: &egui::Context) {
        if !self.show_settings {
            return;
        }

        let mut open = true;
        egui::Window::new("Settings")
            .open(&mut open)
            .resizable(true)
            .default_width(320.0)
            .frame(
                egui::Frame::window(&ctx.style())
                    .fill(egui::Color32::from_rgba_unmultiplied(10, 10, 10, 210)),
            )
            .show(ctx, |ui| {
                if ui
                    .checkbox(
                        &mut self.preferences.restore_last_view,
                        "Restore last view on startup",
                    )
                    .changed()
                {
                    self.preferences.save();
                }

                ui.add_space(6.0);
                let mut sensitivity = self.explorer.zoom_sensitivity();
                if ui
                    .add(
                        egui::Slider::new(&mut sensitivity, 0.01..=1.0)
                            .logarithmic(true)
                            .text("Zoom sensitivity"),
                    )
                    .changed()
                {
                    self.explorer.set_zoom_sensitivity(sensitivity);
                    self.preferences.zoom_sensitivity = sensitivity;
                    self.preferences.save();
                }

                ui.add_space(10.0);
                ui.heading("Renderer");
                let current = self.explorer.resolution();
                ui.label(format!(
                    "Output: {}x{} on {} threads",
                    current.width,
                    current.height,
                    self.explorer.dispatcher().kernel().thread_count()
                ));
                ui.horizontal(|ui| {
                    ui.label("Resolution:");
                    let res = &mut self.preferences.output_resolution;
                    let mut changed = ui
                        .add(egui::DragValue::new(&mut res.width).range(16..=7680))
                        .changed();
                    ui.label("x");
                    changed |= ui
                        .add(egui::DragValue::new(&mut res.height).range(16..=4320))
                        .changed();
                    if changed {
                        self.preferences.save();
                    }
                });
                ui.horizontal(|ui| {
                    ui.label("Threads (0 = auto):");
                    if ui
                        .add(egui::DragValue::new(&mut self.preferences.kernel_threads).range(0..=256))
                        .changed()
                    {
                        self.preferences.save();
                    }
                });
                ui.horizontal(|ui| {
                    ui.label("Default iterations:");
                    if ui
                        .add(
                            egui::DragValue::new(&mut self.preferences.default_iterations)
                                .range(MIN_ITERATIONS..=MAX_ITERATIONS),
                        )
                        .changed()
                    {
                        self.preferences.save();
                    }
                });
                ui.label("(resolution, threads and default iterations apply on restart)");
            });

        if !open {
            self.show_settings = false;
        }
    }
}
