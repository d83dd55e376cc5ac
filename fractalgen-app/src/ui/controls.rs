use std::str::FromStr;

use eframe::egui;

use fractalgen_core::{ColorMode, ExplorerControls, FractalVariant, GotoTarget, Rgb};

use crate::app::FractalGenApp;

/// Parse one text field, naming it in the error.
pub(crate) fn parse_field<T: FromStr>(name: &str, text: &str) -> Result<T, String> {
    text.trim()
        .parse::<T>()
        .map_err(|_| format!("{name}: \"{}\" is not a number", text.trim()))
}

/// Build a jump target from the coordinate fields. `R` wins over `M`; the
/// two are kept in sync while typing.
pub(crate) fn parse_goto(
    x: &str,
    y: &str,
    radius: &str,
    iterations: &str,
) -> Result<GotoTarget, String> {
    Ok(GotoTarget {
        x: parse_field("X", x)?,
        y: parse_field("Y", y)?,
        radius: parse_field("R", radius)?,
        iterations: parse_field("Iterations", iterations)?,
    })
}

impl FractalGenApp {
    pub(crate) fn show_controls_window(&mut self, ctx: &egui::Context) {
        if !self.show_controls {
            return;
        }

        let mut open = true;
        egui::Window::new("Controls")
            .open(&mut open)
            .resizable(true)
            .default_width(300.0)
            .frame(
                egui::Frame::window(&ctx.style())
                    .fill(egui::Color32::from_rgba_unmultiplied(10, 10, 10, 210)),
            )
            .show(ctx, |ui| {
                let locked = self.explorer.is_capturing();
                if locked {
                    ui.colored_label(
                        egui::Color32::from_rgb(255, 180, 50),
                        "View is locked while a capture runs",
                    );
                }

                ui.add_enabled_ui(!locked, |ui| {
                    self.draw_view_controls(ui);
                    ui.separator();
                    self.draw_coordinate_inputs(ui);
                });

                ui.separator();
                ui.horizontal(|ui| {
                    let mut single = self.explorer.single_mode();
                    if ui.checkbox(&mut single, "Single dispatch").changed() {
                        self.explorer.set_single_mode(single);
                    }
                    if ui
                        .add_enabled(single && !locked, egui::Button::new("Run!"))
                        .clicked()
                    {
                        self.explorer.request_dispatch();
                    }
                });

                ui.separator();
                ui.horizontal(|ui| {
                    ui.toggle_value(&mut self.show_capture, "Capture...");
                    ui.toggle_value(&mut self.show_settings, "Settings...");
                });

                if let Some(status) = self.status.clone() {
                    ui.separator();
                    ui.horizontal_wrapped(|ui| {
                        ui.colored_label(egui::Color32::from_rgb(255, 180, 50), status);
                        if ui.small_button("Clear").clicked() {
                            self.status = None;
                        }
                    });
                }
            });

        if !open {
            self.show_controls = false;
        }
    }

    fn draw_view_controls(&mut self, ui: &mut egui::Ui) {
        let vp = self.explorer.viewport().clone();

        ui.horizontal(|ui| {
            ui.label(format!("Iterations: {}", vp.iterations()));
            for delta in [-10i64, -1, 1, 10] {
                if ui.small_button(format!("{delta:+}")).clicked() {
                    self.explorer.adjust_iterations(delta);
                }
            }
        });

        let mut double = vp.uses_double_precision();
        if ui.checkbox(&mut double, "Double precision").changed() {
            self.explorer.set_double_precision(double);
        }

        ui.horizontal(|ui| {
            ui.label("Fractal:");
            let mut variant = vp.fractal_variant();
            egui::ComboBox::from_id_salt(egui::Id::new("fractal_variant"))
                .selected_text(variant.label())
                .show_ui(ui, |ui| {
                    for v in FractalVariant::ALL {
                        ui.selectable_value(&mut variant, v, v.label());
                    }
                });
            if variant != vp.fractal_variant() {
                self.explorer.set_fractal_variant(variant);
            }
        });

        ui.horizontal(|ui| {
            ui.label("Color:");
            let mut mode = vp.color_mode();
            for m in ColorMode::ALL {
                ui.radio_value(&mut mode, m, m.label());
            }
            if mode != vp.color_mode() {
                self.explorer.set_color_mode(mode);
            }
            if mode == ColorMode::SingleColor {
                let mut rgb = vp.single_color().to_array();
                if ui.color_edit_button_rgb(&mut rgb).changed() {
                    self.explorer.set_single_color(Rgb::from_array(rgb));
                }
            }
        });
    }

    fn draw_coordinate_inputs(&mut self, ui: &mut egui::Ui) {
        ui.label("Coordinates");
        egui::Grid::new("goto_fields")
            .num_columns(2)
            .spacing([8.0, 4.0])
            .show(ui, |ui| {
                ui.label("X:");
                ui.text_edit_singleline(&mut self.goto_fields.x);
                ui.end_row();

                ui.label("Y:");
                ui.text_edit_singleline(&mut self.goto_fields.y);
                ui.end_row();

                ui.label("R:");
                if ui.text_edit_singleline(&mut self.goto_fields.radius).changed() {
                    if let Ok(r) = self.goto_fields.radius.trim().parse::<f64>() {
                        self.goto_fields.magnitude = format!("{:e}", 1.0 / r);
                    }
                }
                ui.end_row();

                ui.label("M:");
                if ui
                    .text_edit_singleline(&mut self.goto_fields.magnitude)
                    .changed()
                {
                    if let Ok(m) = self.goto_fields.magnitude.trim().parse::<f64>() {
                        self.goto_fields.radius = format!("{:e}", 1.0 / m);
                    }
                }
                ui.end_row();

                ui.label("Iterations:");
                ui.text_edit_singleline(&mut self.goto_fields.iterations);
                ui.end_row();
            });

        ui.horizontal(|ui| {
            if ui.button("Go!").clicked() {
                self.apply_goto();
            }
            if ui.button("Input To Center").clicked() {
                self.fill_goto_from_view();
            }
        });
    }

    fn apply_goto(&mut self) {
        let f = &self.goto_fields;
        let target = match parse_goto(&f.x, &f.y, &f.radius, &f.iterations) {
            Ok(target) => target,
            Err(message) => {
                self.set_status(message);
                return;
            }
        };
        match self.explorer.go_to(&target) {
            Ok(()) => {
                self.status = None;
                self.fill_goto_from_view();
            }
            Err(e) => self.set_status(e.to_string()),
        }
    }
}
