use std::time::Duration;

use eframe::egui;

use fractalgen_core::capture::video_duration;
use fractalgen_core::{CaptureSettings, CaptureState, ExplorerControls, IterationGrowth};
use fractalgen_render::FrameFormat;

use crate::app::{CaptureFields, FractalGenApp};

/// `mm:ss`, or `h:mm:ss` past an hour.
pub(crate) fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

/// Merge the typed range into `current`. `None` while a field does not
/// parse.
pub(crate) fn parse_capture_fields(
    fields: &CaptureFields,
    current: CaptureSettings,
) -> Option<CaptureSettings> {
    let min_magnitude = fields.min_magnitude.trim().parse().ok()?;
    let max_magnitude = fields.max_magnitude.trim().parse().ok()?;
    Some(CaptureSettings {
        min_magnitude,
        max_magnitude,
        ..current
    })
}

impl FractalGenApp {
    pub(crate) fn show_capture_window(&mut self, ctx: &egui::Context) {
        if !self.show_capture {
            return;
        }

        let mut open = true;
        egui::Window::new("Capture")
            .open(&mut open)
            .resizable(true)
            .default_width(340.0)
            .frame(
                egui::Frame::window(&ctx.style())
                    .fill(egui::Color32::from_rgba_unmultiplied(10, 10, 10, 210)),
            )
            .show(ctx, |ui| {
                let running = self.explorer.is_capturing();
                ui.add_enabled_ui(!running, |ui| {
                    self.draw_capture_range(ui);
                    ui.add_space(6.0);
                    self.draw_capture_output(ui);
                });

                ui.separator();
                ui.horizontal(|ui| {
                    if ui
                        .add_enabled(!running, egui::Button::new("Start capture"))
                        .clicked()
                    {
                        self.start_capture();
                    }
                    if ui
                        .add_enabled(running, egui::Button::new("Stop"))
                        .clicked()
                    {
                        self.stop_capture();
                    }
                });

                self.draw_capture_progress(ui);
            });

        if !open {
            self.show_capture = false;
        }
    }

    fn draw_capture_range(&mut self, ui: &mut egui::Ui) {
        let mut settings = self.explorer.capture_settings();
        let mut changed = false;

        egui::Grid::new("capture_range")
            .num_columns(2)
            .spacing([8.0, 4.0])
            .show(ui, |ui| {
                ui.label("Start magnitude:");
                changed |= ui
                    .text_edit_singleline(&mut self.capture_fields.min_magnitude)
                    .changed();
                ui.end_row();

                ui.label("Stop magnitude:");
                changed |= ui
                    .text_edit_singleline(&mut self.capture_fields.max_magnitude)
                    .changed();
                ui.end_row();

                ui.label("Multiplier per frame:");
                changed |= ui
                    .add(
                        egui::DragValue::new(&mut settings.multiplier)
                            .speed(0.01)
                            .range(1.001..=100.0)
                            .max_decimals(4),
                    )
                    .changed();
                ui.end_row();
            });

        if changed {
            match parse_capture_fields(&self.capture_fields, settings) {
                Some(parsed) => self.explorer.set_capture_settings(parsed),
                None => self.explorer.set_capture_settings(CaptureSettings {
                    multiplier: settings.multiplier,
                    ..self.explorer.capture_settings()
                }),
            }
        }

        match self.explorer.planned_frames() {
            Ok(frames) => {
                ui.label(format!("Frames to generate: {frames}"));
                ui.label(format!(
                    "Video length: {} at 30 fps, {} at 60 fps",
                    format_duration(video_duration(frames, 30.0)),
                    format_duration(video_duration(frames, 60.0)),
                ));
            }
            Err(e) => {
                ui.colored_label(egui::Color32::from_rgb(255, 100, 100), e.to_string());
            }
        }

        ui.horizontal(|ui| {
            ui.label("Iteration growth:");
            let mut growth = self.explorer.iteration_growth();
            egui::ComboBox::from_id_salt(egui::Id::new("iteration_growth"))
                .selected_text(growth.label())
                .show_ui(ui, |ui| {
                    let factor = match growth {
                        IterationGrowth::Geometric { factor } => factor,
                        _ => 1.05,
                    };
                    for option in [
                        IterationGrowth::Fixed,
                        IterationGrowth::MatchMultiplier,
                        IterationGrowth::Geometric { factor },
                    ] {
                        ui.selectable_value(&mut growth, option, option.label());
                    }
                });
            if let IterationGrowth::Geometric { factor } = &mut growth {
                ui.add(
                    egui::DragValue::new(factor)
                        .speed(0.001)
                        .range(0.5..=4.0)
                        .prefix("x"),
                );
            }
            if growth != self.explorer.iteration_growth() {
                self.explorer.set_iteration_growth(growth);
            }
        });
    }

    fn draw_capture_output(&mut self, ui: &mut egui::Ui) {
        ui.label("Output folder:");
        ui.add(
            egui::TextEdit::singleline(&mut self.capture_dir_buf)
                .desired_width(ui.available_width()),
        );
        ui.horizontal(|ui| {
            if ui.small_button("Browse...").clicked() {
                let start = std::path::Path::new(&self.capture_dir_buf);
                let mut dialog = rfd::FileDialog::new();
                if start.is_dir() {
                    dialog = dialog.set_directory(start);
                }
                if let Some(folder) = dialog.pick_folder() {
                    self.capture_dir_buf = folder.to_string_lossy().to_string();
                }
            }
            if ui.small_button("Reset").clicked() {
                self.preferences.capture_dir = String::new();
                self.capture_dir_buf = self
                    .preferences
                    .capture_root()
                    .to_string_lossy()
                    .to_string();
            }

            ui.label("Format:");
            egui::ComboBox::from_id_salt(egui::Id::new("frame_format"))
                .selected_text(self.preferences.frame_format.label())
                .show_ui(ui, |ui| {
                    for format in FrameFormat::ALL {
                        ui.selectable_value(
                            &mut self.preferences.frame_format,
                            format,
                            format.label(),
                        );
                    }
                });
        });
    }

    fn start_capture(&mut self) {
        self.sync_preferences();
        self.sink.root = self.preferences.capture_root();
        self.sink.format = self.preferences.frame_format;
        self.save_failures = 0;
        self.last_saved = None;
        match self.explorer.start_capture() {
            Ok(()) => {
                self.status = None;
                self.preferences.save();
            }
            Err(e) => self.set_status(e.to_string()),
        }
    }

    fn draw_capture_progress(&mut self, ui: &mut egui::Ui) {
        if let Some(p) = self.explorer.capture_progress() {
            ui.separator();
            let color = match p.state {
                CaptureState::Running => egui::Color32::YELLOW,
                CaptureState::Completing => egui::Color32::from_rgb(100, 255, 100),
                CaptureState::Idle => egui::Color32::GRAY,
            };
            ui.colored_label(color, format!("{} (session {})", p.state.label(), p.session_id));
            let fraction = if p.total_frames > 0 {
                p.frame_index as f32 / p.total_frames as f32
            } else {
                1.0
            };
            ui.add(
                egui::ProgressBar::new(fraction)
                    .text(format!("Frame {} / {}", p.frame_index, p.total_frames)),
            );
            ui.label(format!("Magnitude: {:.4e}", p.current_magnitude));
            ui.label(format!("Elapsed: {}", format_duration(p.elapsed)));
            if let Some(eta) = p.estimated_remaining {
                ui.label(format!("Remaining: ~{}", format_duration(eta)));
            }
            if let Some(last) = p.last_frame_time {
                ui.label(format!("Last frame: {:.1} ms", last.as_secs_f64() * 1000.0));
            }
            ui.label(format!(
                "Queued: {}  Skipped: {}  Write errors: {}",
                p.frames_saved, p.frames_failed, self.save_failures
            ));
        } else if let Some(summary) = self.explorer.last_capture() {
            ui.separator();
            ui.label(format!(
                "Last session {}: {} frames, {} saved, {} skipped{}",
                summary.session_id,
                summary.frames_dispatched,
                summary.frames_saved,
                summary.frames_failed,
                if summary.cancelled { " (cancelled)" } else { "" },
            ));
            ui.label(format!("Took {}", format_duration(summary.elapsed)));
        }

        if let Some(path) = &self.last_saved {
            ui.label(format!("Last file: {}", path.display()));
        }
    }
}
