//! egui windows and overlays, each an `impl FractalGenApp` block.

mod capture;
mod controls;
mod hud;
mod settings;
