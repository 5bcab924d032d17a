// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Sketchboard - diagram editor
//!
//! A desktop application for laying out labelled shapes on a canvas,
//! marking circular regions on a reference image, and capturing media.

mod app;
mod capture;
mod config;
mod interaction;
mod io;
mod models;
mod store;
mod ui;
mod util;

use anyhow::Result;
use app::SketchboardApp;
use config::AppConfig;

fn main() -> Result<()> {
    let config = AppConfig::load()?;

    // Initialize logging
    let default_level = if config.debug_logging { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    log::info!("Using data directory {}", config.data_dir.display());

    let [width, height] = config.window_size;
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([width, height])
            .with_min_inner_size([800.0, 600.0])
            .with_title("Sketchboard"),
        ..Default::default()
    };

    // Run the application
    eframe::run_native(
        "Sketchboard",
        options,
        Box::new(move |cc| Ok(Box::new(SketchboardApp::new(cc, config)))),
    )
    .map_err(|e| anyhow::anyhow!("Application error: {}", e))?;

    Ok(())
}
