//! musubi-bench: CLI tool for segmentation parameter experimentation
//! and diagnostics.
//!
//! Runs the segmentation engine on a given image file with configurable
//! parameters, printing per-phase diagnostics. Useful for:
//!
//! - Tuning the merge cutoff, absorption thresholds, and averaging rounds
//! - Comparing basic and boundary-weighted merging
//! - Measuring per-phase durations to identify bottlenecks
//! - Inspecting results visually via a colorized label-map PNG
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin musubi-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use image::{DynamicImage, Rgb, RgbImage};
use musubi_segment::{
    raster, ScalarField, SegmentError, Segmentation, Segmenter, SegmenterConfig, Silent,
};

/// Segmentation parameter experimentation and diagnostics for musubi.
///
/// Runs the segmentation engine on a given image with configurable
/// parameters and prints per-phase timing and count diagnostics.
#[derive(Parser)]
#[command(name = "musubi-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Feature channels fed to the engine.
    #[arg(long, value_enum, default_value_t = Channels::Luma)]
    channels: Channels,

    /// Merge cutoff distance in feature space.
    #[arg(long, default_value_t = SegmenterConfig::DEFAULT_CUTOFF)]
    cutoff: f32,

    /// Scale applied to every feature channel before distance tests.
    #[arg(long, default_value_t = 1.0)]
    scale: f32,

    /// Minimum segment size; smaller segments are absorbed into their
    /// nearest neighbor. Zero disables absorption.
    #[arg(long, default_value_t = SegmenterConfig::DEFAULT_MIN_MERGE)]
    min_merge: u32,

    /// Kill threshold; segments still smaller than this collapse into
    /// the sink segment (id 0). Only active when above --min-merge.
    #[arg(long, default_value_t = SegmenterConfig::DEFAULT_MIN_KILL)]
    min_kill: u32,

    /// Number of averaging rounds (coarsen-and-remerge).
    #[arg(long, default_value_t = SegmenterConfig::DEFAULT_AVERAGE_STEPS)]
    average_steps: u32,

    /// Enable boundary-weighted merging with this cutoff in (0, 1).
    /// The weight channel is derived from the image's Sobel gradient:
    /// high in smooth regions, low across strong edges.
    #[arg(long)]
    weight_cutoff: Option<f32>,

    /// Write a colorized label-map PNG to this path.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Full scalar config as a JSON string.
    ///
    /// When provided, --cutoff, --min-merge, --min-kill, and
    /// --average-steps are ignored. The JSON must be a valid
    /// `SegmenterConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Number of runs for timing comparison.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,
}

/// Feature channel selection.
#[derive(Clone, Copy, ValueEnum)]
enum Channels {
    /// Single luminance channel.
    Luma,
    /// Red, green, and blue channels.
    Rgb,
}

/// Build a [`SegmenterConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<SegmenterConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(SegmenterConfig {
        cutoff: cli.cutoff,
        min_merge: cli.min_merge,
        min_kill: cli.min_kill,
        average_steps: cli.average_steps,
    })
}

/// Assemble a configured engine from the decoded image and CLI flags.
fn build_segmenter(
    cli: &Cli,
    config: &SegmenterConfig,
    image: &DynamicImage,
) -> Result<Segmenter, SegmentError> {
    let mut segmenter = Segmenter::with_config(config);
    match cli.channels {
        Channels::Luma => {
            segmenter.add_feature(raster::luma_channel(&image.to_luma8()), cli.scale)?;
        }
        Channels::Rgb => {
            let [r, g, b]: [ScalarField; 3] = raster::rgb_channels(&image.to_rgba8());
            segmenter.add_feature(r, cli.scale)?;
            segmenter.add_feature(g, cli.scale)?;
            segmenter.add_feature(b, cli.scale)?;
        }
    }
    if let Some(weight_cutoff) = cli.weight_cutoff {
        segmenter.set_merge_weight(raster::smoothness_weight(&image.to_luma8()), weight_cutoff)?;
    }
    Ok(segmenter)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image = match image::open(&cli.image_path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    let (width, height) = image::GenericImageView::dimensions(&image);
    eprintln!(
        "Image: {} ({width}x{height})",
        cli.image_path.display(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut total_durations = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let segmenter = match build_segmenter(&cli, &config, &image) {
            Ok(segmenter) => segmenter,
            Err(e) => {
                eprintln!("Configuration error: {e}");
                return ExitCode::FAILURE;
            }
        };

        match segmenter.run_diagnosed(&mut Silent) {
            Ok((segmentation, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write the label map on the first run only.
                if run == 0
                    && let Some(ref out_path) = cli.out
                {
                    let sink_black = config.min_kill > config.min_merge;
                    let rendered = colorize(&segmentation, sink_black);
                    match rendered.save(out_path) {
                        Ok(()) => eprintln!("Label map written to {}", out_path.display()),
                        Err(e) => {
                            eprintln!("Error writing label map to {}: {e}", out_path.display());
                        }
                    }
                }

                total_durations.push(diagnostics.total_duration);
            }
            Err(e) => {
                eprintln!("Segmentation error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&total_durations);
    }

    ExitCode::SUCCESS
}

/// Print aggregated timing across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(durations: &[std::time::Duration]) {
    let total: f64 = durations.iter().map(std::time::Duration::as_secs_f64).sum();
    let mean = total / durations.len() as f64;
    let min = durations
        .iter()
        .map(std::time::Duration::as_secs_f64)
        .fold(f64::INFINITY, f64::min);
    let max = durations
        .iter()
        .map(std::time::Duration::as_secs_f64)
        .fold(0.0f64, f64::max);
    eprintln!(
        "=== {} runs: mean {mean:.4} s, min {min:.4} s, max {max:.4} s ===",
        durations.len(),
    );
}

/// Render the segmentation as a color image.
///
/// Segment ids map to hues by golden-angle stepping, which keeps
/// neighboring ids visually distinct for any segment count. When kill
/// mode was active, the sink (id 0) renders black.
fn colorize(segmentation: &Segmentation, sink_black: bool) -> RgbImage {
    let dims = segmentation.dimensions();
    RgbImage::from_fn(dims.width, dims.height, |x, y| {
        let id = segmentation.label(x, y);
        if sink_black && id == 0 {
            return Rgb([0, 0, 0]);
        }
        #[allow(clippy::cast_precision_loss)]
        let hue = (id as f32 * 137.507_77) % 360.0;
        Rgb(hsv_to_rgb(hue, 0.65, 0.95))
    })
}

/// Convert HSV (`h` in degrees, `s`/`v` in `[0, 1]`) to RGB bytes.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let c = v * s;
    let h_prime = h / 60.0;
    let x = c * (1.0 - (h_prime % 2.0 - 1.0).abs());
    let (r, g, b) = match h_prime as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    [
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    ]
}
