mod capture;
mod compose;
mod diagnostics;
mod error;
mod output;
mod pipeline;
mod segmentation;
#[cfg(test)]
mod testing;
mod transform;

use anyhow::{Context, Result};
use capture::{permission::NokhwaAuthorization, DeviceHandle, PermissionGate};
use clap::Parser;
use compose::{ChannelOrder, Shape};
use diagnostics::DiagnosticsSink;
use output::V4L2Output;
use pipeline::{PipelineConfig, PipelineController, PipelineParameters};
use segmentation::TensorLayout;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Output v4l2loopback device path
    #[arg(short, long, default_value = "/dev/video10")]
    output_device: String,

    /// Requested capture resolution width
    #[arg(long, default_value_t = 1280)]
    capture_width: u32,

    /// Requested capture resolution height
    #[arg(long, default_value_t = 720)]
    capture_height: u32,

    /// Canvas width every frame is scaled to
    #[arg(long, default_value_t = 320, value_parser = clap::value_parser!(u32).range(1..))]
    canvas_width: u32,

    /// Canvas height every frame is scaled to
    #[arg(long, default_value_t = 320, value_parser = clap::value_parser!(u32).range(1..))]
    canvas_height: u32,

    /// Output resolution width (defaults to the canvas width)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    output_width: Option<u32>,

    /// Output resolution height (defaults to the canvas height)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    output_height: Option<u32>,

    /// Target frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Initial zoom factor (1.0 - 3.0)
    #[arg(long, default_value_t = pipeline::DEFAULT_ZOOM)]
    zoom: f32,

    /// Initial display shape
    #[arg(long, value_enum, default_value_t = Shape::Square)]
    shape: Shape,

    /// Start with background removal on
    #[arg(long)]
    cutout: bool,

    /// Do not mirror the camera image
    #[arg(long)]
    no_mirror: bool,

    /// Channel order handed to the presentation surface
    #[arg(long, value_enum, default_value_t = ChannelOrder::Rgb)]
    channel_order: ChannelOrder,

    /// Path to the segmentation model (ONNX file)
    /// If not provided, the model is looked up next to the executable
    #[arg(long)]
    model: Option<PathBuf>,

    /// Side of the square model input
    #[arg(long, default_value_t = 256)]
    model_input_size: u32,

    /// Input tensor layout of the model
    #[arg(long, value_enum, default_value_t = TensorLayout::Nhwc)]
    model_layout: TensorLayout,

    /// File that receives the message of the current placeholder
    #[arg(long)]
    diagnostics_path: Option<PathBuf>,

    /// Ticks between camera reopen attempts while it is unavailable
    #[arg(long, default_value_t = pipeline::DEFAULT_RETRY_INTERVAL)]
    retry_interval: u64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Camera overlay starting");
    tracing::info!("Capture: {}x{}", args.capture_width, args.capture_height);
    tracing::info!("Canvas: {}x{}", args.canvas_width, args.canvas_height);
    tracing::info!("Target FPS: {}", args.fps);

    let config = PipelineConfig {
        canvas: (args.canvas_width, args.canvas_height),
        mirror: !args.no_mirror,
        channel_order: args.channel_order,
        retry_interval: args.retry_interval,
    };

    let diagnostics = match args.diagnostics_path.clone().or_else(DiagnosticsSink::default_path) {
        Some(path) => {
            tracing::info!("Placeholder messages go to {}", path.display());
            DiagnosticsSink::new(path)
        }
        None => {
            tracing::warn!("No diagnostics path available");
            DiagnosticsSink::disabled()
        }
    };

    let device = DeviceHandle::new(capture::platform_backends(
        args.input_device,
        args.capture_width,
        args.capture_height,
    ));
    let permission = PermissionGate::new(Box::new(NokhwaAuthorization));
    let engine = segmentation::create_default_engine(args.model.clone(), args.model_input_size, args.model_layout);
    let params = PipelineParameters::new(args.zoom, args.shape, args.cutout);

    // Initialize output
    let mut output = V4L2Output::new(
        &args.output_device,
        args.output_width.unwrap_or(args.canvas_width),
        args.output_height.unwrap_or(args.canvas_height),
    )
    .context("Failed to initialize v4l2loopback output")?;

    let mut controller = PipelineController::new(config, device, permission, engine, diagnostics, params);
    controller.start();

    let events = pipeline::spawn_stdin_controls();
    pipeline::run_pipeline(&mut controller, &mut output, events, args.fps);

    tracing::info!("Camera overlay stopped");
    Ok(())
}
