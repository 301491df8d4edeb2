use super::{ControlEvent, PipelineController};
use crate::output::PresentationSurface;
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, Instant};

/// Apply one control event. Returns `false` once the pipeline should stop.
pub fn apply_event(controller: &mut PipelineController, event: ControlEvent) -> bool {
    match event {
        ControlEvent::SetZoom(zoom) => {
            let zoom = controller.set_zoom(zoom);
            tracing::info!("Zoom {:.1}x", zoom);
        }
        ControlEvent::SetShape(shape) => controller.set_shape(shape),
        ControlEvent::ToggleShape => {
            let shape = controller.params().shape().toggled();
            controller.set_shape(shape);
            tracing::info!("Shape {:?}", shape);
        }
        ControlEvent::SetCutout(enabled) => {
            if let Err(err) = controller.set_cutout_enabled(enabled) {
                tracing::warn!("Background removal not enabled: {}", err);
            }
        }
        ControlEvent::ToggleCutout => {
            let enabled = !controller.params().cutout_enabled();
            if let Err(err) = controller.set_cutout_enabled(enabled) {
                tracing::warn!("Background removal not enabled: {}", err);
            }
        }
        ControlEvent::Quit => return false,
    }
    true
}

/// Read text commands from stdin on a separate thread
pub fn spawn_stdin_controls() -> Receiver<ControlEvent> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    tracing::warn!("Control input failed: {}", err);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<ControlEvent>() {
                Ok(event) => {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                Err(err) => tracing::warn!("{}", err),
            }
        }
    });
    rx
}

/// Drive the controller at `target_fps` until a quit event arrives
pub fn run_pipeline<O>(
    controller: &mut PipelineController,
    output: &mut O,
    events: Receiver<ControlEvent>,
    target_fps: u32,
) where
    O: PresentationSurface,
{
    let frame_duration = Duration::from_secs_f32(1.0 / target_fps.max(1) as f32);
    let mut frame_count = 0u64;
    let mut total_capture_time = Duration::ZERO;
    let mut total_segment_time = Duration::ZERO;
    let mut total_compose_time = Duration::ZERO;
    let mut total_output_time = Duration::ZERO;
    let mut controls_open = true;
    let started = Instant::now();

    tracing::info!("Starting main pipeline loop");
    tracing::info!("Commands: zoom <1.0-3.0>, shape [square|circle], cutout [on|off], quit");

    'ticks: loop {
        let loop_start = Instant::now();

        while controls_open {
            match events.try_recv() {
                Ok(event) => {
                    if !apply_event(controller, event) {
                        tracing::info!("Quit requested");
                        break 'ticks;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::info!("Control input closed");
                    controls_open = false;
                }
            }
        }

        if let Some(bitmap) = controller.tick() {
            let output_start = Instant::now();
            if let Err(err) = output.present(bitmap) {
                tracing::warn!("Failed to present frame: {:#}", err);
            }
            total_output_time += output_start.elapsed();
        }

        let timings = controller.timings();
        total_capture_time += timings.capture;
        total_segment_time += timings.segment;
        total_compose_time += timings.transform + timings.compose;
        frame_count += 1;

        // Log stats every 30 frames
        if frame_count % 30 == 0 {
            let avg = |total: Duration| total.as_secs_f64() * 1000.0 / frame_count as f64;
            let total_ms = avg(total_capture_time)
                + avg(total_segment_time)
                + avg(total_compose_time)
                + avg(total_output_time);
            let fps = frame_count as f64 / started.elapsed().as_secs_f64().max(f64::EPSILON);
            tracing::debug!(
                "Frame {}: capture={:.1}ms, segment={:.1}ms, compose={:.1}ms, output={:.1}ms, total={:.1}ms, fps={:.1}, state={:?}, device={:?}, reopens={}",
                frame_count,
                avg(total_capture_time),
                avg(total_segment_time),
                avg(total_compose_time),
                avg(total_output_time),
                total_ms,
                fps,
                controller.state(),
                controller.device().state(),
                controller.reopen_attempts()
            );
        }

        // Frame rate limiting
        let elapsed = loop_start.elapsed();
        if elapsed < frame_duration {
            std::thread::sleep(frame_duration - elapsed);
        }
    }

    controller.shutdown();
}
