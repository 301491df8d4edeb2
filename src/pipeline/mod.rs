mod controller;
mod runner;

pub use controller::{PipelineController, PipelineState, StageTimings};
pub use runner::{apply_event, run_pipeline, spawn_stdin_controls};

use crate::compose::{ChannelOrder, Shape};
use crate::transform::{MAX_ZOOM, MIN_ZOOM};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_ZOOM: f32 = 2.0;
/// Not-live ticks between two reopen attempts (about one second at 30 fps)
pub const DEFAULT_RETRY_INTERVAL: u64 = 30;

/// Static settings fixed at startup
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Output canvas every live frame is scaled to
    pub canvas: (u32, u32),
    /// Flip frames horizontally before zooming
    pub mirror: bool,
    pub channel_order: ChannelOrder,
    pub retry_interval: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            canvas: (320, 320),
            mirror: true,
            channel_order: ChannelOrder::Rgb,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

/// User-adjustable knobs, read once per tick
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineParameters {
    zoom: f32,
    shape: Shape,
    cutout_enabled: bool,
}

impl Default for PipelineParameters {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            shape: Shape::Square,
            cutout_enabled: false,
        }
    }
}

impl PipelineParameters {
    pub fn new(zoom: f32, shape: Shape, cutout_enabled: bool) -> Self {
        let mut params = Self {
            shape,
            cutout_enabled,
            ..Self::default()
        };
        params.set_zoom(zoom);
        params
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn cutout_enabled(&self) -> bool {
        self.cutout_enabled
    }

    /// Clamp into [1.0, 3.0]. Non-finite values are ignored. Returns the
    /// stored zoom.
    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
        self.zoom
    }

    pub fn set_shape(&mut self, shape: Shape) {
        self.shape = shape;
    }

    fn set_cutout_enabled(&mut self, enabled: bool) {
        self.cutout_enabled = enabled;
    }
}

/// Control input coming from outside the tick loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    SetZoom(f32),
    SetShape(Shape),
    ToggleShape,
    SetCutout(bool),
    ToggleCutout,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("invalid argument for {command}: {value}")]
    InvalidArgument { command: String, value: String },
}

impl FromStr for ControlEvent {
    type Err = CommandError;

    /// `zoom <factor>`, `shape square|circle|toggle`, `cutout on|off|toggle`,
    /// `quit`
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().ok_or(CommandError::Empty)?.to_ascii_lowercase();
        let argument = words.next().map(str::to_ascii_lowercase);

        let invalid = |value: &str| CommandError::InvalidArgument {
            command: command.clone(),
            value: value.to_string(),
        };

        match (command.as_str(), argument.as_deref()) {
            ("zoom", Some(value)) => value
                .trim_end_matches('x')
                .parse::<f32>()
                .map(ControlEvent::SetZoom)
                .map_err(|_| invalid(value)),
            ("shape", None | Some("toggle")) => Ok(ControlEvent::ToggleShape),
            ("shape", Some("square")) => Ok(ControlEvent::SetShape(Shape::Square)),
            ("shape", Some("circle")) => Ok(ControlEvent::SetShape(Shape::Circle)),
            ("cutout", None | Some("toggle")) => Ok(ControlEvent::ToggleCutout),
            ("cutout", Some("on")) => Ok(ControlEvent::SetCutout(true)),
            ("cutout", Some("off")) => Ok(ControlEvent::SetCutout(false)),
            ("quit" | "q" | "exit", None) => Ok(ControlEvent::Quit),
            ("zoom" | "shape" | "cutout", Some(value)) => Err(invalid(value)),
            _ => Err(CommandError::Unknown(line.trim().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_is_clamped() {
        let mut params = PipelineParameters::default();
        assert_eq!(params.zoom(), 2.0);
        assert_eq!(params.set_zoom(0.2), 1.0);
        assert_eq!(params.set_zoom(9.0), 3.0);
        assert_eq!(params.set_zoom(f32::NAN), 3.0);
        assert_eq!(params.set_zoom(1.5), 1.5);
        assert_eq!(PipelineParameters::new(7.0, Shape::Circle, true).zoom(), 3.0);
    }

    #[test]
    fn parses_commands() {
        assert_eq!("zoom 2.5".parse::<ControlEvent>(), Ok(ControlEvent::SetZoom(2.5)));
        assert_eq!("ZOOM 1.5x".parse::<ControlEvent>(), Ok(ControlEvent::SetZoom(1.5)));
        assert_eq!("shape".parse::<ControlEvent>(), Ok(ControlEvent::ToggleShape));
        assert_eq!("shape circle".parse::<ControlEvent>(), Ok(ControlEvent::SetShape(Shape::Circle)));
        assert_eq!("cutout on".parse::<ControlEvent>(), Ok(ControlEvent::SetCutout(true)));
        assert_eq!("cutout".parse::<ControlEvent>(), Ok(ControlEvent::ToggleCutout));
        assert_eq!("  q ".parse::<ControlEvent>(), Ok(ControlEvent::Quit));
    }

    #[test]
    fn rejects_bad_commands() {
        assert_eq!("".parse::<ControlEvent>(), Err(CommandError::Empty));
        assert!(matches!("zoom wide".parse::<ControlEvent>(), Err(CommandError::InvalidArgument { .. })));
        assert!(matches!("shape hexagon".parse::<ControlEvent>(), Err(CommandError::InvalidArgument { .. })));
        assert!(matches!("dance".parse::<ControlEvent>(), Err(CommandError::Unknown(_))));
    }
}
