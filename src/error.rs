use std::path::PathBuf;
use thiserror::Error;

/// No capture backend could be opened
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Permission(#[from] PermissionError),
}

/// The platform refused camera access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PermissionError {
    #[error("camera permission is off. allow it in system settings.")]
    Denied,
    #[error("camera access is restricted on this system.")]
    Restricted,
}

/// Segmentation model could not be brought up
#[derive(Debug, Clone, Error)]
pub enum InitError {
    #[error("{}", missing_message(.searched))]
    ModelAssetsMissing { searched: Vec<PathBuf> },
    #[error("background removal failed to initialize.\n{0}")]
    ModelConstructionFailed(String),
}

fn missing_message(searched: &[PathBuf]) -> String {
    let mut message = String::from("segmentation model not found.\n");
    for dir in searched {
        message.push_str(&format!("searched: {}\n", dir.display()));
    }
    message.push_str("rebuild the app.");
    message
}

/// Failures raised while a tick is running
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("frame read failed: {0}")]
    TransientReadFailure(String),
    #[error("composite failed: {0}")]
    UnexpectedCompositeFailure(String),
    #[error("segmentation model used before it was ready")]
    ModelNotReady,
    #[error("segmentation inference failed: {0:#}")]
    Inference(anyhow::Error),
}
