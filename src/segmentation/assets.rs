use crate::error::InitError;
use std::path::{Path, PathBuf};

/// Model file location relative to an asset directory
pub const MODEL_RELPATH: &str = "models/selfie_segmentation.onnx";

/// Finds the segmentation model on disk
pub trait AssetResolver {
    /// Path of the model file, or the list of directories that were searched
    fn resolve_model_assets(&self) -> Result<PathBuf, InitError>;
}

/// Searches the directories an installed build ships its assets in,
/// relative to the running executable.
pub struct InstallLayout {
    explicit: Option<PathBuf>,
    candidates: Vec<PathBuf>,
}

impl InstallLayout {
    /// Candidates for the current executable. An explicit model path, when
    /// given, is the only place looked at.
    pub fn for_current_exe(explicit: Option<PathBuf>) -> Self {
        let candidates = match std::env::current_exe() {
            Ok(exe) => Self::candidate_dirs(&exe),
            Err(err) => {
                tracing::warn!("Cannot locate the running executable: {}", err);
                Vec::new()
            }
        };
        Self { explicit, candidates }
    }

    #[cfg(test)]
    pub fn with_candidates(explicit: Option<PathBuf>, candidates: Vec<PathBuf>) -> Self {
        Self { explicit, candidates }
    }

    /// Bundle `Resources` and `Frameworks` next to `Contents/MacOS`, a
    /// `share/` tree beside `bin/`, then the executable's own directory.
    pub fn candidate_dirs(exe: &Path) -> Vec<PathBuf> {
        let Some(exe_dir) = exe.parent() else {
            return Vec::new();
        };
        let mut dirs = Vec::new();
        if let Some(prefix) = exe_dir.parent() {
            dirs.push(prefix.join("Resources"));
            dirs.push(prefix.join("Frameworks"));
            dirs.push(prefix.join("share").join("camera-overlay"));
        }
        dirs.push(exe_dir.to_path_buf());
        dirs
    }
}

impl AssetResolver for InstallLayout {
    fn resolve_model_assets(&self) -> Result<PathBuf, InitError> {
        if let Some(path) = &self.explicit {
            if path.is_file() {
                return Ok(path.clone());
            }
            return Err(InitError::ModelAssetsMissing {
                searched: vec![path.clone()],
            });
        }

        for dir in &self.candidates {
            let path = dir.join(MODEL_RELPATH);
            if path.is_file() {
                tracing::info!("Segmentation assets found in {}", dir.display());
                return Ok(path);
            }
        }

        Err(InitError::ModelAssetsMissing {
            searched: self.candidates.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn candidates_follow_bundle_layout() {
        let dirs = InstallLayout::candidate_dirs(Path::new("/Apps/Overlay.app/Contents/MacOS/overlay"));
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/Apps/Overlay.app/Contents/Resources"),
                PathBuf::from("/Apps/Overlay.app/Contents/Frameworks"),
                PathBuf::from("/Apps/Overlay.app/Contents/share/camera-overlay"),
                PathBuf::from("/Apps/Overlay.app/Contents/MacOS"),
            ]
        );
    }

    #[test]
    fn first_candidate_with_model_wins() {
        let root = tempfile::tempdir().unwrap();
        let resources = root.path().join("Resources");
        let frameworks = root.path().join("Frameworks");
        fs::create_dir_all(frameworks.join("models")).unwrap();
        fs::write(frameworks.join(MODEL_RELPATH), b"onnx").unwrap();

        let layout = InstallLayout::with_candidates(None, vec![resources, frameworks.clone()]);

        assert_eq!(layout.resolve_model_assets().unwrap(), frameworks.join(MODEL_RELPATH));
    }

    #[test]
    fn miss_reports_searched_dirs() {
        let root = tempfile::tempdir().unwrap();
        let candidates = vec![root.path().join("Resources"), root.path().join("Frameworks")];
        let layout = InstallLayout::with_candidates(None, candidates.clone());

        match layout.resolve_model_assets() {
            Err(InitError::ModelAssetsMissing { searched }) => assert_eq!(searched, candidates),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn explicit_path_overrides_candidates() {
        let root = tempfile::tempdir().unwrap();
        let model = root.path().join("custom.onnx");
        let layout = InstallLayout::with_candidates(Some(model.clone()), vec![root.path().to_path_buf()]);
        assert!(layout.resolve_model_assets().is_err());

        fs::write(&model, b"onnx").unwrap();
        assert_eq!(layout.resolve_model_assets().unwrap(), model);
    }
}
