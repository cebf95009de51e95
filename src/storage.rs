use anyhow::{Context, Result};
use deskup_vision::Calibration;
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory holding persisted state. `DESKUP_STORE_PREFIX` at build time wins over
/// the per-user data directory.
pub static STORE_PREFIX: Lazy<PathBuf> = Lazy::new(|| match option_env!("DESKUP_STORE_PREFIX") {
    Some(prefix) => PathBuf::from(prefix),
    None => ProjectDirs::from("", "", "deskup")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("deskup")),
});

const CALIBRATION_FILE: &str = "calibration.bin";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub pixels_per_cm: f32,
    /// Height the user reported when calibrating.
    pub reported_height_cm: f32,
}

impl CalibrationRecord {
    pub fn new(calibration: Calibration, reported_height_cm: f32) -> Self {
        Self {
            pixels_per_cm: calibration.pixels_per_cm(),
            reported_height_cm,
        }
    }

    /// The stored scale, rechecked since the file may have been edited.
    pub fn calibration(&self) -> Result<Calibration> {
        Calibration::new(self.pixels_per_cm).context("stored calibration is invalid")
    }
}

fn calibration_file(dir: Option<&Path>) -> PathBuf {
    dir.unwrap_or(&STORE_PREFIX).join(CALIBRATION_FILE)
}

pub fn load_calibration(dir: Option<&Path>) -> Result<Option<CalibrationRecord>> {
    let file = calibration_file(dir);
    if !file.exists() {
        return Ok(None);
    }
    let data = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
    let record: CalibrationRecord =
        postcard::from_bytes(&data).with_context(|| format!("decoding {}", file.display()))?;
    record.calibration()?;
    Ok(Some(record))
}

pub fn save_calibration(record: &CalibrationRecord, dir: Option<&Path>) -> Result<()> {
    let file = calibration_file(dir);
    if let Some(parent) = file.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let data = postcard::to_allocvec(record)?;
    std::fs::write(&file, data).with_context(|| format!("writing {}", file.display()))?;
    Ok(())
}

/// Remove any stored calibration. Returns whether one existed.
pub fn clear_calibration(dir: Option<&Path>) -> Result<bool> {
    let file = calibration_file(dir);
    if !file.exists() {
        return Ok(false);
    }
    std::fs::remove_file(&file).with_context(|| format!("removing {}", file.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("deskup-store-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_empty_store() {
        let dir = scratch("empty");
        assert_eq!(load_calibration(Some(&dir)).unwrap(), None);
        assert!(!clear_calibration(Some(&dir)).unwrap());
    }

    #[test]
    fn test_save_load_clear() {
        let dir = scratch("cycle");
        let record = CalibrationRecord::new(Calibration::new(10.0).unwrap(), 180.0);
        save_calibration(&record, Some(&dir)).unwrap();

        let loaded = load_calibration(Some(&dir)).unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.calibration().unwrap().pixels_per_cm(), 10.0);

        assert!(clear_calibration(Some(&dir)).unwrap());
        assert_eq!(load_calibration(Some(&dir)).unwrap(), None);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_invalid_stored_scale_rejected() {
        let dir = scratch("invalid");
        let record = CalibrationRecord {
            pixels_per_cm: -1.0,
            reported_height_cm: 170.0,
        };
        save_calibration(&record, Some(&dir)).unwrap();
        assert!(load_calibration(Some(&dir)).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_corrupt_file_rejected() {
        let dir = scratch("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CALIBRATION_FILE), [0xff]).unwrap();
        assert!(load_calibration(Some(&dir)).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
