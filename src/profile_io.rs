use std::fs;
use std::path::{Path, PathBuf};

use crate::error::IoError;
use crate::models::ProfileConfig;

/// `photo.jpg` → `photo.lumen.json` in the same directory.
pub fn sidecar_path(image_path: &Path) -> PathBuf {
    let mut file_name = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "profile".to_string());
    file_name.push_str(".lumen.json");
    image_path
        .parent()
        .map(|p| p.join(&file_name))
        .unwrap_or_else(|| PathBuf::from(file_name))
}

pub fn load_profile(path: &Path) -> Result<ProfileConfig, IoError> {
    let data = fs::read_to_string(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| IoError::Profile {
        path: path.to_path_buf(),
        source,
    })
}

/// Profile stored next to `image_path`, if there is one.
pub fn load_sidecar(image_path: &Path) -> Result<Option<ProfileConfig>, IoError> {
    let path = sidecar_path(image_path);
    if !path.exists() {
        return Ok(None);
    }
    load_profile(&path).map(Some)
}

pub fn save_profile(path: &Path, profile: &ProfileConfig) -> Result<(), IoError> {
    let serialized = serde_json::to_string_pretty(profile)?;
    fs::write(path, serialized).map_err(|source| IoError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Vignette;

    #[test]
    fn sidecar_sits_next_to_the_image() {
        let path = sidecar_path(Path::new("/shots/roll1/img_0042.CR2"));
        assert_eq!(path, PathBuf::from("/shots/roll1/img_0042.lumen.json"));
    }

    #[test]
    fn saved_profile_loads_back() {
        let dir = std::env::temp_dir().join(format!("lumen-profile-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("look.json");

        let mut profile = ProfileConfig::default();
        profile.name = Some("Faded".into());
        profile.adjustments.contrast = Some(0.8);
        profile.vignette = Some(Vignette::with_amount(-15.0));
        save_profile(&path, &profile).unwrap();

        assert_eq!(load_profile(&path).unwrap(), profile);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn malformed_profile_names_the_file() {
        let dir = std::env::temp_dir().join(format!("lumen-bad-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        fs::write(&path, "{\"grain\": \"lots\"}").unwrap();
        let err = load_profile(&path).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
        fs::remove_dir_all(&dir).unwrap();
    }
}
