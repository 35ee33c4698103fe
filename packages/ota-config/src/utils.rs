use std::{env, io, path::PathBuf};

pub struct DataDir {
    pub data_dir: PathBuf,
}

#[cfg(all(
    target_family = "unix",
    not(target_os = "macos"),
    not(target_os = "android")
))]
pub fn all_dir() -> Result<DataDir, io::Error> {
    let home_dir = env::var("HOME")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not found"))
        .map(PathBuf::from)?;
    let data_dir = home_dir.join(".local/share/ota-updater/");
    Ok(DataDir { data_dir })
}

#[cfg(target_os = "macos")]
pub fn all_dir() -> Result<DataDir, io::Error> {
    let home_dir = env::var("HOME")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not found"))
        .map(PathBuf::from)?;
    let data_dir = home_dir.join("Library/Application Support/ota-updater/");
    Ok(DataDir { data_dir })
}

#[cfg(target_family = "windows")]
pub fn all_dir() -> Result<DataDir, io::Error> {
    let home_dir = env::var("APPDATA")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "APPDATA not found"))
        .map(PathBuf::from)?;
    let data_dir = home_dir.join("ota-updater/data/");
    Ok(DataDir { data_dir })
}

#[cfg(target_os = "android")]
pub fn all_dir() -> Result<DataDir, io::Error> {
    let data_dir = PathBuf::from("/data/adb/ota-updater/");
    Ok(DataDir { data_dir })
}

/// Data directory, `DATA_DIR` taking precedence over the per-OS default.
pub fn get_data_path() -> Result<PathBuf, io::Error> {
    match env::var("DATA_DIR") {
        Ok(dir) if !dir.trim().is_empty() => Ok(PathBuf::from(dir)),
        _ => all_dir().map(|dirs| dirs.data_dir),
    }
}
