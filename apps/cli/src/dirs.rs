use std::path::PathBuf;

use meter_app::STORAGE_FILE_NAME;

#[derive(Debug, Clone)]
pub struct DataDirResolution {
    pub dir: PathBuf,
    pub matched_existing: bool,
}

pub fn resolve_data_dir() -> Result<DataDirResolution, String> {
    if let Ok(dir) = std::env::var("DATA_METER_DIR") {
        let dir = PathBuf::from(dir);
        let matched_existing = dir.join(STORAGE_FILE_NAME).exists();
        return Ok(DataDirResolution {
            dir,
            matched_existing,
        });
    }

    let home = std::env::var("HOME").map_err(|err| format!("resolve HOME: {}", err))?;
    let base = PathBuf::from(home).join(".local").join("share");

    let candidates = [base.join("data-meter"), base.join("DataMeter")];
    for candidate in candidates {
        if candidate.join(STORAGE_FILE_NAME).exists() {
            return Ok(DataDirResolution {
                dir: candidate,
                matched_existing: true,
            });
        }
    }

    Ok(DataDirResolution {
        dir: base.join("data-meter"),
        matched_existing: false,
    })
}
