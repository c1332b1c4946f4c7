use std::path::PathBuf;

use crate::error::Result;
use meter_store::STORAGE_FILE_NAME;

#[derive(Clone, Debug)]
pub struct AppPaths {
    pub app_data_dir: PathBuf,
    pub users_path: PathBuf,
}

impl AppPaths {
    pub fn new(app_data_dir: PathBuf) -> Self {
        let users_path = app_data_dir.join(STORAGE_FILE_NAME);
        Self {
            app_data_dir,
            users_path,
        }
    }
}

pub fn ensure_app_data_dir(paths: &AppPaths) -> Result<()> {
    std::fs::create_dir_all(&paths.app_data_dir).map_err(meter_store::StoreError::from)?;
    Ok(())
}
