pub mod error;
pub mod reconcile;
pub mod repository;
pub mod session;
pub mod startup;

pub use error::{AppError, Result};
pub use reconcile::reconcile;
pub use repository::UserRepository;
pub use session::{
    DEFAULT_FETCH_URL, DEFAULT_SAMPLE_INTERVAL, FetchError, HttpPayloadFetcher, PayloadFetcher,
    SessionState, TrackingSession,
};
pub use startup::{AppPaths, ensure_app_data_dir};

pub use meter_store::{STORAGE_FILE_NAME, StoreError, UserStore};
