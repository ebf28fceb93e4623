pub mod error;
pub mod locks;
pub mod manager;
pub mod models;
pub mod retry;

pub use error::LifecycleError;
pub use manager::ArtifactManager;
pub use models::UploadFile;
