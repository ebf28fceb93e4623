pub mod error;
pub mod policy;

pub use error::VersionError;
pub use policy::{
    compare_versions, derive_storage_key, model_name_from_filename, select_versions_to_evict,
    sort_newest_first, validate_model_name, VersionToken,
};
