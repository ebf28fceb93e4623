pub mod error;
pub mod models;
pub mod service;

pub use error::CatalogError;
pub use models::ModelPage;
pub use service::CatalogService;
