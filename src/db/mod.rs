pub mod database;
pub mod error;
#[cfg(test)]
pub mod fake;
pub mod models;
pub mod postgres;

pub use database::MetadataStore;
pub use error::DatabaseError;
#[cfg(test)]
pub use fake::FakeDatabase;
pub use models::{ArtifactRecord, NewArtifactRecord, RecordPage};
pub use postgres::PostgresDatabase;
