use crate::db::ArtifactRecord;
use serde::Serialize;

/// One page of the catalog, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelPage {
    pub models: Vec<ArtifactRecord>,
    pub current_page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u64,
}
