use crate::catalog::error::CatalogError;
use crate::catalog::models::ModelPage;
use crate::db::MetadataStore;
use std::sync::Arc;
use tracing::{debug, info};

pub const MAX_PAGE_SIZE: u32 = 100;

/// Read-only paginated view over the metadata store
pub struct CatalogService<D: MetadataStore> {
    database: Arc<D>,
}

impl<D: MetadataStore> CatalogService<D> {
    pub fn new(database: D) -> Self {
        CatalogService {
            database: Arc::new(database),
        }
    }

    /// List page `page` (1-based). `page_size` is clamped into `1..=100`;
    /// a page past the end comes back empty.
    pub async fn list_page(&self, page: u32, page_size: i64) -> Result<ModelPage, CatalogError> {
        if page == 0 {
            return Err(CatalogError::InvalidArgument(
                "page must be at least 1".to_string(),
            ));
        }

        let page_size = clamp_page_size(page_size);
        let offset = u64::from(page - 1) * u64::from(page_size);
        debug!(
            "Listing page {} (size {}, offset {})",
            page, page_size, offset
        );

        let result = self
            .database
            .get_page(offset, u64::from(page_size))
            .await?;
        let total_pages = result.total_count.div_ceil(u64::from(page_size));

        info!(
            "Listed page {}/{}: {} of {} records",
            page,
            total_pages,
            result.records.len(),
            result.total_count
        );

        Ok(ModelPage {
            models: result.records,
            current_page: page,
            page_size,
            total_count: result.total_count,
            total_pages,
        })
    }
}

fn clamp_page_size(page_size: i64) -> u32 {
    // Bounded to 1..=100, so the cast is lossless
    page_size.clamp(1, i64::from(MAX_PAGE_SIZE)) as u32
}

#[cfg(test)]
mod tests {
    use super::clamp_page_size;

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(clamp_page_size(0), 1);
        assert_eq!(clamp_page_size(-5), 1);
        assert_eq!(clamp_page_size(10), 10);
        assert_eq!(clamp_page_size(100), 100);
        assert_eq!(clamp_page_size(1000), 100);
    }
}
