use std::sync::Arc;

use async_trait::async_trait;

use crate::adapters::catalog::FunctionCatalog;
use crate::adapters::AdapterError;
use crate::runtime::contract::{
    default_log_group_name, NormalizedEnumerateRequest, Page, ValidationError, WorkUnit,
};
use crate::runtime::pagination::{advance_cursor, resume_cursor};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error(transparent)]
    InvalidToken(#[from] ValidationError),

    #[error(transparent)]
    Upstream(#[from] AdapterError),
}

/// Produces one page of work units per call. Implementations must hand back a
/// continuation token exactly when more units remain.
#[async_trait]
pub trait WorkUnitSource: Send + Sync {
    async fn fetch_page(&self, request: &NormalizedEnumerateRequest) -> Result<Page, SourceError>;
}

#[async_trait]
impl<T: WorkUnitSource + ?Sized> WorkUnitSource for Arc<T> {
    async fn fetch_page(&self, request: &NormalizedEnumerateRequest) -> Result<Page, SourceError> {
        (**self).fetch_page(request).await
    }
}

/// Walks every function of every requested region, one listing page per
/// call. Regions are visited in the caller's order, or sorted when they are
/// discovered from the account.
pub struct RegionalFunctionSource<C> {
    catalog: C,
}

impl<C: FunctionCatalog> RegionalFunctionSource<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    async fn resolve_regions(
        &self,
        request: &NormalizedEnumerateRequest,
    ) -> Result<Vec<String>, AdapterError> {
        if let Some(explicit) = &request.regions {
            return Ok(explicit.clone());
        }

        let mut discovered = self.catalog.enabled_regions().await?;
        discovered.sort();
        discovered.dedup();
        Ok(discovered)
    }
}

#[async_trait]
impl<C: FunctionCatalog> WorkUnitSource for RegionalFunctionSource<C> {
    async fn fetch_page(&self, request: &NormalizedEnumerateRequest) -> Result<Page, SourceError> {
        let regions = self.resolve_regions(request).await?;
        let Some(cursor) = resume_cursor(&regions, request.next_token.as_deref())? else {
            return Ok(Page::default());
        };

        let listing = self
            .catalog
            .list_functions(&cursor.region, cursor.marker.as_deref())
            .await?;

        let items = listing
            .functions
            .into_iter()
            .map(|function| WorkUnit {
                log_group_name: function
                    .log_group_name
                    .unwrap_or_else(|| default_log_group_name(&function.function_name)),
                function_name: function.function_name,
                architecture: function.architecture,
                region: cursor.region.clone(),
                days: request.days,
            })
            .collect();

        let next_token = advance_cursor(&regions, &cursor.region, listing.next_marker)?
            .map(|token| token.encode());

        Ok(Page { items, next_token })
    }
}
