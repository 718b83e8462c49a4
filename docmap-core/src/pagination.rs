//! Pagination hook for [`Mapper::get_paginator`](crate::Mapper::get_paginator).
//!
//! The mapper computes the page; turning it into a response is up to the
//! host application, which plugs in a [`Paginate`] implementation:
//!
//! ```rust
//! use docmap_core::{Model, PageData, Paginate, OdmResult};
//!
//! struct JsonPages;
//!
//! impl<M: Model> Paginate<M> for JsonPages {
//!     type Output = (u64, u64, usize);
//!
//!     fn create_paginator(&self, page: PageData<M>) -> OdmResult<Self::Output> {
//!         Ok((page.page, page.total_pages(), page.results.len()))
//!     }
//! }
//! ```

use std::convert::Infallible;

use bson::Document;

use crate::error::{OdmError, OdmResult};
use crate::model::{Entity, Model};

/// One page of results plus the numbers needed to render navigation.
#[derive(Debug, Clone)]
pub struct PageData<M: Model> {
    /// Results on this page.
    pub results: Vec<Entity<M>>,
    /// Documents matching the query across all pages.
    pub total: u64,
    /// Page size.
    pub per_page: u64,
    /// 1-indexed page number.
    pub page: u64,
    /// Options passed through from the caller.
    pub options: Option<Document>,
}

impl<M: Model> PageData<M> {
    /// Number of pages needed for `total` documents.
    pub fn total_pages(&self) -> u64 {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(self.per_page)
    }

    /// Check whether a page follows this one.
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Check whether a page precedes this one.
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Builds a host-specific paginator from a page of results.
pub trait Paginate<M: Model> {
    /// The paginator handed back to the caller.
    type Output;

    /// Build the paginator.
    fn create_paginator(&self, page: PageData<M>) -> OdmResult<Self::Output>;
}

/// Placeholder hook of a mapper without pagination support.
///
/// Always fails with a configuration error.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPaginator;

impl<M: Model> Paginate<M> for NoPaginator {
    type Output = Infallible;

    fn create_paginator(&self, _page: PageData<M>) -> OdmResult<Self::Output> {
        Err(OdmError::config(
            "no paginator configured, attach one with Mapper::with_paginator",
        ))
    }
}

impl<M, O, F> Paginate<M> for F
where
    M: Model,
    F: Fn(PageData<M>) -> O,
{
    type Output = O;

    fn create_paginator(&self, page: PageData<M>) -> OdmResult<Self::Output> {
        Ok(self(page))
    }
}
