//! Filtered, paged load
//!
//! ## Architecture
//!
//! A load resolves its [`LoadFilter`] to overview rows of the requested
//! type and every subtype (through `jds_entity_instance`), then hands them
//! to an [`EntityStream`] that populates one page at a time:
//!
//! 1. one query per value/collection table the page's types use
//! 2. one query for the page's bindings
//! 3. missing nested instances, loaded the same way, recursively
//! 4. post-load hooks, whose statements run in one transaction
//!
//! ## Logging Ownership
//!
//! `load` logs the resolution of the filter; pages log at debug level as
//! the stream is consumed.

#![allow(clippy::result_large_err)]

mod filter;
mod stream;

use std::time::Instant;

use jds_core::{log_op_end, log_op_error, log_op_start};
use jds_core::{JdsOptions, MetadataRegistry, Overview, SharedEntity};

use crate::connection::SqlConnection;
use crate::errors::Result;
use crate::events::LoadListener;

pub use filter::{LoadFilter, IN_LIST_LIMIT};
pub use stream::EntityStream;

/// Reads entity graphs through a [`SqlConnection`]
pub struct LoadEngine<'r> {
    registry: &'r MetadataRegistry,
    listeners: Vec<Box<dyn LoadListener>>,
    page_size: usize,
}

impl<'r> LoadEngine<'r> {
    /// Pages hold `options.chunk_size` top-level instances
    pub fn new(registry: &'r MetadataRegistry, options: &JdsOptions) -> Self {
        Self {
            registry,
            listeners: Vec::new(),
            page_size: options.chunk_size,
        }
    }

    pub fn with_listener(mut self, listener: impl LoadListener + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Instances of `type_id` (and its subtypes) matching `filter`
    ///
    /// Ordered by creation time, then uuid, then edit version. Fields not
    /// present in the store keep their defaults; collections come back
    /// empty.
    ///
    /// # Errors
    ///
    /// `UnknownType` for an unregistered `type_id`, driver failures while
    /// resolving the filter. Population failures surface from the stream.
    pub fn load<'s>(
        &'s self,
        type_id: u64,
        filter: &LoadFilter,
        conn: &'s mut dyn SqlConnection,
    ) -> Result<EntityStream<'s>> {
        log_op_start!("load", type_id = type_id, filter = ?filter);
        let start = Instant::now();

        let overviews = self.resolve(type_id, filter, conn).map_err(|e| {
            log_op_error!("load", e.clone(), duration_ms = start.elapsed().as_millis() as u64);
            e
        })?;

        log_op_end!(
            "load",
            duration_ms = start.elapsed().as_millis() as u64,
            matched = overviews.len()
        );
        Ok(EntityStream::new(
            self.registry,
            conn,
            &self.listeners,
            overviews,
            self.page_size,
        ))
    }

    /// Drain [`LoadEngine::load`] into a vector
    ///
    /// # Errors
    ///
    /// As for `load`, plus the first population failure.
    pub fn load_all(
        &self,
        type_id: u64,
        filter: &LoadFilter,
        conn: &mut dyn SqlConnection,
    ) -> Result<Vec<SharedEntity>> {
        self.load(type_id, filter, conn)?.collect()
    }

    fn resolve(&self, type_id: u64, filter: &LoadFilter, conn: &mut dyn SqlConnection) -> Result<Vec<Overview>> {
        self.registry.type_descriptor(type_id)?;
        let queries = filter.overview_queries(conn.dialect().adapter(), type_id);
        let chunked = queries.len() > 1;

        let mut overviews = Vec::new();
        for (sql, params) in queries {
            for row in conn.query(&sql, &params)? {
                overviews.push(stream::overview_from_row(&row)?);
            }
        }
        if chunked {
            overviews.sort_by(|a, b| {
                (a.date_created, &a.uuid, a.edit_version).cmp(&(b.date_created, &b.uuid, b.edit_version))
            });
        }
        Ok(overviews)
    }
}
