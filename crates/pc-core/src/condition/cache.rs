//! Per-condition analysis cache
//!
//! Each condition owns one cell holding a `(tag, analysis)` record. The tag
//! is recomputed on every access and compared with the stored one, so a
//! condition edited in place is re-analyzed without explicit invalidation.
//! Records are immutable once published and swapped as a whole.

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use super::Analysis;
use crate::error::Result;
use crate::expr::Node;

/// One cache fill: the tag it was computed for and its results.
#[derive(Debug)]
pub struct CacheRecord {
    tag: String,
    analysis: Analysis,
    compiled: OnceLock<Node>,
}

impl CacheRecord {
    /// Tag the record was computed for.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Variant analysis payload.
    pub fn analysis(&self) -> &Analysis {
        &self.analysis
    }

    /// Compiled expression, if `compile` already ran for this record.
    pub fn compiled(&self) -> Option<&Node> {
        self.compiled.get()
    }

    pub(crate) fn compiled_or_init(&self, node: Node) -> &Node {
        self.compiled.get_or_init(|| node)
    }
}

/// Memoization cell attached to a condition.
///
/// Cloning yields an empty cell; caches are never shared between conditions.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    slot: RwLock<Option<Arc<CacheRecord>>>,
}

impl AnalysisCache {
    /// Return the record for `tag`, computing and publishing a new one when
    /// the cell is empty or holds a stale tag.
    pub fn get_or_refresh<F>(&self, tag: String, compute: F) -> Result<Arc<CacheRecord>>
    where
        F: FnOnce() -> Result<Analysis>,
    {
        if let Some(record) = self.slot.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            if record.tag == tag {
                return Ok(Arc::clone(record));
            }
        }

        log::debug!("analyzing condition {}", tag);
        let record = Arc::new(CacheRecord {
            tag,
            analysis: compute()?,
            compiled: OnceLock::new(),
        });
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&record));
        Ok(record)
    }

    /// Current record without checking staleness.
    pub fn peek(&self) -> Option<Arc<CacheRecord>> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Drop the current record.
    pub fn clear(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Clone for AnalysisCache {
    fn clone(&self) -> Self {
        Self::default()
    }
}
