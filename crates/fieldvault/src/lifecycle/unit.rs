//! [`UnitOfWork`]: the per-pass context that owns the Decrypt Cache.

use tracing::debug;
use uuid::Uuid;

use super::cache::DecryptCache;

/// One unit of work: a load pass, a write/commit pass, or a host session
/// spanning both.
///
/// Owned by exactly one caller and never shared between concurrent units of
/// work. Dropping it (normal end or abort) discards every cached entry.
#[derive(Debug)]
pub struct UnitOfWork {
    id: Uuid,
    cache: DecryptCache,
}

impl UnitOfWork {
    /// Start a new unit of work with an empty cache.
    pub fn begin() -> Self {
        let id = Uuid::new_v4();
        debug!(unit_of_work = %id, "unit of work started");
        Self {
            id,
            cache: DecryptCache::new(),
        }
    }

    /// Identifier used to correlate log events. Carries no secret.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cache(&self) -> &DecryptCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut DecryptCache {
        &mut self.cache
    }

    /// End the unit of work normally.
    pub fn finish(self) {
        debug!(unit_of_work = %self.id, cached = self.cache.len(), "unit of work finished");
    }

    /// End the unit of work after the enclosing transaction aborted.
    pub fn abort(self) {
        debug!(unit_of_work = %self.id, cached = self.cache.len(), "unit of work aborted");
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::cache::CacheKey;

    #[test]
    fn each_unit_starts_empty_with_its_own_id() {
        let mut a = UnitOfWork::begin();
        a.cache_mut()
            .insert(CacheKey::new("T", "1", "f"), "x".into(), "1:x<ENC>".into());
        let b = UnitOfWork::begin();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.cache().len(), 1);
        assert!(b.cache().is_empty());
        a.abort();
        b.finish();
    }
}
