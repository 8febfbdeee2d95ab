//! Lazily recomputed values tied to an invalidation token
//!
//! The owner of some source data keeps an `InvalidationToken` and bumps it
//! whenever that data changes. Every `Cached` derived from the data
//! remembers the token it was computed under and recomputes on mismatch.

/// Monotonic change counter for cache invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InvalidationToken(u64);

impl InvalidationToken {
    pub fn new() -> Self {
        Self(0)
    }

    /// Mark the source data as changed.
    pub fn bump(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

/// A value computed on demand and kept until its token goes stale.
#[derive(Debug, Clone)]
pub struct Cached<T> {
    slot: Option<(InvalidationToken, T)>,
}

impl<T> Cached<T> {
    pub const fn new() -> Self {
        Self { slot: None }
    }

    pub fn is_valid(&self, token: InvalidationToken) -> bool {
        matches!(&self.slot, Some((t, _)) if *t == token)
    }

    pub fn get(&self, token: InvalidationToken) -> Option<&T> {
        match &self.slot {
            Some((t, value)) if *t == token => Some(value),
            _ => None,
        }
    }

    /// Return the cached value, recomputing it if `token` changed.
    pub fn get_or_update(&mut self, token: InvalidationToken, compute: impl FnOnce() -> T) -> &T {
        if !self.is_valid(token) {
            self.slot = None;
        }
        &self.slot.get_or_insert_with(|| (token, compute())).1
    }

    /// Drop the value regardless of token.
    pub fn invalidate(&mut self) {
        self.slot = None;
    }
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_computes_once_per_token() {
        let calls = Cell::new(0);
        let mut token = InvalidationToken::new();
        let mut cached = Cached::new();

        let compute = || {
            calls.set(calls.get() + 1);
            42
        };
        assert_eq!(*cached.get_or_update(token, compute), 42);
        assert_eq!(*cached.get_or_update(token, compute), 42);
        assert_eq!(calls.get(), 1);

        token.bump();
        assert!(!cached.is_valid(token));
        cached.get_or_update(token, compute);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_invalidate_forces_recompute() {
        let token = InvalidationToken::new();
        let mut cached = Cached::new();
        cached.get_or_update(token, || 1);
        cached.invalidate();
        assert!(cached.get(token).is_none());
        assert_eq!(*cached.get_or_update(token, || 2), 2);
    }
}
