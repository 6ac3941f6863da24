use crate::config::IndexingConfig;
use crate::types::TokenId;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Source of unique token ids.
pub trait AutoNumber: Send + Sync + fmt::Debug {
    /// Next id, or `None` once the id space is used up.
    fn next_id(&self) -> Option<TokenId>;
}

/// Atomic counter handing out `seed + 1`, `seed + 2`, ...
#[derive(Debug, Default)]
pub struct StandardAutoNumber {
    last: AtomicU32,
}

impl StandardAutoNumber {
    pub fn new(seed: u32) -> Self {
        Self {
            last: AtomicU32::new(seed),
        }
    }

    /// Last id handed out, or the seed.
    pub fn last(&self) -> u32 {
        self.last.load(Ordering::SeqCst)
    }
}

impl From<&IndexingConfig> for StandardAutoNumber {
    fn from(config: &IndexingConfig) -> Self {
        Self::new(config.token_id_seed)
    }
}

impl AutoNumber for StandardAutoNumber {
    fn next_id(&self) -> Option<TokenId> {
        self.last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
            .ok()
            .and_then(|previous| TokenId::new(previous + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_starts_above_seed() {
        let auto = StandardAutoNumber::new(41);
        assert_eq!(auto.next_id().unwrap().value(), 42);
        assert_eq!(auto.next_id().unwrap().value(), 43);
        assert_eq!(auto.last(), 43);
    }

    #[test]
    fn test_seed_from_config() {
        let config = IndexingConfig {
            token_id_seed: 1000,
            ..IndexingConfig::default()
        };
        let auto = StandardAutoNumber::from(&config);
        assert_eq!(auto.last(), 1000);
        assert_eq!(auto.next_id().unwrap().value(), 1001);
    }

    #[test]
    fn test_exhaustion() {
        let auto = StandardAutoNumber::new(u32::MAX - 1);
        assert_eq!(auto.next_id().unwrap().value(), u32::MAX);
        assert!(auto.next_id().is_none());
        assert!(auto.next_id().is_none());
    }

    #[test]
    fn test_concurrent_ids_unique() {
        let auto = StandardAutoNumber::default();
        let ids: Vec<Vec<u32>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| (0..1000).map(|_| auto.next_id().unwrap().value()).collect()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let all: HashSet<u32> = ids.into_iter().flatten().collect();
        assert_eq!(all.len(), 8000);
        assert_eq!(all.iter().max(), Some(&8000));
    }
}
