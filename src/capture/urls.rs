// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Transient references to captured payloads.

use std::collections::HashMap;
use std::sync::Arc;

const SCHEME: &str = "capture://";

/// Registry of live payload URLs. Every URL handed out must be revoked
/// once nothing displays it, otherwise its payload stays in memory.
#[derive(Debug, Default)]
pub struct PayloadUrls {
    next: u64,
    live: HashMap<String, Arc<[u8]>>,
}

impl PayloadUrls {
    pub fn create(&mut self, payload: Arc<[u8]>) -> String {
        self.next += 1;
        let url = format!("{SCHEME}{}", self.next);
        self.live.insert(url.clone(), payload);
        url
    }

    pub fn resolve(&self, url: &str) -> Option<Arc<[u8]>> {
        self.live.get(url).cloned()
    }

    /// Release a URL. Returns false if it was not live.
    pub fn revoke(&mut self, url: &str) -> bool {
        self.live.remove(url).is_some()
    }

    #[cfg(test)]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_resolve_revoke() {
        let mut urls = PayloadUrls::default();
        let a = urls.create(Arc::from(&b"abc"[..]));
        let b = urls.create(Arc::from(&b"def"[..]));
        assert_ne!(a, b);
        assert_eq!(urls.resolve(&a).as_deref(), Some(&b"abc"[..]));

        assert!(urls.revoke(&a));
        assert!(!urls.revoke(&a));
        assert!(urls.resolve(&a).is_none());
        assert_eq!(urls.live_count(), 1);
    }
}
