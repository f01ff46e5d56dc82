//! Map-backed `CacheClient` for unit tests. TTLs are recorded, not simulated.
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};

#[derive(Clone, Default)]
pub(crate) struct FakeCache {
    pub map: Arc<Mutex<HashMap<String, String>>>,
    pub ttls: Arc<Mutex<Vec<Duration>>>,
    pub fail: bool,
}

impl FakeCache {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn last_ttl(&self) -> Option<Duration> {
        self.ttls.lock().unwrap().last().copied()
    }

    fn check(&self) -> CacheResult<()> {
        if self.fail {
            return Err(CacheError::BackendConnection("down".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheClient for FakeCache {
    fn backend_name(&self) -> &'static str {
        "fake"
    }

    async fn set_if_absent_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool> {
        self.check()?;
        let mut map = self.map.lock().unwrap();
        if map.contains_key(key) {
            return Ok(false);
        }
        map.insert(key.to_string(), value.to_string());
        self.ttls.lock().unwrap().push(ttl);
        Ok(true)
    }

    async fn get_del(&self, key: &str) -> CacheResult<Option<String>> {
        self.check()?;
        Ok(self.map.lock().unwrap().remove(key))
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.check()?;
        Ok(self.map.lock().unwrap().get(key).cloned())
    }
}
