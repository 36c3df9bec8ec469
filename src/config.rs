//! Global configuration options.

use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Global configuration options for the array engine.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// ## Cache Maximum
/// > default: 64 MiB
///
/// The byte budget assumed to be available for raster caching. Chunked
/// operations that do not receive an explicit budget derive theirs from it.
///
/// ## Copy Swath Size
/// > default: unset
///
/// An explicit byte budget for the temporary buffer used by deep copy and
/// other chunked traversals. When unset, a quarter of the cache maximum is
/// used instead.
#[derive(Debug)]
pub struct Config {
    cache_max_bytes: usize,
    copy_swath_bytes: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cache_max_bytes: 64 * 1024 * 1024,
            copy_swath_bytes: None,
        }
    }
}

impl Config {
    /// Get the [cache maximum](#cache-maximum) configuration.
    #[must_use]
    pub fn cache_max_bytes(&self) -> usize {
        self.cache_max_bytes
    }

    /// Set the [cache maximum](#cache-maximum) configuration.
    pub fn set_cache_max_bytes(&mut self, cache_max_bytes: usize) {
        self.cache_max_bytes = cache_max_bytes;
    }

    /// Get the [copy swath size](#copy-swath-size) configuration.
    #[must_use]
    pub fn copy_swath_bytes(&self) -> Option<usize> {
        self.copy_swath_bytes
    }

    /// Set the [copy swath size](#copy-swath-size) configuration.
    pub fn set_copy_swath_bytes(&mut self, copy_swath_bytes: Option<usize>) {
        self.copy_swath_bytes = copy_swath_bytes;
    }

    /// The effective byte budget for chunked traversals: the copy swath size
    /// if set, else a quarter of the cache maximum.
    #[must_use]
    pub fn chunk_byte_budget(&self) -> usize {
        self.copy_swath_bytes
            .unwrap_or(self.cache_max_bytes / 4)
            .min(usize::MAX / 2)
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .read()
        .unwrap()
}

/// Returns a mutable reference to the global configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .write()
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_chunk_byte_budget() {
        let mut config = Config::default();
        assert_eq!(config.chunk_byte_budget(), 16 * 1024 * 1024);
        config.set_copy_swath_bytes(Some(1024));
        assert_eq!(config.chunk_byte_budget(), 1024);
        config.set_copy_swath_bytes(None);
        config.set_cache_max_bytes(400);
        assert_eq!(config.chunk_byte_budget(), 100);
    }

    #[test]
    fn config_global() {
        assert!(global_config().cache_max_bytes() > 0);
        let default = global_config().cache_max_bytes();
        global_config_mut().set_cache_max_bytes(123);
        assert_eq!(global_config().cache_max_bytes(), 123);
        global_config_mut().set_cache_max_bytes(default);
    }
}
