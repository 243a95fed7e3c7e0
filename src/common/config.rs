use log::warn;

use super::error::{EngineError, Result};
use super::types::PAGE_HEADER_SIZE;

/// Engine configuration - fixed once the engine is constructed.
///
/// `page_size` drives the arithmetic of every other structure; there is no
/// way to change it afterwards.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Size of each page in bytes (64..=32768).
    pub page_size: u32,
    /// Number of frames in the buffer pool.
    pub pool_size: u32,
    /// Maximum number of pages the simulated disk can hold.
    pub disk_capacity: u32,
    /// Encoded rows larger than this are written as overflow chains.
    pub overflow_threshold: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: 128,
            pool_size: 8,
            disk_capacity: 64,
            overflow_threshold: 64,
        }
    }
}

impl EngineConfig {
    /// Check the configuration. Invalid input is rejected, never adjusted.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0
            || self.pool_size == 0
            || self.disk_capacity == 0
            || self.overflow_threshold == 0
        {
            return Err(EngineError::InvalidConfig(
                "all configuration values must be positive".into(),
            ));
        }
        if self.page_size < 64 {
            return Err(EngineError::InvalidConfig(format!(
                "page_size {} is below the 64-byte minimum",
                self.page_size
            )));
        }
        // Header offsets (free_start/free_end) are u16.
        if self.page_size > 32768 {
            return Err(EngineError::InvalidConfig(format!(
                "page_size {} exceeds the 32768-byte maximum",
                self.page_size
            )));
        }
        if self.overflow_threshold > self.page_size {
            return Err(EngineError::InvalidConfig(format!(
                "overflow_threshold {} exceeds page_size {}",
                self.overflow_threshold, self.page_size
            )));
        }
        if self.pool_size > self.disk_capacity {
            warn!(
                "pool_size {} exceeds disk_capacity {}: some frames can never be filled",
                self.pool_size, self.disk_capacity
            );
        }
        Ok(())
    }

    /// Usable space inside a page once the header is paid for.
    pub fn page_data_capacity(&self) -> usize {
        self.page_size as usize - PAGE_HEADER_SIZE
    }
}
