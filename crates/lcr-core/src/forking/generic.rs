use async_trait::async_trait;

use super::PlatformHandler;
use crate::config::Platform;

/// Answers BYE and CANCEL only
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericHandler;

#[async_trait]
impl PlatformHandler for GenericHandler {
    fn platform(&self) -> Platform {
        Platform::Generic
    }
}
