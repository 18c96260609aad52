//! Shared AWS SDK configuration.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::info;

/// Load credentials and settings from the default provider chain, pinned to
/// `region`. Loaded once and shared by every client the process builds.
pub async fn load_sdk_config(region: &str) -> SdkConfig {
    info!(region, "Loading AWS configuration");
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}
