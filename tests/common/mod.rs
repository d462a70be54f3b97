//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::time::Duration;

/// Upper bound for anything a test waits on
pub fn test_timeout() -> Duration {
    Duration::from_secs(2)
}

/// Awaits `fut`, failing the test if it takes longer than [`test_timeout`]
pub async fn within_timeout<F: std::future::Future>(fut: F) -> F::Output {
    tokio::time::timeout(test_timeout(), fut)
        .await
        .expect("operation timed out")
}
