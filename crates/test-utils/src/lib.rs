pub mod buffer;
pub mod builders;
pub mod fake_process;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Upper bound for any single orchestrator run in tests.
pub const TEST_DEADLINE: Duration = Duration::from_secs(5);

/// Install a test-captured subscriber once per test binary.
///
/// Defaults to `xbatch=debug` so core transitions and teardown steps show up
/// in the output of a failing test; override with `RUST_LOG`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("xbatch=debug"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(false)
            .init();
    });
}

/// Await `f`, failing the test if it runs past [`TEST_DEADLINE`]. A hung
/// run usually means a process was never reaped or an interrupt was lost.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_DEADLINE, f)
        .await
        .unwrap_or_else(|_| {
            panic!("run did not finish within {TEST_DEADLINE:?}; a process or reader is still alive")
        })
}
