//! Shared helpers for builddag's integration tests.

pub mod builders;
pub mod fake_runner;

pub use builders::{ConfigFileBuilder, TaskConfigBuilder};
pub use fake_runner::FakeRunner;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Upper bound for any single async step in a test.
pub const TEST_DEADLINE: Duration = Duration::from_secs(5);

/// Install a test-captured tracing subscriber once per test binary.
///
/// Honours `BUILDDAG_LOG` like the binary does (`BUILDDAG_LOG=debug cargo
/// test -- --nocapture`), and falls back to `warn` so passing tests stay
/// quiet.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(builddag::logging::LOG_ENV_VAR)
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Await `f`, failing the test if it takes longer than [`TEST_DEADLINE`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_DEADLINE, f).await {
        Ok(value) => value,
        Err(_) => panic!("test step did not finish within {TEST_DEADLINE:?}"),
    }
}
