use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

/// Crates whose logs are captured at full verbosity.
const CRATE_NAMES: &[&str] = &["dbbench"];

/// Builds the filter used by tests.
///
/// `RUST_LOG` is honored when it is set, so a single failing test can be rerun with more or less
/// output. Otherwise only the harness crates log at full verbosity and everything else is
/// limited to errors.
fn env_filter() -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    CRATE_NAMES
        .iter()
        .filter_map(|name| format!("{name}=TRACE").parse::<Directive>().ok())
        .fold(EnvFilter::new("ERROR"), EnvFilter::add_directive)
}

/// Initialize the logger for testing.
///
/// Logs go to the writer captured by the Rust test runner. Calling this more than once is fine.
///
/// # Example
///
/// ```
/// dbbench_test::tracing::init();
/// ```
pub fn init() {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_test_writer()
        .compact()
        .try_init()
        .ok();
}
