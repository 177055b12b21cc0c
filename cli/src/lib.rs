pub mod driver;
pub mod repl;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter (`warn` when unset).
pub const LOG_ENV: &str = "UB_LOG";
/// Environment variable capping the depth search when `--max-depth` is absent.
pub const MAX_DEPTH_ENV: &str = "UB_MAX_DEPTH";

/// Install the global subscriber. `--verbose` wins over `UB_LOG`.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // a second initialisation (tests) is not an error
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).without_time())
        .with(filter)
        .try_init();
}

/// The depth cap: the flag if given, then `UB_MAX_DEPTH`, else unbounded.
/// Unparseable environment values are ignored.
pub fn resolve_max_depth(flag: Option<usize>) -> Option<usize> {
    flag.or_else(|| {
        std::env::var(MAX_DEPTH_ENV)
            .ok()
            .and_then(|value| value.trim().parse::<usize>().ok())
    })
}
