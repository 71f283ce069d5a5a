use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// - Create a formatting subscriber for outputting logs to stderr
/// - Filter using the `RUST_LOG` env variable
/// - If `RUST_LOG` is not set, filter using the `verbose` argument:
///     - 0: error
///     - 1: warn
///     - 2: info
///     - 3: debug
///     - 4: trace
pub fn init(verbose: u8) {
    let env_filter = EnvFilter::try_from_default_env().ok();

    let env_filter = env_filter.unwrap_or(match verbose {
        0 => EnvFilter::from("error"),
        1 => EnvFilter::from("warn"),
        2 => EnvFilter::from("info"),
        3 => EnvFilter::from("debug"),
        _ => EnvFilter::from("trace"),
    });
    let env_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(env_layer).init();
}
