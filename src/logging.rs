use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// `TMPLSYNC_LOG` wins over `-v` flags when set.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_env("TMPLSYNC_LOG")
        .or_else(|_| EnvFilter::try_new(default_directive(verbosity)))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry().with(layer).with(filter).try_init();
}
