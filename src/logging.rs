use tracing_subscriber::EnvFilter;

/// Directive used when `RUST_LOG` is not set
pub fn default_directive(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "incbak=warn"
    } else if verbose {
        "incbak=debug"
    } else {
        "incbak=info"
    }
}

/// Send engine diagnostics to stderr; `RUST_LOG` takes precedence over the flags
pub fn init_logging(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    // A subscriber may already be installed (tests, embedding); keep it
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
