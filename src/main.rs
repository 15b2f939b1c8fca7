//! handoff binary entry point.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use handoff::cli::{self, Cli};
use handoff::ui::output::{self, Verbosity};

fn main() {
    let cli = Cli::parse_args();
    init_tracing(Verbosity::from_flags(cli.quiet, cli.debug));

    let code = match cli::run(cli) {
        Ok(code) => code,
        Err(err) => {
            output::error(format!("{:#}", err));
            cli::exit_code(&err)
        }
    };
    std::process::exit(code);
}

/// Log to stderr; `RUST_LOG` wins over the verbosity flags.
fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(verbosity.log_directive()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
