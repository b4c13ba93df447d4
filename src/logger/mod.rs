// SPDX-License-Identifier: GPL-3.0-only

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init_logger() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cfg!(debug_assertions) {
            "warn,cosmic_monitors=debug"
        } else {
            "warn,cosmic_monitors=info"
        })
    });
    let term = fmt::layer().compact().with_writer(std::io::stderr);
    // not running under systemd is fine
    let journald = tracing_journald::layer().ok();

    tracing_subscriber::registry()
        .with(filter)
        .with(term)
        .with(journald)
        .try_init()?;
    log_panics::init();

    info!("Version: {}", std::env!("CARGO_PKG_VERSION"));
    Ok(())
}
