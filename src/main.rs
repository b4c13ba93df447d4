// SPDX-License-Identifier: GPL-3.0-only

use std::{
    error::Error,
    process,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use calloop::EventLoop;
use clap_lex::RawArgs;
use cosmic_monitors::{
    backend::dummy::DummyBackend,
    config::{ConfigFiles, MonitorConfig, MonitorsObserver, Saver},
    dbus,
    state::State,
};
use cosmic_monitors_config::Configuration;
use futures_executor::ThreadPool;
use ron::ser::PrettyConfig;
use tracing::{error, info};

mod logger;

const DEFAULT_OUTPUTS: &str = "eDP-1:1920x1080@60";
const SAVE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct Args {
    outputs: Option<String>,
    lid_closed: bool,
    dump: bool,
    persist: bool,
    watch: bool,
}

struct LogObserver;

impl MonitorsObserver for LogObserver {
    fn monitors_changed(&mut self, current: &Configuration) {
        for (key, intent) in current.iter().filter(|(_, intent)| intent.enabled) {
            info!(
                output = %key.connector,
                primary = intent.is_primary,
                "{}x{}@{} at {},{}",
                intent.rect.width,
                intent.rect.height,
                intent.refresh_rate,
                intent.rect.x,
                intent.rect.y,
            );
        }
    }

    fn confirm_display_change(&mut self) {
        info!("Waiting for the display change to be confirmed");
    }
}

fn main() {
    if let Err(err) = main_inner() {
        error!("Error occured in main(): {}", err);
        process::exit(1);
    }
}

fn main_inner() -> Result<(), Box<dyn Error>> {
    let raw_args = RawArgs::from_args();
    let mut cursor = raw_args.cursor();
    let mut args = Args::default();

    // Parse the arguments
    while let Some(arg) = raw_args.next_os(&mut cursor) {
        match arg.to_str() {
            Some("--help") | Some("-h") => {
                print_help(env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            Some("--version") | Some("-V") => {
                println!("cosmic-monitors {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            Some("--outputs") => {
                let spec = raw_args
                    .next_os(&mut cursor)
                    .and_then(|spec| spec.to_str())
                    .context("--outputs needs a value")?;
                args.outputs = Some(spec.to_string());
            }
            Some("--lid-closed") => args.lid_closed = true,
            Some("--dump") => args.dump = true,
            Some("--persist") => args.persist = true,
            Some("--watch") => args.watch = true,
            _ => {
                return Err(format!("Unknown argument {:?}, see --help", arg).into());
            }
        }
    }

    // setup logger
    logger::init_logger()?;

    let backend = DummyBackend::from_spec(args.outputs.as_deref().unwrap_or(DEFAULT_OUTPUTS))
        .context("Invalid output list")?;
    let lid_closed = args.lid_closed || dbus::lid_is_closed().unwrap_or(false);

    let files = ConfigFiles::from_env();
    let mut monitors = MonitorConfig::load(&files, lid_closed);
    monitors.add_observer(Box::new(LogObserver));

    let mut event_loop: EventLoop<'static, State> =
        EventLoop::try_new().with_context(|| "Failed to initialize event loop")?;
    let saves = match files.user.clone() {
        Some(path) => {
            let (saver, channel) = Saver::new(path)?;
            monitors.set_saver(saver);
            Some(channel)
        }
        None => None,
    };

    let mut state = State::new(backend, monitors, event_loop.handle());
    if let Some(channel) = saves {
        state.watch_saves(channel)?;
    }

    state.monitors.apply_initial(&mut state.backend);

    if args.persist {
        state.monitors.make_persistent();
        wait_for_save(&mut event_loop, &mut state)?;
    }

    if args.dump {
        println!("{}", dump(&state.monitors)?);
    }

    if args.watch {
        let executor = ThreadPool::builder()
            .pool_size(1)
            .name_prefix("monitors-dbus-")
            .create()
            .context("Failed to create executor")?;
        let _tokens = dbus::init(&event_loop.handle(), &executor)?;
        info!("Watching for lid changes");
        event_loop.run(None, &mut state, |_| {})?;
    }

    Ok(())
}

fn wait_for_save(event_loop: &mut EventLoop<'static, State>, state: &mut State) -> Result<()> {
    let deadline = Instant::now() + SAVE_TIMEOUT;
    while state.monitors.is_saving() {
        if Instant::now() >= deadline {
            anyhow::bail!("Timed out saving the monitor configuration");
        }
        event_loop
            .dispatch(Some(Duration::from_millis(100)), state)
            .context("Failed to dispatch event loop")?;
    }
    Ok(())
}

fn dump(monitors: &MonitorConfig) -> Result<String> {
    let configs = monitors
        .store()
        .iter()
        .map(|config| config.as_ref())
        .collect::<Vec<_>>();
    ron::ser::to_string_pretty(&configs, PrettyConfig::default())
        .context("Failed to serialize configurations")
}

fn print_help(version: &str) {
    println!(
        r#"cosmic-monitors {version}
System76 <info@system76.com>

Picks and remembers the display layout for the connected outputs.

Project home page: https://github.com/pop-os/cosmic-comp

Options:
  -h, --help          Show this message
  -V, --version       Show the version of cosmic-monitors
      --outputs SPEC  Simulated outputs, e.g. eDP-1:1920x1080@60,DP-1:2560x1440@60
      --lid-closed    Start with the laptop lid closed
      --persist       Store the resulting layout in monitors.xml
      --dump          Print the stored layouts
      --watch         Keep running and follow lid changes"#
    );
}
