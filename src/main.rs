#[macro_use]
extern crate tracing;

use std::io::{self, Read as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use std::{env, thread};

use anyhow::{anyhow, Context};
use clap::Parser;
use directories::ProjectDirs;
use stratum::cli::{Cli, Sub};
use stratum::container::{ActiveContainerFile, ContainerId};
use stratum::focus::FocusTracker;
use stratum::stacking::StackingPolicy;
use stratum::uevent::UEvent;
use stratum::utils::version;
use stratum::utils::watcher::Watcher;
use stratum_config::Config;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let directives = env::var("RUST_LOG").unwrap_or_else(|_| "stratum=debug,info".to_owned());
    let env_filter = EnvFilter::builder().parse_lossy(directives);
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(env_filter)
        .init();

    let cli = Cli::parse();

    let _client = tracy_client::Client::start();

    info!("starting version {}", &version());

    let path = cli
        .config
        .or_else(|| env::var_os("STRATUM_CONFIG").map(PathBuf::from))
        .or_else(default_config_path);

    match cli.subcommand {
        Sub::Validate => {
            let path = path.context("error retrieving home directory")?;
            let config = Config::load(&path).map_err(|err| anyhow!("{err:?}"))?;
            StackingPolicy::from_config(&config.stacking).context("invalid stacking section")?;
            info!("config is valid");
        }
        Sub::Status => {
            let config = load_config(path.as_deref());
            status(&config)?;
        }
        Sub::Uevent => {
            let config = load_config(path.as_deref());
            uevent(&config)?;
        }
        Sub::Watch { interval_ms } => {
            let config = load_config(path.as_deref());
            let interval = interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.container.poll_interval_ms.to_duration());
            watch(&config, interval)?;
        }
    }

    Ok(())
}

fn default_config_path() -> Option<PathBuf> {
    let mut path = ProjectDirs::from("", "", "stratum")?.config_dir().to_owned();
    path.push("config.kdl");
    Some(path)
}

fn load_config(path: Option<&Path>) -> Config {
    let Some(path) = path else {
        warn!("error retrieving home directory, using the default config");
        return Config::default();
    };

    if !path.exists() {
        debug!("{path:?} does not exist, using the default config");
        return Config::default();
    }

    match Config::load(path) {
        Ok(config) => config,
        Err(err) => {
            warn!("{err:?}");
            Config::default()
        }
    }
}

fn status(config: &Config) -> anyhow::Result<()> {
    let policy =
        StackingPolicy::from_config(&config.stacking).context("invalid stacking section")?;
    let tracker = FocusTracker::from_config(&config.container);
    let identity = tracker.container_identity();

    println!("Container: {identity}");
    println!(
        "Active container: {}",
        tracker.current_focused_container_id()
    );
    println!(
        "Focused: {}",
        if tracker.is_local_container_focused() {
            "yes"
        } else {
            "no"
        }
    );

    match (
        policy.container_offset(identity, false),
        policy.container_offset(identity, true),
    ) {
        (Ok(unfocused), Ok(focused)) => {
            println!("Stacking offset: {unfocused} (focused: {focused})");
        }
        (Err(err), _) | (_, Err(err)) => println!("Stacking offset: {err}"),
    }
    println!("Highest container id: {}", policy.max_container_id());

    Ok(())
}

fn uevent(config: &Config) -> anyhow::Result<()> {
    let mut raw = Vec::new();
    io::stdin()
        .read_to_end(&mut raw)
        .context("error reading the uevent from stdin")?;
    let event = UEvent::parse(&raw);

    println!("Action: {}", event.action().unwrap_or("(none)"));
    println!("Device: {}", event.devpath().unwrap_or("(none)"));

    let tracker = FocusTracker::from_config(&config.container);
    if !tracker.handle_uevent(&event) {
        println!("Not a focus event: {} is not set", tracker.event_name());
        return Ok(());
    }

    let state = tracker.state();
    println!("Focused container: {}", state.focused_container());
    println!(
        "Focused: {}",
        if state.is_local_container_focused() {
            "yes"
        } else {
            "no"
        }
    );

    Ok(())
}

fn watch(config: &Config, interval: Duration) -> anyhow::Result<()> {
    let tracker = Arc::new(FocusTracker::from_config(&config.container));
    let identity = tracker.container_identity();

    tracker.subscribe(Arc::new(move |focused: ContainerId| {
        if focused == identity {
            info!("container {focused} is focused (this container)");
        } else {
            info!("container {focused} is focused");
        }
    }));

    let active_path = &config.container.active_path;
    info!("watching {active_path:?} as container {identity}");

    let _watcher = {
        let tracker = tracker.clone();
        Watcher::new(ActiveContainerFile::new(active_path), interval, move |line| {
            tracker.on_external_focus_event(line)
        })
        .context("error starting the active container watcher")?
    };

    loop {
        thread::park();
    }
}
