//! Entry point for **swipe-relay**.
//!
//! ```text
//! swipe-relay [listen] [--in-process] [--source libinput|hyprland] [--config <path>]
//! swipe-relay relay
//! swipe-relay quit
//! ```
//!
//! `listen` (the default) finds the touchpad, makes sure a relay is running
//! and forwards gestures to it.  `relay` runs only the relay service and
//! prints `READY` on stdout once it owns the bus name.  `quit` stops the
//! running relay.

use log::{error, info};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use swipe_relay::bus::client::RelayClient;
use swipe_relay::bus::relay::Relay;
use swipe_relay::bus::{default_socket_path, READY_LINE};
use swipe_relay::config::{default_config_path, Config};
use swipe_relay::device::hyprland::HyprlandSource;
use swipe_relay::device::libinput::LibinputSource;
use swipe_relay::device::probe::{find_touchpad, ProbeRoots, TouchpadDevice, MAX_EVENT_NODES};
use swipe_relay::listener::{self, ListenerError, ListenerOptions, RelayLauncher, RelayMode};

const USAGE: &str = "\
usage: swipe-relay [listen] [--in-process] [--source libinput|hyprland] [--config <path>]
       swipe-relay relay
       swipe-relay quit";

/// Exit status when no touchpad can be found.
const EXIT_NO_DEVICE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Libinput,
    Hyprland,
}

#[derive(Debug, PartialEq, Eq)]
enum Cli {
    Listen {
        in_process: bool,
        source: SourceKind,
        config: Option<PathBuf>,
    },
    Relay,
    Quit,
    Help,
}

fn parse_args(args: &[String]) -> Result<Cli, String> {
    let mut iter = args.iter();
    match args.first().map(|s| s.as_str()) {
        Some("relay") => return only(Cli::Relay, &args[1..]),
        Some("quit") => return only(Cli::Quit, &args[1..]),
        Some("-h") | Some("--help") | Some("help") => return Ok(Cli::Help),
        Some("listen") => {
            iter.next();
        }
        _ => {}
    }

    let mut in_process = false;
    let mut source = SourceKind::Libinput;
    let mut config = None;
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--in-process" => in_process = true,
            "--source" => {
                source = match iter.next().map(|s| s.as_str()) {
                    Some("libinput") => SourceKind::Libinput,
                    Some("hyprland") => SourceKind::Hyprland,
                    other => return Err(format!("invalid --source: {:?}", other)),
                }
            }
            "--config" => {
                let path = iter.next().ok_or("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            other => return Err(format!("unknown argument: {}", other)),
        }
    }
    Ok(Cli::Listen {
        in_process,
        source,
        config,
    })
}

fn only(cli: Cli, rest: &[String]) -> Result<Cli, String> {
    match rest.first() {
        Some(extra) => Err(format!("unexpected argument: {}", extra)),
        None => Ok(cli),
    }
}

/// Load the config from `path` (or the default location), falling back to
/// compiled-in defaults.
fn load_config(path: Option<PathBuf>) -> Config {
    let path = path.unwrap_or_else(default_config_path);
    match Config::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            info!("no config file ({}), using defaults", e);
            Config::default()
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(msg) => {
            eprintln!("{}\n{}", msg, USAGE);
            return ExitCode::FAILURE;
        }
    };

    match cli {
        Cli::Listen {
            in_process,
            source,
            config,
        } => run_listener(in_process, source, config),
        Cli::Relay => run_relay(),
        Cli::Quit => run_quit(),
        Cli::Help => {
            println!("{}", USAGE);
            ExitCode::SUCCESS
        }
    }
}

/// Find the touchpad below `roots`.
fn select_touchpad(roots: &ProbeRoots) -> Result<TouchpadDevice, ListenerError> {
    Ok(find_touchpad(roots, MAX_EVENT_NODES)?)
}

/// Process exit status for a fatal listener error.
fn exit_status(e: &ListenerError) -> u8 {
    match e {
        ListenerError::Device(_) => EXIT_NO_DEVICE,
        _ => 1,
    }
}

/// Listener mode.
fn run_listener(in_process: bool, source: SourceKind, config: Option<PathBuf>) -> ExitCode {
    let config = load_config(config);

    let mode = if in_process {
        RelayMode::InProcess
    } else {
        match RelayLauncher::current_exe() {
            Ok(launcher) => RelayMode::OutOfProcess(launcher),
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    };
    let options = ListenerOptions {
        socket: default_socket_path(),
        mode,
        thresholds: config.thresholds,
    };

    let result = match source {
        SourceKind::Libinput => {
            match select_touchpad(&ProbeRoots::default()) {
                Ok(device) => listener::run(LibinputSource::new(&device), &options),
                Err(e) => {
                    eprintln!("{}", e);
                    Err(e)
                }
            }
        }
        SourceKind::Hyprland => listener::run(HyprlandSource::new(), &options),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}

/// Relay-only mode.
fn run_relay() -> ExitCode {
    let path = default_socket_path();
    let relay = match Relay::acquire(&path) {
        Ok(relay) => relay,
        Err(e) => {
            error!("cannot start relay: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = std::io::stdout();
    if let Err(e) = writeln!(stdout, "{}", READY_LINE).and_then(|_| stdout.flush()) {
        error!("cannot signal readiness: {}", e);
        return ExitCode::FAILURE;
    }

    match relay.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("relay failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Ask the running relay to stop.
fn run_quit() -> ExitCode {
    let path = default_socket_path();
    match RelayClient::connect(&path).and_then(|mut client| client.quit()) {
        Ok(()) => {
            info!("relay at {} stopped", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("cannot reach relay at {}: {}", path.display(), e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_is_listen_with_libinput() {
        assert_eq!(
            parse_args(&[]).unwrap(),
            Cli::Listen {
                in_process: false,
                source: SourceKind::Libinput,
                config: None
            }
        );
    }

    #[test]
    fn listen_flags() {
        assert_eq!(
            parse_args(&args(&["listen", "--in-process", "--source", "hyprland", "--config", "/x.json"]))
                .unwrap(),
            Cli::Listen {
                in_process: true,
                source: SourceKind::Hyprland,
                config: Some(PathBuf::from("/x.json"))
            }
        );
    }

    #[test]
    fn subcommands() {
        assert_eq!(parse_args(&args(&["relay"])).unwrap(), Cli::Relay);
        assert_eq!(parse_args(&args(&["quit"])).unwrap(), Cli::Quit);
        assert_eq!(parse_args(&args(&["--help"])).unwrap(), Cli::Help);
    }

    #[test]
    fn missing_touchpad_exits_with_status_2() {
        let base = std::env::temp_dir().join(format!("swipe-relay-main-{}", std::process::id()));
        let roots = ProbeRoots {
            dev: base.join("dev/input"),
            sys: base.join("sys/class/input"),
        };
        let err = select_touchpad(&roots).unwrap_err();
        assert_eq!(exit_status(&err), 2);
        assert!(err.to_string().starts_with("error detecting touchpad: "));
    }

    #[test]
    fn other_failures_exit_with_status_1() {
        let err = ListenerError::Launch("relay exited".into());
        assert_eq!(exit_status(&err), 1);
    }

    #[test]
    fn bad_arguments() {
        assert!(parse_args(&args(&["relay", "extra"])).is_err());
        assert!(parse_args(&args(&["--source", "evdev"])).is_err());
        assert!(parse_args(&args(&["--config"])).is_err());
        assert!(parse_args(&args(&["--frobnicate"])).is_err());
    }
}
