// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::ErrorKind;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;

use anyhow::Context;
use clap::Parser;
use slog::{o, Drain};

use ps2kbd::usdt::register_probes;
use ps2kbd::{DeviceConfiguration, Keycode, PS2Kbd};

mod config;
mod sock_line;

use sock_line::SockLine;

fn build_log() -> (slog::Logger, slog_async::AsyncGuard) {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::CompactFormat::new(decorator).build().fuse();
    let (drain, guard) = slog_async::Async::new(drain).build_with_guard();
    (slog::Logger::root(drain.fuse(), o!()), guard)
}

/// Run one host session: power on, type the key script, then answer host
/// commands until the host hangs up.
fn serve(
    conn: UnixStream,
    config: &config::Config,
    keys: &[Keycode],
    log: &slog::Logger,
) -> anyhow::Result<DeviceConfiguration> {
    let mut kbd = PS2Kbd::new(SockLine::new(conn), log)
        .with_retry_policy(config.retry.policy());

    kbd.initialize().context("keyboard initialization")?;
    if !keys.is_empty() {
        slog::info!(log, "Typing key script"; "keys" => keys.len());
        kbd.type_keys(keys).context("typing key script")?;
    }

    loop {
        match kbd.process_command() {
            Ok(cmd) => slog::debug!(log, "Host command done"; "cmd" => ?cmd),
            Err(ps2kbd::Error::Line(e))
                if e.kind() == ErrorKind::UnexpectedEof =>
            {
                slog::info!(log, "Host disconnected");
                break;
            }
            Err(e) => return Err(e).context("processing host command"),
        }
    }
    Ok(kbd.config().clone())
}

fn dump_state(path: &str, state: &DeviceConfiguration) -> anyhow::Result<()> {
    let data = serde_json::to_vec_pretty(state)?;
    std::fs::write(path, data)
        .with_context(|| format!("Failed to write device state to {path}"))
}

#[derive(clap::Parser)]
/// Emulated PS/2 keyboard, served to a host over a Unix socket.
struct Args {
    /// Keyboard config file.
    #[clap(value_name = "CONFIG", action)]
    config: String,

    /// Write the keyboard state as JSON to this path after each session.
    #[clap(short, long, action)]
    dump_state: Option<String>,

    /// Exit after the first host session.
    #[clap(long, action)]
    once: bool,
}

fn main() -> anyhow::Result<()> {
    let Args { config: config_path, dump_state: dump_path, once } =
        Args::parse();

    let (log, _log_async_guard) = build_log();

    // Ensure proper setup of USDT probes
    register_probes().context("Failed to setup USDT probes")?;

    let config = config::parse(&config_path)?;
    let keys = config.script.keycodes()?;

    let sock_path = Path::new(&config.main.socket);
    if sock_path.exists() {
        std::fs::remove_file(sock_path)
            .context("Failed to remove stale socket")?;
    }
    let listener = UnixListener::bind(sock_path)
        .with_context(|| format!("Failed to bind {}", sock_path.display()))?;

    slog::info!(log, "Waiting for host"; "socket" => %sock_path.display());
    for conn in listener.incoming() {
        let conn = conn.context("Failed to accept host connection")?;
        slog::info!(log, "Host connected");

        match serve(conn, &config, &keys, &log) {
            Ok(state) => {
                slog::info!(log, "Session ended";
                    "enabled" => state.enabled(),
                    "scan_code_set" => state.scan_code_set(),
                    "leds" => ?state.leds());
                if let Some(path) = dump_path.as_deref() {
                    dump_state(path, &state)?;
                }
            }
            Err(e) => {
                slog::error!(log, "Session failed: {:?}", e);
            }
        }
        if once {
            break;
        }
    }
    Ok(())
}
