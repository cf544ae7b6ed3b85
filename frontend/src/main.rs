//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Mudgate launcher: flag parsing, listener construction, and graceful
//! shutdown on SIGHUP/SIGTERM/SIGINT.

use clap::Parser;
use mudgate_frontend::{
    FrontendConfig, KeyStore, LinkRegistry, SessionRegistry, backend, ssh, telnet,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Connection front end for the game engine.
#[derive(Debug, Parser)]
#[command(name = "mudgate", version)]
struct Args {
    /// Set log level to debug
    #[arg(short = 'd')]
    debug: bool,

    /// Disable Telnet listener
    #[arg(short = 't')]
    disable_telnet: bool,

    /// Disable SSH listener
    #[arg(short = 's')]
    disable_ssh: bool,

    /// Disable Secure Telnet listener
    #[arg(long = "st")]
    disable_secure_telnet: bool,

    /// Telnet listener port
    #[arg(long = "tp", value_name = "PORT", default_value_t = 4000)]
    telnet_port: u16,

    /// SSH listener port
    #[arg(long = "sp", value_name = "PORT", default_value_t = 4001)]
    ssh_port: u16,

    /// Secure Telnet listener port
    #[arg(long = "stp", value_name = "PORT", default_value_t = 4002)]
    secure_telnet_port: u16,

    /// Websocket listener port
    #[arg(long = "wsp", value_name = "PORT", default_value_t = 8989)]
    ws_port: u16,

    /// Command line used to relaunch the game engine on softboot
    #[arg(long = "softboot-command", value_name = "CMDLINE")]
    softboot_command: Option<String>,
}

impl Args {
    fn into_config(self) -> FrontendConfig {
        let mut config = FrontendConfig::default()
            .with_telnet_port(self.telnet_port)
            .with_ssh_port(self.ssh_port)
            .with_telnet_tls_port(self.secure_telnet_port)
            .with_ws_port(self.ws_port);
        config.telnet_enabled = !self.disable_telnet;
        config.ssh_enabled = !self.disable_ssh;
        config.telnet_tls_enabled = !self.disable_secure_telnet;
        if let Some(command) = self.softboot_command {
            config.softboot_command = command.split_whitespace().map(String::from).collect();
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();
    install_panic_hook();

    let keys = KeyStore::from_env()?;
    let config = Arc::new(args.into_config());
    let registry = Arc::new(SessionRegistry::new(keys.ws_secret(), &config));
    let links = Arc::new(LinkRegistry::new());
    let tracker = TaskTracker::new();
    let shutdown = CancellationToken::new();

    if config.telnet_enabled {
        tracing::info!(port = config.telnet_port, "creating client telnet listener");
        let listener = TcpListener::bind(config.telnet_addr()).await?;
        tracker.spawn(telnet::serve_telnet(
            listener,
            registry.clone(),
            config.clone(),
            tracker.clone(),
            shutdown.clone(),
        ));
    }

    if config.telnet_tls_enabled {
        tracing::info!(
            port = config.telnet_tls_port,
            "creating client secure telnet listener"
        );
        let acceptor = telnet::build_tls_acceptor(&config)?;
        let listener = TcpListener::bind(config.telnet_tls_addr()).await?;
        tracker.spawn(telnet::serve_telnet_tls(
            listener,
            acceptor,
            registry.clone(),
            config.clone(),
            tracker.clone(),
            shutdown.clone(),
        ));
    }

    if config.ssh_enabled {
        tracing::info!(port = config.ssh_port, "creating client ssh listener");
        let host_key = ssh::load_host_key(&config, keys.ssh_passphrase())?;
        let ssh_registry = registry.clone();
        let ssh_config = config.clone();
        let ssh_tracker = tracker.clone();
        let ssh_shutdown = shutdown.clone();
        tracker.spawn(async move {
            if let Err(error) =
                ssh::serve_ssh(ssh_registry, ssh_config, host_key, ssh_tracker, ssh_shutdown)
                    .await
            {
                tracing::error!(%error, "ssh listener failed");
            }
        });
    }

    tracing::info!(port = config.ws_port, "creating game engine websocket listener");
    let ws_listener = TcpListener::bind(config.ws_addr()).await?;
    tracker.spawn(backend::serve_backend(
        ws_listener,
        registry.clone(),
        links,
        config.clone(),
        tracker.clone(),
        shutdown.clone(),
    ));

    tracing::info!("launching game front end loop");
    let signal = wait_for_shutdown_signal().await?;
    tracing::warn!(signal, "received exit signal");

    // Cancel everything except this task and collect completions without
    // re-raising their errors.
    shutdown.cancel();
    tracker.close();
    if tokio::time::timeout(Duration::from_secs(10), tracker.wait())
        .await
        .is_err()
    {
        tracing::warn!("some tasks did not finish before the shutdown deadline");
    }

    tracing::info!("front end shut down");
    Ok(())
}

/// Log panics from worker tasks. A panicking session or link task is
/// contained by its supervisor; the runtime keeps serving everyone else.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(panic = %info, "caught panic in task");
        default_hook(info);
    }));
}

/// Block until SIGHUP, SIGTERM, or SIGINT arrives.
async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    let name = tokio::select! {
        _ = hangup.recv() => "SIGHUP",
        _ = terminate.recv() => "SIGTERM",
        _ = interrupt.recv() => "SIGINT",
    };
    Ok(name)
}
