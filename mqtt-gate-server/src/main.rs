/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

extern crate argh;
extern crate mqtt_gate;
extern crate simplelog;
extern crate tokio;

mod config;

use argh::FromArgs;
use crate::config::ServerConfig;
use log::*;
use mqtt_gate::features::rustls::build_tls_acceptor;
use mqtt_gate::*;
use simplelog::*;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

#[derive(FromArgs, Debug, PartialEq)]
/// mqtt-gate-server - an MQTT 3.1/3.1.1 gateway
struct CommandLineArgs {

    /// path to the TOML configuration file.  Defaults are used for everything if the file does
    /// not exist.
    #[argh(option, default = "PathBuf::from(\"gateway.toml\")")]
    config: PathBuf,

    /// path to a log file that should be written.  Overrides `log_path` in the configuration file.
    #[argh(option)]
    logpath: Option<PathBuf>,
}

fn load_config(args: &CommandLineArgs) -> GateResult<ServerConfig> {
    let mut config =
        if args.config.exists() {
            ServerConfig::load(&args.config)?
        } else {
            println!("Configuration file {} not found, using defaults", args.config.display());
            ServerConfig::default()
        };

    if let Some(log_path) = &args.logpath {
        config.common.log_path = Some(log_path.clone());
    }

    Ok(config)
}

fn init_logging(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let level = config.log_level()?;
    let log_config = simplelog::ConfigBuilder::new().build();

    match &config.common.log_path {
        Some(log_path) => {
            let log_file = File::create(log_path)?;
            WriteLogger::init(level, log_config, log_file)?;
        }
        None => {
            TermLogger::init(level, log_config, TerminalMode::Mixed, ColorChoice::Auto)?;
        }
    }

    Ok(())
}

fn build_gateway(config: &ServerConfig) -> GateResult<Gateway> {
    let options = config.gateway_options();

    let providers = SessionProviders::new();
    providers.register(options.session_provider(), Arc::new(MemoryProvider::new(options.ack_queue_size())))?;

    Gateway::new(options, Arc::new(AllowAllAuthenticator {}), Arc::new(RequestedQosResolver {}), &providers)
}

fn accept_tls(gateway: &Gateway, acceptor: &TlsAcceptor, stream: tokio::net::TcpStream, address: std::net::SocketAddr) {
    let gateway = gateway.clone();
    let acceptor = acceptor.clone();
    let handshake_timeout = gateway.options().handshake_timeout();

    tokio::spawn(async move {
        match tokio::time::timeout(handshake_timeout, acceptor.accept(stream)).await {
            Ok(Ok(tls_stream)) => {
                let _ = gateway.accept(tls_stream).await;
            }
            Ok(Err(error)) => {
                info!("server - tls handshake with {} failed: {}", address, error);
            }
            Err(_) => {
                info!("server - tls handshake with {} timed out", address);
            }
        }
    });
}

async fn run_listener(config: &ServerConfig, gateway: &Gateway) -> GateResult<()> {
    let acceptor =
        if config.provider.enable_tls {
            Some(build_tls_acceptor(&config.provider.tls_cert, &config.provider.tls_key)?)
        } else {
            None
        };

    let listener = TcpListener::bind(&config.provider.tcp_addr).await?;
    info!("server - listening on {} (tls: {})", config.provider.tcp_addr, acceptor.is_some());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("server - interrupt received, shutting down");
                return Ok(());
            }
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, address)) => {
                        debug!("server - accepted connection from {}", address);
                        if let Err(error) = stream.set_nodelay(true) {
                            debug!("server - failed to disable nagle for {}: {}", address, error);
                        }

                        match &acceptor {
                            Some(acceptor) => { accept_tls(gateway, acceptor, stream, address); }
                            None => { let _ = gateway.accept(stream); }
                        }
                    }
                    Err(error) => {
                        error!("server - accept failed: {}", error);
                    }
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli_args: CommandLineArgs = argh::from_env();

    let config = load_config(&cli_args)?;
    init_logging(&config)?;

    let gateway = build_gateway(&config)?;
    run_listener(&config, &gateway).await?;

    for id in gateway.connections().ids() {
        if let Some(connection) = gateway.find_connection(id) {
            connection.stop();
        }
    }
    gateway.sessions().close();

    Ok(())
}
