use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use mcstatus::{
    config,
    service::{StatusRequest, StatusService, UserId},
    trace::init_tracing_subscriber,
    HostPort, ServerAddress, StatusResponse,
};
use tracing::{debug, info, warn};

/// Everything run from the command line shares one history
const LOCAL_USER: UserId = 0;

/// Query the status of Minecraft Java edition servers
#[derive(Debug, Parser)]
#[command(name = "mcstatus", version)]
struct Args {
    /// Print each status as a line of JSON instead of a report
    #[arg(long)]
    json: bool,

    /// Config file to load, a missing file means defaults
    #[arg(long, env = config::CONFIG_PATH_ENV, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Servers to query as `host[:port]`, the configured servers when empty
    targets: Vec<HostPort>,
}

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    let Args {
        json,
        config: config_path,
        mut targets,
    } = Args::parse();

    init_tracing_subscriber();

    let config = config::load(&config_path).await?;
    if targets.is_empty() {
        debug!(count = config.servers.len(), "using servers from config");
        targets.clone_from(&config.servers);
    }

    if targets.is_empty() {
        eyre::bail!(
            "no servers given on the command line or in {}",
            config_path.display()
        );
    }

    let service = StatusService::new(&config);
    let mut failed = 0;

    for target in targets {
        let address = match StatusRequest::from(target).validate(service.query_config()) {
            Ok(address) => address,
            Err(error) => {
                warn!(%error, "request refused");
                eprintln!("{error}");
                failed += 1;
                continue;
            }
        };

        match service.request_status(LOCAL_USER, &address).await {
            Ok(status) if json => println!("{}", serde_json::to_string(&*status)?),
            Ok(status) => print_report(&address, &status),
            Err(error) => {
                debug!(span_trace = %error.span_trace(), "query failed");
                println!("{address}\n  {error}\n");
                failed += 1;
            }
        }
    }

    info!(failed, "done");

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_report(address: &ServerAddress, response: &StatusResponse) {
    let status = response.status();

    println!("{address}");
    if let Some(description) = status.description_text() {
        for line in description.lines() {
            println!("  {line}");
        }
    }

    match &status.players {
        Some(players) => println!("  players:  {}/{}", players.online, players.max),
        None => println!("  players:  hidden"),
    }
    println!(
        "  version:  {} (protocol {})",
        status.version.name, status.version.protocol
    );
    println!("  ping:     {:.2} ms", response.ping());

    if status.enforces_secure_chat {
        println!("  enforces secure chat");
    }
    if status.prevents_chat_reports {
        println!("  prevents chat reports");
    }

    if let Some(mod_info) = &status.mod_info {
        println!("  mods:     {} ({} loaded)", mod_info.kind, mod_info.mods.len());
    }

    match status.favicon_png() {
        Some(Ok(png)) => println!("  favicon:  {} bytes", png.len()),
        Some(Err(error)) => println!("  favicon:  unreadable ({error})"),
        None => {}
    }

    if let Some(players) = &status.players {
        if !players.sample.is_empty() {
            let names = players
                .sample
                .iter()
                .map(|player| player.name.as_str())
                .collect::<Vec<_>>();

            println!("  online:   {}", names.join(", "));
        }
    }

    println!();
}
