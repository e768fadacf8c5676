//! naga
//!
//! Fleet maintenance CLI: runs each host's updater and tasks over SSH,
//! syncs repositories, and reboots hosts after halting what they power.

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use naga_core::{Dispatcher, HostRegistry, NewHost, Operation, PowerMode, run_fleet};
use naga_registry::Registry;

mod cli;
mod config;
mod factory;
mod output;

use cli::{Cli, Command, HostsCommand, LinkCommand};
use config::Config;
use factory::DefaultSessionFactory;
use output::Printer;

/// Target name that selects every registered host
const ALL_HOSTS: &str = "all";

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = Config::locate(cli.config.as_deref())?;
    init_tracing(&config, cli.verbose);

    let db = cli.db.clone().unwrap_or_else(|| config.registry.path.clone());
    let mut printer = Printer::stdout(cli.json);

    let registry = match cli.command {
        Command::Init => Registry::init(&db)?,
        _ => open_registry(&db)?,
    };
    let result = execute(cli.command, &config, &db, registry.clone(), &mut printer).await;
    registry.shutdown().await;
    result
}

/// `RUST_LOG` wins, then `-v` flags, then `log_level` from the config file
fn init_tracing(config: &Config, verbose: u8) {
    let level = match verbose {
        0 => config.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_registry(db: &Path) -> Result<Registry> {
    Registry::open(db).map_err(|e| eyre::eyre!("{e} (run `naga init` to create it)"))
}

async fn execute(
    command: Command,
    config: &Config,
    db: &Path,
    registry: Registry,
    printer: &mut Printer<std::io::Stdout>,
) -> Result<()> {
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(registry.clone()),
        Arc::new(DefaultSessionFactory::new(config)),
        config.engine.clone(),
    ));

    match command {
        Command::Init => println!("initialised {}", db.display()),
        Command::Run {
            target,
            operation,
            arg,
        } => {
            let operation = operation.map(|name| Operation::from_parts(&name, arg.as_deref()));
            if target == ALL_HOSTS {
                let fleet = run_fleet(dispatcher, operation).await?;
                info!(
                    hosts = fleet.hosts.len(),
                    restart_required = fleet.restart_required.len(),
                    failed = fleet.failed.len(),
                    "fleet run finished"
                );
                printer.fleet(&fleet)?;
            } else {
                let report = match operation {
                    Some(operation) => dispatcher.run_adhoc(&target, &operation).await?,
                    None => dispatcher.update_host(&target).await?,
                };
                printer.host(&report)?;
            }
        }
        Command::Reboot { host, at, halt } => {
            let record = registry.require(&host).await?;
            let mode = if halt { PowerMode::Halt } else { PowerMode::Reboot };
            let tree = dispatcher.cascade().run(&record, at, mode).await;
            printer.cascade(&tree)?;
            if tree.has_failures() {
                warn!(%host, "cascade left some hosts unscheduled");
            }
        }
        Command::Hosts(cmd) => hosts(cmd, &registry, printer).await?,
        Command::Tasks(LinkCommand::Add { host, item }) => {
            registry.assign_task(&host, &item).await?;
            println!("{host}: assigned {item}");
        }
        Command::Tasks(LinkCommand::Remove { host, item }) => {
            registry.remove_task(&host, &item).await?;
            println!("{host}: removed {item}");
        }
        Command::Children(LinkCommand::Add { host, item }) => {
            registry.add_child(&host, &item).await?;
            println!("{host}: now powers {item}");
        }
        Command::Children(LinkCommand::Remove { host, item }) => {
            registry.remove_child(&host, &item).await?;
            println!("{host}: no longer powers {item}");
        }
    }
    Ok(())
}

async fn hosts(
    command: HostsCommand,
    registry: &Registry,
    printer: &mut Printer<std::io::Stdout>,
) -> Result<()> {
    match command {
        HostsCommand::List => {
            let names = registry.host_names().await?;
            printer.value(&names, &names)?;
        }
        HostsCommand::Show { name } => {
            let record = registry.require(&name).await?;
            let mut children = Vec::with_capacity(record.children.len());
            for id in &record.children {
                children.push(match registry.get(*id).await? {
                    Some(child) => child.name,
                    None => format!("#{id} (missing)"),
                });
            }
            let plain = vec![
                format!("name: {}", record.name),
                format!("updater: {}", record.updater),
                format!("tasks: {}", record.tasks.join(", ")),
                format!("children: {}", children.join(", ")),
            ];
            printer.value(&record, &plain)?;
        }
        HostsCommand::Add {
            name,
            updater,
            tasks,
        } => {
            let id = registry
                .add_host(NewHost {
                    name: name.clone(),
                    updater,
                    tasks,
                })
                .await?;
            println!("{name}: added with id {id}");
        }
        HostsCommand::Delete { name } => {
            registry.delete_host(&name).await?;
            println!("{name}: deleted");
        }
    }
    Ok(())
}
