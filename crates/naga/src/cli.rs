//! CLI argument parsing for naga

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use naga_core::Delay;

#[derive(Parser, Debug)]
#[command(name = "naga", version)]
#[command(about = "Fleet maintenance over SSH: updates, repo sync and reboot cascades")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (default: NAGA_CONFIG, ./naga.toml, /etc/naga/naga.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Registry database, overriding `[registry] path`
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the registry database
    Init,

    /// Run updaters and tasks on one host or on every host
    Run {
        /// Host name, or `all`
        target: String,

        /// Run this operation instead of the assigned updater and tasks
        operation: Option<String>,

        /// Operation argument (package, repository path, script, delay)
        arg: Option<String>,
    },

    /// Reboot a host after halting everything it powers
    Reboot {
        /// Host name
        host: String,

        /// `+N` minutes, `HH:MM`, or `now`
        #[arg(long, default_value = "+1")]
        at: Delay,

        /// Halt instead of rebooting
        #[arg(long)]
        halt: bool,
    },

    /// Manage hosts
    #[command(subcommand)]
    Hosts(HostsCommand),

    /// Manage task assignments
    #[command(subcommand)]
    Tasks(LinkCommand),

    /// Manage power dependencies
    #[command(subcommand)]
    Children(LinkCommand),
}

#[derive(Subcommand, Debug)]
pub enum HostsCommand {
    /// List every host
    List,

    /// Show one host
    Show {
        /// Host name
        name: String,
    },

    /// Register a host
    Add {
        /// Host name, also the connection target
        name: String,

        /// Updater operation (e.g. apt_all, brew_all)
        #[arg(long)]
        updater: String,

        /// Task to assign (repeatable)
        #[arg(long = "task")]
        tasks: Vec<String>,
    },

    /// Delete a host with its tasks and power links
    Delete {
        /// Host name
        name: String,
    },
}

/// `add`/`remove` over a pair: host+task or parent+child
#[derive(Subcommand, Debug)]
pub enum LinkCommand {
    /// Create the link
    Add {
        /// Host (or parent) name
        host: String,
        /// Task identifier (or child name)
        item: String,
    },

    /// Remove the link
    Remove {
        /// Host (or parent) name
        host: String,
        /// Task identifier (or child name)
        item: String,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_with_operation_and_arg() {
        let cli = Cli::try_parse_from(["naga", "--json", "run", "web1", "apt_install", "htop"]).unwrap();

        assert!(cli.json);
        match cli.command {
            Command::Run {
                target,
                operation,
                arg,
            } => {
                assert_eq!(target, "web1");
                assert_eq!(operation.as_deref(), Some("apt_install"));
                assert_eq!(arg.as_deref(), Some("htop"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_reboot_delay() {
        let cli = Cli::try_parse_from(["naga", "reboot", "hv1", "--at", "23:55", "--halt"]).unwrap();
        match cli.command {
            Command::Reboot { host, at, halt } => {
                assert_eq!(host, "hv1");
                assert_eq!(at.to_string(), "23:55");
                assert!(halt);
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::try_parse_from(["naga", "reboot", "hv1"]).unwrap();
        assert!(matches!(cli.command, Command::Reboot { at: Delay::Relative(1), .. }));

        assert!(Cli::try_parse_from(["naga", "reboot", "hv1", "--at", "soon"]).is_err());
    }

    #[test]
    fn test_repeated_tasks_and_verbosity() {
        let cli = Cli::try_parse_from([
            "naga", "-vv", "hosts", "add", "web1", "--updater", "apt_all", "--task", "git_all",
            "--task", "pihole_up",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Hosts(HostsCommand::Add { tasks, .. }) => {
                assert_eq!(tasks, vec!["git_all", "pihole_up"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
