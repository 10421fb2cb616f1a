//! hostvars cli interface

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; hostvars ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    /// Inventory file, or a directory containing hosts.yml
    #[clap(
        short = 'i',
        long = "inventory",
        env = "ANSIBLE_INVENTORY",
        default_value = ".",
        global(true)
    )]
    pub inventory: PathBuf,

    /// Workspace snapshot (yaml or json), overrides inventory variables
    #[clap(
        short = 's',
        long = "snapshot",
        env = "POLYCRATE_WORKSPACE_SNAPSHOT_YAML",
        global(true)
    )]
    pub snapshot: Option<PathBuf>,

    #[clap(flatten)]
    pub ssh: SshArgs,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[clap(short = 'v', long = "verbose", action = ArgAction::Count, global(true))]
    pub verbose: u8,

    #[clap(
        long = "verbosity",
        env = "ANSIBLE_VERBOSITY",
        default_value_t = 0,
        hide = true,
        global(true)
    )]
    pub verbosity: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose.max(self.verbosity)
    }
}

#[derive(Parser, Debug)]
pub struct SshArgs {
    /// Fallback ssh user
    #[clap(long = "ssh-user", env = "USERNAME", default_value = "root", global(true))]
    pub user: String,

    /// Fallback ssh port
    #[clap(long = "ssh-port", env = "ANSIBLE_SSH_PORT", default_value_t = 22, global(true))]
    pub port: u16,

    /// Fallback private key [default: ~/.ssh/id_rsa]
    #[clap(long = "ssh-private-key-file", env = "ANSIBLE_SSH_PRIVATE_KEY_FILE", global(true))]
    pub private_key_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect the inventory
    #[command(alias = "inv")]
    Inventory(InventoryCommand),

    /// Print the resolved variables of a host
    Vars(VarsCommand),

    /// Connect to hosts via ssh
    Ssh(SshCommand),

    /// Print debug information for development
    Dev(DevCommand),
}

#[derive(Parser, Debug)]
pub struct InventoryCommand {
    #[command(subcommand)]
    pub command: InventorySubCommand,
}

#[derive(Subcommand, Debug)]
pub enum InventorySubCommand {
    /// List hosts with their address, port and user
    List {
        /// Host pattern, e.g. `web:&prod:!web3`
        #[arg(default_value = "all")]
        pattern: String,

        /// Print all resolved variables
        #[clap(long)]
        full: bool,

        #[clap(flatten)]
        output: OutputArgs,
    },

    /// Print the names of matching hosts
    Hosts {
        #[arg(default_value = "all")]
        pattern: String,
    },

    /// Print children and hosts of every group
    Groups {
        #[clap(flatten)]
        output: OutputArgs,
    },

    /// Print the layers a host is resolved from, lowest precedence first
    Layers {
        host: String,

        #[clap(flatten)]
        output: OutputArgs,
    },

    /// Write resolved hosts and the group topology to a file
    Export {
        #[arg(default_value = "all")]
        pattern: String,

        #[clap(short = 'o', long = "output-file")]
        file: PathBuf,

        #[clap(flatten)]
        output: OutputArgs,
    },
}

#[derive(Parser, Debug)]
pub struct VarsCommand {
    pub host: String,

    /// Only print this variable
    #[clap(short = 'k', long = "key")]
    pub key: Option<String>,

    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct SshCommand {
    #[command(subcommand)]
    pub command: SshSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum SshSubCommand {
    /// Open an interactive shell on a host
    Shell { host: String },

    /// Run a command on a host
    Exec {
        host: String,

        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Print the ssh invocation for a host
    Cmd {
        host: String,

        #[arg(last = true)]
        command: Vec<String>,
    },

    /// List ssh targets of matching hosts
    List {
        #[arg(default_value = "all")]
        pattern: String,

        #[clap(flatten)]
        output: OutputArgs,
    },
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(Parser, Debug)]
pub struct DevCommand {
    #[command(subcommand)]
    pub command: DevSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum DevSubCommand {
    Inventory,
    Snapshot,
}
