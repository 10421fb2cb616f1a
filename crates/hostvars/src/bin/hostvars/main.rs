mod cli;

use anyhow::Context as _;
use hostvars::context::{Context, Settings, SshDefaults};
use hostvars::export::{topology, HostSummary, InventoryExport};
use hostvars::resolve::VariableProvider;
use hostvars::ssh::SshTarget;
use hostvars::value::Variables;
use indexmap::IndexMap;
use serde::Serialize;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbosity()))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = load(&cli).and_then(|context| match cli.command {
        cli::Command::Inventory(inventory_cli) => inventory(&context, inventory_cli),
        cli::Command::Vars(vars_cli) => vars(&context, vars_cli),
        cli::Command::Ssh(ssh_cli) => ssh(&context, ssh_cli),
        cli::Command::Dev(dev_cli) => dev(&context, dev_cli),
    });

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

/// `HOSTVARS_LOG` if set, otherwise derived from the verbosity
fn log_filter(verbosity: u8) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_env("HOSTVARS_LOG").unwrap_or_else(|_| {
        let level = match verbosity {
            0 | 1 => "info",
            2 => "debug",
            _ => "trace",
        };
        tracing_subscriber::EnvFilter::new(level)
    })
}

fn load(cli: &cli::Cli) -> anyhow::Result<Context> {
    let ssh = SshDefaults {
        user: cli.ssh.user.clone(),
        port: cli.ssh.port,
        private_key_file: cli
            .ssh
            .private_key_file
            .clone()
            .unwrap_or_else(SshDefaults::default_private_key_file),
    };

    let settings = Settings::new(
        cli.inventory.clone(),
        cli.snapshot.clone(),
        ssh,
        cli.verbosity(),
    );

    Ok(Context::load(settings)?)
}

pub fn inventory(context: &Context, cli: cli::InventoryCommand) -> anyhow::Result<()> {
    use cli::InventorySubCommand::*;

    let resolver = context.resolver();

    match cli.command {
        List {
            pattern,
            full,
            output: out,
        } => {
            let resolved = resolver.resolve_all(&pattern);

            if full || context.verbosity > 0 {
                let hosts: IndexMap<&str, Variables> = resolved
                    .into_iter()
                    .map(|(host, variables)| (context.inventory.host(host).name.as_str(), variables))
                    .collect();
                output(&out, &hosts)?;
            } else {
                for (host, variables) in &resolved {
                    let name = &context.inventory.host(*host).name;
                    println!("{}", HostSummary::from_vars(name, variables));
                }
            }
        }
        Hosts { pattern } => {
            for host in context.inventory.get_hosts(&pattern) {
                println!("{}", context.inventory.host(host).name);
            }
        }
        Groups { output: out } => output(&out, &topology(&context.inventory))?,
        Layers { host, output: out } => {
            let layers: IndexMap<String, Variables> = resolver
                .layers(&host)?
                .iter()
                .map(|layer| (layer.describe(), layer.provide().into_owned()))
                .collect();
            output(&out, &layers)?;
        }
        Export {
            pattern,
            file,
            output: out,
        } => {
            let export = InventoryExport::new(&resolver, &pattern);
            let writer = std::fs::File::create(&file)
                .with_context(|| format!("Unable to create {}", file.display()))?;
            write(writer, out.format, &export)?;
            tracing::info!(path=%file.display(), hosts = export.hosts.len(), "inventory exported");
        }
    }

    Ok(())
}

pub fn vars(context: &Context, cli: cli::VarsCommand) -> anyhow::Result<()> {
    let variables = context.resolver().resolve(&cli.host)?;

    match cli.key {
        None => output(&cli.output, &variables),
        Some(key) => {
            let value = variables
                .get(&key)
                .with_context(|| format!("Variable {key} is not set for host {}", cli.host))?;
            output(&cli.output, value)
        }
    }
}

pub fn ssh(context: &Context, cli: cli::SshCommand) -> anyhow::Result<()> {
    use cli::SshSubCommand::*;

    let resolver = context.resolver();
    let target = |host: &str| SshTarget::resolve(&resolver, host, &context.ssh);

    match cli.command {
        Shell { host } => run(&target(&host)?, &[], context.verbosity),
        Exec { host, command } => run(&target(&host)?, &command, context.verbosity),
        Cmd { host, command } => {
            println!("{}", target(&host)?.command_line(&command, context.verbosity));
            Ok(())
        }
        List {
            pattern,
            output: out,
        } => {
            let targets = resolver
                .resolve_all(&pattern)
                .into_iter()
                .map(|(host, variables)| {
                    let name = &context.inventory.host(host).name;
                    SshTarget::from_vars(name, &variables, &context.ssh)
                })
                .collect::<Result<Vec<_>, _>>()?;
            output(&out, &targets)
        }
    }
}

fn run(target: &SshTarget, remote_command: &[String], verbosity: u8) -> anyhow::Result<()> {
    tracing::info!(host = %target.host, address = %target.address, "connecting");

    let status = target
        .command(remote_command, verbosity)
        .status()
        .context("Unable to run ssh")?;

    anyhow::ensure!(status.success(), "ssh to {} failed: {status}", target.host);
    Ok(())
}

fn output(output: &cli::OutputArgs, value: &impl Serialize) -> anyhow::Result<()> {
    write(std::io::stdout(), output.format, value)
}

fn write(
    writer: impl std::io::Write,
    format: cli::OutputFormat,
    value: &impl Serialize,
) -> anyhow::Result<()> {
    match format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(writer, value)?,
        cli::OutputFormat::Json => {
            use std::io::Write;
            let mut writer = writer;
            serde_json::to_writer_pretty(&mut writer, value)?;
            writeln!(writer)?;
        }
    };

    Ok(())
}

/// (hostvars-)developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(context: &Context, cli: cli::DevCommand) -> anyhow::Result<()> {
    use cli::DevSubCommand::*;

    match cli.command {
        Inventory => println!("{:#?}", context.inventory),
        Snapshot => println!("{:#?}", context.snapshot),
    }

    Ok(())
}
