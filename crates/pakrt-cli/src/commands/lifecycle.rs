//! `create-container` / `list-containers` / `run-container` / `delete-container`.
//!
//! Grounded on `youki::commands::{create, start, delete}` for the shape of "parse args,
//! call into the library, report" and `youki::commands::list`'s `TabWriter` rendering.

use std::io::{self, Write};

use anyhow::Result;
use tabwriter::TabWriter;

use pakrt_container::process::LaunchMode;
use pakrt_container::{Config, Orchestrator};

pub fn create(
    config: Config,
    name: &str,
    ram: i64,
    cpu: i64,
    hostname: Option<&str>,
) -> Result<()> {
    let mut orchestrator = Orchestrator::new(config)?;
    let container = orchestrator.create(name, ram, cpu, hostname)?;
    println!(
        "created {} ({} MiB, {}% cpu, ip {})",
        container.name, container.resources.memory_mb, container.resources.cpu_percentage,
        container.network.ip_address
    );
    Ok(())
}

pub fn list(config: Config) -> Result<()> {
    let orchestrator = Orchestrator::new(config)?;
    let containers = orchestrator.list_containers()?;

    let mut tab_writer = TabWriter::new(io::stdout());
    writeln!(&mut tab_writer, "NAME\tSTATUS\tPID\tIP\tMEMORY\tCPU\tCREATED")?;
    for container in &containers {
        writeln!(
            &mut tab_writer,
            "{}\t{}\t{}\t{}\t{} MiB\t{}%\t{}",
            container.name,
            container.status,
            if container.pid > 0 {
                container.pid.to_string()
            } else {
                "-".to_string()
            },
            container.network.ip_address,
            container.resources.memory_mb,
            container.resources.cpu_percentage,
            container.created.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        )?;
    }
    tab_writer.flush()?;
    Ok(())
}

pub fn run(
    config: Config,
    name: &str,
    command: Option<&str>,
    args: &[String],
    detach: bool,
) -> Result<()> {
    let mut orchestrator = Orchestrator::new(config)?;
    let mode = if detach {
        LaunchMode::Detached
    } else {
        LaunchMode::Interactive
    };
    let code = orchestrator.run(name, command, args, mode)?;
    if mode == LaunchMode::Interactive && code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

pub fn delete(config: Config, name: &str, force: bool) -> Result<()> {
    let mut orchestrator = Orchestrator::new(config)?;
    let failures = orchestrator.delete(name, force)?;
    if failures > 0 {
        println!("deleted {name} with {failures} teardown error(s)");
    } else {
        println!("deleted {name}");
    }
    Ok(())
}
