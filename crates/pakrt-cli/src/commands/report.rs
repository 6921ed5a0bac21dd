//! `monitor` / `show-topology` / `security-audit`.
//!
//! Grounded on `youki::commands::list`'s `TabWriter` rendering for the topology table,
//! and on `report::usage_report`'s severity banding for the monitor poll loop.

use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tabwriter::TabWriter;

use pakrt_container::{integrity, report, Config, Orchestrator};

pub fn monitor(config: Config, name: &str, interval_secs: u64) -> Result<()> {
    let orchestrator = Orchestrator::new(config)?;
    let container = orchestrator.load(name)?;
    let cgroups = orchestrator.cgroup_manager_for_integrity()?;
    let interval = Duration::from_secs(interval_secs.max(1));

    loop {
        let usage = report::usage_report(name, &cgroups, container.resources.memory_mb);
        let pids = usage
            .pids
            .iter()
            .map(|(pid, comm)| format!("{pid}({comm})"))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{name}: memory {:.1}% ({} / {} bytes, {}) cpu {}ns pids [{pids}]",
            usage.memory_percent,
            usage.memory_used_bytes,
            usage.memory_limit_bytes,
            usage.severity,
            usage.cpu_usage_ns,
        );
        if pakrt_container::rollback::interrupted() || pakrt_container::rollback::term_requested() {
            break;
        }
        thread::sleep(interval);
    }
    Ok(())
}

pub fn show_topology(config: Config) -> Result<()> {
    let orchestrator = Orchestrator::new(config)?;
    let containers = orchestrator.list_containers()?;
    let entries = report::topology(&containers);

    let mut tab_writer = TabWriter::new(io::stdout());
    writeln!(&mut tab_writer, "NAME\tSTATUS\tIP\tVETH_HOST\tVETH_CONTAINER\tNETNS")?;
    for entry in &entries {
        writeln!(
            &mut tab_writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            entry.name, entry.status, entry.ip, entry.veth_host, entry.veth_container, entry.netns
        )?;
    }
    tab_writer.flush()?;
    Ok(())
}

pub fn security_audit(config: Config, scope: &str, name: Option<&str>) -> Result<()> {
    let orchestrator = Orchestrator::new(config)?;

    if scope == "all" || scope == "system" {
        let report = integrity::validate_system(&orchestrator);
        for check in &report.checks {
            let mark = if check.passed { "ok" } else { "FAIL" };
            println!("[system] [{mark}] {}: {}", check.name, check.detail);
        }
    }

    if scope == "all" || scope == "container" {
        let names: Vec<String> = match name {
            Some(n) => vec![n.to_string()],
            None => orchestrator.list_containers()?.into_iter().map(|c| c.name).collect(),
        };
        for name in &names {
            let corruption = integrity::check_corruption(&orchestrator, name);
            if corruption.is_clean() {
                println!("[container] [ok] {name}: no inconsistencies");
            } else {
                for issue in &corruption.issues {
                    println!("[container] [FAIL] {name}: {issue}");
                }
            }
        }
    }

    Ok(())
}
