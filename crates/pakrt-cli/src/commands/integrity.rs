//! `cleanup-all` / `recover-state` / `validate-system` / `emergency-cleanup`.
//!
//! Grounded on `libcontainer::container::container_delete`'s tolerant teardown reporting
//! style ("N error(s)" rather than aborting), applied here to the cross-container sweep
//! and recovery operations.

use std::io::{self, Write};

use anyhow::Result;

use pakrt_container::{integrity, Config, Orchestrator};

pub fn cleanup_all(config: Config) -> Result<()> {
    let mut orchestrator = Orchestrator::new(config)?;
    let sweep = integrity::sweep_orphans(&mut orchestrator)?;
    report_sweep(&sweep);

    let names: Vec<String> = orchestrator
        .list_containers()?
        .into_iter()
        .map(|c| c.name)
        .collect();

    let mut total_failures = 0;
    for name in &names {
        match orchestrator.delete(name, true) {
            Ok(failures) => total_failures += failures,
            Err(err) => {
                eprintln!("failed to delete {name}: {err}");
                total_failures += 1;
            }
        }
    }
    println!("removed {} container(s), {total_failures} teardown error(s)", names.len());
    Ok(())
}

pub fn recover_state(config: Config, name: Option<&str>) -> Result<()> {
    let orchestrator = Orchestrator::new(config)?;
    let names: Vec<String> = match name {
        Some(n) => vec![n.to_string()],
        None => orchestrator.list_containers()?.into_iter().map(|c| c.name).collect(),
    };

    for name in &names {
        let report = integrity::recover(&orchestrator, name)?;
        if report.actions_taken.is_empty() {
            println!("{name}: no corruption found");
        } else {
            println!("{name}: {}", report.actions_taken.join(", "));
        }
    }
    Ok(())
}

pub fn validate_system(config: Config) -> Result<()> {
    let orchestrator = Orchestrator::new(config)?;
    let report = integrity::validate_system(&orchestrator);
    for check in &report.checks {
        let mark = if check.passed { "ok" } else { "FAIL" };
        println!("[{mark}] {}: {}", check.name, check.detail);
    }
    if !report.all_passed() {
        anyhow::bail!("system validation failed");
    }
    Ok(())
}

pub fn emergency_cleanup(config: Config) -> Result<()> {
    print!("this will remove every orphaned veth, netns, and cgroup directory owned by pakrt. continue? [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    if !answer.trim().eq_ignore_ascii_case("y") {
        println!("aborted");
        return Ok(());
    }

    let mut orchestrator = Orchestrator::new(config)?;
    let sweep = integrity::sweep_orphans(&mut orchestrator)?;
    report_sweep(&sweep);
    Ok(())
}

fn report_sweep(sweep: &integrity::OrphanSweepReport) {
    println!(
        "removed {} veth(s), {} netns, {} cgroup dir(s), released {} ip binding(s)",
        sweep.removed_veths.len(),
        sweep.removed_netns.len(),
        sweep.removed_cgroups.len(),
        sweep.released_ips.len(),
    );
}
