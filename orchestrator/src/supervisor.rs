//! Parser process lifecycle (§4.6 steps 7 and the monitoring loop's
//! "Health-check parser processes; restart any dead process"). Parser
//! consumers run as separate OS processes with no shared memory; the
//! orchestrator only spawns them and watches their exit status.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, Command};

pub struct ParserProcess {
    pub index: usize,
    child: Child,
}

/// Spawns `count` copies of the `webcrawler-parser` binary, passing through
/// the same config file / connection flags the orchestrator was given.
pub fn spawn_parsers(
    count: usize,
    parser_binary: &PathBuf,
    config_path: Option<&PathBuf>,
    cs_host: &str,
    cs_port: u16,
) -> std::io::Result<Vec<ParserProcess>> {
    let mut processes = Vec::with_capacity(count);
    for index in 0..count {
        let mut cmd = Command::new(parser_binary);
        if let Some(path) = config_path {
            cmd.arg("--config").arg(path);
        }
        cmd.arg("--cs-host")
            .arg(cs_host)
            .arg("--cs-port")
            .arg(cs_port.to_string())
            .arg("--process-index")
            .arg(index.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let child = cmd.spawn()?;
        tracing::info!(index, pid = child.id(), "spawned parser process");
        processes.push(ParserProcess { index, child });
    }
    Ok(processes)
}

impl ParserProcess {
    /// Non-blocking liveness check. Returns `true` if the process has
    /// exited and should be respawned.
    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_status)))
    }

    pub async fn terminate(mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }
}

/// Restarts any parser process that `has_exited`, in place.
pub fn restart_dead(
    processes: &mut Vec<ParserProcess>,
    parser_binary: &PathBuf,
    config_path: Option<&PathBuf>,
    cs_host: &str,
    cs_port: u16,
) {
    for i in 0..processes.len() {
        if processes[i].has_exited() {
            let index = processes[i].index;
            tracing::warn!(index, "parser process died; respawning");
            let mut cmd = Command::new(parser_binary);
            if let Some(path) = config_path {
                cmd.arg("--config").arg(path);
            }
            cmd.arg("--cs-host")
                .arg(cs_host)
                .arg("--cs-port")
                .arg(cs_port.to_string())
                .arg("--process-index")
                .arg(index.to_string())
                .stdin(Stdio::null())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .kill_on_drop(true);
            match cmd.spawn() {
                Ok(child) => {
                    tracing::info!(index, pid = child.id(), "respawned parser process");
                    processes[i] = ParserProcess { index, child };
                }
                Err(e) => {
                    tracing::error!(index, error = %e, "failed to respawn parser process");
                }
            }
        }
    }
}
