//! Background process-stats polling, ticking once a second while the agent
//! subprocess runs. Linux-only (reads `/proc/<pid>/status`); a no-op
//! poller elsewhere. Stats are sent over a channel rather than invoked
//! through a borrowed callback directly, so the polling task can be
//! `'static` and spawned independently of the caller's borrowed options.

use conductor_application::ports::agent_invoker::ProcessStats;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub fn spawn_poller(pid: u32) -> (JoinHandle<()>, mpsc::UnboundedReceiver<ProcessStats>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        loop {
            interval.tick().await;
            let Some(stats) = read_stats(pid) else {
                break;
            };
            if tx.send(stats).is_err() {
                break;
            }
        }
    });
    (handle, rx)
}

#[cfg(target_os = "linux")]
fn read_stats(pid: u32) -> Option<ProcessStats> {
    let status = std::fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    let rss_bytes = status.lines().find_map(|line| {
        line.strip_prefix("VmRSS:").map(|rest| {
            rest.trim()
                .trim_end_matches(" kB")
                .trim()
                .parse::<u64>()
                .unwrap_or(0)
                * 1024
        })
    })?;
    Some(ProcessStats {
        rss_bytes,
        cpu_percent: 0.0,
    })
}

#[cfg(not(target_os = "linux"))]
fn read_stats(_pid: u32) -> Option<ProcessStats> {
    None
}
