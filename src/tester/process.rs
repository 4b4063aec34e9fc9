//! Ownership of connector processes started by the smoke tester.
//!
//! Every started child lives in a [`ProcessRegistry`] until
//! [`ProcessRegistry::shutdown_all`] terminates it. Children are spawned with
//! kill-on-drop while cleanup is enabled, so a panic still releases them.

use std::time::Duration;

use console::style;
use indexmap::IndexMap;
use tokio::process::Child;

/// Observed state of a retained child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Running,
    /// Exit code, `-1` when terminated by a signal.
    Exited(i32),
}

#[derive(Debug, Default)]
pub struct ProcessRegistry {
    children: IndexMap<String, Child>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, child: Child) {
        if let Some(mut previous) = self.children.insert(key.to_string(), child) {
            log::warn!("replacing retained process for {}", key);
            let _ = previous.start_kill();
        }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Poll a retained child without blocking. `None` when no handle is held.
    pub fn liveness(&mut self, key: &str) -> Option<std::io::Result<Liveness>> {
        let child = self.children.get_mut(key)?;
        Some(child.try_wait().map(|status| match status {
            None => Liveness::Running,
            Some(status) => Liveness::Exited(status.code().unwrap_or(-1)),
        }))
    }

    /// Terminate every retained child that is still running, then forget all
    /// handles. Each child gets SIGTERM (Unix) and `wait` to exit before a
    /// forced kill. Returns how many were running.
    pub async fn shutdown_all(&mut self, wait: Duration) -> usize {
        let mut stopped = 0;
        for (key, mut child) in self.children.drain(..) {
            if !matches!(child.try_wait(), Ok(None)) {
                continue;
            }
            stopped += 1;
            terminate(&mut child);
            match tokio::time::timeout(wait, child.wait()).await {
                Ok(_) => println!("{}", style(format!("Stopped process: {}", key)).dim()),
                Err(_) => {
                    log::debug!("{} ignored SIGTERM for {}s, killing", key, wait.as_secs());
                    if let Err(e) = child.kill().await {
                        log::warn!("failed to kill {}: {}", key, e);
                    }
                    println!("{}", style(format!("Killed process: {}", key)).dim());
                }
            }
        }
        stopped
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match child.id() {
        Some(pid) => {
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                log::debug!("SIGTERM to {} failed: {}", pid, e);
            }
        }
        None => log::debug!("child already reaped"),
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;
    use tokio::process::Command;

    fn spawn(program: &str, args: &[&str]) -> Child {
        Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .unwrap()
    }

    #[tokio::test]
    async fn liveness_tracks_running_and_exited() {
        let mut registry = ProcessRegistry::new();
        registry.insert("sleeper", spawn("sleep", &["30"]));
        registry.insert("quitter", spawn("sh", &["-c", "exit 4"]));
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(registry.liveness("sleeper").unwrap().unwrap(), Liveness::Running);
        assert_eq!(registry.liveness("quitter").unwrap().unwrap(), Liveness::Exited(4));
        assert!(registry.liveness("missing").is_none());

        assert_eq!(registry.shutdown_all(Duration::from_secs(5)).await, 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn stubborn_child_is_killed_after_wait() {
        let mut registry = ProcessRegistry::new();
        registry.insert("stubborn", spawn("sh", &["-c", "trap '' TERM; sleep 30"]));
        tokio::time::sleep(Duration::from_millis(300)).await;

        let started = std::time::Instant::now();
        assert_eq!(registry.shutdown_all(Duration::from_millis(300)).await, 1);
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
