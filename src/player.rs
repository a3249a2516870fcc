use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Sender};
use serde_json::json;
use tracing::{debug, warn};

#[cfg(unix)]
use rand::{distributions::Alphanumeric, Rng};
#[cfg(unix)]
use std::io::Write;
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::feed::FeedEvent;
use crate::playback::PlayFailure;

const POLL_INTERVAL: Duration = Duration::from_millis(30);

#[derive(Debug, Clone)]
pub struct PlayerOptions {
    pub mpv_path: String,
    pub extra_args: Vec<String>,
    pub fullscreen: bool,
    pub user_agent: String,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            mpv_path: "mpv".to_string(),
            extra_args: Vec::new(),
            fullscreen: false,
            user_agent: String::new(),
        }
    }
}

/// Plays one slide at a time in an external mpv window and reports
/// started/failed/ended back to the feed's event channel.
pub struct Player {
    opts: PlayerOptions,
    events: Sender<FeedEvent>,
    current: Option<Running>,
}

struct Running {
    slide: usize,
    url: String,
    kill_tx: Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
    ipc_path: Option<String>,
}

impl Running {
    fn stop(mut self) {
        let _ = self.kill_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn exited(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true)
    }
}

impl Player {
    pub fn new(opts: PlayerOptions, events: Sender<FeedEvent>) -> Self {
        Self {
            opts,
            events,
            current: None,
        }
    }

    pub fn current_slide(&self) -> Option<usize> {
        self.current.as_ref().map(|running| running.slide)
    }

    pub fn play(&mut self, slide: usize, url: &str) {
        if let Some(running) = self.current.as_ref() {
            if running.slide == slide && running.url == url && !running.exited() {
                if let Some(path) = running.ipc_path.as_deref() {
                    match send_ipc_command(path, &["set_property", "pause", "false"]) {
                        Ok(()) => {
                            let _ = self.events.send(FeedEvent::PlayStarted(slide));
                            return;
                        }
                        Err(err) => debug!(slide, error = %format!("{err:#}"), "mpv resume failed"),
                    }
                }
            }
        }
        self.stop();
        match self.spawn(slide, url) {
            Ok(running) => self.current = Some(running),
            Err(err) => {
                warn!(slide, error = %format!("{err:#}"), "mpv launch failed");
                let _ = self.events.send(FeedEvent::PlayFailed {
                    slide,
                    failure: PlayFailure::Other(format!("{err:#}")),
                });
            }
        }
    }

    pub fn pause(&mut self, slide: usize) {
        let Some(running) = self.current.as_ref() else {
            return;
        };
        if running.slide != slide {
            return;
        }
        if let Some(path) = running.ipc_path.as_deref() {
            if send_ipc_command(path, &["set_property", "pause", "true"]).is_ok() {
                return;
            }
        }
        self.stop();
    }

    pub fn stop(&mut self) {
        if let Some(running) = self.current.take() {
            debug!(slide = running.slide, "stopping mpv");
            running.stop();
        }
    }

    fn args(&self, url: &str, ipc_path: Option<&str>) -> Vec<String> {
        let mut args = vec![
            url.to_string(),
            "--force-window=yes".to_string(),
            "--keep-open=no".to_string(),
            "--really-quiet".to_string(),
            "--no-terminal".to_string(),
            "--ytdl=no".to_string(),
        ];
        if self.opts.fullscreen {
            args.push("--fullscreen".to_string());
        }
        if !self.opts.user_agent.trim().is_empty() {
            args.push(format!("--user-agent={}", self.opts.user_agent.trim()));
        }
        if let Some(path) = ipc_path {
            args.push(format!("--input-ipc-server={path}"));
        }
        args.extend(self.opts.extra_args.iter().cloned());
        args
    }

    fn spawn(&self, slide: usize, url: &str) -> Result<Running> {
        if url.trim().is_empty() {
            return Err(anyhow!("video URL missing"));
        }
        let ipc_path = unique_ipc_path();
        #[cfg(unix)]
        if let Some(path) = &ipc_path {
            let _ = std::fs::remove_file(path);
        }
        let args = self.args(url, ipc_path.as_deref());
        debug!(slide, ?args, "launching mpv");

        let mut child = Command::new(&self.opts.mpv_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("launch {} to play {url}", self.opts.mpv_path))?;
        let _ = self.events.send(FeedEvent::PlayStarted(slide));

        let (kill_tx, kill_rx) = bounded::<()>(1);
        let events = self.events.clone();
        let cleanup = ipc_path.clone();
        let handle = thread::spawn(move || {
            let outcome: Result<Option<ExitStatus>> = loop {
                if kill_rx.try_recv().is_ok() {
                    let _ = child.kill();
                    let _ = child.wait();
                    break Ok(None);
                }
                match child.try_wait() {
                    Ok(Some(status)) => break Ok(Some(status)),
                    Ok(None) => thread::sleep(POLL_INTERVAL),
                    Err(err) => break Err(anyhow!(err)).context("poll mpv status"),
                }
            };
            if let Some(path) = cleanup {
                let _ = std::fs::remove_file(path);
            }
            let event = match outcome {
                Ok(None) => return,
                Ok(Some(status)) if status.success() => FeedEvent::Ended(slide),
                Ok(Some(status)) => FeedEvent::PlayFailed {
                    slide,
                    failure: PlayFailure::Other(format!("mpv exited with {status}")),
                },
                Err(err) => FeedEvent::PlayFailed {
                    slide,
                    failure: PlayFailure::Other(format!("{err:#}")),
                },
            };
            let _ = events.send(event);
        });

        Ok(Running {
            slide,
            url: url.to_string(),
            kill_tx,
            handle: Some(handle),
            ipc_path,
        })
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.stop();
    }
}

fn send_ipc_command(path: &str, command: &[&str]) -> Result<()> {
    let payload = json!({ "command": command });
    let serialized = serde_json::to_string(&payload).context("serialize mpv command")?;
    write_ipc(path, &serialized)
}

#[cfg(unix)]
fn write_ipc(path: &str, serialized: &str) -> Result<()> {
    let mut stream =
        UnixStream::connect(path).with_context(|| format!("connect to mpv IPC socket {path}"))?;
    stream
        .write_all(serialized.as_bytes())
        .context("write mpv IPC command")?;
    stream
        .write_all(b"\n")
        .context("write mpv IPC command terminator")?;
    Ok(())
}

#[cfg(not(unix))]
fn write_ipc(_path: &str, _serialized: &str) -> Result<()> {
    Err(anyhow!("mpv IPC is not supported on this platform"))
}

#[cfg(unix)]
fn unique_ipc_path() -> Option<String> {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    let mut path = std::env::temp_dir();
    path.push(format!("reels-mpv-{}-{suffix}.sock", std::process::id()));
    Some(path.to_string_lossy().to_string())
}

#[cfg(not(unix))]
fn unique_ipc_path() -> Option<String> {
    None
}
