//! Audio route supervisor
//!
//! One task owns the routing child process. Everything else talks to it
//! through a request channel, so there is exactly one writer of the process
//! handle and two routes can never be spawned side by side. The task also
//! runs the watchdog that respawns a route whose process dies.
//!
//! Routes run under `sh -c` in a fresh process group; signals go to the whole
//! group so `arecord`, `sox` and `aplay` start, pause and die together.

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use serde::Serialize;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::pipeline::{Route, RouteKind};
use crate::config::AudioConfig;
use crate::error::AudioError;

/// Supervisor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Published after every state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorStatus {
    pub state: SupervisorState,
    pub route: Option<RouteKind>,
    pub pid: Option<u32>,
    /// Stopped with SIGSTOP while an announcement plays
    pub paused: bool,
    /// Watchdog respawns since startup
    pub restarts: u64,
}

impl Default for SupervisorStatus {
    fn default() -> Self {
        Self {
            state: SupervisorState::Stopped,
            route: None,
            pid: None,
            paused: false,
            restarts: 0,
        }
    }
}

enum Request {
    Start {
        route: Route,
        reply: oneshot::Sender<Result<(), AudioError>>,
    },
    Pause {
        reply: oneshot::Sender<Result<bool, AudioError>>,
    },
    Resume {
        reply: oneshot::Sender<Result<(), AudioError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the supervisor task. Cheap to clone.
#[derive(Clone)]
pub struct AudioSupervisor {
    requests: mpsc::Sender<Request>,
    status: watch::Receiver<SupervisorStatus>,
}

impl AudioSupervisor {
    /// Spawn the supervisor task. No route runs until [`start`](Self::start).
    pub fn spawn(config: AudioConfig) -> (Self, JoinHandle<()>) {
        let (requests, rx) = mpsc::channel(16);
        let (status_tx, status) = watch::channel(SupervisorStatus::default());
        let worker = Worker {
            config,
            child: None,
            route: None,
            paused: false,
            restarts: 0,
            status: status_tx,
        };
        let handle = tokio::spawn(worker.run(rx));
        (Self { requests, status }, handle)
    }

    /// Replace the running route with `route`.
    ///
    /// On failure the previous route is restored (or passthrough if that
    /// fails too) and the spawn error is returned. Rejected with
    /// [`AudioError::Busy`] while paused.
    pub async fn start(&self, route: Route) -> Result<(), AudioError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Start { route, reply }).await?;
        rx.await.map_err(|_| AudioError::SupervisorGone)?
    }

    /// Freeze the route's process group. Returns whether a process was
    /// actually stopped.
    pub async fn pause(&self) -> Result<bool, AudioError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Pause { reply }).await?;
        rx.await.map_err(|_| AudioError::SupervisorGone)?
    }

    pub async fn resume(&self) -> Result<(), AudioError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Resume { reply }).await?;
        rx.await.map_err(|_| AudioError::SupervisorGone)?
    }

    /// Stop the route and end the task
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.send(Request::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    pub fn status(&self) -> SupervisorStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SupervisorStatus> {
        self.status.clone()
    }

    async fn send(&self, request: Request) -> Result<(), AudioError> {
        self.requests
            .send(request)
            .await
            .map_err(|_| AudioError::SupervisorGone)
    }
}

/// Owned routing process. Dropping it kills the whole process group.
struct ChildGuard {
    child: Child,
    pgid: Pid,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Result<Self, AudioError> {
        let pid = child
            .id()
            .ok_or_else(|| AudioError::ExitedEarly("exited before it could be tracked".into()))?;
        Ok(Self {
            child,
            pgid: Pid::from_raw(pid as i32),
            reaped: false,
        })
    }

    fn pid(&self) -> u32 {
        self.pgid.as_raw() as u32
    }

    fn signal(&self, signal: Signal) -> Result<(), AudioError> {
        killpg(self.pgid, signal).map_err(|e| AudioError::Signal(format!("{}: {}", signal, e)))
    }

    /// Non-blocking exit check. A dead leader takes the rest of its group
    /// with it.
    fn try_wait(&mut self) -> Result<Option<ExitStatus>, AudioError> {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.reaped = true;
                let _ = killpg(self.pgid, Signal::SIGKILL);
                Ok(Some(status))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(AudioError::Signal(e.to_string())),
        }
    }

    /// SIGCONT (in case it was paused), SIGTERM, then SIGKILL after `grace`
    async fn stop(mut self, grace: Duration) {
        let pid = self.pid();
        let _ = self.signal(Signal::SIGCONT);
        let _ = self.signal(Signal::SIGTERM);

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                tracing::warn!("Route pid {} ignored SIGTERM, killing", pid);
                let _ = self.signal(Signal::SIGKILL);
                let _ = self.child.wait().await;
            }
        }
        // Stragglers that outlived the leader
        let _ = killpg(self.pgid, Signal::SIGKILL);
        self.reaped = true;
        tracing::debug!("Route pid {} stopped", pid);
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = killpg(self.pgid, Signal::SIGKILL);
        }
    }
}

struct Worker {
    config: AudioConfig,
    child: Option<ChildGuard>,
    /// Route that should be running (last known good)
    route: Option<Route>,
    paused: bool,
    restarts: u64,
    status: watch::Sender<SupervisorStatus>,
}

impl Worker {
    async fn run(mut self, mut requests: mpsc::Receiver<Request>) {
        let mut watchdog = tokio::time::interval(Duration::from_millis(self.config.watchdog_ms.max(1)));
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(Request::Start { route, reply }) => {
                        let result = self.start(route).await;
                        let _ = reply.send(result);
                    }
                    Some(Request::Pause { reply }) => {
                        let _ = reply.send(self.pause());
                    }
                    Some(Request::Resume { reply }) => {
                        let _ = reply.send(self.resume());
                    }
                    Some(Request::Shutdown { reply }) => {
                        self.stop_child().await;
                        self.route = None;
                        self.publish(SupervisorState::Stopped);
                        let _ = reply.send(());
                        break;
                    }
                    None => break,
                },
                _ = watchdog.tick() => self.watchdog().await,
            }
        }

        // Handles dropped without a shutdown request
        self.stop_child().await;
        tracing::info!("Audio supervisor stopped");
    }

    async fn start(&mut self, route: Route) -> Result<(), AudioError> {
        if self.paused {
            return Err(AudioError::Busy);
        }

        let previous = self.route.take();
        self.stop_child().await;

        match self.launch(&route).await {
            Ok(()) => {
                tracing::info!("Audio route {:?} running", route.kind());
                self.route = Some(route);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Audio route {:?} failed to start: {}", route.kind(), e);
                self.restore(previous, &route).await;
                Err(e)
            }
        }
    }

    /// Bring back the last known-good route, falling back to passthrough
    async fn restore(&mut self, previous: Option<Route>, failed: &Route) {
        let mut candidates = Vec::new();
        if let Some(previous) = previous.filter(|p| p != failed) {
            candidates.push(previous);
        }
        if *failed != Route::Passthrough && !candidates.contains(&Route::Passthrough) {
            candidates.push(Route::Passthrough);
        }

        for candidate in candidates {
            match self.launch(&candidate).await {
                Ok(()) => {
                    tracing::warn!("Restored audio route {:?}", candidate.kind());
                    self.route = Some(candidate);
                    return;
                }
                Err(e) => tracing::error!("Fallback route {:?} failed: {}", candidate.kind(), e),
            }
        }

        // Nothing runs; the watchdog keeps retrying passthrough
        self.route = Some(Route::Passthrough);
        self.publish(SupervisorState::Stopped);
    }

    /// Spawn `route` and wait out the settle period
    async fn launch(&mut self, route: &Route) -> Result<(), AudioError> {
        self.publish_route(SupervisorState::Starting, Some(route.kind()), None);

        let line = route.command_line(&self.config);
        tracing::debug!("Spawning route: {}", line);
        let child = Command::new("sh")
            .arg("-c")
            .arg(&line)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AudioError::SpawnFailed(e.to_string()))?;
        let mut guard = ChildGuard::new(child)?;

        tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;
        if let Some(status) = guard.try_wait()? {
            self.publish_route(SupervisorState::Stopped, None, None);
            return Err(AudioError::ExitedEarly(status.to_string()));
        }

        let pid = guard.pid();
        self.child = Some(guard);
        self.publish_route(SupervisorState::Running, Some(route.kind()), Some(pid));
        Ok(())
    }

    async fn stop_child(&mut self) {
        if let Some(child) = self.child.take() {
            self.publish(SupervisorState::Stopping);
            child.stop(Duration::from_millis(self.config.stop_grace_ms)).await;
        }
        self.paused = false;
        self.publish(SupervisorState::Stopped);
    }

    fn pause(&mut self) -> Result<bool, AudioError> {
        if self.paused {
            return Err(AudioError::Busy);
        }
        let stopped = match &self.child {
            Some(child) => {
                child.signal(Signal::SIGSTOP)?;
                true
            }
            None => false,
        };
        self.paused = true;
        self.publish_current();
        Ok(stopped)
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if !self.paused {
            return Ok(());
        }
        self.paused = false;
        if let Some(child) = &self.child {
            child.signal(Signal::SIGCONT)?;
        }
        self.publish_current();
        Ok(())
    }

    async fn watchdog(&mut self) {
        if self.paused {
            return;
        }

        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(None) => return,
                Ok(Some(status)) => {
                    tracing::warn!("Audio route pid {} exited unexpectedly ({})", child.pid(), status);
                }
                Err(e) => {
                    tracing::warn!("Audio route check failed: {}", e);
                    return;
                }
            }
            self.child = None;
            self.publish(SupervisorState::Stopped);
        }

        let Some(route) = self.route.clone() else {
            return;
        };
        self.restarts += 1;
        if let Err(e) = self.launch(&route).await {
            tracing::warn!("Watchdog respawn of {:?} failed: {}", route.kind(), e);
        }
    }

    fn publish(&self, state: SupervisorState) {
        let (route, pid) = match &self.child {
            Some(child) => (self.route.as_ref().map(Route::kind), Some(child.pid())),
            None => (None, None),
        };
        self.publish_route(state, route, pid);
    }

    fn publish_current(&self) {
        let state = self.status.borrow().state;
        self.publish(state);
    }

    fn publish_route(&self, state: SupervisorState, route: Option<RouteKind>, pid: Option<u32>) {
        self.status.send_replace(SupervisorStatus {
            state,
            route,
            pid,
            paused: self.paused,
            restarts: self.restarts,
        });
    }
}
