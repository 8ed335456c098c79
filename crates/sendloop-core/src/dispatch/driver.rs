//! Dispatch Loop - In-process driver that walks a job through its batches

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use sendloop_storage::models::JobStatus;

use super::manager::{DispatchError, JobManager};

/// Commands accepted by a running dispatch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchCommand {
    Pause,
    Resume,
    Stop,
}

/// Observable state of a dispatch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Dispatching,
    Paused,
    Done,
    Error,
}

/// Everything that can move the loop between states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    Start,
    Pause,
    Resume,
    Stop,
    BatchProcessed { job_completed: bool },
    BatchFailed,
}

impl From<DispatchCommand> for LoopEvent {
    fn from(command: DispatchCommand) -> Self {
        match command {
            DispatchCommand::Pause => LoopEvent::Pause,
            DispatchCommand::Resume => LoopEvent::Resume,
            DispatchCommand::Stop => LoopEvent::Stop,
        }
    }
}

impl LoopState {
    /// Apply one event; combinations not listed leave the state unchanged
    pub fn apply(self, event: LoopEvent) -> LoopState {
        match (self, event) {
            (LoopState::Idle, LoopEvent::Start) => LoopState::Dispatching,
            (LoopState::Dispatching, LoopEvent::Pause) => LoopState::Paused,
            (LoopState::Paused, LoopEvent::Resume) => LoopState::Dispatching,
            (LoopState::Dispatching, LoopEvent::BatchProcessed { job_completed }) => {
                if job_completed {
                    LoopState::Done
                } else {
                    LoopState::Dispatching
                }
            }
            (LoopState::Dispatching, LoopEvent::BatchFailed) => LoopState::Error,
            (LoopState::Done, _) | (LoopState::Error, _) => self,
            (_, LoopEvent::Stop) => LoopState::Done,
            _ => self,
        }
    }

    /// Terminal loop states never transition again
    pub fn is_terminal(self) -> bool {
        matches!(self, LoopState::Done | LoopState::Error)
    }
}

/// Dispatch Loop - owns batch pacing for a single job
///
/// The loop claims and sends one batch at a time, sleeping the job's
/// configured delay between batches. A pause or stop command interrupts
/// the sleep but never an in-flight batch, so a paused job always holds
/// a consistent batch boundary.
pub struct DispatchLoop {
    manager: Arc<JobManager>,
    job_id: Uuid,
}

impl DispatchLoop {
    /// Create a loop for one job
    pub fn new(manager: Arc<JobManager>, job_id: Uuid) -> Self {
        Self { manager, job_id }
    }

    /// Run until the job completes, fails or is stopped
    pub async fn run(self, mut commands: mpsc::Receiver<DispatchCommand>) {
        let mut state = LoopState::Idle.apply(LoopEvent::Start);
        info!("Dispatch loop for job {} started", self.job_id);

        loop {
            match state {
                LoopState::Dispatching => {
                    state = self.dispatch_once(state, &mut commands).await;
                }
                LoopState::Paused => {
                    state = match commands.recv().await {
                        Some(command) => state.apply(command.into()),
                        None => state.apply(LoopEvent::Stop),
                    };
                }
                LoopState::Idle | LoopState::Done | LoopState::Error => break,
            }
        }

        info!(
            "Dispatch loop for job {} ended ({:?})",
            self.job_id, state
        );
    }

    /// Process one batch and wait out the inter-batch delay
    async fn dispatch_once(
        &self,
        state: LoopState,
        commands: &mut mpsc::Receiver<DispatchCommand>,
    ) -> LoopState {
        match self.manager.process_next_batch(self.job_id).await {
            Ok(outcome) => {
                let state = state.apply(LoopEvent::BatchProcessed {
                    job_completed: outcome.job_completed,
                });
                match (state, outcome.next_batch_in) {
                    (LoopState::Dispatching, Some(delay_ms)) => {
                        self.wait_between_batches(state, commands, delay_ms).await
                    }
                    _ => state,
                }
            }
            Err(DispatchError::NotProcessing(status)) => {
                if status.parse::<JobStatus>().ok() == Some(JobStatus::Paused) {
                    // Paused through the API before we noticed the command
                    state.apply(LoopEvent::Pause)
                } else {
                    info!(
                        "Dispatch loop for job {} stopping, job is {}",
                        self.job_id, status
                    );
                    state.apply(LoopEvent::Stop)
                }
            }
            Err(DispatchError::JobNotFound) => {
                warn!("Dispatch loop for job {} stopping, job deleted", self.job_id);
                state.apply(LoopEvent::Stop)
            }
            Err(e) => {
                error!("Dispatch loop for job {} failed: {}", self.job_id, e);
                state.apply(LoopEvent::BatchFailed)
            }
        }
    }

    async fn wait_between_batches(
        &self,
        state: LoopState,
        commands: &mut mpsc::Receiver<DispatchCommand>,
        delay_ms: i64,
    ) -> LoopState {
        tokio::select! {
            _ = sleep(Duration::from_millis(delay_ms.max(0) as u64)) => state,
            command = commands.recv() => match command {
                Some(command) => state.apply(command.into()),
                None => state.apply(LoopEvent::Stop),
            },
        }
    }
}

struct LoopHandle {
    commands: mpsc::Sender<DispatchCommand>,
    task: JoinHandle<()>,
}

/// Dispatch Registry - one live loop handle per driven job
///
/// With `auto_drive` off the registry is inert and processing stays
/// fully client-driven through the process endpoint.
#[derive(Clone)]
pub struct DispatchRegistry {
    manager: Arc<JobManager>,
    auto_drive: bool,
    loops: Arc<Mutex<HashMap<Uuid, LoopHandle>>>,
}

impl DispatchRegistry {
    /// Create a registry over the shared job manager
    pub fn new(manager: Arc<JobManager>, auto_drive: bool) -> Self {
        Self {
            manager,
            auto_drive,
            loops: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawn a loop for a job unless one is already running
    pub async fn start(&self, job_id: Uuid) {
        if !self.auto_drive {
            return;
        }

        let mut loops = self.loops.lock().await;
        if let Some(handle) = loops.get(&job_id) {
            if !handle.task.is_finished() {
                return;
            }
            loops.remove(&job_id);
        }
        self.spawn_loop(&mut loops, job_id);
    }

    /// Signal a running loop to pause
    pub async fn pause(&self, job_id: Uuid) {
        self.signal(job_id, DispatchCommand::Pause).await;
    }

    /// Signal a running loop to resume, spawning a fresh one if it died
    pub async fn resume(&self, job_id: Uuid) {
        if !self.auto_drive {
            return;
        }

        let mut loops = self.loops.lock().await;
        if let Some(handle) = loops.get(&job_id) {
            if !handle.task.is_finished()
                && handle.commands.send(DispatchCommand::Resume).await.is_ok()
            {
                return;
            }
            loops.remove(&job_id);
        }
        self.spawn_loop(&mut loops, job_id);
    }

    /// Signal a running loop to stop
    pub async fn stop(&self, job_id: Uuid) {
        self.signal(job_id, DispatchCommand::Stop).await;
    }

    /// Abort every loop, for shutdown
    pub async fn shutdown(&self) {
        let mut loops = self.loops.lock().await;
        for (job_id, handle) in loops.drain() {
            info!("Aborting dispatch loop for job {}", job_id);
            handle.task.abort();
        }
    }

    async fn signal(&self, job_id: Uuid, command: DispatchCommand) {
        let mut loops = self.loops.lock().await;
        if let Some(handle) = loops.get(&job_id) {
            if handle.commands.send(command).await.is_err() {
                loops.remove(&job_id);
            }
        }
    }

    fn spawn_loop(&self, loops: &mut HashMap<Uuid, LoopHandle>, job_id: Uuid) {
        let (tx, rx) = mpsc::channel(8);
        let dispatch_loop = DispatchLoop::new(self.manager.clone(), job_id);
        let registry = self.loops.clone();

        let task = tokio::spawn(async move {
            dispatch_loop.run(rx).await;
            registry.lock().await.remove(&job_id);
        });

        loops.insert(job_id, LoopHandle { commands: tx, task });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_start_moves_idle_to_dispatching() {
        assert_eq!(
            LoopState::Idle.apply(LoopEvent::Start),
            LoopState::Dispatching
        );
        // Start is a no-op everywhere else
        assert_eq!(
            LoopState::Dispatching.apply(LoopEvent::Start),
            LoopState::Dispatching
        );
        assert_eq!(LoopState::Paused.apply(LoopEvent::Start), LoopState::Paused);
    }

    #[test]
    fn test_pause_resume_cycle() {
        let state = LoopState::Dispatching.apply(LoopEvent::Pause);
        assert_eq!(state, LoopState::Paused);
        assert_eq!(state.apply(LoopEvent::Resume), LoopState::Dispatching);
    }

    #[test]
    fn test_pause_outside_dispatching_is_ignored() {
        assert_eq!(LoopState::Idle.apply(LoopEvent::Pause), LoopState::Idle);
        assert_eq!(LoopState::Paused.apply(LoopEvent::Pause), LoopState::Paused);
        assert_eq!(LoopState::Done.apply(LoopEvent::Pause), LoopState::Done);
    }

    #[test]
    fn test_batch_events() {
        assert_eq!(
            LoopState::Dispatching.apply(LoopEvent::BatchProcessed {
                job_completed: false
            }),
            LoopState::Dispatching
        );
        assert_eq!(
            LoopState::Dispatching.apply(LoopEvent::BatchProcessed {
                job_completed: true
            }),
            LoopState::Done
        );
        assert_eq!(
            LoopState::Dispatching.apply(LoopEvent::BatchFailed),
            LoopState::Error
        );
    }

    #[test]
    fn test_paused_ignores_batch_events() {
        assert_eq!(
            LoopState::Paused.apply(LoopEvent::BatchProcessed {
                job_completed: true
            }),
            LoopState::Paused
        );
        assert_eq!(
            LoopState::Paused.apply(LoopEvent::BatchFailed),
            LoopState::Paused
        );
    }

    #[test]
    fn test_stop_ends_any_live_state() {
        assert_eq!(LoopState::Idle.apply(LoopEvent::Stop), LoopState::Done);
        assert_eq!(
            LoopState::Dispatching.apply(LoopEvent::Stop),
            LoopState::Done
        );
        assert_eq!(LoopState::Paused.apply(LoopEvent::Stop), LoopState::Done);
    }

    #[test]
    fn test_terminal_states_absorb_everything() {
        for event in [
            LoopEvent::Start,
            LoopEvent::Pause,
            LoopEvent::Resume,
            LoopEvent::Stop,
            LoopEvent::BatchProcessed {
                job_completed: false,
            },
            LoopEvent::BatchFailed,
        ] {
            assert_eq!(LoopState::Done.apply(event), LoopState::Done);
            assert_eq!(LoopState::Error.apply(event), LoopState::Error);
        }
    }

    #[test]
    fn test_pause_mid_job_then_resume_continues() {
        // Two batches done out of five, then a pause lands between batches
        let mut state = LoopState::Idle.apply(LoopEvent::Start);
        for _ in 0..2 {
            state = state.apply(LoopEvent::BatchProcessed {
                job_completed: false,
            });
        }
        state = state.apply(LoopEvent::Pause);
        assert_eq!(state, LoopState::Paused);

        // Nothing moves the machine while paused except resume or stop
        state = state.apply(LoopEvent::BatchProcessed {
            job_completed: false,
        });
        assert_eq!(state, LoopState::Paused);

        state = state.apply(LoopEvent::Resume);
        assert_eq!(state, LoopState::Dispatching);

        // Remaining batches run to completion
        for _ in 0..2 {
            state = state.apply(LoopEvent::BatchProcessed {
                job_completed: false,
            });
        }
        state = state.apply(LoopEvent::BatchProcessed {
            job_completed: true,
        });
        assert_eq!(state, LoopState::Done);
        assert!(state.is_terminal());
    }
}
