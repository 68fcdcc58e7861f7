//! Blocking façade over the async process.
//!
//! The turn loop is inherently asynchronous; synchronous callers get a
//! dedicated background thread running its own event loop, with commands
//! crossing over a channel. This is a bridging detail only — nothing in
//! the runtime blocks on the loop's own execution context.

use crate::error::CoreErr;
use crate::process::AgentProcess;
use agentrun_protocol::RunResult;
use std::sync::mpsc;
use std::thread;
use tracing::debug;

enum Command {
    Run {
        prompt: String,
        reply: mpsc::Sender<Result<RunResult, CoreErr>>,
    },
    Shutdown,
}

/// A blocking handle to an [`AgentProcess`] living on its own runtime
/// thread.
pub struct SyncProcess {
    commands: mpsc::Sender<Command>,
    worker: Option<thread::JoinHandle<()>>,
}

impl SyncProcess {
    /// Move the process onto a background thread with a fresh
    /// single-threaded runtime.
    pub fn start(process: AgentProcess) -> Result<Self, CoreErr> {
        let (commands, inbox) = mpsc::channel::<Command>();
        let worker = thread::Builder::new()
            .name("agentrun-sync".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        debug!(error = %e, "sync runtime failed to start");
                        return;
                    }
                };
                runtime.block_on(async move {
                    while let Ok(command) = inbox.recv() {
                        match command {
                            Command::Run { prompt, reply } => {
                                let outcome = process.run(prompt).await;
                                let _ = reply.send(outcome);
                            }
                            Command::Shutdown => break,
                        }
                    }
                    process.shutdown().await;
                });
            })
            .map_err(|e| CoreErr::Internal(format!("cannot spawn sync worker: {e}")))?;

        Ok(Self {
            commands,
            worker: Some(worker),
        })
    }

    /// Run one prompt, blocking until the turn loop completes.
    pub fn run(&self, prompt: impl Into<String>) -> Result<RunResult, CoreErr> {
        let (reply, outcome) = mpsc::channel();
        self.commands
            .send(Command::Run {
                prompt: prompt.into(),
                reply,
            })
            .map_err(|_| CoreErr::Internal("sync worker is gone".to_string()))?;
        outcome
            .recv()
            .map_err(|_| CoreErr::Internal("sync worker dropped the reply".to_string()))?
    }
}

impl Drop for SyncProcess {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
