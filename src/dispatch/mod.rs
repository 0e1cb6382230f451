//! Command dispatch
//!
//! Each [`Domain`] has a bounded queue and one worker task, so commands for
//! the same domain run in the order they were issued while music, light and
//! system commands proceed independently. Every action runs in its own task;
//! a failing or panicking action is logged and the worker moves on.
//!
//! Replies go to a per-domain voice task, so a long reply never delays the
//! next command while replies of one domain still come out in order.

mod actions;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::extract::Parameters;
use crate::lexicon::{CommandKey, Domain, Lexicon};
use crate::light::LightController;
use crate::music::MusicDomain;
use crate::speech::{Responses, Speaker};
use crate::system::SystemDomain;

pub use actions::{FAILURE_REPLY, NOT_HEARD_REPLY};

/// Default capacity of each domain queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Increments for relative volume and brightness commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Steps {
    pub volume: i64,
    pub brightness: i64,
}

impl Default for Steps {
    fn default() -> Self {
        Self {
            volume: 10,
            brightness: 10,
        }
    }
}

/// Everything an action may touch
pub struct HomeContext {
    pub lexicon: Arc<Lexicon>,
    pub light: Arc<LightController>,
    pub music: Arc<dyn MusicDomain>,
    pub system: Arc<dyn SystemDomain>,
    /// Speaks action replies
    pub speaker: Arc<dyn Speaker>,
    pub responses: Responses,
    pub steps: Steps,
    /// Playlist used when a switch names none
    pub default_playlist: String,
}

#[derive(Debug)]
struct Job {
    command: CommandKey,
    params: Parameters,
}

struct Queues {
    music: mpsc::Sender<Job>,
    light: mpsc::Sender<Job>,
    system: mpsc::Sender<Job>,
}

impl Queues {
    fn sender(&self, domain: Domain) -> mpsc::Sender<Job> {
        match domain {
            Domain::Music => self.music.clone(),
            Domain::Light => self.light.clone(),
            Domain::System => self.system.clone(),
        }
    }
}

/// Routes commands to their domain workers
pub struct Dispatcher {
    queues: Mutex<Option<Queues>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Start one worker per domain; must be called inside a tokio runtime
    #[must_use]
    pub fn spawn(ctx: HomeContext, capacity: usize) -> Self {
        let ctx = Arc::new(ctx);
        let capacity = capacity.max(1);

        let mut workers = Vec::with_capacity(Domain::ALL.len() * 2);
        let mut start = |domain: Domain| {
            let (tx, rx) = mpsc::channel(capacity);
            let (voice_tx, voice_rx) = mpsc::unbounded_channel();
            workers.push(tokio::spawn(run_voice(voice_rx, Arc::clone(&ctx.speaker))));
            workers.push(tokio::spawn(run_worker(domain, rx, voice_tx, Arc::clone(&ctx))));
            tx
        };
        let queues = Queues {
            music: start(Domain::Music),
            light: start(Domain::Light),
            system: start(Domain::System),
        };
        tracing::debug!(capacity, "dispatcher started");

        Self {
            queues: Mutex::new(Some(queues)),
            workers: Mutex::new(workers),
        }
    }

    /// Queue a command for its domain worker
    ///
    /// Waits while the queue is full, not for the action itself. Returns
    /// `false` if the dispatcher has shut down.
    pub async fn dispatch(&self, command: CommandKey, params: Parameters) -> bool {
        let domain = command.domain();
        let sender = {
            let queues = self.queues.lock();
            queues.as_ref().map(|q| q.sender(domain))
        };
        let Some(sender) = sender else {
            tracing::warn!(command = %command, "dispatcher is shut down");
            return false;
        };

        tracing::debug!(command = %command, %domain, "queueing command");
        if sender.send(Job { command, params }).await.is_err() {
            tracing::warn!(%domain, "domain worker is gone");
            return false;
        }
        true
    }

    /// Parse `key` and dispatch it; unknown keys are logged and ignored
    pub async fn dispatch_key(&self, key: &str, params: Parameters) -> bool {
        match key.parse::<CommandKey>() {
            Ok(command) => self.dispatch(command, params).await,
            Err(e) => {
                tracing::warn!(key, error = %e, "unknown command");
                false
            }
        }
    }

    /// Stop accepting commands, finish the queued ones and their replies
    pub async fn shutdown(&self) {
        let workers = {
            self.queues.lock().take();
            std::mem::take(&mut *self.workers.lock())
        };
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "dispatch worker failed");
            }
        }
        tracing::debug!("dispatcher stopped");
    }
}

async fn run_worker(
    domain: Domain,
    mut rx: mpsc::Receiver<Job>,
    voice: mpsc::UnboundedSender<String>,
    ctx: Arc<HomeContext>,
) {
    while let Some(job) = rx.recv().await {
        let command = job.command.to_string();
        match perform(domain, job, &ctx).await {
            Some(reply) if !reply.is_empty() => {
                if voice.send(reply).is_err() {
                    tracing::warn!(%domain, "voice task is gone, reply dropped");
                }
            }
            _ => {}
        }
        tracing::trace!(%domain, command, "command done");
    }
}

/// Speak replies one after another until the worker hangs up
async fn run_voice(mut rx: mpsc::UnboundedReceiver<String>, speaker: Arc<dyn Speaker>) {
    while let Some(reply) = rx.recv().await {
        let speaker = Arc::clone(&speaker);
        let spoken = tokio::task::spawn_blocking(move || speaker.speak(&reply)).await;
        match spoken {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to speak reply"),
            Err(e) => tracing::warn!(error = %e, "speaker panicked"),
        }
    }
}

/// Run one action in its own task; `None` if it panicked
async fn perform(domain: Domain, job: Job, ctx: &Arc<HomeContext>) -> Option<String> {
    let Job { command, params } = job;
    let name = command.to_string();
    let task_ctx = Arc::clone(ctx);

    let handle = match domain {
        Domain::Light => tokio::spawn(async move { actions::light(&task_ctx, &command, &params).await }),
        Domain::Music => tokio::task::spawn_blocking(move || actions::music(&task_ctx, &command, &params)),
        Domain::System => tokio::task::spawn_blocking(move || actions::system(&task_ctx, &command, &params)),
    };

    match handle.await {
        Ok(Ok(reply)) => {
            tracing::info!(command = %name, reply = %reply, "command executed");
            Some(reply)
        }
        Ok(Err(e)) => {
            tracing::warn!(command = %name, error = %e, "command failed");
            Some(FAILURE_REPLY.to_string())
        }
        Err(e) => {
            tracing::error!(command = %name, error = %e, "command panicked");
            None
        }
    }
}
