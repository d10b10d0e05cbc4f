//! Per-user inbox. Each learner gets a worker task fed by an unbounded queue,
//! so one user's messages are handled strictly in arrival order while
//! different users proceed in parallel. A worker that sits idle past the idle
//! timeout removes itself; the next message from that user starts a new one.
//! Dialogue sessions live in the bot, so they survive the swap.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

use wordnest_core::types::{IncomingMessage, UserId};

use crate::bot::WordNestBot;

/// How long a worker waits for the next message before exiting.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

struct Worker {
    id: u64,
    tx: mpsc::UnboundedSender<IncomingMessage>,
}

type Workers = Arc<Mutex<HashMap<UserId, Worker>>>;

fn lock(workers: &Workers) -> MutexGuard<'_, HashMap<UserId, Worker>> {
    workers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct Inbox {
    bot: Arc<WordNestBot>,
    workers: Workers,
    idle_timeout: Duration,
    next_id: AtomicU64,
}

impl Inbox {
    pub fn new(bot: Arc<WordNestBot>) -> Self {
        Self {
            bot,
            workers: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Queue a message on its sender's worker, starting one if needed.
    pub fn dispatch(&self, msg: IncomingMessage) {
        let user = msg.user_id;
        // Held across the send: a worker only retires while holding this lock
        // and seeing an empty queue, so no message is stranded.
        let mut workers = lock(&self.workers);

        let msg = match workers.get(&user) {
            Some(worker) => match worker.tx.send(msg) {
                Ok(()) => return,
                // Worker died (a handler panicked); start a fresh one.
                Err(mpsc::error::SendError(msg)) => {
                    tracing::warn!("Inbox worker for user {user} stopped, restarting");
                    msg
                }
            },
            None => msg,
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(
            self.bot.clone(),
            self.workers.clone(),
            user,
            id,
            rx,
            self.idle_timeout,
        ));
        if tx.send(msg).is_ok() {
            workers.insert(user, Worker { id, tx });
        }
    }

    pub fn worker_count(&self) -> usize {
        lock(&self.workers).len()
    }
}

async fn run_worker(
    bot: Arc<WordNestBot>,
    workers: Workers,
    user: UserId,
    id: u64,
    mut rx: mpsc::UnboundedReceiver<IncomingMessage>,
    idle_timeout: Duration,
) {
    tracing::debug!("Inbox worker {id} started for user {user}");
    loop {
        let msg = match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(msg)) => msg,
            Ok(None) => return,
            Err(_elapsed) => {
                let mut map = lock(&workers);
                match rx.try_recv() {
                    Ok(msg) => msg,
                    Err(_) => {
                        if map.get(&user).is_some_and(|w| w.id == id) {
                            map.remove(&user);
                        }
                        tracing::debug!("Inbox worker {id} for user {user} retired (idle)");
                        return;
                    }
                }
            }
        };
        bot.handle(msg).await;
    }
}
