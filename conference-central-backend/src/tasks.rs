//! In-process background work. Tasks are delivered at least once: a failing
//! task is retried a few times and then dropped.

use std::sync::Arc;
use std::time::Duration;

use conference_central_database::Store;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::announcements::determine_featured_speaker;
use crate::cache::Cache;
use crate::error::AppError;
use crate::forms::parse_key;
use crate::mail::{Mail, Mailer};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Task {
    SendConfirmationEmail {
        email: String,
        conference_info: String,
    },
    DetermineFeaturedSpeaker {
        conference_key: String,
        speaker: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<Task>,
}

impl TaskQueue {
    pub fn enqueue(&self, task: Task) -> Result<(), AppError> {
        debug!(?task, "enqueue task");
        self.sender
            .send(task)
            .map_err(|_| AppError::TaskQueueClosed)
    }
}

#[derive(Clone)]
pub struct TaskRunner {
    pub store: Arc<dyn Store>,
    pub cache: Arc<dyn Cache>,
    pub mailer: Arc<dyn Mailer>,
}

impl TaskRunner {
    pub async fn send_confirmation_email(
        &self,
        email: String,
        conference_info: &str,
    ) -> Result<(), AppError> {
        self.mailer
            .send(Mail::conference_created(email, conference_info))
            .await
    }

    pub async fn determine_featured_speaker(
        &self,
        conference_key: &str,
        speaker: &str,
    ) -> Result<(), AppError> {
        let conference_id = parse_key("conference", conference_key)?;
        determine_featured_speaker(&*self.store, &*self.cache, conference_id, speaker).await
    }

    pub async fn run(&self, task: &Task) -> Result<(), AppError> {
        match task {
            Task::SendConfirmationEmail {
                email,
                conference_info,
            } => {
                self.send_confirmation_email(email.clone(), conference_info)
                    .await
            }
            Task::DetermineFeaturedSpeaker {
                conference_key,
                speaker,
            } => self.determine_featured_speaker(conference_key, speaker).await,
        }
    }

    /// Returns whether the task eventually succeeded.
    pub async fn run_with_retries(&self, task: &Task, policy: RetryPolicy) -> bool {
        let attempts = policy.attempts.max(1);
        for attempt in 1..=attempts {
            match self.run(task).await {
                Ok(()) => {
                    info!(?task, attempt, "task done");
                    return true;
                }
                Err(err) if attempt < attempts => {
                    warn!(?task, attempt, "task failed, retrying: {err}");
                    tokio::time::sleep(policy.delay).await;
                }
                Err(err) => {
                    error!(?task, attempt, "task failed, dropping it: {err}");
                }
            }
        }
        false
    }
}

/// Starts the worker. It stops once every [`TaskQueue`] clone is dropped and
/// the remaining tasks are processed.
pub fn spawn_worker(runner: TaskRunner, policy: RetryPolicy) -> (TaskQueue, JoinHandle<()>) {
    let (sender, mut receiver) = mpsc::unbounded_channel::<Task>();
    let handle = tokio::spawn(async move {
        while let Some(task) = receiver.recv().await {
            runner.run_with_retries(&task, policy).await;
        }
        debug!("task queue closed");
    });
    (TaskQueue { sender }, handle)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use conference_central_database::MemoryStore;

    use super::*;
    use crate::cache::MemoryCache;

    #[derive(Default)]
    struct FlakyMailer {
        failures_left: AtomicU32,
        sent: Mutex<Vec<Mail>>,
    }

    #[async_trait]
    impl Mailer for FlakyMailer {
        async fn send(&self, mail: Mail) -> Result<(), AppError> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok()
            {
                return Err(std::io::Error::other("smtp unavailable").into());
            }
            self.sent.lock().unwrap().push(mail);
            Ok(())
        }
    }

    fn runner(mailer: Arc<FlakyMailer>) -> TaskRunner {
        TaskRunner {
            store: Arc::new(MemoryStore::new()),
            cache: Arc::new(MemoryCache::default()),
            mailer,
        }
    }

    fn confirmation() -> Task {
        Task::SendConfirmationEmail {
            email: "organizer@example.com".to_owned(),
            conference_info: "DevCon".to_owned(),
        }
    }

    const POLICY: RetryPolicy = RetryPolicy {
        attempts: 3,
        delay: Duration::ZERO,
    };

    #[tokio::test]
    async fn failing_tasks_are_retried() {
        let mailer = Arc::new(FlakyMailer {
            failures_left: AtomicU32::new(2),
            ..FlakyMailer::default()
        });
        assert!(runner(Arc::clone(&mailer)).run_with_retries(&confirmation(), POLICY).await);
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "organizer@example.com");
        assert_eq!(sent[0].subject, "You created a new Conference!");
    }

    #[tokio::test]
    async fn tasks_are_dropped_after_the_last_attempt() {
        let mailer = Arc::new(FlakyMailer {
            failures_left: AtomicU32::new(3),
            ..FlakyMailer::default()
        });
        assert!(!runner(Arc::clone(&mailer)).run_with_retries(&confirmation(), POLICY).await);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn worker_drains_the_queue_before_stopping() {
        let mailer = Arc::new(FlakyMailer::default());
        let (queue, worker) = spawn_worker(runner(Arc::clone(&mailer)), POLICY);
        queue.enqueue(confirmation()).unwrap();
        queue.enqueue(confirmation()).unwrap();
        drop(queue);
        worker.await.unwrap();
        assert_eq!(mailer.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn featured_speaker_task_needs_a_valid_key() {
        let mailer = Arc::new(FlakyMailer::default());
        let task = Task::DetermineFeaturedSpeaker {
            conference_key: "not-a-key".to_owned(),
            speaker: "Ada".to_owned(),
        };
        assert!(matches!(
            runner(mailer).run(&task).await,
            Err(AppError::Database(_))
        ));
    }
}
