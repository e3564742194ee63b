//! Thread publishing
//!
//! Creates the posts of a thread one at a time as a linked reply chain.
//! Post 0 becomes the root; every later post replies to the root and to the
//! post immediately before it. Calls are strictly sequential with a fixed
//! pause between them, and the first failure stops the thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::{Event, EventBus};
use super::progress::{estimate_total, preview, ProgressTracker};
use super::validation::ValidationService;
use crate::api::BlueskyApi;
use crate::config::ThreadConfig;
use crate::error::{PostFailure, Result, ThreadPostError, ThreadpostError};
use crate::types::{PostRecord, PublishedPost, ReplyRef, Session, StrongRef};

/// Result of a fully published thread
#[derive(Debug, Clone)]
pub struct ThreadOutcome {
    pub job_id: String,
    pub posted: usize,
    /// Created posts in thread order; the first is the root
    pub published: Vec<PublishedPost>,
}

impl ThreadOutcome {
    pub fn root(&self) -> Option<&PublishedPost> {
        self.published.first()
    }
}

/// Publishes validated bodies as a thread
#[derive(Clone)]
pub struct ThreadPublisher {
    api: Arc<dyn BlueskyApi>,
    config: Arc<ThreadConfig>,
    validation: ValidationService,
    event_bus: EventBus,
}

impl ThreadPublisher {
    pub fn new(api: Arc<dyn BlueskyApi>, config: Arc<ThreadConfig>, event_bus: EventBus) -> Self {
        let validation = ValidationService::new(Arc::clone(&config));
        Self {
            api,
            config,
            validation,
            event_bus,
        }
    }

    /// Post `bodies` as one thread
    ///
    /// Bodies are expected to be formatted already. They are trimmed and
    /// blank ones dropped before numbering. `cancel` is checked before each
    /// post; setting it stops the thread with a `Cancelled` cause.
    ///
    /// # Errors
    ///
    /// - `ValidationError` before any network call
    /// - `ThreadPostError` with the count of posts created before the failure
    pub async fn publish<S: AsRef<str>>(
        &self,
        session: &Session,
        bodies: &[S],
        cancel: Option<&AtomicBool>,
    ) -> Result<ThreadOutcome> {
        let posts = self.validation.validate_thread(bodies)?;
        let total = posts.len();
        let delay = self.config.delay_for(total);
        let job_id = Uuid::new_v4().to_string();

        info!(
            "Posting thread {} with {} post(s), {}ms between posts",
            job_id,
            total,
            delay.as_millis()
        );
        self.event_bus.emit(Event::ThreadStarted {
            job_id: job_id.clone(),
            total,
            estimated_ms: estimate_total(total, &self.config).as_millis() as u64,
        });

        let mut tracker = ProgressTracker::start(total);
        let mut root: Option<StrongRef> = None;
        let mut parent: Option<StrongRef> = None;
        let mut published = Vec::with_capacity(total);

        for (i, text) in posts.iter().enumerate() {
            if cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
                return Err(self.fail(&job_id, i, total, PostFailure::Cancelled));
            }

            self.event_bus.emit(Event::PostProgress {
                job_id: job_id.clone(),
                index: i + 1,
                total,
                preview: preview(text),
                elapsed_ms: tracker.elapsed().as_millis() as u64,
                remaining_ms: tracker.remaining().map(|d| d.as_millis() as u64),
            });

            let reply = match (&root, &parent) {
                (Some(root), Some(parent)) => Some(ReplyRef {
                    root: root.clone(),
                    parent: parent.clone(),
                }),
                _ => None,
            };
            let record = PostRecord::new(text.clone(), reply);

            let created = match self.api.create_record(session, &record).await {
                Ok(created) => created,
                Err(e) => return Err(self.fail(&job_id, i, total, PostFailure::Api(e))),
            };

            debug!("Post {}/{} created: {}", i + 1, total, created.uri);
            tracker.record_completed();
            self.event_bus.emit(Event::PostPublished {
                job_id: job_id.clone(),
                index: i + 1,
                uri: created.uri.clone(),
                cid: created.cid.clone(),
            });

            if root.is_none() {
                root = Some(created.clone());
            }
            parent = Some(created.clone());
            published.push(created);

            if i + 1 < total {
                sleep(delay).await;
            }
        }

        info!("Thread {} complete: {} post(s)", job_id, total);
        self.event_bus.emit(Event::ThreadCompleted {
            job_id: job_id.clone(),
            posted: total,
        });

        Ok(ThreadOutcome {
            job_id,
            posted: total,
            published,
        })
    }

    fn fail(&self, job_id: &str, posted: usize, total: usize, cause: PostFailure) -> ThreadpostError {
        let error = ThreadPostError {
            posted,
            total,
            cause,
        };
        warn!("Thread {} stopped: {}", job_id, error);
        self.event_bus.emit(Event::ThreadFailed {
            job_id: job_id.to_string(),
            posted,
            total,
            error: error.to_string(),
        });
        error.into()
    }
}
