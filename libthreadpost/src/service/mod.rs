//! Service layer for Threadpost
//!
//! Business logic shared by every front end, behind one facade.
//!
//! # Architecture
//!
//! `ThreadpostService` is the main entry point and coordinates:
//!
//! - `SessionManager`: login state and remembered credentials
//! - `DraftStore`: the persisted, not-yet-posted thread
//! - `ThreadPublisher`: sequential creation of the reply chain
//! - `ValidationService`: limits and counter thresholds
//! - `EventBus`: progress event distribution
//!
//! # Example
//!
//! ```no_run
//! use libthreadpost::service::ThreadpostService;
//!
//! # async fn example() -> libthreadpost::Result<()> {
//! let service = ThreadpostService::new()?;
//! service
//!     .session()
//!     .authenticate("alice.bsky.social", "abcd-efgh-ijkl-mnop")
//!     .await?;
//!
//! let mut composer = service.composer();
//! composer.set_content(0, "A thread, part one")?;
//! composer.set_content(1, "And part two")?;
//!
//! let outcome = service.post_composer(&mut composer, None).await?;
//! println!("Posted {} posts", outcome.posted);
//! # Ok(())
//! # }
//! ```

pub mod composer;
pub mod draft;
pub mod events;
pub mod progress;
pub mod publisher;
pub mod session;
pub mod status;
pub mod validation;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use self::composer::ThreadComposer;
use self::draft::DraftStore;
use self::events::{EventBus, EventReceiver};
use self::publisher::{ThreadOutcome, ThreadPublisher};
use self::session::SessionManager;
use self::validation::ValidationService;
use crate::api::bluesky::XrpcClient;
use crate::api::BlueskyApi;
use crate::credentials::credential_cache;
use crate::store::{FileStore, LocalStore};
use crate::{Config, Result};

/// Main service facade
///
/// All sub-services share the same API client, store and thread limits.
pub struct ThreadpostService {
    config: Arc<Config>,
    store: Arc<dyn LocalStore>,
    session: SessionManager,
    drafts: DraftStore,
    publisher: ThreadPublisher,
    validation: ValidationService,
    event_bus: EventBus,
}

impl ThreadpostService {
    /// Create a service from the default configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or the HTTP
    /// client cannot be built.
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config)
    }

    /// Create a service talking to the configured PDS, with file-backed state
    pub fn from_config(config: Config) -> Result<Self> {
        let api = XrpcClient::new(&config.api.base_url, config.api.timeout_secs)?;
        let store = FileStore::new(config.storage.expand_path());
        tracing::debug!("Using state file {}", store.path().display());
        Ok(Self::with_parts(config, Arc::new(api), Arc::new(store)))
    }

    /// Assemble a service from explicit parts (used by tests)
    pub fn with_parts(config: Config, api: Arc<dyn BlueskyApi>, store: Arc<dyn LocalStore>) -> Self {
        let config = Arc::new(config);
        let thread_config = Arc::new(config.thread.clone());
        let event_bus = EventBus::new(100);

        let credentials = credential_cache(config.storage.credentials, Arc::clone(&store));
        let session = SessionManager::new(Arc::clone(&api), credentials);
        let drafts = DraftStore::new(Arc::clone(&store));
        let validation = ValidationService::new(Arc::clone(&thread_config));
        let publisher = ThreadPublisher::new(api, thread_config, event_bus.clone());

        Self {
            config,
            store,
            session,
            drafts,
            publisher,
            validation,
            event_bus,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn drafts(&self) -> &DraftStore {
        &self.drafts
    }

    pub fn publisher(&self) -> &ThreadPublisher {
        &self.publisher
    }

    pub fn validation(&self) -> &ValidationService {
        &self.validation
    }

    /// A composer seeded with the saved drafts
    pub fn composer(&self) -> ThreadComposer {
        ThreadComposer::from_drafts(self.validation.clone(), self.drafts.load())
    }

    /// Subscribe to publishing events
    ///
    /// # Example
    ///
    /// ```no_run
    /// use libthreadpost::service::ThreadpostService;
    ///
    /// # async fn example() -> libthreadpost::Result<()> {
    /// let service = ThreadpostService::new()?;
    /// let mut events = service.subscribe();
    ///
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         println!("Event: {:?}", event);
    ///     }
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }

    /// Publish already-formatted bodies with the current session
    pub async fn post_thread<S: AsRef<str>>(
        &self,
        bodies: &[S],
        cancel: Option<&AtomicBool>,
    ) -> Result<ThreadOutcome> {
        let session = self.session.require()?;
        self.publisher.publish(&session, bodies, cancel).await
    }

    /// Publish the composer's drafts
    ///
    /// On full success the saved drafts are deleted and the composer reset.
    /// On any failure the drafts are saved so the user can retry.
    pub async fn post_composer(
        &self,
        composer: &mut ThreadComposer,
        cancel: Option<&AtomicBool>,
    ) -> Result<ThreadOutcome> {
        let bodies = composer.formatted_bodies();
        match self.post_thread(&bodies, cancel).await {
            Ok(outcome) => {
                self.drafts.clear();
                composer.reset();
                Ok(outcome)
            }
            Err(e) => {
                self.drafts.save(composer.drafts());
                Err(e)
            }
        }
    }
}
