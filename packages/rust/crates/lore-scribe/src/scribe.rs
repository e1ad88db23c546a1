//! Guarded lorebook workflow: extract, prompt, generate, parse, reconcile, save.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use lore_timeline::{
    ChatTurn, ContextSelector, ContextWindow, EntryDefaults, EntryIdAllocator, EntryKind,
    KnowledgeBase, LoreError, ParsedSummary, PromptMode, ReconcilePolicy, Reconciler,
    build_note_update_prompt, build_prompt, extract, parse, parse_events,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::state::{BusyGuard, StateCell};
use crate::{
    CommitReceipt, CommitTarget, Draft, DraftRequest, EntryUpdate, EventBookReceipt,
    KnowledgeBaseStore, ScribeError, ScribeSettings, TextGenerator, WorkflowState,
    resolve_generator, resolve_store,
};

const EVENT_BOOK_SUFFIX: &str = "Events";

/// One claimed run: busy guard, cancellation token and the settings it started with.
struct Run {
    guard: BusyGuard,
    token: CancellationToken,
    settings: Arc<ScribeSettings>,
}

/// Summarizes chat history into lorebooks, one run at a time.
///
/// A second run started while one is in flight fails with
/// [`ScribeError::Busy`]. Whatever way a run ends, the state returns to
/// [`WorkflowState::Idle`].
pub struct Scribe {
    settings: RwLock<Arc<ScribeSettings>>,
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn KnowledgeBaseStore>,
    defaults: EntryDefaults,
    state: StateCell,
    cancel: Mutex<CancellationToken>,
}

impl Scribe {
    /// Create a scribe over explicit collaborators.
    #[must_use]
    pub fn new(
        settings: ScribeSettings,
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn KnowledgeBaseStore>,
    ) -> Self {
        Self {
            settings: RwLock::new(Arc::new(settings)),
            generator,
            store,
            defaults: EntryDefaults::default(),
            state: StateCell::default(),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Create a scribe whose collaborators are resolved from `settings`.
    ///
    /// The generation backend is chosen here once; [`Self::apply_settings`]
    /// does not re-resolve it.
    pub fn from_settings(settings: ScribeSettings) -> Result<Self, ScribeError> {
        let generator = resolve_generator(&settings.generation)?;
        let store = resolve_store(&settings.store);
        Ok(Self::new(settings, generator, store))
    }

    /// Builder: field values for created entries.
    #[must_use]
    pub fn with_entry_defaults(mut self, defaults: EntryDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Settings new runs start with.
    #[must_use]
    pub fn settings(&self) -> Arc<ScribeSettings> {
        Arc::clone(&self.settings.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace settings; runs already in flight keep the old ones.
    pub fn apply_settings(&self, settings: ScribeSettings) {
        let settings = Arc::new(settings);
        tracing::info!(
            enabled = settings.scribe.enabled(),
            scan_depth = settings.scribe.scan_depth(),
            "applied lorebook scribe settings"
        );
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    /// Current workflow stage.
    #[must_use]
    pub fn state(&self) -> WorkflowState {
        self.state.current()
    }

    /// Whether a run is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state() != WorkflowState::Idle
    }

    /// Cancel the run in flight, if any.
    ///
    /// The run fails with [`ScribeError::Cancelled`] at its current wait.
    pub fn cancel(&self) {
        let token = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_busy() {
            tracing::info!(state = %self.state(), "cancelling lorebook run");
        }
        token.cancel();
    }

    /// Lorebook store used by this scribe.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KnowledgeBaseStore> {
        &self.store
    }

    /// Names of the lorebooks available as targets.
    pub async fn list_lorebooks(&self) -> Result<Vec<String>, ScribeError> {
        self.store
            .list()
            .await
            .map_err(|source| ScribeError::Load {
                lorebook: "*".to_string(),
                source,
            })
    }

    /// Generate a draft for review; nothing is written.
    pub async fn draft(
        &self,
        history: &[ChatTurn],
        request: &DraftRequest,
    ) -> Result<Draft, ScribeError> {
        let run = self.begin(WorkflowState::Extracting)?;
        self.run_draft(&run, history, request).await
    }

    /// Write a reviewed draft into its target lorebook.
    ///
    /// The draft is only read, so a rejected commit can be retried with
    /// the same edits.
    pub async fn commit(
        &self,
        draft: &Draft,
        target: &CommitTarget,
    ) -> Result<CommitReceipt, ScribeError> {
        let run = self.begin(WorkflowState::AwaitingPersist)?;
        self.run_commit(&run, draft.to_summary(), target).await
    }

    /// Generate and write in one run, without review.
    pub async fn generate_and_commit(
        &self,
        history: &[ChatTurn],
        request: &DraftRequest,
        target: &CommitTarget,
    ) -> Result<CommitReceipt, ScribeError> {
        let run = self.begin(WorkflowState::Extracting)?;
        let draft = self.run_draft(&run, history, request).await?;
        self.run_commit(&run, draft.to_summary(), target).await
    }

    /// Regenerate an existing entry from recent chat and append or replace its body.
    ///
    /// The template follows the entry's stored kind (timeline, event or
    /// entity note); entity notes send their current body along so the
    /// model rewrites the note. Host-authored entries fail with
    /// [`ScribeError::NoPromptMode`] unless `update.mode` is set.
    pub async fn update_entry(
        &self,
        history: &[ChatTurn],
        update: &EntryUpdate,
    ) -> Result<CommitReceipt, ScribeError> {
        let run = self.begin(WorkflowState::AwaitingPersist)?;
        let kb = self.load_required(&run, &update.lorebook).await?;
        let entry = kb
            .get(update.entry)
            .ok_or(LoreError::EntryNotFound(update.entry))?;
        let mode = match update.mode.or_else(|| entry.kind.prompt_mode()) {
            Some(mode) => mode,
            None => {
                tracing::warn!(
                    lorebook = %update.lorebook,
                    entry_id = %update.entry,
                    "entry has no generated kind and no prompt mode was given"
                );
                return Err(ScribeError::NoPromptMode(update.entry));
            }
        };
        tracing::info!(
            lorebook = %update.lorebook,
            entry_id = %update.entry,
            kind = ?entry.kind,
            mode = ?mode,
            "regenerating lorebook entry"
        );
        let request = DraftRequest {
            mode,
            selector: update.selector,
            existing_note: (mode == PromptMode::EntityNote).then(|| entry.body.clone()),
        };

        let draft = self.run_draft(&run, history, &request).await?;
        let target = CommitTarget::existing(
            update.lorebook.clone(),
            update.entry,
            update.strategy.policy(),
        );
        self.run_commit(&run, draft.to_summary(), &target).await
    }

    /// Write a whole-story timeline as an always-active entry in the main lorebook.
    pub async fn generate_main_timeline(
        &self,
        history: &[ChatTurn],
        selector: Option<ContextSelector>,
    ) -> Result<CommitReceipt, ScribeError> {
        let lorebook = self
            .settings()
            .scribe
            .main_lorebook_name()
            .map(str::to_string)
            .ok_or(ScribeError::NoMainLorebook)?;
        let request = DraftRequest {
            mode: PromptMode::FullTimeline,
            selector,
            existing_note: None,
        };
        let target = CommitTarget::create(
            lorebook,
            ReconcilePolicy::CreateAlwaysActive {
                kind: EntryKind::Timeline,
            },
        );
        self.generate_and_commit(history, &request, &target).await
    }

    /// Extract several events and write each as a keyword entry in a new lorebook.
    ///
    /// `lorebook` defaults to the configured prefix plus `Events`. An
    /// existing lorebook of that name is never overwritten.
    pub async fn generate_event_book(
        &self,
        history: &[ChatTurn],
        lorebook: Option<&str>,
        selector: Option<ContextSelector>,
    ) -> Result<EventBookReceipt, ScribeError> {
        let run = self.begin(WorkflowState::Extracting)?;
        let name = match lorebook.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => name.to_string(),
            None => format!(
                "{}{EVENT_BOOK_SUFFIX}",
                run.settings.scribe.sub_lorebook_prefix()
            ),
        };

        let window = Self::extract_window(&run, history, selector)?;
        let prompt = build_prompt(&window.transcript, PromptMode::EventBatch);
        let raw = self.generate(&run, &prompt).await?;

        run.guard.advance(WorkflowState::Parsing);
        let events: Vec<ParsedSummary> = parse_events(&raw)
            .into_iter()
            .filter(|event| !event.body.trim().is_empty())
            .collect();
        if events.is_empty() {
            tracing::warn!(lorebook = %name, "event completion held no usable events");
            return Err(ScribeError::NoEvents);
        }

        run.guard.advance(WorkflowState::AwaitingPersist);
        if self.load(&run, &name).await?.is_some() {
            tracing::warn!(lorebook = %name, "refusing to overwrite existing lorebook");
            return Err(ScribeError::LorebookExists(name));
        }

        let auto_keywords = run.settings.scribe.auto_keywords();
        let reconciler = Reconciler::new(&self.defaults, EntryIdAllocator::process());
        let mut kb = KnowledgeBase::new();
        let mut entry_ids = Vec::with_capacity(events.len());
        for (index, mut event) in events.into_iter().enumerate() {
            if !auto_keywords {
                event.keywords.clear();
            }
            let outcome = reconciler.reconcile(
                &mut kb,
                None,
                &event,
                ReconcilePolicy::CreateNew {
                    kind: EntryKind::Event,
                },
            )?;
            if let Some(entry) = kb.get_mut(outcome.entry_id) {
                let offset = u32::try_from(index).unwrap_or(u32::MAX);
                entry.order = self.defaults.order.saturating_add(offset);
                entry.title = format!("{}{}", self.defaults.event_title_prefix, entry.title);
                entry.extra.insert(
                    "scanDepth".to_string(),
                    Value::from(self.defaults.event_scan_depth),
                );
            }
            entry_ids.push(outcome.entry_id);
        }

        self.save(&run, &name, &kb).await?;
        tracing::info!(lorebook = %name, events = entry_ids.len(), "event lorebook created");
        Ok(EventBookReceipt {
            lorebook: name,
            entry_ids,
        })
    }

    fn begin(&self, first: WorkflowState) -> Result<Run, ScribeError> {
        let settings = self.settings();
        if !settings.scribe.enabled() {
            tracing::warn!("lorebook scribe disabled; run rejected");
            return Err(ScribeError::Disabled);
        }
        // Claim and token swap happen under the cancel lock so `cancel()`
        // never lands between them.
        let mut current = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        let guard = self.state.begin(first)?;
        let token = CancellationToken::new();
        *current = token.clone();
        drop(current);
        Ok(Run {
            guard,
            token,
            settings,
        })
    }

    fn extract_window(
        run: &Run,
        history: &[ChatTurn],
        selector: Option<ContextSelector>,
    ) -> Result<ContextWindow, ScribeError> {
        run.guard.advance(WorkflowState::Extracting);
        let selector = selector.unwrap_or(ContextSelector::LastN {
            n: run.settings.scribe.scan_depth(),
        });
        Ok(extract(history, selector)?)
    }

    async fn run_draft(
        &self,
        run: &Run,
        history: &[ChatTurn],
        request: &DraftRequest,
    ) -> Result<Draft, ScribeError> {
        let window = Self::extract_window(run, history, request.selector)?;
        let prompt = match (request.mode, request.existing_note.as_deref()) {
            (PromptMode::EntityNote, Some(note)) => {
                build_note_update_prompt(&window.transcript, note)
            }
            (mode, _) => build_prompt(&window.transcript, mode),
        };
        let raw = self.generate(run, &prompt).await?;

        run.guard.advance(WorkflowState::Parsing);
        let parsed = parse(&raw, request.mode);
        Ok(Draft {
            mode: request.mode,
            start_index: window.start_index,
            end_index: window.end_index,
            turn_count: window.len(),
            title: parsed.title,
            body: parsed.body,
            keywords: parsed.keywords,
        })
    }

    async fn run_commit(
        &self,
        run: &Run,
        summary: ParsedSummary,
        target: &CommitTarget,
    ) -> Result<CommitReceipt, ScribeError> {
        run.guard.advance(WorkflowState::AwaitingPersist);
        let mut kb = self.load_required(run, &target.lorebook).await?;

        let outcome = Reconciler::new(&self.defaults, EntryIdAllocator::process()).reconcile(
            &mut kb,
            target.entry,
            &summary,
            target.policy,
        )?;
        self.save(run, &target.lorebook, &kb).await?;
        Ok(CommitReceipt {
            lorebook: target.lorebook.clone(),
            outcome,
        })
    }

    async fn generate(&self, run: &Run, prompt: &str) -> Result<String, ScribeError> {
        run.guard.advance(WorkflowState::AwaitingGeneration);
        tracing::info!(
            backend = self.generator.backend_name(),
            prompt_chars = prompt.len(),
            "requesting lorebook summary"
        );
        let limit = run.settings.generation.timeout();
        let raw = wait(
            run,
            WorkflowState::AwaitingGeneration,
            limit,
            self.generator.generate(prompt),
        )
        .await?
        .map_err(|error| {
            tracing::warn!(
                backend = self.generator.backend_name(),
                error = %error,
                "text generation failed"
            );
            ScribeError::Generation(error)
        })?;
        tracing::info!(response_chars = raw.len(), "lorebook summary received");
        Ok(raw)
    }

    async fn load(&self, run: &Run, name: &str) -> Result<Option<KnowledgeBase>, ScribeError> {
        wait(
            run,
            WorkflowState::AwaitingPersist,
            None,
            self.store.load(name),
        )
        .await?
        .map_err(|source| {
            tracing::warn!(lorebook = %name, error = %source, "failed to load lorebook");
            ScribeError::Load {
                lorebook: name.to_string(),
                source,
            }
        })
    }

    async fn load_required(&self, run: &Run, name: &str) -> Result<KnowledgeBase, ScribeError> {
        self.load(run, name).await?.ok_or_else(|| {
            tracing::warn!(lorebook = %name, "target lorebook not found");
            ScribeError::StoreNotFound(name.to_string())
        })
    }

    async fn save(&self, run: &Run, name: &str, kb: &KnowledgeBase) -> Result<(), ScribeError> {
        wait(
            run,
            WorkflowState::AwaitingPersist,
            None,
            self.store.save(name, kb),
        )
        .await?
        .map_err(|source| {
            tracing::warn!(
                lorebook = %name,
                backend = self.store.backend_name(),
                error = %source,
                "failed to save lorebook; change discarded"
            );
            ScribeError::Persistence {
                lorebook: name.to_string(),
                source,
            }
        })?;
        tracing::info!(
            lorebook = %name,
            backend = self.store.backend_name(),
            entries = kb.len(),
            "lorebook saved"
        );
        Ok(())
    }
}

/// Await `work` unless the run is cancelled or `limit` elapses first.
async fn wait<T>(
    run: &Run,
    stage: WorkflowState,
    limit: Option<Duration>,
    work: impl Future<Output = T>,
) -> Result<T, ScribeError> {
    let bounded = async move {
        match limit {
            Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
                tracing::warn!(stage = %stage, secs = limit.as_secs(), "external call timed out");
                ScribeError::TimedOut {
                    stage,
                    secs: limit.as_secs(),
                }
            }),
            None => Ok(work.await),
        }
    };
    tokio::select! {
        biased;
        () = run.token.cancelled() => {
            tracing::info!(stage = %stage, "lorebook run cancelled");
            Err(ScribeError::Cancelled { stage })
        }
        result = bounded => result,
    }
}
