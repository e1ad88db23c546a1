#![allow(missing_docs)]

use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use lore_scribe::{
    CommitTarget, DraftRequest, EntryUpdate, GenerationSettings, KnowledgeBaseStore,
    MemoryStore, Scribe, ScribeError, ScribeSettings, TextGenerator, UpdateStrategy,
    WorkflowSettings, WorkflowState,
};
use lore_timeline::{
    APPEND_SEPARATOR, ChatTurn, ContextSelector, EntryId, EntryKind, KnowledgeBase,
    KnowledgeEntry, LoreError, PromptMode, ReconcileAction, ReconcilePolicy,
};
use tokio::sync::Notify;

const NOTE_ID: EntryId = EntryId(42);

/// Replies with a fixed completion and records every prompt.
struct ScriptedGenerator {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn backend_name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    fn backend_name(&self) -> &'static str {
        "failing"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(anyhow!("backend unavailable"))
    }
}

/// Signals `started`, then waits for `release` (or forever when `None`).
struct GatedGenerator {
    started: Notify,
    release: Option<Notify>,
    reply: String,
}

impl GatedGenerator {
    fn held(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            started: Notify::new(),
            release: Some(Notify::new()),
            reply: reply.to_string(),
        })
    }

    fn stuck() -> Arc<Self> {
        Arc::new(Self {
            started: Notify::new(),
            release: None,
            reply: String::new(),
        })
    }
}

#[async_trait]
impl TextGenerator for GatedGenerator {
    fn backend_name(&self) -> &'static str {
        "gated"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.started.notify_one();
        match &self.release {
            Some(release) => release.notified().await,
            None => std::future::pending::<()>().await,
        }
        Ok(self.reply.clone())
    }
}

/// Loads from an inner store but refuses every save.
struct ReadOnlyStore {
    inner: Arc<MemoryStore>,
}

#[async_trait]
impl KnowledgeBaseStore for ReadOnlyStore {
    fn backend_name(&self) -> &'static str {
        "read_only"
    }

    async fn list(&self) -> Result<Vec<String>> {
        self.inner.list().await
    }

    async fn load(&self, name: &str) -> Result<Option<KnowledgeBase>> {
        self.inner.load(name).await
    }

    async fn save(&self, _name: &str, _kb: &KnowledgeBase) -> Result<()> {
        Err(anyhow!("disk full"))
    }
}

fn history() -> Vec<ChatTurn> {
    vec![
        ChatTurn::new("Mina", false, "The harbor is on fire."),
        ChatTurn::new("Aren", true, "Get the boats out."),
        ChatTurn::new("Mina", false, "Too late, the docks collapsed."),
    ]
}

fn cast_lorebook() -> KnowledgeBase {
    let mut note = KnowledgeEntry::new(NOTE_ID, "Mina", "A knight of the harbor watch.");
    note.is_keyword_triggered = true;
    note.extend_keywords(["mina"]);
    let mut kb = KnowledgeBase::new();
    kb.insert(note);
    kb
}

fn seeded_store() -> Arc<MemoryStore> {
    Arc::new(
        MemoryStore::new()
            .with_lorebook("Cast", cast_lorebook())
            .with_lorebook("World", KnowledgeBase::new()),
    )
}

fn settings_with(scribe: WorkflowSettings) -> ScribeSettings {
    ScribeSettings {
        scribe,
        ..ScribeSettings::default()
    }
}

fn main_lorebook_settings() -> ScribeSettings {
    settings_with(WorkflowSettings {
        main_lorebook_name: Some("World".to_string()),
        ..WorkflowSettings::default()
    })
}

const EVENT_REPLY: &str = r#"{"title": "Harbor Fire", "content": "The harbor burned.", "keywords": ["harbor", "fire"]}"#;

#[tokio::test]
async fn draft_then_commit_creates_keyword_entry() {
    let generator = ScriptedGenerator::new(EVENT_REPLY);
    let store = seeded_store();
    let scribe = Scribe::new(ScribeSettings::default(), generator.clone(), store.clone());

    let request = DraftRequest::new(PromptMode::SingleEvent)
        .with_selector(ContextSelector::Range { start: 0, end: 1 });
    let mut draft = scribe.draft(&history(), &request).await.expect("draft");

    assert_eq!(draft.title.as_deref(), Some("Harbor Fire"));
    assert_eq!(draft.body, "The harbor burned.");
    assert_eq!(draft.keywords_text(), "harbor, fire");
    assert_eq!((draft.start_index, draft.end_index, draft.turn_count), (0, 1, 2));
    let prompt = &generator.prompts()[0];
    assert!(prompt.contains("[#0] [Mina]: The harbor is on fire."));
    assert!(prompt.contains("[#1] [Aren]: Get the boats out."));
    assert!(!prompt.contains("docks collapsed"));
    assert_eq!(scribe.state(), WorkflowState::Idle);

    draft.set_keywords_text("harbor, blaze, harbor");
    let receipt = scribe
        .commit(
            &draft,
            &CommitTarget::create(
                "World",
                ReconcilePolicy::CreateNew {
                    kind: EntryKind::Event,
                },
            ),
        )
        .await
        .expect("commit");

    assert_eq!(receipt.lorebook, "World");
    assert_eq!(receipt.outcome.action, ReconcileAction::Created);
    let world = store.snapshot("World").expect("world lorebook");
    let entry = world.get(receipt.outcome.entry_id).expect("created entry");
    assert_eq!(entry.title, "Harbor Fire");
    assert_eq!(entry.body, "The harbor burned.");
    assert_eq!(entry.trigger_keywords, vec!["harbor", "blaze"]);
    assert!(entry.is_keyword_triggered);
    assert!(!entry.is_always_active);
    assert_eq!(entry.kind, EntryKind::Event);
}

#[tokio::test]
async fn dropped_draft_writes_nothing() {
    let store = seeded_store();
    let scribe = Scribe::new(
        ScribeSettings::default(),
        ScriptedGenerator::new(EVENT_REPLY),
        store.clone(),
    );

    let draft = scribe
        .draft(&history(), &DraftRequest::new(PromptMode::SingleEvent))
        .await
        .expect("draft");
    drop(draft);

    assert_eq!(store.snapshot("World"), Some(KnowledgeBase::new()));
    assert_eq!(store.snapshot("Cast"), Some(cast_lorebook()));
}

#[tokio::test]
async fn note_update_appends_and_replaces_existing_entry() {
    let generator = ScriptedGenerator::new("KEYWORDS: mina\nMina lost her post after the fire.");
    let store = seeded_store();
    let scribe = Scribe::new(ScribeSettings::default(), generator.clone(), store.clone());
    let request = DraftRequest::new(PromptMode::EntityNote)
        .with_existing_note("A knight of the harbor watch.");

    let receipt = scribe
        .generate_and_commit(
            &history(),
            &request,
            &CommitTarget::existing("Cast", NOTE_ID, ReconcilePolicy::AppendToExisting),
        )
        .await
        .expect("append");
    assert_eq!(receipt.outcome.entry_id, NOTE_ID);
    assert_eq!(receipt.outcome.action, ReconcileAction::Appended);
    let cast = store.snapshot("Cast").expect("cast lorebook");
    assert_eq!(
        cast.get(NOTE_ID).expect("note").body,
        format!("A knight of the harbor watch.{APPEND_SEPARATOR}Mina lost her post after the fire.")
    );
    let prompt = &generator.prompts()[0];
    assert!(prompt.contains("CURRENT NOTE:\nA knight of the harbor watch."));

    scribe
        .generate_and_commit(
            &history(),
            &request,
            &CommitTarget::existing("Cast", NOTE_ID, ReconcilePolicy::ReplaceExisting),
        )
        .await
        .expect("replace");
    let cast = store.snapshot("Cast").expect("cast lorebook");
    let note = cast.get(NOTE_ID).expect("note");
    assert_eq!(note.body, "Mina lost her post after the fire.");
    assert_eq!(note.trigger_keywords, vec!["mina"]);
    assert_eq!(cast.len(), 1);
}

#[tokio::test]
async fn append_without_target_is_rejected() {
    let store = seeded_store();
    let scribe = Scribe::new(
        ScribeSettings::default(),
        ScriptedGenerator::new("text"),
        store.clone(),
    );

    let error = scribe
        .generate_and_commit(
            &history(),
            &DraftRequest::new(PromptMode::EntityNote),
            &CommitTarget::create("Cast", ReconcilePolicy::AppendToExisting),
        )
        .await
        .expect_err("no target");

    assert!(matches!(error, ScribeError::Lore(LoreError::MissingTarget)));
    assert_eq!(store.snapshot("Cast"), Some(cast_lorebook()));
    assert_eq!(scribe.state(), WorkflowState::Idle);
}

#[tokio::test]
async fn unknown_lorebook_is_store_not_found() {
    let scribe = Scribe::new(
        ScribeSettings::default(),
        ScriptedGenerator::new(EVENT_REPLY),
        seeded_store(),
    );

    let error = scribe
        .generate_and_commit(
            &history(),
            &DraftRequest::new(PromptMode::SingleEvent),
            &CommitTarget::create(
                "Missing",
                ReconcilePolicy::CreateNew {
                    kind: EntryKind::Event,
                },
            ),
        )
        .await
        .expect_err("missing lorebook");

    assert!(matches!(error, ScribeError::StoreNotFound(name) if name == "Missing"));
    assert_eq!(scribe.state(), WorkflowState::Idle);
}

#[tokio::test]
async fn inverted_range_fails_before_generation() {
    let generator = ScriptedGenerator::new(EVENT_REPLY);
    let scribe = Scribe::new(ScribeSettings::default(), generator.clone(), seeded_store());

    let request = DraftRequest::new(PromptMode::SingleEvent)
        .with_selector(ContextSelector::Range { start: 2, end: 1 });
    let error = scribe.draft(&history(), &request).await.expect_err("range");

    assert!(matches!(
        error,
        ScribeError::Lore(LoreError::InvalidRange { start: 2, end: 1 })
    ));
    assert!(generator.prompts().is_empty());
    assert_eq!(scribe.state(), WorkflowState::Idle);
}

#[tokio::test]
async fn main_timeline_is_always_active_entry() {
    let reply = "1. The harbor burns.\n2. The docks collapse.";
    let store = seeded_store();
    let scribe = Scribe::new(
        main_lorebook_settings(),
        ScriptedGenerator::new(reply),
        store.clone(),
    );

    let receipt = scribe
        .generate_main_timeline(&history(), None)
        .await
        .expect("timeline");

    assert_eq!(receipt.lorebook, "World");
    let world = store.snapshot("World").expect("world lorebook");
    let entry = world.get(receipt.outcome.entry_id).expect("timeline entry");
    assert_eq!(entry.title, "📅 Main Timeline");
    assert_eq!(entry.body, reply);
    assert!(entry.is_always_active);
    assert!(!entry.is_keyword_triggered);
    assert!(entry.trigger_keywords.is_empty());
    assert_eq!(entry.kind, EntryKind::Timeline);
    assert_eq!((entry.order, entry.position, entry.depth), (100, 4, 4));
}

#[tokio::test]
async fn main_timeline_requires_configured_lorebook() {
    let generator = ScriptedGenerator::new("timeline");
    let scribe = Scribe::new(ScribeSettings::default(), generator.clone(), seeded_store());

    let error = scribe
        .generate_main_timeline(&history(), None)
        .await
        .expect_err("no main lorebook");

    assert!(matches!(error, ScribeError::NoMainLorebook));
    assert!(generator.prompts().is_empty());
}

#[tokio::test]
async fn event_book_creates_ordered_keyword_entries() {
    let reply = r#"Here you go:
{"events": [
  {"title": "Harbor Fire", "content": "The harbor burned.", "keywords": ["harbor", "fire"]},
  {"title": "Broken Note"},
  {"title": "Collapse", "content": "The docks collapsed.", "keywords": "docks, collapse"}
]}"#;
    let store = seeded_store();
    let scribe = Scribe::new(
        ScribeSettings::default(),
        ScriptedGenerator::new(reply),
        store.clone(),
    );

    let receipt = scribe
        .generate_event_book(&history(), None, None)
        .await
        .expect("event book");

    assert_eq!(receipt.lorebook, "Timeline_Events");
    assert_eq!(receipt.entry_ids.len(), 2);
    let book = store.snapshot("Timeline_Events").expect("event lorebook");
    assert_eq!(book.len(), 2);
    let first = book.get(receipt.entry_ids[0]).expect("first event");
    let second = book.get(receipt.entry_ids[1]).expect("second event");
    assert_eq!(first.title, "📅 Harbor Fire");
    assert_eq!(first.trigger_keywords, vec!["harbor", "fire"]);
    assert_eq!(first.order, 100);
    assert_eq!(first.extra.get("scanDepth"), Some(&serde_json::json!(2)));
    assert_eq!(second.title, "📅 Collapse");
    assert_eq!(second.trigger_keywords, vec!["docks", "collapse"]);
    assert_eq!(second.order, 101);
    assert!(book.iter().all(|entry| entry.kind == EntryKind::Event));

    let error = scribe
        .generate_event_book(&history(), None, None)
        .await
        .expect_err("second run");
    assert!(matches!(error, ScribeError::LorebookExists(name) if name == "Timeline_Events"));
    assert_eq!(store.snapshot("Timeline_Events"), Some(book));
}

#[tokio::test]
async fn event_book_drops_keywords_when_auto_keywords_off() {
    let store = seeded_store();
    let settings = settings_with(WorkflowSettings {
        auto_keywords: Some(false),
        ..WorkflowSettings::default()
    });
    let scribe = Scribe::new(settings, ScriptedGenerator::new(EVENT_REPLY), store.clone());

    let receipt = scribe
        .generate_event_book(&history(), Some("Saga"), None)
        .await
        .expect("event book");

    let book = store.snapshot("Saga").expect("named lorebook");
    let entry = book.get(receipt.entry_ids[0]).expect("event");
    assert!(entry.trigger_keywords.is_empty());
    assert_eq!(entry.title, "📅 Harbor Fire");
}

#[tokio::test]
async fn blank_event_completion_is_no_events() {
    let store = seeded_store();
    let scribe = Scribe::new(
        ScribeSettings::default(),
        ScriptedGenerator::new("   \n"),
        store.clone(),
    );

    let error = scribe
        .generate_event_book(&history(), None, None)
        .await
        .expect_err("no events");

    assert!(matches!(error, ScribeError::NoEvents));
    assert!(store.snapshot("Timeline_Events").is_none());
}

#[tokio::test]
async fn generation_failure_leaves_store_and_state_clean() {
    let store = seeded_store();
    let scribe = Scribe::new(
        main_lorebook_settings(),
        Arc::new(FailingGenerator),
        store.clone(),
    );

    let error = scribe
        .generate_main_timeline(&history(), None)
        .await
        .expect_err("generation fails");

    assert!(matches!(error, ScribeError::Generation(_)));
    assert!(error.to_string().contains("backend unavailable"));
    assert_eq!(store.snapshot("World"), Some(KnowledgeBase::new()));
    assert_eq!(scribe.state(), WorkflowState::Idle);
}

#[tokio::test]
async fn persistence_failure_discards_change() {
    let inner = seeded_store();
    let scribe = Scribe::new(
        ScribeSettings::default(),
        ScriptedGenerator::new("Replaced body"),
        Arc::new(ReadOnlyStore {
            inner: inner.clone(),
        }),
    );

    let error = scribe
        .generate_and_commit(
            &history(),
            &DraftRequest::new(PromptMode::EntityNote),
            &CommitTarget::existing("Cast", NOTE_ID, ReconcilePolicy::ReplaceExisting),
        )
        .await
        .expect_err("save fails");

    assert!(matches!(error, ScribeError::Persistence { ref lorebook, .. } if lorebook == "Cast"));
    assert_eq!(inner.snapshot("Cast"), Some(cast_lorebook()));
    assert_eq!(scribe.state(), WorkflowState::Idle);
}

#[tokio::test]
async fn disabled_scribe_rejects_runs() {
    let generator = ScriptedGenerator::new(EVENT_REPLY);
    let settings = settings_with(WorkflowSettings {
        enabled: Some(false),
        ..WorkflowSettings::default()
    });
    let scribe = Scribe::new(settings, generator.clone(), seeded_store());

    let error = scribe
        .draft(&history(), &DraftRequest::new(PromptMode::SingleEvent))
        .await
        .expect_err("disabled");

    assert!(matches!(error, ScribeError::Disabled));
    assert!(generator.prompts().is_empty());
}

#[tokio::test]
async fn applied_settings_change_default_window() {
    let generator = ScriptedGenerator::new(EVENT_REPLY);
    let scribe = Scribe::new(ScribeSettings::default(), generator.clone(), seeded_store());
    scribe.apply_settings(settings_with(WorkflowSettings {
        scan_depth: Some(1),
        ..WorkflowSettings::default()
    }));

    let draft = scribe
        .draft(&history(), &DraftRequest::new(PromptMode::SingleEvent))
        .await
        .expect("draft");

    assert_eq!(scribe.settings().scribe.scan_depth(), 1);
    assert_eq!((draft.start_index, draft.turn_count), (2, 1));
    let prompt = &generator.prompts()[0];
    assert!(prompt.contains("[Mina]: Too late, the docks collapsed."));
    assert!(!prompt.contains("Get the boats out."));
}

#[tokio::test]
async fn second_run_is_rejected_while_busy() {
    let generator = GatedGenerator::held(EVENT_REPLY);
    let store = seeded_store();
    let scribe = Arc::new(Scribe::new(
        ScribeSettings::default(),
        generator.clone(),
        store.clone(),
    ));

    let running = tokio::spawn({
        let scribe = Arc::clone(&scribe);
        async move {
            scribe
                .generate_and_commit(
                    &history(),
                    &DraftRequest::new(PromptMode::SingleEvent),
                    &CommitTarget::create(
                        "World",
                        ReconcilePolicy::CreateNew {
                            kind: EntryKind::Event,
                        },
                    ),
                )
                .await
        }
    });
    generator.started.notified().await;

    assert!(scribe.is_busy());
    assert_eq!(scribe.state(), WorkflowState::AwaitingGeneration);
    let error = scribe
        .draft(&history(), &DraftRequest::new(PromptMode::SingleEvent))
        .await
        .expect_err("busy");
    assert!(matches!(error, ScribeError::Busy));

    if let Some(release) = &generator.release {
        release.notify_one();
    }
    let receipt = running.await.expect("join").expect("first run completes");
    assert_eq!(receipt.outcome.action, ReconcileAction::Created);
    assert_eq!(store.snapshot("World").map(|kb| kb.len()), Some(1));
    assert_eq!(scribe.state(), WorkflowState::Idle);
}

#[tokio::test(start_paused = true)]
async fn stalled_generation_times_out() {
    let generator = GatedGenerator::stuck();
    let mut settings = main_lorebook_settings();
    settings.generation = GenerationSettings {
        timeout_secs: Some(5),
        ..GenerationSettings::default()
    };
    let store = seeded_store();
    let scribe = Scribe::new(settings, generator, store.clone());

    let error = scribe
        .generate_main_timeline(&history(), None)
        .await
        .expect_err("timeout");

    assert!(matches!(
        error,
        ScribeError::TimedOut {
            stage: WorkflowState::AwaitingGeneration,
            secs: 5
        }
    ));
    assert_eq!(store.snapshot("World"), Some(KnowledgeBase::new()));
    assert_eq!(scribe.state(), WorkflowState::Idle);
}

#[tokio::test]
async fn cancel_stops_in_flight_run() {
    let generator = GatedGenerator::stuck();
    let store = seeded_store();
    let scribe = Arc::new(Scribe::new(
        main_lorebook_settings(),
        generator.clone(),
        store.clone(),
    ));

    let running = tokio::spawn({
        let scribe = Arc::clone(&scribe);
        async move { scribe.generate_main_timeline(&history(), None).await }
    });
    generator.started.notified().await;
    scribe.cancel();

    let error = running.await.expect("join").expect_err("cancelled");
    assert!(matches!(
        error,
        ScribeError::Cancelled {
            stage: WorkflowState::AwaitingGeneration
        }
    ));
    assert_eq!(store.snapshot("World"), Some(KnowledgeBase::new()));
    assert_eq!(scribe.state(), WorkflowState::Idle);
}

#[tokio::test]
async fn cancel_before_a_run_does_not_poison_the_next() {
    let scribe = Scribe::new(
        main_lorebook_settings(),
        ScriptedGenerator::new("timeline"),
        seeded_store(),
    );
    scribe.cancel();

    scribe
        .generate_main_timeline(&history(), None)
        .await
        .expect("new run gets a fresh token");
}

#[tokio::test]
async fn list_lorebooks_reports_store_names() {
    let scribe = Scribe::new(
        ScribeSettings::default(),
        ScriptedGenerator::new(""),
        seeded_store(),
    );
    assert_eq!(
        scribe.list_lorebooks().await.expect("list"),
        vec!["Cast".to_string(), "World".to_string()]
    );
}

#[test]
fn from_settings_requires_generation_backend() {
    let result = Scribe::from_settings(ScribeSettings::default());
    assert!(matches!(result, Err(ScribeError::NoGenerationBackend)));
}

#[tokio::test]
async fn rejected_commit_keeps_draft_for_retry() {
    let store = seeded_store();
    let scribe = Scribe::new(
        ScribeSettings::default(),
        ScriptedGenerator::new(EVENT_REPLY),
        store.clone(),
    );
    let mut draft = scribe
        .draft(&history(), &DraftRequest::new(PromptMode::SingleEvent))
        .await
        .expect("draft");
    draft.body = "Edited by hand.".to_string();
    let policy = ReconcilePolicy::CreateNew {
        kind: EntryKind::Event,
    };

    let error = scribe
        .commit(&draft, &CommitTarget::create("Missing", policy))
        .await
        .expect_err("missing lorebook");
    assert!(matches!(error, ScribeError::StoreNotFound(_)));

    let receipt = scribe
        .commit(&draft, &CommitTarget::create("World", policy))
        .await
        .expect("retry");
    let world = store.snapshot("World").expect("world lorebook");
    assert_eq!(
        world.get(receipt.outcome.entry_id).expect("entry").body,
        "Edited by hand."
    );
}

fn tagged_lorebook() -> KnowledgeBase {
    // Titles deliberately point at the wrong template.
    let mut timeline = KnowledgeEntry::new(EntryId(1), "Mina", "Arc I.");
    timeline.kind = EntryKind::Timeline;
    timeline.make_always_active();
    let mut note = KnowledgeEntry::new(EntryId(2), "📅 Main Timeline", "Mina trusts Aren.");
    note.kind = EntryKind::EntityNote;
    let mut event = KnowledgeEntry::new(EntryId(3), "Relationship notes", "Old event.");
    event.kind = EntryKind::Event;
    let mut kb = KnowledgeBase::new();
    kb.insert(timeline);
    kb.insert(note);
    kb.insert(event);
    kb.insert(KnowledgeEntry::new(EntryId(4), "📅 Harbor", "Written by hand."));
    kb
}

fn tagged_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new().with_lorebook("Story", tagged_lorebook()))
}

#[tokio::test]
async fn update_entry_picks_template_from_kind_not_title() {
    let generator = ScriptedGenerator::new("Arc II.");
    let store = tagged_store();
    let scribe = Scribe::new(ScribeSettings::default(), generator.clone(), store.clone());

    let receipt = scribe
        .update_entry(
            &history(),
            &EntryUpdate::new("Story", EntryId(1), UpdateStrategy::Append),
        )
        .await
        .expect("timeline update");
    assert_eq!(receipt.outcome.action, ReconcileAction::Appended);
    assert!(generator.prompts()[0].contains("### **I. [Arc Title]"));
    let story = store.snapshot("Story").expect("story lorebook");
    assert_eq!(
        story.get(EntryId(1)).expect("timeline").body,
        format!("Arc I.{APPEND_SEPARATOR}Arc II.")
    );

    scribe
        .update_entry(
            &history(),
            &EntryUpdate::new("Story", EntryId(2), UpdateStrategy::Replace),
        )
        .await
        .expect("note update");
    let prompt = &generator.prompts()[1];
    assert!(prompt.contains("KEYWORDS:"));
    assert!(prompt.contains("CURRENT NOTE:\nMina trusts Aren."));
    assert!(!prompt.contains("### **I. [Arc Title]"));
}

#[tokio::test]
async fn update_entry_replaces_event_body_from_json() {
    let generator = ScriptedGenerator::new(EVENT_REPLY);
    let store = tagged_store();
    let scribe = Scribe::new(ScribeSettings::default(), generator.clone(), store.clone());

    let receipt = scribe
        .update_entry(
            &history(),
            &EntryUpdate::new("Story", EntryId(3), UpdateStrategy::Replace)
                .with_selector(ContextSelector::Range { start: 0, end: 0 }),
        )
        .await
        .expect("event update");

    assert_eq!(receipt.outcome.action, ReconcileAction::Replaced);
    let prompt = &generator.prompts()[0];
    assert!(prompt.contains("single most significant event"));
    assert!(prompt.contains("[#0] [Mina]: The harbor is on fire."));
    assert!(!prompt.contains("CURRENT NOTE:"));
    let story = store.snapshot("Story").expect("story lorebook");
    let event = story.get(EntryId(3)).expect("event");
    assert_eq!(event.body, "The harbor burned.");
    assert_eq!(event.title, "Relationship notes");
}

#[tokio::test]
async fn update_entry_needs_mode_for_host_entries() {
    let generator = ScriptedGenerator::new("Rewritten by the model.");
    let store = tagged_store();
    let scribe = Scribe::new(ScribeSettings::default(), generator.clone(), store.clone());
    let update = EntryUpdate::new("Story", EntryId(4), UpdateStrategy::Replace);

    let error = scribe
        .update_entry(&history(), &update)
        .await
        .expect_err("manual entry without mode");
    assert!(matches!(error, ScribeError::NoPromptMode(EntryId(4))));
    assert!(generator.prompts().is_empty());
    assert_eq!(store.snapshot("Story"), Some(tagged_lorebook()));
    assert_eq!(scribe.state(), WorkflowState::Idle);

    scribe
        .update_entry(&history(), &update.with_mode(PromptMode::FullTimeline))
        .await
        .expect("explicit mode");
    let story = store.snapshot("Story").expect("story lorebook");
    assert_eq!(story.get(EntryId(4)).expect("entry").body, "Rewritten by the model.");
}

#[tokio::test]
async fn update_entry_reports_unknown_entry() {
    let generator = ScriptedGenerator::new("text");
    let scribe = Scribe::new(ScribeSettings::default(), generator.clone(), tagged_store());

    let error = scribe
        .update_entry(
            &history(),
            &EntryUpdate::new("Story", EntryId(99), UpdateStrategy::Append),
        )
        .await
        .expect_err("unknown entry");

    assert!(matches!(
        error,
        ScribeError::Lore(LoreError::EntryNotFound(EntryId(99)))
    ));
    assert!(generator.prompts().is_empty());
}

#[tokio::test]
async fn rejected_run_does_not_take_over_cancellation() {
    let generator = GatedGenerator::stuck();
    let scribe = Arc::new(Scribe::new(
        main_lorebook_settings(),
        generator.clone(),
        seeded_store(),
    ));

    let running = tokio::spawn({
        let scribe = Arc::clone(&scribe);
        async move { scribe.generate_main_timeline(&history(), None).await }
    });
    generator.started.notified().await;

    let error = scribe
        .generate_main_timeline(&history(), None)
        .await
        .expect_err("busy");
    assert!(matches!(error, ScribeError::Busy));
    scribe.cancel();

    let error = running.await.expect("join").expect_err("cancelled");
    assert!(matches!(error, ScribeError::Cancelled { .. }));
    assert_eq!(scribe.state(), WorkflowState::Idle);
}
