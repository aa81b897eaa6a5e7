//! Dialog router — the top-level turn handler.
//!
//! For each inbound activity the router resumes the conversation's active
//! dialog, or, when nothing is waiting for input, greets the user, matches a
//! keyword and begins the corresponding dialog (falling back to the options
//! menu). Turns of one conversation are serialized; state is written only
//! when the whole turn succeeds.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::activity::{Activity, ActivityType, CardAction, HeroCard, OutgoingActivity};
use crate::config::BotConfig;
use crate::dialogs::DialogSet;
use crate::error::{Result, StoreError};
use crate::store::{ConversationRecord, StateStore, UserProfile};
use crate::turn::TurnContext;

/// Reply sent when a turn fails with an unhandled error.
pub const TURN_ERROR_MESSAGE: &str = "The bot encountered an error or bug.";

pub const MENU_TITLE: &str = "¿Qué deseas hacer?";

const WELCOME_BACK: &str = "Bienvenido a nuestro chat de Automatizacion de Recursos Humanos en Softgic.";

/// Trigger word → dialog id. Matched against the trimmed, lowercased text.
const KEYWORDS: &[(&str, &str)] = &[
    ("solicitud", "solicitud"),
    ("candidato", "candidato"),
    ("busqueda", "candidato"),
    ("validacion", "validacion"),
    ("consultar", "validacion"),
    ("vitae", "vitae"),
];

/// Writes of a shared profile retried after a concurrent update.
const PROFILE_WRITE_ATTEMPTS: usize = 3;

/// Buttons of the options menu as (title, value sent back).
const MENU_OPTIONS: &[(&str, &str)] = &[
    ("📝 Registrar nueva solicitud", "solicitud"),
    ("🔍 Validación ID Solicitud", "consultar"),
    ("👤 Búsqueda de candidato", "candidato"),
    ("📄 Hoja de vida formato Softgic", "vitae"),
];

/// Timing knobs of the router.
#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    pub welcome_interval: Duration,
    pub dialog_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::from(&BotConfig::default())
    }
}

impl From<&BotConfig> for RouterConfig {
    fn from(config: &BotConfig) -> Self {
        Self {
            welcome_interval: config.welcome_interval,
            dialog_timeout: config.dialog_timeout,
        }
    }
}

/// Dialog id matched by a message, if any.
pub fn match_keyword(text: &str) -> Option<&'static str> {
    let text = text.trim().to_lowercase();
    KEYWORDS
        .iter()
        .find(|(trigger, _)| *trigger == text)
        .map(|(_, dialog)| *dialog)
}

/// The options menu card.
pub fn options_menu() -> HeroCard {
    HeroCard {
        title: MENU_TITLE.to_string(),
        buttons: MENU_OPTIONS
            .iter()
            .map(|(title, value)| CardAction::im_back(title, value))
            .collect(),
    }
}

/// Routes inbound activities to dialogs.
pub struct DialogRouter {
    store: Arc<dyn StateStore>,
    dialogs: DialogSet,
    config: RouterConfig,
    /// One lock per conversation id.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DialogRouter {
    pub fn new(store: Arc<dyn StateStore>, dialogs: DialogSet, config: RouterConfig) -> Self {
        Self {
            store,
            dialogs,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Process one inbound activity to completion and return the replies.
    ///
    /// Never fails: an unhandled error is logged, the turn's replies are
    /// replaced by a generic error message and nothing is persisted. Replies
    /// relaying a webhook answer are kept; the conversation's dialog is then
    /// dropped so the same input cannot be submitted twice.
    pub async fn handle_turn(&self, activity: Activity) -> Vec<OutgoingActivity> {
        self.run_turn(TurnContext::new(activity)).await
    }

    /// Like [`handle_turn`](Self::handle_turn), but replies go to `outbox`,
    /// some of them before the turn finishes.
    pub async fn handle_turn_streaming(
        &self,
        activity: Activity,
        outbox: UnboundedSender<OutgoingActivity>,
    ) {
        self.run_turn(TurnContext::streaming(activity, outbox)).await;
    }

    async fn run_turn(&self, mut turn: TurnContext) -> Vec<OutgoingActivity> {
        let conversation_id = turn.activity().conversation_id().to_string();
        let lock = self.conversation_lock(&conversation_id).await;
        let guard = lock.lock().await;

        if let Err(e) = self.process(&mut turn).await {
            error!(conversation = %conversation_id, error = %e, "Turn failed");
            if turn.handed_off() {
                self.forget_conversation(&conversation_id).await;
            }
            turn.discard_replies();
            turn.send(TURN_ERROR_MESSAGE);
        }

        drop(guard);
        self.release_lock(&conversation_id, lock).await;
        turn.flush();
        turn.into_replies()
    }

    async fn conversation_lock(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(conversation_id.to_string()).or_default())
    }

    /// Drop the conversation's lock entry once no other turn holds or waits on it.
    async fn release_lock(&self, conversation_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // One reference in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(conversation_id);
        }
    }

    async fn forget_conversation(&self, conversation_id: &str) {
        match self.store.delete_conversation(conversation_id).await {
            Ok(()) => warn!(conversation = %conversation_id, "Dialog state dropped after failed hand-off turn"),
            Err(e) => error!(
                conversation = %conversation_id,
                error = %e,
                "Failed to drop dialog state after failed hand-off turn"
            ),
        }
    }

    async fn process(&self, turn: &mut TurnContext) -> Result<()> {
        match turn.activity().kind {
            ActivityType::Message => self.on_message(turn).await,
            ActivityType::ConversationUpdate => self.on_members_added(turn).await,
            ActivityType::Other => {
                debug!("Ignoring activity");
                Ok(())
            }
        }
    }

    async fn on_message(&self, turn: &mut TurnContext) -> Result<()> {
        let now = Utc::now();
        let activity = turn.activity();
        info!(
            conversation = %activity.conversation_id(),
            user = %activity.user_id(),
            attachments = activity.attachments.len(),
            "Message received"
        );

        let mut record = self.store.load_conversation(activity.conversation_id()).await?;
        let mut profile = self.store.load_profile(activity.user_id()).await?;

        if let Some(active) = record.active.as_ref() {
            if active.is_expired(now, self.config.dialog_timeout) {
                info!(dialog = %active.dialog_id, "Discarding idle dialog");
                record.active = None;
            }
        }

        let result = self.dialogs.resume(&mut record.active, turn).await?;
        let mut greeted = false;
        if !result.is_waiting() {
            debug!(result = ?result, "No dialog waiting, routing message");
            greeted = self.greet_if_due(turn, &mut profile, now);
            self.route(turn, &mut record, &mut profile).await?;
        }

        record.last_activity = Some(now);
        self.store.save_conversation(&mut record).await?;
        if greeted {
            self.record_greeting(&profile).await;
        }
        Ok(())
    }

    async fn on_members_added(&self, turn: &mut TurnContext) -> Result<()> {
        let joined: Vec<String> = turn.activity().new_members().map(|m| m.id.clone()).collect();
        if joined.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let mut profile = self.store.load_profile(turn.activity().user_id()).await?;
        let mut greeted = false;
        for member in &joined {
            debug!(member = %member, "Member added");
            greeted |= self.greet_if_due(turn, &mut profile, now);
        }
        if greeted {
            self.record_greeting(&profile).await;
        }
        Ok(())
    }

    /// Send the welcome pair when the user has not been greeted recently.
    /// Returns whether the profile changed.
    fn greet_if_due(&self, turn: &mut TurnContext, profile: &mut UserProfile, now: DateTime<Utc>) -> bool {
        if !profile.welcome_due(now, self.config.welcome_interval) {
            return false;
        }
        let name = turn.activity().user_name().to_string();
        turn.send(format!("Me alegro que estés aquí, {name}"));
        turn.send(WELCOME_BACK);
        if !name.is_empty() {
            profile.name = Some(name);
        }
        profile.last_interaction = Some(now);
        true
    }

    /// Begin the dialog named by the message, or show the options menu.
    async fn route(
        &self,
        turn: &mut TurnContext,
        record: &mut ConversationRecord,
        profile: &mut UserProfile,
    ) -> Result<()> {
        let Some(dialog_id) = match_keyword(turn.activity().text_trimmed()) else {
            debug!("No keyword matched, sending options menu");
            turn.send_card(options_menu());
            return Ok(());
        };

        info!(dialog = dialog_id, "Keyword matched");
        profile.selected_option = Some(dialog_id.to_string());
        self.dialogs.begin(dialog_id, &mut record.active, turn).await?;
        profile.selected_option = None;
        Ok(())
    }

    /// Store the welcome on the user's profile. Profiles are shared by all of
    /// a user's conversations, so a concurrent update is reloaded and merged.
    /// Failure only costs a repeated welcome and does not fail the turn.
    async fn record_greeting(&self, greeted: &UserProfile) {
        let mut profile = greeted.clone();
        for _ in 0..PROFILE_WRITE_ATTEMPTS {
            match self.store.save_profile(&mut profile).await {
                Ok(()) => return,
                Err(StoreError::Conflict { .. }) => {
                    debug!(user = %greeted.user_id, "Profile changed concurrently, merging");
                    match self.store.load_profile(&greeted.user_id).await {
                        Ok(mut fresh) => {
                            fresh.name = greeted.name.clone().or(fresh.name);
                            fresh.last_interaction = greeted.last_interaction.max(fresh.last_interaction);
                            profile = fresh;
                        }
                        Err(e) => {
                            warn!(user = %greeted.user_id, error = %e, "Failed to reload profile");
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!(user = %greeted.user_id, error = %e, "Failed to save profile");
                    return;
                }
            }
        }
        warn!(user = %greeted.user_id, "Gave up saving profile after repeated conflicts");
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dialogs::build_dialogs;
    use crate::error::StoreError;
    use crate::dialogs::testing::RecordingDelegate;
    use crate::store::MemoryStore;

    fn router_with(store: Arc<MemoryStore>, delegate: Arc<RecordingDelegate>) -> DialogRouter {
        let dialogs = build_dialogs(delegate, None).unwrap();
        DialogRouter::new(store, dialogs, RouterConfig::default())
    }

    fn message(text: &str) -> Activity {
        Activity::message("conv-1", "user-1", "Ana", text)
    }

    fn texts(replies: &[OutgoingActivity]) -> Vec<String> {
        replies.iter().filter_map(|r| r.text.clone()).collect()
    }

    #[test]
    fn keywords_are_matched_exactly() {
        assert_eq!(match_keyword("  Solicitud "), Some("solicitud"));
        assert_eq!(match_keyword("BUSQUEDA"), Some("candidato"));
        assert_eq!(match_keyword("consultar"), Some("validacion"));
        assert_eq!(match_keyword("vitae"), Some("vitae"));
        assert_eq!(match_keyword("quiero una solicitud"), None);
        assert_eq!(match_keyword(""), None);
    }

    #[test]
    fn menu_buttons_route_to_dialogs() {
        let card = options_menu();
        assert_eq!(card.title, MENU_TITLE);
        assert_eq!(card.buttons.len(), 4);
        for button in &card.buttons {
            assert_eq!(button.kind, "imBack");
            assert!(match_keyword(&button.value).is_some(), "{}", button.value);
        }
    }

    #[tokio::test]
    async fn first_message_gets_welcome_and_menu() {
        let store = Arc::new(MemoryStore::new());
        let router = router_with(store.clone(), Arc::new(RecordingDelegate::default()));

        let replies = router.handle_turn(message("hola")).await;
        assert_eq!(
            texts(&replies),
            vec!["Me alegro que estés aquí, Ana".to_string(), WELCOME_BACK.to_string()]
        );
        let card = replies.last().and_then(OutgoingActivity::card).unwrap();
        assert_eq!(card.title, MENU_TITLE);

        let profile = store.load_profile("user-1").await.unwrap();
        assert!(profile.last_interaction.is_some());
        assert_eq!(profile.name.as_deref(), Some("Ana"));

        // Second message within the interval: menu only.
        let replies = router.handle_turn(message("hola otra vez")).await;
        assert!(texts(&replies).is_empty());
        assert!(replies[0].card().is_some());
    }

    #[tokio::test]
    async fn keyword_begins_dialog_and_next_message_resumes_it() {
        let store = Arc::new(MemoryStore::new());
        let delegate = Arc::new(RecordingDelegate::default());
        let router = router_with(store.clone(), delegate.clone());

        let replies = router.handle_turn(message("busqueda")).await;
        assert!(texts(&replies).iter().any(|t| t == "Escribe la busqueda"));
        let record = store.load_conversation("conv-1").await.unwrap();
        assert_eq!(record.active.as_ref().map(|a| a.dialog_id.as_str()), Some("candidato"));
        assert!(store.load_profile("user-1").await.unwrap().selected_option.is_none());

        let replies = router.handle_turn(message("desarrollador rust senior")).await;
        assert!(texts(&replies).iter().any(|t| t == "hecho"));

        let calls = delegate.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.get("message"), Some(&json!("desarrollador rust senior")));
        assert!(store.load_conversation("conv-1").await.unwrap().active.is_none());
    }

    #[tokio::test]
    async fn waiting_dialog_takes_keywords_as_input() {
        let store = Arc::new(MemoryStore::new());
        let delegate = Arc::new(RecordingDelegate::default());
        let router = router_with(store.clone(), delegate.clone());

        router.handle_turn(message("candidato")).await;
        router.handle_turn(message("vitae")).await;

        assert_eq!(delegate.calls()[0].1.get("message"), Some(&json!("vitae")));
    }

    #[tokio::test]
    async fn idle_dialog_is_discarded() {
        let store = Arc::new(MemoryStore::new());
        let delegate = Arc::new(RecordingDelegate::default());
        let router = router_with(store.clone(), delegate.clone());

        router.handle_turn(message("candidato")).await;
        let mut record = store.load_conversation("conv-1").await.unwrap();
        if let Some(active) = record.active.as_mut() {
            active.updated_at = Utc::now() - chrono::Duration::hours(2);
        }
        store.save_conversation(&mut record).await.unwrap();

        let replies = router.handle_turn(message("algo")).await;
        assert!(replies.last().and_then(OutgoingActivity::card).is_some());
        assert!(delegate.calls().is_empty());
        assert!(store.load_conversation("conv-1").await.unwrap().active.is_none());
    }

    #[tokio::test]
    async fn members_added_triggers_welcome_only() {
        let store = Arc::new(MemoryStore::new());
        let router = router_with(store, Arc::new(RecordingDelegate::default()));

        let activity: Activity = serde_json::from_value(json!({
            "type": "conversationUpdate",
            "from": { "id": "user-1", "name": "Ana" },
            "conversation": { "id": "conv-1" },
            "recipient": { "id": "bot" },
            "membersAdded": [{ "id": "bot" }, { "id": "user-1", "name": "Ana" }]
        }))
        .unwrap();

        let replies = router.handle_turn(activity).await;
        assert_eq!(replies.len(), 2);
        assert!(replies.iter().all(|r| r.card().is_none()));

        // Only the bot joined: nothing to say.
        let activity: Activity = serde_json::from_value(json!({
            "type": "conversationUpdate",
            "from": { "id": "user-2" },
            "conversation": { "id": "conv-2" },
            "recipient": { "id": "bot" },
            "membersAdded": [{ "id": "bot" }]
        }))
        .unwrap();
        assert!(router.handle_turn(activity).await.is_empty());
    }

    #[tokio::test]
    async fn other_activities_are_ignored() {
        let router = router_with(Arc::new(MemoryStore::new()), Arc::new(RecordingDelegate::default()));
        let activity: Activity =
            serde_json::from_value(json!({ "type": "typing", "conversation": { "id": "c" } }))
                .unwrap();
        assert!(router.handle_turn(activity).await.is_empty());
    }

    /// Reads succeed (empty); every write fails.
    struct ReadOnlyStore;

    #[async_trait::async_trait]
    impl StateStore for ReadOnlyStore {
        async fn get(
            &self,
            _namespace: &str,
            _key: &str,
        ) -> std::result::Result<Option<crate::store::Versioned>, StoreError> {
            Ok(None)
        }

        async fn put(
            &self,
            _namespace: &str,
            _key: &str,
            _value: &serde_json::Value,
            _expected: u64,
        ) -> std::result::Result<u64, StoreError> {
            Err(StoreError::Query("read-only".into()))
        }

        async fn delete(&self, _namespace: &str, _key: &str) -> std::result::Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_turn_replaces_replies_with_error_message() {
        let dialogs = build_dialogs(Arc::new(RecordingDelegate::default()), None).unwrap();
        let router = DialogRouter::new(Arc::new(ReadOnlyStore), dialogs, RouterConfig::default());

        let replies = router.handle_turn(message("hola")).await;
        assert_eq!(texts(&replies), vec![TURN_ERROR_MESSAGE.to_string()]);
        assert!(replies[0].card().is_none());
    }

    #[tokio::test]
    async fn profile_removed_between_turns_is_recreated() {
        let store = Arc::new(MemoryStore::new());
        let router = router_with(store.clone(), Arc::new(RecordingDelegate::default()));
        router.handle_turn(message("candidato")).await;

        // Another writer removes the profile between turns; the router loads
        // a fresh one, so the turn still succeeds.
        store.delete("user", "user-1").await.unwrap();
        let replies = router.handle_turn(message("rust")).await;
        assert!(!texts(&replies).contains(&TURN_ERROR_MESSAGE.to_string()));
        assert!(store.load_conversation("conv-1").await.unwrap().active.is_none());
    }

    #[tokio::test]
    async fn solicitud_keyword_starts_intake_with_method_menu() {
        let store = Arc::new(MemoryStore::new());
        let router = router_with(store.clone(), Arc::new(RecordingDelegate::default()));

        let replies = router.handle_turn(message("solicitud")).await;
        assert!(texts(&replies).iter().any(|t| t.contains("¿Cómo deseas continuar?")));
        assert!(replies.iter().all(|r| r.card().is_none()));

        let record = store.load_conversation("conv-1").await.unwrap();
        let active = record.active.expect("intake should be waiting");
        assert_eq!(active.dialog_id, "solicitud");
    }

    #[tokio::test]
    async fn lock_entries_are_released_after_each_turn() {
        let router = router_with(Arc::new(MemoryStore::new()), Arc::new(RecordingDelegate::default()));

        for i in 0..200 {
            router
                .handle_turn(Activity::message(&format!("conv-{i}"), "user-1", "Ana", "hola"))
                .await;
        }
        assert!(router.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_turns_of_one_conversation_share_a_lock() {
        let router = Arc::new(router_with(
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingDelegate::default()),
        ));

        let turns: Vec<_> = (0..20)
            .map(|i| {
                let router = Arc::clone(&router);
                tokio::spawn(async move {
                    router.handle_turn(message(&format!("mensaje {i}"))).await
                })
            })
            .collect();
        for turn in turns {
            let replies = turn.await.unwrap();
            assert!(!texts(&replies).contains(&TURN_ERROR_MESSAGE.to_string()));
        }
        assert!(router.locks.lock().await.is_empty());
    }

    /// Fails exactly one conversation write, identified by its ordinal.
    struct FailingConversationWrite {
        inner: MemoryStore,
        writes: std::sync::atomic::AtomicUsize,
        fail_on: usize,
    }

    #[async_trait::async_trait]
    impl StateStore for FailingConversationWrite {
        async fn get(
            &self,
            namespace: &str,
            key: &str,
        ) -> std::result::Result<Option<crate::store::Versioned>, StoreError> {
            self.inner.get(namespace, key).await
        }

        async fn put(
            &self,
            namespace: &str,
            key: &str,
            value: &serde_json::Value,
            expected: u64,
        ) -> std::result::Result<u64, StoreError> {
            if namespace == crate::store::records::CONVERSATIONS {
                let n = self.writes.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                if n == self.fail_on {
                    return Err(StoreError::Query("disk full".into()));
                }
            }
            self.inner.put(namespace, key, value, expected).await
        }

        async fn delete(&self, namespace: &str, key: &str) -> std::result::Result<(), StoreError> {
            self.inner.delete(namespace, key).await
        }
    }

    #[tokio::test]
    async fn failed_save_after_hand_off_keeps_answer_and_prevents_resubmission() {
        let store = Arc::new(FailingConversationWrite {
            inner: MemoryStore::new(),
            writes: Default::default(),
            fail_on: 2,
        });
        let delegate = Arc::new(RecordingDelegate::default());
        let dialogs = build_dialogs(delegate.clone(), None).unwrap();
        let router = DialogRouter::new(store.clone(), dialogs, RouterConfig::default());

        router.handle_turn(message("candidato")).await;
        let replies = router.handle_turn(message("rust dev")).await;
        let replies = texts(&replies);
        assert!(replies.contains(&"hecho".to_string()));
        assert_eq!(replies.last().map(String::as_str), Some(TURN_ERROR_MESSAGE));
        assert_eq!(delegate.calls().len(), 1);
        assert!(store.load_conversation("conv-1").await.unwrap().active.is_none());

        // Replaying the same input reaches the menu, not the webhook.
        let replies = router.handle_turn(message("rust dev")).await;
        assert!(replies.last().and_then(OutgoingActivity::card).is_some());
        assert_eq!(delegate.calls().len(), 1);
    }

    #[tokio::test]
    async fn failed_save_without_hand_off_keeps_dialog_waiting() {
        let store = Arc::new(FailingConversationWrite {
            inner: MemoryStore::new(),
            writes: Default::default(),
            fail_on: 2,
        });
        let delegate = Arc::new(RecordingDelegate::default());
        let dialogs = build_dialogs(delegate.clone(), None).unwrap();
        let router = DialogRouter::new(store.clone(), dialogs, RouterConfig::default());

        router.handle_turn(message("solicitud")).await;
        let before = store.load_conversation("conv-1").await.unwrap();

        let replies = router.handle_turn(message("2")).await;
        assert_eq!(texts(&replies), vec![TURN_ERROR_MESSAGE.to_string()]);

        let after = store.load_conversation("conv-1").await.unwrap();
        assert_eq!(after, before);
        assert_eq!(after.active.map(|a| a.dialog_id).as_deref(), Some("solicitud"));
        assert!(delegate.calls().is_empty());
    }

    /// Lets another writer update the profile right before the router's
    /// first profile write, the way a second conversation of the same user would.
    struct ProfileRace {
        inner: MemoryStore,
        raced: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl StateStore for ProfileRace {
        async fn get(
            &self,
            namespace: &str,
            key: &str,
        ) -> std::result::Result<Option<crate::store::Versioned>, StoreError> {
            self.inner.get(namespace, key).await
        }

        async fn put(
            &self,
            namespace: &str,
            key: &str,
            value: &serde_json::Value,
            expected: u64,
        ) -> std::result::Result<u64, StoreError> {
            if namespace == crate::store::records::PROFILES
                && !self.raced.swap(true, std::sync::atomic::Ordering::SeqCst)
            {
                let other = json!({ "user_id": key, "name": "Ana G." });
                self.inner.put(namespace, key, &other, expected).await?;
            }
            self.inner.put(namespace, key, value, expected).await
        }

        async fn delete(&self, namespace: &str, key: &str) -> std::result::Result<(), StoreError> {
            self.inner.delete(namespace, key).await
        }
    }

    #[tokio::test]
    async fn concurrent_profile_update_is_merged() {
        let store = Arc::new(ProfileRace {
            inner: MemoryStore::new(),
            raced: Default::default(),
        });
        let dialogs = build_dialogs(Arc::new(RecordingDelegate::default()), None).unwrap();
        let router = DialogRouter::new(store.clone(), dialogs, RouterConfig::default());

        let replies = router.handle_turn(message("hola")).await;
        assert!(!texts(&replies).contains(&TURN_ERROR_MESSAGE.to_string()));

        let profile = store.load_profile("user-1").await.unwrap();
        assert!(profile.last_interaction.is_some());
        assert_eq!(profile.name.as_deref(), Some("Ana"));
    }

    #[tokio::test]
    async fn profile_is_written_only_when_greeting() {
        let store = Arc::new(MemoryStore::new());
        let router = router_with(store.clone(), Arc::new(RecordingDelegate::default()));

        router.handle_turn(message("hola")).await;
        let etag = store.load_profile("user-1").await.unwrap().etag;

        router.handle_turn(message("candidato")).await;
        router.handle_turn(message("rust")).await;
        assert_eq!(store.load_profile("user-1").await.unwrap().etag, etag);

        // A second conversation of the same user shares the profile.
        let replies = router
            .handle_turn(Activity::message("conv-2", "user-1", "Ana", "hola"))
            .await;
        assert!(texts(&replies).is_empty());
        assert_eq!(store.load_profile("user-1").await.unwrap().etag, etag);
    }
}
