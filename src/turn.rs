//! Per-turn context: the inbound activity plus the replies queued for it.

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::activity::{Activity, HeroCard, OutgoingActivity};

/// Everything a dialog step may read or send during one turn.
///
/// Replies are buffered and handed to the channel once the turn finishes.
/// A streaming turn can also push the buffer out early with [`flush`].
///
/// [`flush`]: TurnContext::flush
#[derive(Debug)]
pub struct TurnContext {
    activity: Activity,
    replies: Vec<OutgoingActivity>,
    /// Replies below this index survive `discard_replies`.
    kept: usize,
    handed_off: bool,
    outbox: Option<UnboundedSender<OutgoingActivity>>,
}

impl TurnContext {
    pub fn new(activity: Activity) -> Self {
        Self {
            activity,
            replies: Vec::new(),
            kept: 0,
            handed_off: false,
            outbox: None,
        }
    }

    /// A turn whose replies are delivered through `outbox` as they are flushed.
    pub fn streaming(activity: Activity, outbox: UnboundedSender<OutgoingActivity>) -> Self {
        Self {
            outbox: Some(outbox),
            ..Self::new(activity)
        }
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    /// Queue a text reply.
    pub fn send(&mut self, text: impl Into<String>) {
        self.send_activity(OutgoingActivity::text(text));
    }

    pub fn send_card(&mut self, card: HeroCard) {
        self.send_activity(OutgoingActivity::hero_card(card));
    }

    pub fn send_activity(&mut self, mut activity: OutgoingActivity) {
        if activity.reply_to_id.is_none() {
            activity.reply_to_id = self.activity.id.clone();
        }
        self.replies.push(activity);
    }

    pub fn replies(&self) -> &[OutgoingActivity] {
        &self.replies
    }

    /// Deliver everything queued so far. No-op unless the turn streams.
    pub fn flush(&mut self) {
        let Some(outbox) = &self.outbox else {
            return;
        };
        for reply in self.replies.drain(..) {
            if outbox.send(reply).is_err() {
                debug!("Reply receiver closed, dropping reply");
            }
        }
        self.kept = 0;
    }

    /// Note that the turn's work reached an external flow. Replies queued so
    /// far carry its answer and are kept even if the turn later fails.
    pub fn record_hand_off(&mut self) {
        self.handed_off = true;
        self.kept = self.replies.len();
    }

    pub fn handed_off(&self) -> bool {
        self.handed_off
    }

    /// Drop the replies queued since the last hand-off (used when a turn fails).
    pub fn discard_replies(&mut self) {
        self.replies.truncate(self.kept);
    }

    pub fn into_replies(self) -> Vec<OutgoingActivity> {
        self.replies
    }
}
