//! Waterfall step sequencer.
//!
//! A dialog is an ordered list of steps. Each step either issues a prompt and
//! suspends until the next inbound message, or returns a value and lets the
//! sequencer run the following step in the same turn. The reply to a prompt
//! issued by step N is handed to step N+1.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::prompt::{Prompt, StepValue};
use super::state::{DialogInstance, DialogState};
use crate::error::{DialogError, Result};
use crate::turn::TurnContext;

/// What a step asks the sequencer to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Send the prompt and suspend; the reply goes to the next step.
    Prompt(Prompt),
    /// Send the prompt and suspend; the reply comes back to this same step.
    Reprompt(Prompt),
    /// Run the next step now with this value.
    Continue(StepValue),
    /// Run the next step now, marking it as skipped.
    Skip,
    /// Finish the dialog with an optional result.
    End(Option<Value>),
    /// Start this dialog again from its first step with a clean context.
    Restart,
    /// Abandon the dialog.
    Cancel,
}

/// Per-step view of the running dialog.
pub struct StepContext<'a> {
    pub turn: &'a mut TurnContext,
    values: &'a mut Map<String, Value>,
    result: StepValue,
    skipped: bool,
    index: usize,
}

impl<'a> StepContext<'a> {
    pub fn new(
        turn: &'a mut TurnContext,
        values: &'a mut Map<String, Value>,
        result: StepValue,
        skipped: bool,
        index: usize,
    ) -> Self {
        Self {
            turn,
            values,
            result,
            skipped,
            index,
        }
    }

    /// Value produced by the previous step or recognized from the user's reply.
    pub fn result(&self) -> &StepValue {
        &self.result
    }

    /// Previous step's result as text, if it was text or a choice.
    pub fn result_text(&self) -> Option<&str> {
        self.result.as_text()
    }

    /// Whether the previous step asked for this one to be skipped.
    pub fn skipped(&self) -> bool {
        self.skipped
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn send(&mut self, text: impl Into<String>) {
        self.turn.send(text);
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &*self.values
    }

    pub fn merge(&mut self, fields: Map<String, Value>) {
        self.values.extend(fields);
    }
}

/// A named, resumable multi-turn interaction.
#[async_trait]
pub trait Dialog: Send + Sync {
    /// Registry id (also what the router begins).
    fn id(&self) -> &'static str;

    /// Number of steps.
    fn step_count(&self) -> usize;

    /// Run step `index`.
    async fn run_step(&self, index: usize, step: &mut StepContext<'_>) -> Result<StepOutcome>;
}

/// Result of driving a dialog for one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogTurnResult {
    /// Nothing was active.
    Empty,
    /// Suspended on a prompt.
    Waiting,
    /// Reached its end in this turn.
    Complete(Option<Value>),
    /// Cancelled in this turn.
    Cancelled,
}

impl DialogTurnResult {
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Waiting)
    }
}

/// Registry of dialogs plus the sequencing loop.
#[derive(Default, Clone)]
pub struct DialogSet {
    dialogs: HashMap<&'static str, Arc<dyn Dialog>>,
}

impl DialogSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dialog. Definitions are immutable once added.
    pub fn add(&mut self, dialog: Arc<dyn Dialog>) {
        self.dialogs.insert(dialog.id(), dialog);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.dialogs.contains_key(id)
    }

    fn get(&self, id: &str) -> std::result::Result<Arc<dyn Dialog>, DialogError> {
        self.dialogs
            .get(id)
            .cloned()
            .ok_or_else(|| DialogError::UnknownDialog(id.to_string()))
    }

    /// Start `id` in `slot`. Fails if another dialog is still active there.
    pub async fn begin(
        &self,
        id: &str,
        slot: &mut Option<DialogInstance>,
        turn: &mut TurnContext,
    ) -> Result<DialogTurnResult> {
        if let Some(active) = slot.as_ref().filter(|i| !i.state.is_terminal()) {
            return Err(DialogError::AlreadyActive(active.dialog_id.clone()).into());
        }
        let dialog = self.get(id)?;
        info!(dialog = id, "Beginning dialog");

        let mut instance = DialogInstance::new(id);
        let result = run(dialog.as_ref(), &mut instance, StepValue::None, false, turn).await?;
        *slot = (!instance.state.is_terminal()).then_some(instance);
        Ok(result)
    }

    /// Feed the current inbound activity to the dialog active in `slot`.
    pub async fn resume(
        &self,
        slot: &mut Option<DialogInstance>,
        turn: &mut TurnContext,
    ) -> Result<DialogTurnResult> {
        let Some(mut instance) = slot.take() else {
            return Ok(DialogTurnResult::Empty);
        };
        if instance.state.is_terminal() {
            return Ok(DialogTurnResult::Empty);
        }
        let dialog = self.get(&instance.dialog_id)?;

        let input = match instance.pending.as_ref() {
            Some(prompt) => match prompt.recognize(turn.activity()) {
                Some(value) => value,
                None => {
                    instance.retries += 1;
                    debug!(
                        dialog = %instance.dialog_id,
                        step = instance.step,
                        retries = instance.retries,
                        "Reply not recognized, re-prompting"
                    );
                    if let Some(text) = prompt.retry_text() {
                        turn.send(text);
                    }
                    *slot = Some(instance);
                    return Ok(DialogTurnResult::Waiting);
                }
            },
            None => StepValue::Text(turn.activity().text_trimmed().to_string()),
        };

        instance.pending = None;
        instance.retries = 0;
        let result = run(dialog.as_ref(), &mut instance, input, false, turn).await?;
        *slot = (!instance.state.is_terminal()).then_some(instance);
        Ok(result)
    }
}

/// Drive `instance` from its resume step until it suspends or terminates.
async fn run(
    dialog: &dyn Dialog,
    instance: &mut DialogInstance,
    mut input: StepValue,
    mut skipped: bool,
    turn: &mut TurnContext,
) -> Result<DialogTurnResult> {
    loop {
        let index = instance.resume_step;
        if index >= dialog.step_count() {
            instance.transition(DialogState::RunningStep)?;
            instance.transition(DialogState::Complete)?;
            return Ok(DialogTurnResult::Complete(input.into_json()));
        }

        instance.transition(DialogState::RunningStep)?;
        instance.step = index;

        let outcome = {
            let mut ctx = StepContext::new(turn, &mut instance.values, input, skipped, index);
            dialog.run_step(index, &mut ctx).await?
        };
        debug!(dialog = dialog.id(), step = index, outcome = outcome_name(&outcome), "Step finished");

        match outcome {
            StepOutcome::Prompt(prompt) => {
                suspend(instance, prompt, index + 1, turn)?;
                return Ok(DialogTurnResult::Waiting);
            }
            StepOutcome::Reprompt(prompt) => {
                suspend(instance, prompt, index, turn)?;
                return Ok(DialogTurnResult::Waiting);
            }
            StepOutcome::Continue(value) => {
                input = value;
                skipped = false;
                instance.resume_step = index + 1;
            }
            StepOutcome::Skip => {
                input = StepValue::None;
                skipped = true;
                instance.resume_step = index + 1;
            }
            StepOutcome::End(value) => {
                instance.transition(DialogState::Complete)?;
                info!(dialog = dialog.id(), step = index, "Dialog complete");
                return Ok(DialogTurnResult::Complete(value));
            }
            StepOutcome::Restart => {
                info!(dialog = dialog.id(), "Restarting dialog");
                instance.restart();
                input = StepValue::None;
                skipped = false;
            }
            StepOutcome::Cancel => {
                instance.transition(DialogState::Cancelled)?;
                info!(dialog = dialog.id(), step = index, "Dialog cancelled");
                return Ok(DialogTurnResult::Cancelled);
            }
        }
    }
}

fn suspend(
    instance: &mut DialogInstance,
    prompt: Prompt,
    resume_step: usize,
    turn: &mut TurnContext,
) -> std::result::Result<(), DialogError> {
    if let Some(text) = prompt.render() {
        turn.send(text);
    }
    instance.pending = Some(prompt);
    instance.retries = 0;
    instance.resume_step = resume_step;
    instance.transition(DialogState::WaitingForInput)
}

fn outcome_name(outcome: &StepOutcome) -> &'static str {
    match outcome {
        StepOutcome::Prompt(_) => "prompt",
        StepOutcome::Reprompt(_) => "reprompt",
        StepOutcome::Continue(_) => "continue",
        StepOutcome::Skip => "skip",
        StepOutcome::End(_) => "end",
        StepOutcome::Restart => "restart",
        StepOutcome::Cancel => "cancel",
    }
}
