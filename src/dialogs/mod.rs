//! Multi-turn dialogs: the waterfall sequencer, prompts, and the concrete
//! flows the bot offers.

pub mod candidato;
pub mod prompt;
pub mod solicitud;
pub mod state;
pub mod validacion;
pub mod vitae;
pub mod waterfall;

use std::sync::Arc;

pub use candidato::CandidatoDialog;
pub use prompt::{Prompt, PromptKind, StepValue};
pub use solicitud::SolicitudDialog;
pub use state::{DialogInstance, DialogState};
pub use validacion::ValidacionDialog;
pub use vitae::VitaeDialog;
pub use waterfall::{Dialog, DialogSet, DialogTurnResult, StepContext, StepOutcome};

use crate::delegate::{relay, Delegate, DelegateTarget, RequestPayload, WORKING_MESSAGE};
use crate::document::DocumentExtractor;
use crate::error::Result;

/// Build the registry with every dialog the bot offers.
pub fn build_dialogs(
    delegate: Arc<dyn Delegate>,
    documents: Option<Arc<dyn DocumentExtractor>>,
) -> Result<DialogSet> {
    let mut set = DialogSet::new();
    set.add(Arc::new(SolicitudDialog::new(delegate.clone(), documents)?));
    set.add(Arc::new(CandidatoDialog::new(delegate.clone())));
    set.add(Arc::new(ValidacionDialog::new(delegate.clone())));
    set.add(Arc::new(VitaeDialog::new(delegate)));
    Ok(set)
}

/// Send the collected values plus the caller identity to `target` and relay
/// the answer. Delegate failures are answered, never propagated.
pub(crate) async fn hand_off(
    step: &mut StepContext<'_>,
    delegate: &dyn Delegate,
    target: DelegateTarget,
) {
    step.send(WORKING_MESSAGE);
    step.turn.flush();
    let payload = RequestPayload::from_values(step.values()).with_activity(step.turn.activity());
    let result = delegate.invoke(target, &payload).await;
    relay(step.turn, target, result);
    step.turn.record_hand_off();
}
