//! CV reformatting: pick the output language, attach the CV, and hand both
//! to the formatting flow.

use std::sync::Arc;

use async_trait::async_trait;

use super::waterfall::{Dialog, StepContext, StepOutcome};
use super::{hand_off, Prompt};
use crate::delegate::{Delegate, DelegateTarget};
use crate::error::{DialogError, Result};

pub const DIALOG_ID: &str = "vitae";

const LANGUAGES: [&str; 2] = ["Español", "Inglés"];

pub struct VitaeDialog {
    delegate: Arc<dyn Delegate>,
}

impl VitaeDialog {
    pub fn new(delegate: Arc<dyn Delegate>) -> Self {
        Self { delegate }
    }
}

#[async_trait]
impl Dialog for VitaeDialog {
    fn id(&self) -> &'static str {
        DIALOG_ID
    }

    fn step_count(&self) -> usize {
        3
    }

    async fn run_step(&self, index: usize, step: &mut StepContext<'_>) -> Result<StepOutcome> {
        let outcome = match index {
            0 => {
                step.set("haraPregunta", "no");
                StepOutcome::Prompt(Prompt::choice(
                    "Vamos a generar una hoja de vida en formato SOFTGIC.\n\n\
                     Seleccione el *idioma* esperado para la hoja de vida:",
                    LANGUAGES,
                ))
            }
            1 => {
                let language = step.result_text().unwrap_or(LANGUAGES[0]).to_string();
                step.set("message", language);
                StepOutcome::Prompt(Prompt::attachment(
                    "Por favor adjunte la hoja de vida en formato *.pdf*",
                ))
            }
            2 => {
                hand_off(step, self.delegate.as_ref(), DelegateTarget::Vitae).await;
                StepOutcome::End(None)
            }
            _ => {
                return Err(DialogError::StepOutOfRange {
                    id: DIALOG_ID.to_string(),
                    index,
                }
                .into());
            }
        };
        Ok(outcome)
    }
}
