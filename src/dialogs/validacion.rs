//! Questions about the requests file: either a direct question, or the
//! validation of one request against an attached PDF.

use std::sync::Arc;

use async_trait::async_trait;

use super::waterfall::{Dialog, StepContext, StepOutcome};
use super::{hand_off, Prompt};
use crate::delegate::{Delegate, DelegateTarget};
use crate::error::{DialogError, Result};

pub const DIALOG_ID: &str = "validacion";

const INSTRUCTIONS: &str = "📝 *Instrucción para preguntar al archivo DT_Solicitudes_2025*\n\n\
    Puedes interactuar con este bot de dos formas. Sigue las instrucciones según lo que necesites hacer:\n\n\
    *1. Realizar una pregunta directa sobre la información del archivo:*\n\
    Ejemplo: ¿Cuáles son las últimas 5 vacantes incluidas?\n\
    ➡️ Escribe tu pregunta y presiona Enter.\n\n\
    *2. Validar una solicitud específica adjuntando un archivo PDF:*\n\
    Ejemplo: Valida la solicitud 1081\n\
    ➡️ Escribe la solicitud y presiona Enter.\n\
    📎 En el siguiente paso, se te pedirá adjuntar el archivo .pdf correspondiente.\n\n\
    💡 *Consejo:* Sé claro y específico en tu mensaje para obtener una respuesta precisa del bot.";

const ACTION_PROMPT: &str = "¿Qué desea hacer?\n\n1. Pregunta Directa\n2. Validar Solicitud";

mod action {
    pub const QUESTION: &str = "pregunta";
    pub const VALIDATE: &str = "validar";
}

pub struct ValidacionDialog {
    delegate: Arc<dyn Delegate>,
}

impl ValidacionDialog {
    pub fn new(delegate: Arc<dyn Delegate>) -> Self {
        Self { delegate }
    }
}

#[async_trait]
impl Dialog for ValidacionDialog {
    fn id(&self) -> &'static str {
        DIALOG_ID
    }

    fn step_count(&self) -> usize {
        4
    }

    async fn run_step(&self, index: usize, step: &mut StepContext<'_>) -> Result<StepOutcome> {
        let outcome = match index {
            0 => {
                step.set("haraPregunta", "si");
                step.send(INSTRUCTIONS);
                StepOutcome::Prompt(
                    Prompt::text(ACTION_PROMPT)
                        .with_retry("No entendí tu opcion. Por favor, escribe nuevamente."),
                )
            }
            1 => {
                let choice = step.result_text().unwrap_or_default().trim().to_lowercase();
                match choice.as_str() {
                    "1" | "pregunta directa" => {
                        step.set("accion", action::QUESTION);
                        StepOutcome::Prompt(Prompt::text("Perfecto! ✍️ *Por favor escriba su pregunta.*"))
                    }
                    "2" | "validar solicitud" => {
                        step.set("accion", action::VALIDATE);
                        StepOutcome::Prompt(Prompt::text(
                            "Perfecto! ✍️ *Por favor escriba su solicitud antes de adjuntar el PDF.*",
                        ))
                    }
                    _ => {
                        step.send("Por favor seleccione una opción válida");
                        StepOutcome::Restart
                    }
                }
            }
            2 => {
                if let Some(message) = step.result_text().map(str::to_string) {
                    step.set("message", message);
                }
                if step.get_str("accion") == Some(action::VALIDATE) {
                    StepOutcome::Prompt(Prompt::attachment(
                        "Por favor adjunte el archivo de la solicitud en formato *.pdf*",
                    ))
                } else {
                    StepOutcome::Skip
                }
            }
            3 => {
                hand_off(step, self.delegate.as_ref(), DelegateTarget::Validacion).await;
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
