//! Candidate search: one free-text query forwarded to the search flow.

use std::sync::Arc;

use async_trait::async_trait;

use super::waterfall::{Dialog, StepContext, StepOutcome};
use super::{hand_off, Prompt};
use crate::delegate::{Delegate, DelegateTarget};
use crate::error::{DialogError, Result};

pub const DIALOG_ID: &str = "candidato";

const INSTRUCTIONS: &str = "📝 *Instrucción para usar el bot de búsqueda de candidatos*\n\n\
    Por favor, escribe tu solicitud en un solo mensaje, siguiendo este estilo:\n\n\
    ✅ *Incluye claramente:*\n\
    • *Cargos* que estás buscando (por ejemplo: Web Developer, Backend Developer, Software Engineer)\n\
    • *Ubicación* o país (por ejemplo: Colombia, Bogotá, Medellín)\n\
    • *Tecnologías o conocimientos técnicos* (por ejemplo: Java, Spring Boot, Python, Web)\n\
    • *Idioma u otro requisito adicional* si aplica (por ejemplo: English)\n\n\
    🔍 *Mensaje ejemplo:*\n\
    Estoy buscando candidatos para *Web Developer* que estén localizados en *Colombia*, \
    y que cuenten con conocimientos técnicos en *Java, Spring Boot, Web y Python*.\n\n\
    💡 Escribe tu solicitud con claridad y en este mismo formato. Así el bot podrá \
    procesarla correctamente y devolverte resultados útiles.";

const NO_QUESTION: &str = "No hay pregunta";

pub struct CandidatoDialog {
    delegate: Arc<dyn Delegate>,
}

impl CandidatoDialog {
    pub fn new(delegate: Arc<dyn Delegate>) -> Self {
        Self { delegate }
    }
}

#[async_trait]
impl Dialog for CandidatoDialog {
    fn id(&self) -> &'static str {
        DIALOG_ID
    }

    fn step_count(&self) -> usize {
        2
    }

    async fn run_step(&self, index: usize, step: &mut StepContext<'_>) -> Result<StepOutcome> {
        match index {
            0 => {
                step.send(INSTRUCTIONS);
                Ok(StepOutcome::Prompt(Prompt::text("Escribe la busqueda")))
            }
            1 => {
                let query = step
                    .result_text()
                    .map(str::trim)
                    .filter(|q| !q.is_empty())
                    .unwrap_or(NO_QUESTION)
                    .to_string();
                step.set("message", query);
                hand_off(step, self.delegate.as_ref(), DelegateTarget::Candidato).await;
                Ok(StepOutcome::End(None))
            }
            _ => Err(DialogError::StepOutOfRange {
                id: DIALOG_ID.to_string(),
                index,
            }
            .into()),
        }
    }
}
