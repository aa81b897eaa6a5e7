//! Recruiting request intake.
//!
//! The user picks how to provide the request: upload a PDF, answer one
//! question per field, or paste a filled-in form. PDF and pasted forms skip
//! the per-field questions. Everything ends in a summary that must be
//! confirmed before the request is handed to the intake webhook.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use super::waterfall::{Dialog, StepContext, StepOutcome};
use super::{hand_off, Prompt, StepValue};
use crate::delegate::{Delegate, DelegateTarget};
use crate::document::DocumentExtractor;
use crate::error::{DialogError, Result};
use crate::extract::{normalize_fields, FieldError, FieldExtractor, SOLICITUD_FIELDS};

pub const DIALOG_ID: &str = "solicitud";

const METHOD_MENU: &str = "📋 *¿Cómo deseas continuar?*\n\n\
    1. 📎 Subir documento PDF\n\
    2. ✍️ Escribir manualmente\n\
    3. 📝 Pegar formulario\n\
    4. ❌ Cancelar\n\n\
    Por favor responde con el número de la opción (ejemplo: \"1\").";

const FORM_TEMPLATE: &str = "📋 *NUEVA SOLICITUD*\n\n\
    Por favor, proporciona la siguiente información en un solo mensaje:\n\n\
    *CAMPOS OBLIGATORIOS:*\n\
    • Cliente:\n\
    • Usuario Solicitante:\n\
    • Origen:\n\
    • Tipo de Perfil:\n\
    • Prioridad: [Alta/Media/Baja]\n\
    • Ciudad:\n\
    • Skills:\n\n\
    *CAMPOS OPCIONALES:*\n\
    • Valor Oportunidad:\n\
    • Fecha Solicitud: [DD/MM/YYYY]\n\
    • Lab:\n\n\
    *Ejemplo:*\n\
    Cliente: TechCorp\n\
    Usuario Solicitante: Juan Pérez\n\
    Origen: COL\n\
    Tipo de Perfil: Developer Full Stack\n\
    Prioridad: Alta\n\
    Ciudad: Bogotá\n\
    Skills: React, Node.js, PostgreSQL\n\
    Valor Oportunidad: $8M - $12M";

const CONFIRM_HINT: &str = "Responde *Confirmar* para enviar, *Editar* para comenzar de nuevo \
    o *Cancelar* para salir.";

const CANCELLED: &str = "❌ Operación cancelada.";

/// One question per field, asked in order when filling in manually.
const QUESTIONS: [(&str, &str); 8] = [
    ("cliente", "🧾 Vamos a comenzar. ¿Cuál es el nombre del *cliente*?"),
    ("origen", "🌐 ¿Cuál es el *origen* de la solicitud?"),
    ("usuarioSolicitante", "👤 ¿Quién es el *usuario solicitante*?"),
    ("tipoPerfil", "👔 ¿Cuál es el *tipo de perfil* que se está solicitando?"),
    ("skills", "🛠️ ¿Qué *skills* debe tener el candidato? (separadas por comas)"),
    ("prioridad", "⚠️ ¿Cuál es la *prioridad* de la solicitud? (Alta, Media, Baja)"),
    ("valorOportunidad", "💰 ¿Cuál es el *valor de la oportunidad*?"),
    ("ciudad", "📍 ¿En qué *ciudad* se requiere el candidato?"),
];

const METHOD_STEP: usize = 0;
const BRANCH_STEP: usize = 1;
const RECEIVE_STEP: usize = 2;
const FIRST_QUESTION_STEP: usize = 3;
const SUMMARY_STEP: usize = FIRST_QUESTION_STEP + QUESTIONS.len();
const SUBMIT_STEP: usize = SUMMARY_STEP + 1;

/// How the request data is being provided.
mod method {
    pub const DOCUMENT: &str = "documento";
    pub const MANUAL: &str = "manual";
    pub const FORM: &str = "formulario";
}

pub struct SolicitudDialog {
    delegate: Arc<dyn Delegate>,
    documents: Option<Arc<dyn DocumentExtractor>>,
    extractor: FieldExtractor,
}

impl SolicitudDialog {
    pub fn new(
        delegate: Arc<dyn Delegate>,
        documents: Option<Arc<dyn DocumentExtractor>>,
    ) -> Result<Self> {
        let extractor = FieldExtractor::new(SOLICITUD_FIELDS).map_err(|e| {
            DialogError::Definition {
                id: DIALOG_ID.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            delegate,
            documents,
            extractor,
        })
    }

    fn choose_method(&self, step: &mut StepContext<'_>) -> StepOutcome {
        let answer = step.result_text().unwrap_or_default().trim().to_lowercase();
        match answer.as_str() {
            "1" => {
                step.set("metodo", method::DOCUMENT);
                StepOutcome::Prompt(
                    Prompt::attachment(
                        "📎 Elegiste subir un documento. Por favor, sube un archivo PDF con la información de la solicitud.",
                    )
                    .with_retry("📎 No se ha recibido ningún archivo. Por favor, sube un archivo PDF."),
                )
            }
            "2" => {
                step.set("metodo", method::MANUAL);
                step.send("✍️ Elegiste llenar los campos manualmente.");
                StepOutcome::Continue(StepValue::None)
            }
            "3" => {
                step.set("metodo", method::FORM);
                StepOutcome::Prompt(Prompt::text(FORM_TEMPLATE))
            }
            "4" | "cancelar" => {
                step.send(CANCELLED);
                StepOutcome::Cancel
            }
            _ => {
                step.send("❌ Opción no válida. Responde con un número entre 1 y 4.");
                StepOutcome::Restart
            }
        }
    }

    async fn receive_document(&self, step: &mut StepContext<'_>) -> StepOutcome {
        let attachment = match step.result() {
            StepValue::Attachments(list) => list.first().cloned(),
            _ => None,
        };
        let Some(attachment) = attachment.filter(|a| a.is_pdf()) else {
            return StepOutcome::Reprompt(Prompt::attachment(
                "❌ El archivo debe ser un PDF. Por favor, sube un archivo PDF válido.",
            ));
        };

        step.set("documento", serde_json::to_value(attachment.descriptor()).unwrap_or(Value::Null));
        step.send("📄 Archivo PDF recibido. Procesando documento...");

        let Some(documents) = &self.documents else {
            step.send("⚠️ El procesamiento de documentos no está disponible. Continuemos de forma manual.");
            step.set("metodo", method::MANUAL);
            return StepOutcome::Continue(StepValue::None);
        };

        match documents.extract(&attachment).await {
            Ok(fields) => {
                info!(fields = fields.len(), "Request fields extracted from document");
                step.merge(fields);
                step.send("✅ Documento procesado exitosamente. Datos extraídos correctamente.");
                StepOutcome::Skip
            }
            Err(e) => {
                warn!(error = %e, "Document extraction failed, falling back to manual entry");
                step.send("❌ Error al procesar el PDF. Continuemos de forma manual.");
                step.set("metodo", method::MANUAL);
                StepOutcome::Continue(StepValue::None)
            }
        }
    }

    fn receive_form(&self, step: &mut StepContext<'_>) -> StepOutcome {
        let text = step.result_text().unwrap_or_default().to_string();
        let mut extraction = self.extractor.extract(&text);
        let sender = step.turn.activity().user_name().to_string();
        extraction.fill_default("usuarioSolicitante", &sender);

        if !extraction.is_complete() {
            let problems = extraction
                .errors
                .iter()
                .map(|e| match e {
                    FieldError::Missing { label, .. } => format!("• {label}"),
                    FieldError::Invalid { label, reason, .. } => format!("• {label}: {reason}"),
                })
                .collect::<Vec<_>>()
                .join("\n");
            step.send(format!("❌ *Faltan datos o hay datos inválidos:*\n{problems}"));
            return StepOutcome::End(None);
        }

        step.merge(extraction.into_json());
        StepOutcome::Skip
    }

    fn summary(step: &StepContext<'_>) -> String {
        let field = |key: &str| step.get_str(key).unwrap_or("N/A").to_string();
        format!(
            "📋 *Resumen de la solicitud*\n\n\
             ✅ *Método:* {}\n\
             ✅ *Cliente:* {}\n\
             ✅ *Origen:* {}\n\
             ✅ *Usuario Solicitante:* {}\n\
             ✅ *Tipo de Perfil:* {}\n\
             ✅ *Skills:* {}\n\
             ✅ *Prioridad:* {}\n\
             ✅ *Valor de Oportunidad:* {}\n\
             ✅ *Ciudad:* {}",
            field("metodo"),
            field("cliente"),
            field("origen"),
            field("usuarioSolicitante"),
            field("tipoPerfil"),
            field("skills"),
            field("prioridad"),
            field("valorOportunidad"),
            field("ciudad"),
        )
    }

    async fn confirm(&self, step: &mut StepContext<'_>) -> StepOutcome {
        let answer = step.result_text().unwrap_or_default().to_lowercase();
        let words: Vec<&str> = answer
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let has = |options: &[&str]| words.iter().any(|w| options.contains(w));

        if has(&["editar", "modificar", "cambiar"]) {
            step.send("🔄 Reiniciando solicitud... Comenzaremos de nuevo.");
            return StepOutcome::Restart;
        }
        if has(&["cancelar"]) {
            step.send(CANCELLED);
            return StepOutcome::Cancel;
        }
        if !has(&["confirmar", "enviar", "si", "sí", "ok"]) {
            return StepOutcome::Reprompt(Prompt::text(format!(
                "❓ Respuesta no reconocida. {CONFIRM_HINT}"
            )));
        }

        hand_off(step, self.delegate.as_ref(), DelegateTarget::Solicitud).await;
        StepOutcome::End(Some(Value::Object(step.values().clone())))
    }
}

#[async_trait]
impl Dialog for SolicitudDialog {
    fn id(&self) -> &'static str {
        DIALOG_ID
    }

    fn step_count(&self) -> usize {
        SUBMIT_STEP + 1
    }

    async fn run_step(&self, index: usize, step: &mut StepContext<'_>) -> Result<StepOutcome> {
        let outcome = match index {
            METHOD_STEP => StepOutcome::Prompt(Prompt::text(METHOD_MENU)),
            BRANCH_STEP => self.choose_method(step),
            RECEIVE_STEP => match step.get_str("metodo").map(str::to_string).as_deref() {
                Some(method::DOCUMENT) => self.receive_document(step).await,
                Some(method::FORM) => self.receive_form(step),
                _ => StepOutcome::Continue(StepValue::None),
            },
            i if (FIRST_QUESTION_STEP..SUMMARY_STEP).contains(&i) => {
                if step.skipped() {
                    return Ok(StepOutcome::Skip);
                }
                let question = i - FIRST_QUESTION_STEP;
                if question > 0 {
                    store_answer(step, QUESTIONS[question - 1].0);
                }
                StepOutcome::Prompt(Prompt::text(QUESTIONS[question].1))
            }
            SUMMARY_STEP => {
                if !step.skipped() {
                    store_answer(step, QUESTIONS[QUESTIONS.len() - 1].0);
                }
                let cleaned = normalize_fields(SOLICITUD_FIELDS, step.values());
                step.merge(cleaned);
                step.send(Self::summary(step));
                StepOutcome::Prompt(Prompt::text(format!("¿Deseas enviar la solicitud? {CONFIRM_HINT}")))
            }
            SUBMIT_STEP => self.confirm(step).await,
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

fn store_answer(step: &mut StepContext<'_>, key: &str) {
    if let Some(answer) = step.result_text().map(str::to_string) {
        step.set(key, answer);
    }
}
