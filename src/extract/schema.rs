//! Declarative field schemas and value-shape normalization.

use chrono::NaiveDate;

/// Expected shape of a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// Any non-empty text.
    Text,
    /// Alta / Media / Baja (English equivalents accepted).
    Priority,
    /// `DD/MM/YYYY`.
    Date,
    /// Comma-separated list; `;` and `|` are accepted as separators.
    List,
}

/// One field of a form: where to find it and what it must look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    /// Key used in the step context and in payloads.
    pub key: &'static str,
    /// Labels the user may write before the colon. The first is canonical.
    pub labels: &'static [&'static str],
    pub required: bool,
    pub shape: ValueShape,
}

impl FieldSchema {
    pub const fn required(
        key: &'static str,
        labels: &'static [&'static str],
        shape: ValueShape,
    ) -> Self {
        Self {
            key,
            labels,
            required: true,
            shape,
        }
    }

    pub const fn optional(
        key: &'static str,
        labels: &'static [&'static str],
        shape: ValueShape,
    ) -> Self {
        Self {
            key,
            labels,
            required: false,
            shape,
        }
    }

    /// Canonical label shown to users.
    pub fn label(&self) -> &'static str {
        self.labels.first().copied().unwrap_or(self.key)
    }
}

/// Fields of a recruiting request.
pub static SOLICITUD_FIELDS: &[FieldSchema] = &[
    FieldSchema::required("cliente", &["Cliente"], ValueShape::Text),
    FieldSchema::required("origen", &["Origen"], ValueShape::Text),
    FieldSchema::required(
        "usuarioSolicitante",
        &["Usuario Solicitante", "Usuario Solicita", "Solicitante"],
        ValueShape::Text,
    ),
    FieldSchema::required("tipoPerfil", &["Tipo de Perfil", "Perfil"], ValueShape::Text),
    FieldSchema::required("skills", &["Skills", "Habilidades"], ValueShape::List),
    FieldSchema::required("prioridad", &["Prioridad"], ValueShape::Priority),
    FieldSchema::optional(
        "valorOportunidad",
        &["Valor Oportunidad", "Valor de Oportunidad", "Rango Salarial", "Salario"],
        ValueShape::Text,
    ),
    FieldSchema::required("ciudad", &["Ciudad"], ValueShape::Text),
    FieldSchema::optional("clienteSolvo", &["Cliente Solvo"], ValueShape::Text),
    FieldSchema::optional("fechaSolicitud", &["Fecha Solicitud"], ValueShape::Date),
    FieldSchema::optional("lab", &["Lab"], ValueShape::Text),
];

/// Canonical priority → words accepted for it.
const PRIORITIES: &[(&str, &[&str])] = &[
    ("Alta", &["alta", "high"]),
    ("Media", &["media", "medium"]),
    ("Baja", &["baja", "low"]),
];

/// Normalize `raw` to `shape`. The error is a user-facing reason.
pub fn normalize(shape: ValueShape, raw: &str) -> Result<String, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err("está vacío".to_string());
    }
    match shape {
        ValueShape::Text => Ok(value.to_string()),
        ValueShape::Priority => {
            let lower = value.to_lowercase();
            let words: Vec<&str> = lower
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .collect();
            PRIORITIES
                .iter()
                .find(|(_, aliases)| aliases.iter().any(|a| words.contains(a)))
                .map(|(canonical, _)| canonical.to_string())
                .ok_or_else(|| "debe ser Alta, Media o Baja".to_string())
        }
        ValueShape::Date => NaiveDate::parse_from_str(value, "%d/%m/%Y")
            .map(|d| d.format("%d/%m/%Y").to_string())
            .map_err(|_| "debe tener el formato DD/MM/YYYY".to_string()),
        ValueShape::List => {
            let items: Vec<&str> = value
                .split([',', ';', '|'])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            if items.is_empty() {
                Err("está vacío".to_string())
            } else {
                Ok(items.join(", "))
            }
        }
    }
}
