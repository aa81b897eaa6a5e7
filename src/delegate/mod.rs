//! External delegate invocation: payload building, the webhook client, and
//! interpretation of whatever the automation backend answers.

pub mod client;
pub mod payload;
pub mod reply;

use std::fmt;

pub use client::{Delegate, WebhookDelegate};
pub use payload::RequestPayload;
pub use reply::{relay, DelegateReply, APOLOGY_MESSAGE, MAINTENANCE_MESSAGE, WORKING_MESSAGE};

/// Which automation flow a dialog hands its work to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelegateTarget {
    Solicitud,
    Candidato,
    Validacion,
    Vitae,
}

impl DelegateTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Solicitud => "solicitud",
            Self::Candidato => "candidato",
            Self::Validacion => "validacion",
            Self::Vitae => "vitae",
        }
    }
}

impl fmt::Display for DelegateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
