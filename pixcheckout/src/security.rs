//! Checkout fraud heuristics.

use crate::validation::validate_document;

/// What the checkout knows about an attempt when deciding whether to accept it.
#[derive(Debug, Clone)]
pub struct FraudSignals<'a> {
    /// Unpaid orders placed with this email during the last hour, not counting this one
    pub attempts: u32,
    pub email: &'a str,
    pub document: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FraudVerdict {
    Clear,
    Suspicious { reason: &'static str },
}

impl FraudVerdict {
    pub fn is_suspicious(&self) -> bool {
        matches!(self, Self::Suspicious { .. })
    }
}

const MAX_ATTEMPTS: u32 = 3;

/// Checks run in order; the first match wins.
pub fn detect_fraud(signals: &FraudSignals<'_>, temporary_email_domains: &[String]) -> FraudVerdict {
    if signals.attempts > MAX_ATTEMPTS {
        return FraudVerdict::Suspicious {
            reason: "Múltiplas tentativas de pagamento",
        };
    }

    let domain = signals.email.rsplit_once('@').map(|(_, d)| d.trim().to_ascii_lowercase());
    if let Some(domain) = domain
        && temporary_email_domains.iter().any(|d| d.eq_ignore_ascii_case(&domain))
    {
        return FraudVerdict::Suspicious {
            reason: "Email temporário detectado",
        };
    }

    if !validate_document(signals.document) {
        return FraudVerdict::Suspicious {
            reason: "Documento inválido",
        };
    }

    FraudVerdict::Clear
}
