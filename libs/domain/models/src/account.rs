// [libs/domain/models/src/account.rs]
//! Identidad de credito compartida por submitters y duenos de workers.

use crate::error_kind::ModelError;
use gridx_domain_ledger::Amount;
use serde::{Deserialize, Serialize};

const MIN_LEN: usize = 1;
const MAX_LEN: usize = 64;

/// Valida la gramatica de identidad de cuenta: `[A-Za-z0-9_-]{1,64}`.
pub fn validate_account_id(id: &str) -> Result<(), ModelError> {
    if id.len() < MIN_LEN || id.len() > MAX_LEN {
        return Err(ModelError::invalid_input(format!(
            "account id must be {}-{} characters, got {}",
            MIN_LEN,
            MAX_LEN,
            id.len()
        )));
    }

    let is_valid = id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');

    if !is_valid {
        return Err(ModelError::invalid_input(
            "account id must match [A-Za-z0-9_-]",
        ));
    }

    Ok(())
}

/// Vista publica de una cuenta de credito (respuesta de `GET /credits/{id}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub balance: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_nominal_identifiers() {
        assert!(validate_account_id("alice").is_ok());
        assert!(validate_account_id("bob_2024-worker").is_ok());
    }

    #[test]
    fn rejects_empty_and_oversized_ids() {
        assert!(validate_account_id("").is_err());
        let too_long = "a".repeat(65);
        assert!(validate_account_id(&too_long).is_err());
    }

    #[test]
    fn rejects_illegal_characters() {
        assert!(validate_account_id("alice smith").is_err());
        assert!(validate_account_id("alice@example.com").is_err());
    }
}
