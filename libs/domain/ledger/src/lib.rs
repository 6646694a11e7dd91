// [libs/domain/ledger/src/lib.rs]
/*!
 * =================================================================
 * APARATO: LEDGER DOMAIN CORE (V1.0 - GOLD MASTER)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: REPRESENTACION EXACTA DE CREDITOS Y SU ARITMETICA
 *
 * `Amount` es un entero de micro-unidades (6 digitos fraccionarios) en
 * vez de un `f64`: el balance nunca debe quedar negativo, y un entero
 * con suma/resta verificada da esa garantia gratis.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Numero de digitos fraccionarios que representa un `Amount`.
pub const FRACTIONAL_DIGITS: u32 = 6;
const SCALE: i64 = 1_000_000; // 10^FRACTIONAL_DIGITS

/// Credito de cuenta con precision fija de 6 digitos fraccionarios.
///
/// Serializado como cadena decimal ("1.000000") para que los clientes
/// HTTP no pierdan precision al parsear JSON con `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Construye un `Amount` a partir de micro-unidades (6 digitos fraccionarios).
    pub const fn from_micros(micros: i64) -> Self {
        Amount(micros)
    }

    /// Construye un `Amount` a partir de un valor decimal aproximado (uso en configuracion).
    pub fn from_decimal(value: f64) -> Self {
        Amount((value * SCALE as f64).round() as i64)
    }

    pub const fn as_micros(self) -> i64 {
        self.0
    }

    pub fn as_decimal(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Suma verificada; usada para creditos (nunca deberia desbordar en la practica).
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Resta verificada; usada para debitos. Devuelve `None` si el resultado seria negativo.
    pub fn checked_sub_nonnegative(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).filter(|v| *v >= 0).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE;
        let frac = (self.0 % SCALE).abs();
        write!(f, "{}.{:06}", whole, frac)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<f64>()
            .map(Amount::from_decimal)
            .map_err(serde::de::Error::custom)
    }
}

/// Taxonomia de errores del dominio del ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("insufficient_credits: balance would fall below zero")]
    InsufficientCredits,

    #[error("unauthenticated: account/secret mismatch")]
    Unauthenticated,

    #[error("not_found: unknown account {0}")]
    AccountNotFound(String),

    #[error("invalid_input: {0}")]
    InvalidInput(String),

    #[error("internal: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_round_trips_through_display() {
        let amount = Amount::from_micros(1_500_000);
        assert_eq!(amount.to_string(), "1.500000");
        assert_eq!(amount.as_decimal(), 1.5);
    }

    #[test]
    fn checked_sub_nonnegative_rejects_negative_results() {
        let balance = Amount::from_decimal(0.5);
        let cost = Amount::from_decimal(1.0);
        assert!(balance.checked_sub_nonnegative(cost).is_none());
    }

    #[test]
    fn checked_sub_nonnegative_allows_exact_zero() {
        let balance = Amount::from_decimal(1.0);
        let cost = Amount::from_decimal(1.0);
        assert_eq!(balance.checked_sub_nonnegative(cost), Some(Amount::ZERO));
    }

    #[test]
    fn serde_round_trip_preserves_precision() {
        let amount = Amount::from_micros(123_456);
        let json = serde_json::to_string(&amount).unwrap();
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(amount, back);
    }
}
