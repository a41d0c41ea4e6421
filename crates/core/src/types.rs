//! Value types shared by the pricing, ledger and engine crates.

use serde::{Deserialize, Serialize};

/// Option right. `Unknown` is used for contracts whose right has not been
/// observed yet (e.g. a position created from a bare fill).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    Call,
    Put,
    #[default]
    Unknown,
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "CALL"),
            Self::Put => write!(f, "PUT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl std::str::FromStr for OptionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "C" | "CALL" => Ok(Self::Call),
            "P" | "PUT" => Ok(Self::Put),
            other => Err(format!("unknown option type: {other}")),
        }
    }
}

/// Option sensitivities.
///
/// Scaling follows the desk convention: `vega` and `rho` are per 1% move,
/// `theta` is per calendar day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

/// Exchange routing code stored inline (no heap allocation).
///
/// Holds at most 7 significant bytes; longer codes are truncated.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ExchangeCode([u8; 8]);

impl ExchangeCode {
    const MAX_LEN: usize = 7;

    /// Builds a code from a string, truncating to 7 bytes on a char boundary.
    #[must_use]
    pub fn new(code: &str) -> Self {
        let mut end = code.len().min(Self::MAX_LEN);
        while !code.is_char_boundary(end) {
            end -= 1;
        }
        let mut bytes = [0u8; 8];
        bytes[..end].copy_from_slice(&code.as_bytes()[..end]);
        Self(bytes)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(Self::MAX_LEN);
        std::str::from_utf8(&self.0[..len]).unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }
}

impl std::fmt::Debug for ExchangeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExchangeCode({:?})", self.as_str())
    }
}

impl std::fmt::Display for ExchangeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ExchangeCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ExchangeCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}
