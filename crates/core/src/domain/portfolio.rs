use serde::{Deserialize, Serialize};
use std::fmt;

pub const PORTFOLIO_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub code: String,
    /// Average purchase price per share; 0 until the user enters one.
    pub unit_price: f64,
}

impl Holding {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            unit_price: 0.0,
        }
    }

    pub fn is_purchased(&self) -> bool {
        self.unit_price > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipError {
    EmptySymbol,
    DuplicateSymbol(String),
    PortfolioFull { capacity: usize },
}

impl fmt::Display for MembershipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipError::EmptySymbol => f.write_str("symbol must be non-empty"),
            MembershipError::DuplicateSymbol(code) => {
                write!(f, "{code} is already included in your portfolio")
            }
            MembershipError::PortfolioFull { capacity } => {
                write!(f, "Maximum count of portfolio items are {capacity}")
            }
        }
    }
}

impl std::error::Error for MembershipError {}

/// Tracked symbols in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Portfolio {
    codes: Vec<String>,
}

impl Portfolio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a persisted symbol list. Malformed input starts an empty portfolio; repeated or
    /// blank codes keep only their first occurrence.
    pub fn from_persisted_json(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };
        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(raw_codes) => {
                let mut codes: Vec<String> = Vec::with_capacity(raw_codes.len());
                for code in raw_codes {
                    let code = code.trim();
                    if code.is_empty() || codes.iter().any(|c| c == code) {
                        continue;
                    }
                    codes.push(code.to_string());
                }
                Self { codes }
            }
            Err(err) => {
                tracing::warn!(error = %err, "persisted portfolio is not a JSON string array; starting empty");
                Self::default()
            }
        }
    }

    pub fn to_persisted_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(&self.codes)?)
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c == code)
    }

    pub fn add_symbol(&mut self, code: &str) -> Result<(), MembershipError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(MembershipError::EmptySymbol);
        }
        if self.contains(code) {
            return Err(MembershipError::DuplicateSymbol(code.to_string()));
        }
        if self.codes.len() >= PORTFOLIO_CAPACITY {
            return Err(MembershipError::PortfolioFull {
                capacity: PORTFOLIO_CAPACITY,
            });
        }
        self.codes.push(code.to_string());
        Ok(())
    }

    /// Removes every occurrence of `code`. Returns whether anything was removed.
    pub fn remove_symbol(&mut self, code: &str) -> bool {
        let code = code.trim();
        let before = self.codes.len();
        self.codes.retain(|c| c != code);
        self.codes.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> Portfolio {
        let mut p = Portfolio::new();
        for i in 0..PORTFOLIO_CAPACITY {
            p.add_symbol(&format!("T{i}")).unwrap();
        }
        p
    }

    #[test]
    fn add_preserves_insertion_order() {
        let mut p = Portfolio::new();
        p.add_symbol("MSFT").unwrap();
        p.add_symbol("AAPL").unwrap();
        p.add_symbol(" TSLA ").unwrap();
        assert_eq!(p.codes(), ["MSFT", "AAPL", "TSLA"]);
    }

    #[test]
    fn rejects_eleventh_symbol() {
        let mut p = full();
        assert_eq!(
            p.add_symbol("NVDA"),
            Err(MembershipError::PortfolioFull { capacity: 10 })
        );
        assert_eq!(p.len(), 10);
    }

    #[test]
    fn rejects_duplicates() {
        let mut p = Portfolio::new();
        p.add_symbol("AAPL").unwrap();
        let err = p.add_symbol("AAPL").unwrap_err();
        assert_eq!(err, MembershipError::DuplicateSymbol("AAPL".to_string()));
        assert_eq!(err.to_string(), "AAPL is already included in your portfolio");
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn duplicate_wins_over_full() {
        let mut p = full();
        assert_eq!(
            p.add_symbol("T3"),
            Err(MembershipError::DuplicateSymbol("T3".to_string()))
        );
    }

    #[test]
    fn rejects_empty_symbol() {
        let mut p = Portfolio::new();
        assert_eq!(p.add_symbol("  "), Err(MembershipError::EmptySymbol));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut p = Portfolio::new();
        p.add_symbol("AAPL").unwrap();
        p.add_symbol("MSFT").unwrap();

        assert!(!p.remove_symbol("GOOG"));
        assert_eq!(p.codes(), ["AAPL", "MSFT"]);

        assert!(p.remove_symbol("AAPL"));
        assert!(!p.remove_symbol("AAPL"));
        assert_eq!(p.codes(), ["MSFT"]);
    }

    #[test]
    fn persisted_list_drops_repeats_in_first_seen_order() {
        let p = Portfolio::from_persisted_json(Some(r#"["AAPL","MSFT","AAPL"," ","MSFT ","TSLA"]"#));
        assert_eq!(p.codes(), ["AAPL", "MSFT", "TSLA"]);

        let mut p = p;
        p.remove_symbol("AAPL");
        assert_eq!(p.codes(), ["MSFT", "TSLA"]);
    }

    #[test]
    fn persisted_json_tolerates_garbage() {
        assert!(Portfolio::from_persisted_json(Some("{not json")).is_empty());
        assert!(Portfolio::from_persisted_json(None).is_empty());

        let p = full();
        let raw = p.to_persisted_json().unwrap();
        assert_eq!(Portfolio::from_persisted_json(Some(&raw)), p);
    }

    #[test]
    fn new_holding_is_not_purchased() {
        let h = Holding::new("AAPL");
        assert_eq!(h.unit_price, 0.0);
        assert!(!h.is_purchased());
    }
}
