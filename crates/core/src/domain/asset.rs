use anyhow::ensure;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The only equity category; every other category holds real-estate funds.
pub const EQUITY_CATEGORY: &str = "acoes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Acoes,
    Fii,
}

impl AssetClass {
    pub fn of_category(category: &str) -> Self {
        if category.trim().eq_ignore_ascii_case(EQUITY_CATEGORY) {
            AssetClass::Acoes
        } else {
            AssetClass::Fii
        }
    }

    /// Path segment used by the backend (`/acoes/...`, `/fii/...`).
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Acoes => "acoes",
            AssetClass::Fii => "fii",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "acoes" | "acao" | "ações" | "ação" => Ok(AssetClass::Acoes),
            "fii" | "fiis" => Ok(AssetClass::Fii),
            other => Err(format!("unknown asset class {other:?} (expected acoes or fii)")),
        }
    }
}

pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_ascii_uppercase()
}

/// Shape check applied before asking the backend to add a ticker to a category.
///
/// Equities: 5 characters (`VALE3`) or 6 ending in `11` (`SANB11`).
/// Funds: exactly 6 characters ending in `11`.
pub fn validate_ticker(category: &str, ticker: &str) -> anyhow::Result<String> {
    let ticker = normalize_ticker(ticker);
    ensure!(!ticker.is_empty(), "ticker must be non-empty");
    ensure!(
        ticker.chars().all(|c| c.is_ascii_alphanumeric()),
        "ticker must be alphanumeric (got {ticker})"
    );

    let len = ticker.chars().count();
    match AssetClass::of_category(category) {
        AssetClass::Acoes => ensure!(
            len == 5 || (len == 6 && ticker.ends_with("11")),
            "equity tickers must have 5 characters (e.g. VALE3) or 6 ending in \"11\" (e.g. SANB11); got {ticker}"
        ),
        AssetClass::Fii => {
            ensure!(len == 6, "fund tickers must have exactly 6 characters; got {ticker}");
            ensure!(ticker.ends_with("11"), "fund tickers must end in \"11\"; got {ticker}");
        }
    }

    Ok(ticker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_selects_asset_class() {
        assert_eq!(AssetClass::of_category("acoes"), AssetClass::Acoes);
        assert_eq!(AssetClass::of_category("papel"), AssetClass::Fii);
        assert_eq!(AssetClass::of_category("shopping"), AssetClass::Fii);
        assert_eq!("FIIs".parse::<AssetClass>().unwrap(), AssetClass::Fii);
        assert!("crypto".parse::<AssetClass>().is_err());
    }

    #[test]
    fn validates_equity_tickers() {
        assert_eq!(validate_ticker("acoes", " vale3 ").unwrap(), "VALE3");
        assert_eq!(validate_ticker("acoes", "sanb11").unwrap(), "SANB11");
        assert!(validate_ticker("acoes", "PETR").is_err());
        assert!(validate_ticker("acoes", "PETR34").is_err());
    }

    #[test]
    fn validates_fund_tickers() {
        assert_eq!(validate_ticker("logistica", "hglg11").unwrap(), "HGLG11");
        assert!(validate_ticker("papel", "MXRF1").is_err());
        assert!(validate_ticker("papel", "MXRF12").is_err());
        assert!(validate_ticker("papel", "").is_err());
    }
}
