//! Table naming.
//!
//! One bars table and one chunk ledger per (symbol, bar size):
//! `"{SYMBOL}_{tag}"` and `"{SYMBOL}_{tag}_chunks"`. Identifiers are always
//! double-quoted in SQL, and symbols are validated so they never contain a
//! quote.

use stx_calendar::BarSize;

use crate::error::CacheError;

const MAX_SYMBOL_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub symbol: String,
    pub bars: String,
    pub chunks: String,
}

impl TableNames {
    pub fn new(symbol: &str, bar_size: BarSize) -> Result<Self, CacheError> {
        let symbol = normalize_symbol(symbol)?;
        let bars = format!("{symbol}_{}", bar_size.table_tag());
        let chunks = format!("{bars}_chunks");
        Ok(Self {
            symbol,
            bars,
            chunks,
        })
    }

    pub fn quoted_bars(&self) -> String {
        quote(&self.bars)
    }

    pub fn quoted_chunks(&self) -> String {
        quote(&self.chunks)
    }
}

/// Trim and uppercase a ticker, rejecting anything unsafe in an identifier.
pub fn normalize_symbol(symbol: &str) -> Result<String, CacheError> {
    let s = symbol.trim();
    let ok = !s.is_empty()
        && s.len() <= MAX_SYMBOL_LEN
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
    if !ok {
        return Err(CacheError::InvalidSymbol(symbol.to_string()));
    }
    Ok(s.to_ascii_uppercase())
}

fn quote(ident: &str) -> String {
    format!("\"{ident}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_symbol_and_tag() {
        let t = TableNames::new("spy", BarSize::M1).unwrap();
        assert_eq!(t.symbol, "SPY");
        assert_eq!(t.bars, "SPY_1m");
        assert_eq!(t.chunks, "SPY_1m_chunks");
        assert_eq!(t.quoted_bars(), "\"SPY_1m\"");

        let monthly = TableNames::new("SPY", BarSize::Mo1).unwrap();
        assert_eq!(monthly.bars, "SPY_1mo");
    }

    #[test]
    fn index_and_futures_symbols_are_allowed() {
        assert_eq!(normalize_symbol("^gspc").unwrap(), "^GSPC");
        assert_eq!(normalize_symbol("ES=F").unwrap(), "ES=F");
        assert_eq!(normalize_symbol(" brk.b ").unwrap(), "BRK.B");
    }

    #[test]
    fn unsafe_symbols_are_rejected() {
        for bad in ["", "  ", "SPY\"; drop table x; --", "A B", "SPY/1m"] {
            assert_eq!(
                normalize_symbol(bad),
                Err(CacheError::InvalidSymbol(bad.to_string())),
                "{bad:?}"
            );
        }
    }
}
