use chrono::{DateTime, Utc};
use serde::Serialize;

/// Placeholder for any field that was not successfully extracted
pub const SENTINEL: &str = "-";

/// One result row for a single account.
///
/// Balance fields stay `String` on purpose: the source values are
/// locale-formatted numeric text and must round-trip exactly as scraped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountRecord {
    pub timestamp: DateTime<Utc>,
    pub account: String,
    pub sol_balance: String,
    pub sol_usd: String,
    pub spl_count: String,
    pub spl_usd: String,
}

impl AccountRecord {
    pub fn new(account: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            account: account.to_string(),
            sol_balance: SENTINEL.to_string(),
            sol_usd: SENTINEL.to_string(),
            spl_count: SENTINEL.to_string(),
            spl_usd: SENTINEL.to_string(),
        }
    }

    /// Row shape expected by the record store:
    /// [Date, Hash, SOL count, SOL usd, SPL count, SPL usd]
    pub fn to_row(&self) -> [String; 6] {
        [
            self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            self.account.clone(),
            self.sol_balance.clone(),
            self.sol_usd.clone(),
            self.spl_count.clone(),
            self.spl_usd.clone(),
        ]
    }
}

/// Parses the native-balance element text, e.g. `"12.5 SOL"` -> `"12.5"`
pub fn parse_native_text(text: &str) -> Option<String> {
    text.split_whitespace().next().map(str::to_string)
}

/// Parses the sub-token element text, two lines:
/// line 1 `"3 Tokens"` -> count `"3"`, line 2 `"($45.67)"` -> usd `"45.67"`
pub fn parse_spl_text(text: &str) -> Option<(String, String)> {
    let mut lines = text.lines();
    let count_line = lines.next()?;
    let usd_line = lines.next()?;

    let count = count_line.split_whitespace().next()?.to_string();
    let usd = usd_line
        .trim()
        .replace('(', "")
        .replace(')', "")
        .replace('$', "");

    Some((count, usd))
}
