//! Request field validation and pagination.

use serde::{Deserialize, Serialize};

use crate::types::Network;
use crate::{CoreError, Result};

const MAX_EMAIL_LEN: usize = 254;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;
const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Validate and normalise an e-mail address to lowercase.
pub fn email(raw: &str) -> Result<String> {
    let value = raw.trim();
    if value.is_empty() || value.len() > MAX_EMAIL_LEN {
        return Err(CoreError::invalid("email", "length must be 1..=254"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(CoreError::invalid("email", "must not contain whitespace"));
    }
    let (local, domain) = value
        .split_once('@')
        .ok_or_else(|| CoreError::invalid("email", "missing @"))?;
    if local.is_empty() || domain.contains('@') {
        return Err(CoreError::invalid("email", "malformed address"));
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(CoreError::invalid("email", "domain must be dotted"));
    }
    Ok(value.to_ascii_lowercase())
}

/// Require 8..=128 chars with an uppercase letter, a lowercase letter and a digit.
pub fn password(value: &str) -> Result<()> {
    let len = value.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(CoreError::invalid("password", "must be 8 to 128 characters"));
    }
    if !value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(CoreError::invalid("password", "needs an uppercase letter"));
    }
    if !value.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(CoreError::invalid("password", "needs a lowercase letter"));
    }
    if !value.chars().any(|c| c.is_ascii_digit()) {
        return Err(CoreError::invalid("password", "needs a digit"));
    }
    Ok(())
}

/// Non-empty trimmed string of at most `max` chars.
pub fn required_text(field: &'static str, value: &str, max: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::invalid(field, "is required"));
    }
    if trimmed.chars().count() > max {
        return Err(CoreError::invalid(field, format!("must be at most {max} characters")));
    }
    Ok(trimmed.to_string())
}

fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// USDT receiving address for `network`.
///
/// TRC20: `T` followed by 33 base58 characters. BEP20: `0x` + 40 hex digits.
pub fn wallet_address(network: Network, raw: &str) -> Result<String> {
    let value = raw.trim();
    let ok = match network {
        Network::Trc20 => {
            value.len() == 34
                && value.starts_with('T')
                && value.chars().all(|c| BASE58_ALPHABET.contains(c))
        }
        Network::Bep20 => {
            value.len() == 42 && value.starts_with("0x") && is_hex(&value[2..])
        }
    };
    if !ok {
        return Err(CoreError::invalid(
            "wallet_address",
            format!("not a valid {} address", network.as_str().to_ascii_uppercase()),
        ));
    }
    Ok(value.to_string())
}

/// On-chain transaction hash for `network`, normalised to lowercase.
///
/// TRC20: 64 hex digits. BEP20: `0x` + 64 hex digits.
pub fn tx_hash(network: Network, raw: &str) -> Result<String> {
    let value = raw.trim().to_ascii_lowercase();
    let ok = match network {
        Network::Trc20 => value.len() == 64 && is_hex(&value),
        Network::Bep20 => value.len() == 66 && value.starts_with("0x") && is_hex(&value[2..]),
    };
    if !ok {
        return Err(CoreError::invalid("tx_hash", "malformed transaction hash"));
    }
    Ok(value)
}

/// Default page size.
pub const DEFAULT_LIMIT: i64 = 20;
/// Largest accepted page size.
pub const MAX_LIMIT: i64 = 100;

/// Page selection for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    /// Clamp page to >= 1 and limit to 1..=100 (default 20).
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total + self.limit - 1) / self.limit
        }
    }
}

/// Envelope returned by list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, pagination: Pagination, total: i64) -> Self {
        Self {
            items,
            page: pagination.page,
            limit: pagination.limit,
            total,
            total_pages: pagination.total_pages(total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalised() {
        assert_eq!(email("  Alice@Example.COM ").unwrap(), "alice@example.com");
    }

    #[test]
    fn test_email_rejects_malformed() {
        for bad in ["", "alice", "@example.com", "a@b", "a@b.", "a@@b.com", "a b@c.com"] {
            assert!(email(bad).is_err(), "accepted {bad:?}");
        }
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(email(&long).is_err());
    }

    #[test]
    fn test_password_strength() {
        assert!(password("Secret123").is_ok());
        assert!(password("Sh0rt").is_err());
        assert!(password("alllowercase1").is_err());
        assert!(password("ALLUPPERCASE1").is_err());
        assert!(password("NoDigitsHere").is_err());
    }

    #[test]
    fn test_required_text() {
        assert_eq!(required_text("name", "  Bob ", 10).unwrap(), "Bob");
        assert!(required_text("name", "   ", 10).is_err());
        assert!(required_text("name", "abcdefghijk", 10).is_err());
    }

    #[test]
    fn test_wallet_addresses() {
        assert!(wallet_address(Network::Trc20, "TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7").is_ok());
        // '0' is not base58
        assert!(wallet_address(Network::Trc20, "TLa2f6VPqDgRE67v1736s7bJ8Ray5wYj00").is_err());
        assert!(wallet_address(Network::Trc20, "XLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7").is_err());
        assert!(
            wallet_address(Network::Bep20, "0x55d398326f99059fF775485246999027B3197955").is_ok()
        );
        assert!(wallet_address(Network::Bep20, "0x55d398326f99059fF775485246999027B31979").is_err());
        assert!(
            wallet_address(Network::Bep20, "0xZZd398326f99059fF775485246999027B3197955").is_err()
        );
    }

    #[test]
    fn test_tx_hashes() {
        let trc = "a".repeat(64);
        assert_eq!(tx_hash(Network::Trc20, &trc.to_uppercase()).unwrap(), trc);
        assert!(tx_hash(Network::Trc20, &"a".repeat(63)).is_err());
        let bep = format!("0x{}", "b".repeat(64));
        assert!(tx_hash(Network::Bep20, &bep).is_ok());
        assert!(tx_hash(Network::Bep20, &trc).is_err());
    }

    #[test]
    fn test_pagination_math() {
        let p = Pagination::new(None, None);
        assert_eq!((p.page, p.limit, p.offset()), (1, 20, 0));

        let p = Pagination::new(Some(3), Some(25));
        assert_eq!(p.offset(), 50);
        assert_eq!(p.total_pages(51), 3);
        assert_eq!(p.total_pages(50), 2);
        assert_eq!(p.total_pages(0), 0);

        let p = Pagination::new(Some(-4), Some(1_000));
        assert_eq!((p.page, p.limit), (1, 100));
        let p = Pagination::new(Some(2), Some(0));
        assert_eq!(p.limit, 1);
    }

    #[test]
    fn test_page_envelope() {
        let page = Page::new(vec![1, 2, 3], Pagination::new(Some(1), Some(3)), 7);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items, vec![1, 2, 3]);
        assert_eq!(page.total, 7);
        assert_eq!((page.page, page.limit), (1, 3));
    }
}
