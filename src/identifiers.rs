use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static CUSIP_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)CUSIP\s*(?:No\.?|Number)?:?\s*([A-Z0-9]{9})\b",
        r"(?i)CUSIP\s+([A-Z0-9]{9})\b",
        r"(?i)\bCUSIP:\s*([A-Z0-9]{9})\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("cusip regex"))
    .collect()
});

static CUSIP_CONTEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)CUSIP.{0,50}?([A-Z0-9]{9})\b").expect("cusip context regex"));

static ISIN_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)ISIN\s*(?:No\.?|Number)?:?\s*([A-Z]{2}[A-Z0-9]{10})\b",
        r"(?i)ISIN\s+([A-Z]{2}[A-Z0-9]{10})\b",
        r"(?i)\bISIN:\s*([A-Z]{2}[A-Z0-9]{10})\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("isin regex"))
    .collect()
});

static ISIN_CONTEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)ISIN.{0,50}?([A-Z]{2}[A-Z0-9]{10})\b").expect("isin context regex")
});

static SEDOL_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)SEDOL\s*(?:No\.?|Number)?:?\s*([A-Z0-9]{7})\b",
        r"(?i)SEDOL\s+([A-Z0-9]{7})\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("sedol regex"))
    .collect()
});

/// Find a check-digit-valid CUSIP near a "CUSIP" label.
pub fn extract_cusip(text: &str) -> Option<String> {
    for pattern in CUSIP_RES.iter() {
        if let Some(caps) = pattern.captures(text) {
            let cusip = caps[1].to_uppercase();
            if validate_cusip(&cusip) {
                debug!(cusip = %cusip, "found cusip");
                return Some(cusip);
            }
        }
    }
    if let Some(caps) = CUSIP_CONTEXT_RE.captures(text) {
        let cusip = caps[1].to_uppercase();
        if validate_cusip(&cusip) {
            debug!(cusip = %cusip, "found cusip in context");
            return Some(cusip);
        }
    }
    None
}

/// CUSIP format plus check digit (modified Luhn over base-36 values).
pub fn validate_cusip(cusip: &str) -> bool {
    if cusip.len() != 9 || !cusip.chars().all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }

    let mut total = 0u32;
    for (index, c) in cusip.chars().take(8).enumerate() {
        let mut value = match c.to_digit(36) {
            Some(value) => value,
            None => return false,
        };
        if index % 2 == 1 {
            value *= 2;
        }
        total += value / 10 + value % 10;
    }

    let check = (10 - total % 10) % 10;
    cusip.chars().nth(8) == char::from_digit(check, 10)
}

/// Find a check-digit-valid ISIN near an "ISIN" label.
pub fn extract_isin(text: &str) -> Option<String> {
    for pattern in ISIN_RES.iter() {
        if let Some(caps) = pattern.captures(text) {
            let isin = caps[1].to_uppercase();
            if validate_isin(&isin) {
                debug!(isin = %isin, "found isin");
                return Some(isin);
            }
        }
    }
    if let Some(caps) = ISIN_CONTEXT_RE.captures(text) {
        let isin = caps[1].to_uppercase();
        if validate_isin(&isin) {
            debug!(isin = %isin, "found isin in context");
            return Some(isin);
        }
    }
    None
}

/// ISIN format plus Luhn check digit over the base-36 expansion.
pub fn validate_isin(isin: &str) -> bool {
    if isin.len() != 12 {
        return false;
    }
    if !isin.chars().take(2).all(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    if !isin.chars().skip(2).all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }

    let Some(check) = luhn_check_digit(&isin[..11]) else {
        return false;
    };
    isin.chars().nth(11) == char::from_digit(check, 10)
}

/// Expand letters to their base-36 values, then run Luhn from the right.
fn luhn_check_digit(body: &str) -> Option<u32> {
    let mut numeric = String::new();
    for c in body.chars() {
        if c.is_ascii_digit() {
            numeric.push(c);
        } else {
            let value = c.to_digit(36)?;
            numeric.push_str(&value.to_string());
        }
    }

    let mut total = 0u32;
    for (index, c) in numeric.chars().rev().enumerate() {
        let mut digit = c.to_digit(10)?;
        if index % 2 == 0 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        total += digit;
    }
    Some((10 - total % 10) % 10)
}

pub fn extract_sedol(text: &str) -> Option<String> {
    for pattern in SEDOL_RES.iter() {
        if let Some(caps) = pattern.captures(text) {
            return Some(caps[1].to_uppercase());
        }
    }
    None
}

/// Build the 12-character ISIN for a valid CUSIP.
pub fn cusip_to_isin(cusip: &str, country_code: &str) -> Option<String> {
    if !validate_cusip(cusip) {
        return None;
    }
    let base = format!("{}{}", country_code.to_uppercase(), cusip);
    let check = luhn_check_digit(&base)?;
    Some(format!("{base}{check}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    // 037833100 is the Apple common stock CUSIP; US0378331005 its ISIN.
    #[test]
    fn cusip_check_digit() {
        assert!(validate_cusip("037833100"));
        assert!(!validate_cusip("037833101"));
        assert!(!validate_cusip("03783310"));
        assert!(!validate_cusip("03783310!"));
    }

    #[test]
    fn isin_check_digit() {
        assert!(validate_isin("US0378331005"));
        assert!(!validate_isin("US0378331004"));
        assert!(!validate_isin("0S0378331005"));
        assert!(!validate_isin("US037833100"));
    }

    #[test]
    fn cusip_from_labeled_text() {
        assert_eq!(
            extract_cusip("CUSIP No.: 037833100"),
            Some("037833100".to_string())
        );
        assert_eq!(
            extract_cusip("CUSIP 037833100"),
            Some("037833100".to_string())
        );
    }

    #[test]
    fn cusip_with_invalid_check_digit_rejected() {
        assert_eq!(extract_cusip("CUSIP: 037833101"), None);
    }

    #[test]
    fn cusip_found_in_context() {
        let text = "CUSIP for this offering: 037833100 as stated";
        assert_eq!(extract_cusip(text), Some("037833100".to_string()));
    }

    #[test]
    fn isin_from_labeled_text() {
        assert_eq!(
            extract_isin("ISIN: US0378331005"),
            Some("US0378331005".to_string())
        );
    }

    #[test]
    fn sedol_from_labeled_text() {
        assert_eq!(
            extract_sedol("SEDOL: 2046251"),
            Some("2046251".to_string())
        );
    }

    #[test]
    fn cusip_to_isin_round_trip() {
        assert_eq!(
            cusip_to_isin("037833100", "US"),
            Some("US0378331005".to_string())
        );
        assert_eq!(cusip_to_isin("037833101", "US"), None);
    }
}
