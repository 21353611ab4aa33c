//! Real numbers.

use std::fmt::{Debug, Formatter};

/// A PDF real number.
///
/// The textual form found in the source is kept verbatim so that it can be
/// written back unchanged, even when it is not a well-formed numeral.
#[derive(Clone)]
pub struct Real {
    text: String,
    value: f64,
}

impl Real {
    /// Create a real from its textual form.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let value = parse_lenient(text.as_bytes());

        Self { text, value }
    }

    /// Create a real from a value, rendering it with the given number of digits
    /// after the decimal point.
    pub fn from_f64(value: f64, precision: u8) -> Self {
        Self {
            text: render(value, precision),
            value,
        }
    }

    /// The textual form.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The numeric value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Render the value again with the given precision, discarding the source text.
    pub fn rendered(&self, precision: u8) -> String {
        render(self.value, precision)
    }
}

impl PartialEq for Real {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Debug for Real {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Real({:?})", self.text)
    }
}

pub(crate) fn render(value: f64, precision: u8) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }

    let mut out = format!("{:.*}", precision as usize, value);

    if out.contains('.') {
        let trimmed = out.trim_end_matches('0').trim_end_matches('.').len();
        out.truncate(trimmed);
    }

    if out == "-0" || out.is_empty() {
        out = "0".to_string();
    }

    out
}

// Numerals in the wild are sometimes malformed, e.g. `--5`, `4.` or `.`. Interpret
// them the way a lenient reader would: collapse repeated signs and treat missing
// digits as zero.
pub(crate) fn parse_lenient(text: &[u8]) -> f64 {
    let mut negative = false;
    let mut i = 0;

    while let Some(&b) = text.get(i) {
        match b {
            b'-' => negative = !negative,
            b'+' => {}
            _ => break,
        }
        i += 1;
    }

    let mut num = String::new();

    for &b in &text[i..] {
        match b {
            b'0'..=b'9' => num.push(b as char),
            b'.' if !num.contains('.') => num.push('.'),
            _ => break,
        }
    }

    if num.is_empty() || num == "." {
        return 0.0;
    }

    let value = num.parse::<f64>().unwrap_or(0.0);

    if negative { -value } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_keeps_text() {
        let r = Real::from_text("1.50");
        assert_eq!(r.text(), "1.50");
        assert_eq!(r.value(), 1.5);
    }

    #[test]
    fn real_malformed() {
        assert_eq!(Real::from_text("--5").value(), 5.0);
        assert_eq!(Real::from_text("-.5").value(), -0.5);
        assert_eq!(Real::from_text("4.").value(), 4.0);
        assert_eq!(Real::from_text(".").value(), 0.0);
        assert_eq!(Real::from_text("--5").text(), "--5");
    }

    #[test]
    fn real_render() {
        assert_eq!(render(1.5, 15), "1.5");
        assert_eq!(render(2.0, 3), "2");
        assert_eq!(render(-0.0001, 2), "0");
        assert_eq!(render(0.333333, 3), "0.333");
        assert_eq!(render(f64::NAN, 3), "0");
    }
}
