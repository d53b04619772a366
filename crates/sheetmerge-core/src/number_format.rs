//! Number format classification
//!
//! Only one question matters when decoding cells: does a numeric cell hold
//! a date or time? Both file formats answer it through a number format that
//! is either a built-in ID or a custom format code.

/// Number format attached to a cell through its style
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum NumberFormat {
    /// General format (default)
    #[default]
    General,

    /// Built-in format by ID
    BuiltIn(u32),

    /// Custom format string
    Custom(String),
}

impl NumberFormat {
    /// Resolve a format ID against the custom codes defined by the file
    pub fn resolve(id: u32, custom: Option<&str>) -> Self {
        match (id, custom) {
            (_, Some(code)) => NumberFormat::Custom(code.to_string()),
            (0, None) => NumberFormat::General,
            (id, None) => NumberFormat::BuiltIn(id),
        }
    }

    /// Check if this is a date/time format
    pub fn is_date_format(&self) -> bool {
        match self {
            NumberFormat::General => false,
            NumberFormat::BuiltIn(id) => is_builtin_date_id(*id),
            NumberFormat::Custom(code) => is_date_format_code(code),
        }
    }
}

/// Built-in IDs that display dates or times.
///
/// 14-22 and 45-47 are locale independent. 27-36 and 50-58 are the East
/// Asian date formats (e.g. `yyyy"年"m"月"d"日"`), which Chinese, Japanese
/// and Korean Excel write without a matching `numFmt` entry.
pub fn is_builtin_date_id(id: u32) -> bool {
    matches!(id, 14..=22 | 27..=36 | 45..=47 | 50..=58)
}

/// Check a custom format code for date or time placeholders.
///
/// Quoted literals, escaped characters and bracketed sections (colors,
/// locales, conditions) are ignored, except elapsed-time sections such as
/// `[h]` or `[mm]`.
pub fn is_date_format_code(code: &str) -> bool {
    // Only the first section (positive numbers) is inspected
    let mut escaped = false;
    let mut in_literal = false;
    let mut bracket: Option<String> = None;

    for c in code.chars() {
        if escaped {
            escaped = false;
            continue;
        }

        if let Some(content) = bracket.as_mut() {
            if c == ']' {
                let elapsed = !content.is_empty()
                    && content.chars().all(|ch| matches!(ch, 'h' | 'H' | 'm' | 'M' | 's' | 'S'));
                if elapsed {
                    return true;
                }
                bracket = None;
            } else {
                content.push(c);
            }
            continue;
        }

        match c {
            '"' => in_literal = !in_literal,
            _ if in_literal => {}
            '\\' | '_' | '*' => escaped = true,
            '[' => bracket = Some(String::new()),
            ';' => break,
            'y' | 'Y' | 'd' | 'D' | 'h' | 'H' | 's' | 'S' => return true,
            _ => {}
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ids() {
        assert!(NumberFormat::BuiltIn(14).is_date_format());
        assert!(NumberFormat::BuiltIn(22).is_date_format());
        assert!(NumberFormat::BuiltIn(58).is_date_format());
        assert!(!NumberFormat::BuiltIn(2).is_date_format());
        assert!(!NumberFormat::BuiltIn(49).is_date_format());
        assert!(!NumberFormat::General.is_date_format());
    }

    #[test]
    fn test_custom_codes() {
        assert!(is_date_format_code("yyyy-mm-dd"));
        assert!(is_date_format_code("yyyy\"年\"m\"月\"d\"日\""));
        assert!(is_date_format_code("[$-409]h:mm:ss AM/PM"));
        assert!(is_date_format_code("[h]:mm"));
        assert!(is_date_format_code("mm:ss"));

        assert!(!is_date_format_code("0.00"));
        assert!(!is_date_format_code("#,##0;[Red]-#,##0"));
        assert!(!is_date_format_code("\"days\" 0"));
        assert!(!is_date_format_code("0.00\\h"));
        assert!(!is_date_format_code("General"));
        assert!(!is_date_format_code("@"));
    }

    #[test]
    fn test_resolve_prefers_custom_code() {
        assert_eq!(NumberFormat::resolve(0, None), NumberFormat::General);
        assert_eq!(NumberFormat::resolve(14, None), NumberFormat::BuiltIn(14));
        assert_eq!(
            NumberFormat::resolve(164, Some("0.0%")),
            NumberFormat::Custom("0.0%".into())
        );
        assert!(!NumberFormat::resolve(164, Some("0.0%")).is_date_format());
    }
}
