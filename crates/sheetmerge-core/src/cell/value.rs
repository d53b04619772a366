//! Cell value types and their text coercion

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Largest serial Excel can display as a date (9999-12-31)
const MAX_DATE_SERIAL: f64 = 2_958_465.0;

/// Serials at or above this are integers too large to print without an exponent
const INTEGER_TEXT_LIMIT: f64 = 1e15;

/// Represents the value stored in a cell
///
/// Formula cells are stored as their cached result; the formula text is
/// never needed once a sheet has been decoded.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// Empty cell (no value)
    #[default]
    Empty,

    /// Boolean value (TRUE/FALSE)
    Boolean(bool),

    /// Numeric value
    Number(f64),

    /// Numeric value whose number format is a date or time.
    ///
    /// The serial always counts days in the 1900 date system; readers
    /// shift 1904-based workbooks when decoding.
    DateTime(f64),

    /// String value
    String(String),

    /// Error value (#VALUE!, #REF!, etc.)
    Error(CellError),
}

impl CellValue {
    /// Create a new string value
    pub fn string<S: Into<String>>(s: S) -> Self {
        CellValue::String(s.into())
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Try to get the value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) | CellValue::DateTime(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get the value as a string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get a type name for this value
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Empty => "empty",
            CellValue::Boolean(_) => "boolean",
            CellValue::Number(_) => "number",
            CellValue::DateTime(_) => "datetime",
            CellValue::String(_) => "string",
            CellValue::Error(_) => "error",
        }
    }

    /// Render the value as text, the way a string-typed table column holds it.
    ///
    /// - integral numbers drop the fractional part (`5`, not `5.0`)
    /// - booleans are `True`/`False`
    /// - dates are `YYYY-MM-DD HH:MM:SS`, pure times `HH:MM:SS`
    /// - empty cells become the empty string
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Boolean(b) => if *b { "True" } else { "False" }.to_string(),
            CellValue::Number(n) => number_to_text(*n),
            CellValue::DateTime(serial) => serial_to_text(*serial),
            CellValue::String(s) => s.clone(),
            CellValue::Error(e) => e.as_str().to_string(),
        }
    }
}

/// Integral values print without a fraction. Others use the shortest
/// round-trip digits, switching to `1e-05` style exponents below 1e-4 and
/// from 1e16 up.
fn number_to_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < INTEGER_TEXT_LIMIT {
        return format!("{}", n as i64);
    }
    let magnitude = n.abs();
    if n.is_finite() && n != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        return exponent_text(n);
    }
    format!("{}", n)
}

fn exponent_text(n: f64) -> String {
    let text = format!("{:e}", n);
    match text.split_once('e') {
        Some((mantissa, exp)) => match exp.parse::<i32>() {
            Ok(exp) => format!(
                "{}e{}{:02}",
                mantissa,
                if exp < 0 { '-' } else { '+' },
                exp.abs()
            ),
            Err(_) => text,
        },
        None => text,
    }
}

fn serial_to_text(serial: f64) -> String {
    match serial_to_datetime(serial) {
        Some(dt) if serial < 1.0 => dt.format("%H:%M:%S").to_string(),
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => number_to_text(serial),
    }
}

/// Convert a 1900-system date serial into a calendar date and time.
///
/// Excel counts 1900-02-29 as a real day, so serials before 60 are one day
/// later than a plain offset from 1899-12-30 would give. Times are rounded
/// to the nearest second.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..MAX_DATE_SERIAL + 1.0).contains(&serial) {
        return None;
    }

    let mut days = serial.trunc() as i64;
    if serial < 60.0 {
        days += 1;
    }
    let seconds = ((serial - serial.trunc()) * 86_400.0).round() as i64;

    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    epoch
        .checked_add_signed(Duration::days(days))?
        .checked_add_signed(Duration::seconds(seconds))
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<CellError> for CellValue {
    fn from(e: CellError) -> Self {
        CellValue::Error(e)
    }
}

/// Excel error values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellError {
    /// #NULL! - Incorrect range operator
    Null,
    /// #DIV/0! - Division by zero
    Div0,
    /// #VALUE! - Wrong type of argument or operand
    Value,
    /// #REF! - Invalid cell reference
    Ref,
    /// #NAME? - Unrecognized formula name
    Name,
    /// #NUM! - Invalid numeric value
    Num,
    /// #N/A - Value not available
    Na,
}

impl CellError {
    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            CellError::Null => "#NULL!",
            CellError::Div0 => "#DIV/0!",
            CellError::Value => "#VALUE!",
            CellError::Ref => "#REF!",
            CellError::Name => "#NAME?",
            CellError::Num => "#NUM!",
            CellError::Na => "#N/A",
        }
    }

    /// Parse an error literal such as `#DIV/0!`
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "#NULL!" => Some(CellError::Null),
            "#DIV/0!" => Some(CellError::Div0),
            "#VALUE!" => Some(CellError::Value),
            "#REF!" => Some(CellError::Ref),
            "#NAME?" => Some(CellError::Name),
            "#NUM!" => Some(CellError::Num),
            "#N/A" => Some(CellError::Na),
            _ => None,
        }
    }

    /// Map a BIFF error code; unknown codes read as `#VALUE!`
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => CellError::Null,
            0x07 => CellError::Div0,
            0x17 => CellError::Ref,
            0x1D => CellError::Name,
            0x24 => CellError::Num,
            0x2A => CellError::Na,
            _ => CellError::Value,
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
