//! CSV cell typing shared by the feature and personal-attribute tables.
//!
//! Columns are typed as a whole, the way a dataframe reader does: a column is
//! integral only when every cell is an integer and none is missing, a column of
//! integers with gaps becomes floating point, and anything unparseable is text.
//! Surrounding whitespace is ignored when typing cells but text keeps it.

use serde_json::{Number, Value};

/// Cell spellings read as missing values
const MISSING_MARKERS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "<NA>", "#N/A",
];

/// Inferred type of a CSV column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Text,
}

impl ColumnKind {
    /// Infer the kind of a column from all of its raw cells
    pub fn infer<'a, I>(cells: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut any_missing = false;
        let mut any_present = false;
        let mut all_int = true;
        let mut all_float = true;
        let mut all_bool = true;

        for cell in cells {
            let cell = cell.trim();
            if is_missing(cell) {
                any_missing = true;
                continue;
            }
            any_present = true;
            all_int &= cell.parse::<i64>().is_ok();
            all_float &= parse_float(cell).is_some();
            all_bool &= parse_bool(cell).is_some();
        }

        if !any_present {
            return ColumnKind::Float;
        }
        if all_int && !any_missing {
            ColumnKind::Integer
        } else if all_float {
            ColumnKind::Float
        } else if all_bool {
            ColumnKind::Boolean
        } else {
            ColumnKind::Text
        }
    }

    /// Usable as model input: numbers, and booleans as 1/0
    pub fn is_model_input(self) -> bool {
        !matches!(self, ColumnKind::Text)
    }

    /// Convert a raw cell of this column into JSON. Text cells are kept verbatim.
    pub fn to_json(self, raw: &str) -> Value {
        let cell = raw.trim();
        if is_missing(cell) {
            return Value::Null;
        }
        match self {
            ColumnKind::Integer => cell
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or(Value::Null),
            ColumnKind::Float => parse_float(cell).map(float_to_json).unwrap_or(Value::Null),
            ColumnKind::Boolean => parse_bool(cell).map(Value::Bool).unwrap_or(Value::Null),
            ColumnKind::Text => Value::String(raw.to_string()),
        }
    }

    /// Model input value of a raw cell; missing cells are `NaN`, booleans are 1/0
    pub fn to_number(self, raw: &str) -> Option<f64> {
        match self {
            ColumnKind::Boolean => {
                let cell = raw.trim();
                if is_missing(cell) {
                    Some(f64::NAN)
                } else {
                    parse_bool(cell).map(|b| if b { 1.0 } else { 0.0 })
                }
            }
            ColumnKind::Integer | ColumnKind::Float => parse_number(raw),
            ColumnKind::Text => None,
        }
    }
}

pub fn is_missing(cell: &str) -> bool {
    MISSING_MARKERS.contains(&cell)
}

/// Parse a numeric cell; missing markers become `NaN`
fn parse_number(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if is_missing(cell) {
        Some(f64::NAN)
    } else {
        parse_float(cell)
    }
}

fn parse_float(cell: &str) -> Option<f64> {
    match cell {
        "inf" | "Infinity" => Some(f64::INFINITY),
        "-inf" | "-Infinity" => Some(f64::NEG_INFINITY),
        _ => cell.parse::<f64>().ok().filter(|v| !v.is_nan()),
    }
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell {
        "True" | "TRUE" | "true" => Some(true),
        "False" | "FALSE" | "false" => Some(false),
        _ => None,
    }
}

/// JSON has no NaN or infinity, those serialize as `null`
pub fn float_to_json(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_integer_column() {
        assert_eq!(ColumnKind::infer(["1", "2", "-3"]), ColumnKind::Integer);
    }

    #[test]
    fn test_integer_column_with_gap_is_float() {
        assert_eq!(ColumnKind::infer(["1", "", "3"]), ColumnKind::Float);
        assert_eq!(ColumnKind::infer(["1.5", "2"]), ColumnKind::Float);
    }

    #[test]
    fn test_infer_bool_and_text() {
        assert_eq!(ColumnKind::infer(["True", "False", ""]), ColumnKind::Boolean);
        assert_eq!(ColumnKind::infer(["M", "F", "1"]), ColumnKind::Text);
    }

    #[test]
    fn test_to_json() {
        assert_eq!(ColumnKind::Integer.to_json("42"), Value::from(42));
        assert_eq!(ColumnKind::Integer.to_json(" 42"), Value::from(42));
        assert_eq!(ColumnKind::Float.to_json("0.5"), Value::from(0.5));
        assert_eq!(ColumnKind::Float.to_json("nan"), Value::Null);
        assert_eq!(ColumnKind::Boolean.to_json("False"), Value::Bool(false));
    }

    #[test]
    fn test_text_cells_keep_surrounding_whitespace() {
        assert_eq!(ColumnKind::Text.to_json(" Married "), Value::from(" Married "));
        assert_eq!(ColumnKind::Text.to_json("  "), Value::Null);
    }

    #[test]
    fn test_to_number() {
        assert_eq!(ColumnKind::Boolean.to_number("True"), Some(1.0));
        assert_eq!(ColumnKind::Boolean.to_number("false"), Some(0.0));
        assert!(ColumnKind::Boolean.to_number("").unwrap().is_nan());
        assert_eq!(ColumnKind::Integer.to_number("3"), Some(3.0));
        assert_eq!(ColumnKind::Text.to_number("M"), None);
    }

    #[test]
    fn test_parse_number_missing_is_nan() {
        assert!(parse_number("").unwrap().is_nan());
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number("abc"), None);
    }
}
