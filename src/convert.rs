//! String-to-type coercion.
//!
//! Attribute values and body text always arrive as strings; rules ask for
//! them in the declared type of the property or method parameter they feed.
//! Only strings are converted. Non-string values pass through unchanged, and
//! `Null` stays `Null` whatever the target type.

use crate::bean::{Value, ValueType};
use crate::error::ConversionError;
use chrono::{NaiveDate, NaiveDateTime};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// Coerce `value` to `ty`.
pub fn coerce(value: Value, ty: ValueType) -> Result<Value, ConversionError> {
    let text = match value {
        Value::Str(s) => s,
        other => return Ok(other),
    };
    let fail = |text: &str| ConversionError { value: text.to_string(), target: ty };

    match ty {
        ValueType::Any | ValueType::Str => Ok(Value::Str(text)),
        ValueType::Bool => parse_bool(text.trim()).map(Value::Bool).ok_or_else(|| fail(&text)),
        ValueType::Int => text.trim().parse::<i64>().map(Value::Int).map_err(|_| fail(&text)),
        ValueType::Float => text.trim().parse::<f64>().map(Value::Float).map_err(|_| fail(&text)),
        ValueType::Char => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(fail(&text)),
            }
        }
        ValueType::Date => {
            NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).map(Value::Date).map_err(|_| fail(&text))
        }
        ValueType::DateTime => DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text.trim(), fmt).ok())
            .map(Value::DateTime)
            .ok_or_else(|| fail(&text)),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    if regex!(r"^(?i:true|yes|y|on|1)$").is_match(s) {
        Some(true)
    } else if regex!(r"^(?i:false|no|n|off|0)$").is_match(s) {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_accept_common_spellings() {
        for s in ["true", "TRUE", "yes", "Y", "on", "1"] {
            assert_eq!(coerce(Value::from(s), ValueType::Bool), Ok(Value::Bool(true)), "{s}");
        }
        for s in ["false", "No", "n", "OFF", "0"] {
            assert_eq!(coerce(Value::from(s), ValueType::Bool), Ok(Value::Bool(false)), "{s}");
        }
        assert!(coerce(Value::from("maybe"), ValueType::Bool).is_err());
    }

    #[test]
    fn numbers_are_trimmed() {
        assert_eq!(coerce(Value::from(" 42 "), ValueType::Int), Ok(Value::Int(42)));
        assert_eq!(coerce(Value::from("2.5"), ValueType::Float), Ok(Value::Float(2.5)));
        let err = coerce(Value::from("4x"), ValueType::Int).unwrap_err();
        assert_eq!(err.to_string(), "cannot convert '4x' to int");
    }

    #[test]
    fn dates_and_times() {
        let d = coerce(Value::from("2013-02-12"), ValueType::Date).unwrap();
        assert_eq!(d, Value::Date(NaiveDate::from_ymd_opt(2013, 2, 12).unwrap()));

        let dt = coerce(Value::from("2013-02-12 04:30:00"), ValueType::DateTime).unwrap();
        assert_eq!(dt.to_string(), "2013-02-12T04:30:00");
        assert!(coerce(Value::from("12/02/2013"), ValueType::Date).is_err());
    }

    #[test]
    fn chars_need_exactly_one() {
        assert_eq!(coerce(Value::from("x"), ValueType::Char), Ok(Value::Char('x')));
        assert!(coerce(Value::from("xy"), ValueType::Char).is_err());
        assert!(coerce(Value::from(""), ValueType::Char).is_err());
    }

    #[test]
    fn non_strings_pass_through() {
        assert_eq!(coerce(Value::Null, ValueType::Int), Ok(Value::Null));
        assert_eq!(coerce(Value::Int(3), ValueType::Str), Ok(Value::Int(3)));
        assert_eq!(coerce(Value::from("raw"), ValueType::Any), Ok(Value::from("raw")));
    }
}
