use chrono::{NaiveDate, NaiveDateTime};

const NULL_MARKERS: &[&str] = &["", "N/A", "NA", "na", "nan", "NaN", "null"];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

fn present(raw: &str) -> Option<&str> {
    let s = raw.trim();
    if NULL_MARKERS.contains(&s) {
        None
    } else {
        Some(s)
    }
}

/// Integer coercion. Integral floats such as `"7.0"` are accepted; anything
/// unparseable becomes `None`.
pub fn to_int(raw: &str) -> Option<i64> {
    let s = present(raw)?;
    if let Ok(n) = s.parse::<i64>() {
        return Some(n);
    }
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

pub fn to_float(raw: &str) -> Option<f64> {
    let f = present(raw)?.parse::<f64>().ok()?;
    f.is_finite().then_some(f)
}

pub fn to_date(raw: &str) -> Option<NaiveDate> {
    let s = present(raw)?;
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(s, "%d/%m/%Y").ok()
}

pub fn to_text(raw: &str) -> Option<String> {
    let s = raw.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Tax ids are compared on their digits only: `"12.345.678/0001-90"` and
/// `"12345678000190"` are the same company.
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// `deserialize_with` adapters so serde-driven CSV rows coerce the same way
/// the loader does. Each one reads the field as optional text first, so an
/// unparseable value never fails the row.
pub mod lenient {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer};

    fn raw<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Option::<String>::deserialize(d)
    }

    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(raw(d)?.as_deref().and_then(super::to_int))
    }

    pub fn float<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(raw(d)?.as_deref().and_then(super::to_float))
    }

    pub fn date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        Ok(raw(d)?.as_deref().and_then(super::to_date))
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(raw(d)?.as_deref().and_then(super::to_text))
    }
}
