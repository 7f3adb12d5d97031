// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Deserialization helpers for the loosely typed Pandora wire format.
//!
//! The upstream emits numbers as JSON numbers or strings depending on the
//! firmware generation, and booleans as `true`/`false` or `0`/`1`. Sparse
//! frames also distinguish an *absent* key (field unchanged) from an
//! explicit `null` (field cleared), which maps onto `Option<Option<T>>`:
//! outer `None` = absent, `Some(None)` = cleared, `Some(Some(v))` = value.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserializes a present key into `Some(inner)`, so that `#[serde(default)]`
/// yields `None` only when the key is absent.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64)),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn value_to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim() {
            "" | "0" | "false" => Some(false),
            _ => Some(true),
        },
        _ => None,
    }
}

/// Deserializes an optionally string-encoded float, `Some(None)` on `null`.
///
/// Unparseable values are logged and treated as `null` rather than failing
/// the whole frame.
pub fn loose_f64<'de, D>(deserializer: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(Some(value.as_ref().and_then(|v| {
        let parsed = value_to_f64(v);
        if parsed.is_none() {
            log::warn!("Could not convert value '{v}' to float, treating as null");
        }
        parsed
    })))
}

/// Deserializes an optionally string-encoded integer, `Some(None)` on `null`.
pub fn loose_i64<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(Some(value.as_ref().and_then(|v| {
        let parsed = value_to_i64(v);
        if parsed.is_none() {
            log::warn!("Could not convert value '{v}' to int, treating as null");
        }
        parsed
    })))
}

/// Deserializes an optionally numeric boolean, `Some(None)` on `null`.
pub fn loose_bool<'de, D>(deserializer: D) -> Result<Option<Option<bool>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(Some(value.as_ref().and_then(value_to_bool)))
}

/// Deserializes an optionally string-encoded unsigned word, `Some(None)` on
/// `null`. Used for the packed bit-state words.
pub fn loose_u64<'de, D>(deserializer: D) -> Result<Option<Option<u64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(Some(value.as_ref().and_then(|v| {
        let parsed = value_to_i64(v).and_then(|i| u64::try_from(i).ok());
        if parsed.is_none() {
            log::warn!("Could not convert value '{v}' to unsigned word, treating as null");
        }
        parsed
    })))
}

/// Deserializes a present-or-null loose integer into a single `Option`.
pub fn loose_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_i64))
}

/// Deserializes a present-or-null loose float into a single `Option`.
pub fn loose_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_f64))
}

/// Deserializes a required loose integer (no absent/null distinction).
pub fn required_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_i64(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected integer, got {value}")))
}

/// Deserializes a required loose unsigned integer.
pub fn required_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_i64(&value)
        .and_then(|i| u64::try_from(i).ok())
        .ok_or_else(|| serde::de::Error::custom(format!("expected unsigned integer, got {value}")))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "loose_f64")]
        speed: Option<Option<f64>>,
        #[serde(default, deserialize_with = "loose_bool")]
        moving: Option<Option<bool>>,
    }

    #[test]
    fn test_absent_vs_null_vs_value() {
        let absent: Probe = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.speed, None);

        let cleared: Probe = serde_json::from_str(r#"{"speed": null}"#).unwrap();
        assert_eq!(cleared.speed, Some(None));

        let set: Probe = serde_json::from_str(r#"{"speed": 42.5}"#).unwrap();
        assert_eq!(set.speed, Some(Some(42.5)));
    }

    #[test]
    fn test_string_encoded_number() {
        let probe: Probe = serde_json::from_str(r#"{"speed": "13.5"}"#).unwrap();
        assert_eq!(probe.speed, Some(Some(13.5)));
    }

    #[test]
    fn test_unparseable_number_treated_as_null() {
        let probe: Probe = serde_json::from_str(r#"{"speed": "n/a"}"#).unwrap();
        assert_eq!(probe.speed, Some(None));
    }

    #[test]
    fn test_numeric_bool() {
        let probe: Probe = serde_json::from_str(r#"{"moving": 1}"#).unwrap();
        assert_eq!(probe.moving, Some(Some(true)));

        let probe: Probe = serde_json::from_str(r#"{"moving": 0}"#).unwrap();
        assert_eq!(probe.moving, Some(Some(false)));
    }
}
