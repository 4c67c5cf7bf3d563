use crate::error::{CacheError, Result};
use indexmap::IndexMap;
use std::fmt::Display;
use std::str::FromStr;

/// On-disk literal standing for "no value".
pub(crate) const ABSENT_LITERAL: &str = "null";

/// Prefix added to real values that would otherwise be mistaken for
/// [`ABSENT_LITERAL`] (or that already start with the prefix).
const LITERAL_QUOTE: char = '\'';

/// One serialized object: an insertion-ordered map from field name to an
/// optional string value.
///
/// A field may be missing, present but absent (`None`), or present with a
/// value (possibly the empty string). The last two survive a disk round trip
/// as distinct states.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheEntry {
    fields: IndexMap<String, Option<String>>,
}

/// Conversion of a scalar into the string form stored in a [`CacheEntry`].
pub trait ToEntryValue {
    fn to_entry_value(&self) -> Option<String>;
}

macro_rules! display_entry_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToEntryValue for $ty {
                fn to_entry_value(&self) -> Option<String> {
                    Some(self.to_string())
                }
            }
        )*
    };
}

display_entry_value!(bool, char, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, str, String);

impl<T: ToEntryValue + ?Sized> ToEntryValue for &T {
    fn to_entry_value(&self) -> Option<String> {
        (**self).to_entry_value()
    }
}

impl<T: ToEntryValue> ToEntryValue for Option<T> {
    fn to_entry_value(&self) -> Option<String> {
        self.as_ref().and_then(ToEntryValue::to_entry_value)
    }
}

impl CacheEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, field: impl Into<String>, value: impl ToEntryValue) {
        self.fields.insert(field.into(), value.to_entry_value());
    }

    pub fn put_display(&mut self, field: impl Into<String>, value: &impl Display) {
        self.fields.insert(field.into(), Some(value.to_string()));
    }

    pub fn put_absent(&mut self, field: impl Into<String>) {
        self.fields.insert(field.into(), None);
    }

    /// Raw value of `field`; `None` when the field is missing or explicitly absent.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|value| value.as_deref())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Like [`get`](Self::get) but a missing or absent field is an error.
    pub fn get_required(&self, field: &str) -> Result<&str> {
        self.get(field)
            .ok_or_else(|| CacheError::invalid_type(field, "string"))
    }

    /// Parse `field` as `T`. Missing, absent and malformed values all fail.
    pub fn get_parsed<T: FromStr>(&self, field: &str, expected: &'static str) -> Result<T> {
        self.get(field)
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| CacheError::invalid_type(field, expected))
    }

    /// Parse `field` as `T`, treating a missing or absent field as `None`.
    pub fn get_optional<T: FromStr>(&self, field: &str, expected: &'static str) -> Result<Option<T>> {
        match self.get(field) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| CacheError::invalid_type(field, expected)),
        }
    }

    pub fn get_bool(&self, field: &str) -> Result<bool> {
        self.get_parsed(field, "bool")
    }

    pub fn get_char(&self, field: &str) -> Result<char> {
        self.get_parsed(field, "char")
    }

    pub fn get_i8(&self, field: &str) -> Result<i8> {
        self.get_parsed(field, "i8")
    }

    pub fn get_i16(&self, field: &str) -> Result<i16> {
        self.get_parsed(field, "i16")
    }

    pub fn get_i32(&self, field: &str) -> Result<i32> {
        self.get_parsed(field, "i32")
    }

    pub fn get_i64(&self, field: &str) -> Result<i64> {
        self.get_parsed(field, "i64")
    }

    pub fn get_u8(&self, field: &str) -> Result<u8> {
        self.get_parsed(field, "u8")
    }

    pub fn get_u16(&self, field: &str) -> Result<u16> {
        self.get_parsed(field, "u16")
    }

    pub fn get_u32(&self, field: &str) -> Result<u32> {
        self.get_parsed(field, "u32")
    }

    pub fn get_u64(&self, field: &str) -> Result<u64> {
        self.get_parsed(field, "u64")
    }

    pub fn get_f32(&self, field: &str) -> Result<f32> {
        self.get_parsed(field, "f32")
    }

    pub fn get_f64(&self, field: &str) -> Result<f64> {
        self.get_parsed(field, "f64")
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields
            .iter()
            .map(|(field, value)| (field.as_str(), value.as_deref()))
    }

    /// Render every field in its stored (sentinel-aware) form.
    pub(crate) fn to_stored_pairs(&self) -> Vec<(&str, String)> {
        self.fields
            .iter()
            .map(|(field, value)| (field.as_str(), encode_stored_value(value.as_deref())))
            .collect()
    }

    pub(crate) fn insert_stored(&mut self, field: String, stored: &str) {
        self.fields.insert(field, decode_stored_value(stored));
    }
}

fn encode_stored_value(value: Option<&str>) -> String {
    match value {
        None => ABSENT_LITERAL.to_string(),
        Some(text) if text == ABSENT_LITERAL || text.starts_with(LITERAL_QUOTE) => {
            let mut quoted = String::with_capacity(text.len() + 1);
            quoted.push(LITERAL_QUOTE);
            quoted.push_str(text);
            quoted
        }
        Some(text) => text.to_string(),
    }
}

fn decode_stored_value(stored: &str) -> Option<String> {
    if stored == ABSENT_LITERAL {
        return None;
    }
    Some(stored.strip_prefix(LITERAL_QUOTE).unwrap_or(stored).to_string())
}
