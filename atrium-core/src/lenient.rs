//! Lenient JSON decoding.
//!
//! Backend responses are inconsistent about casing (`totalCount`,
//! `TotalCount`, `totalcount`) and occasionally ship numbers as strings
//! (`"count": "42"`). This module is a [`serde::Deserializer`] adapter over
//! an already-parsed [`Value`] that tolerates both:
//!
//! - struct field names match case-insensitively (the incoming key is mapped
//!   onto the target's declared field list), and
//! - numeric targets accept JSON strings containing a number,
//!
//! recursively through nested structs, maps, sequences, and options. All
//! other shapes behave exactly like `serde_json::from_value`.

use serde::de::value::StrDeserializer;
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, Deserializer, EnumAccess, IntoDeserializer,
    MapAccess, SeqAccess, VariantAccess, Visitor,
};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Decode a JSON tree into `T` with case-insensitive field matching and
/// numbers-from-strings. The identity on `T = Value`.
pub fn from_value_lenient<T: DeserializeOwned>(value: &Value) -> Result<T, ApiError> {
    T::deserialize(Lenient(value)).map_err(|e| ApiError::Decode(e.to_string()))
}

#[derive(Clone, Copy)]
struct Lenient<'de>(&'de Value);

type Error = serde_json::Error;

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn unexpected(value: &Value, wanted: &str) -> Error {
    de::Error::custom(format_args!("expected {wanted}, found {}", type_name(value)))
}

macro_rules! lenient_number {
    ($method:ident, $parse:ty, $visit:ident) => {
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
            match self.0 {
                Value::String(s) => {
                    let parsed = s.trim().parse::<$parse>().map_err(|_| {
                        de::Error::custom(format_args!("invalid number in string: {s:?}"))
                    })?;
                    visitor.$visit(parsed)
                }
                _ => self.deserialize_any(visitor),
            }
        }
    };
}

impl<'de> Deserializer<'de> for Lenient<'de> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        match self.0 {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(*b),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    visitor.visit_u64(u)
                } else if let Some(i) = n.as_i64() {
                    visitor.visit_i64(i)
                } else {
                    let f = n
                        .as_f64()
                        .ok_or_else(|| de::Error::custom("unrepresentable number"))?;
                    visitor.visit_f64(f)
                }
            }
            Value::String(s) => visitor.visit_borrowed_str(s),
            Value::Array(items) => visitor.visit_seq(LenientSeq { iter: items.iter() }),
            Value::Object(map) => visitor.visit_map(LenientMap::new(map, &[])),
        }
    }

    lenient_number!(deserialize_i8, i64, visit_i64);
    lenient_number!(deserialize_i16, i64, visit_i64);
    lenient_number!(deserialize_i32, i64, visit_i64);
    lenient_number!(deserialize_i64, i64, visit_i64);
    lenient_number!(deserialize_u8, u64, visit_u64);
    lenient_number!(deserialize_u16, u64, visit_u64);
    lenient_number!(deserialize_u32, u64, visit_u64);
    lenient_number!(deserialize_u64, u64, visit_u64);
    lenient_number!(deserialize_f32, f64, visit_f64);
    lenient_number!(deserialize_f64, f64, visit_f64);

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        match self.0 {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        match self.0 {
            Value::Null => visitor.visit_unit(),
            other => Err(unexpected(other, "null")),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        match self.0 {
            Value::Array(items) => visitor.visit_seq(LenientSeq { iter: items.iter() }),
            other => Err(unexpected(other, "array")),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        match self.0 {
            Value::Object(map) => visitor.visit_map(LenientMap::new(map, &[])),
            other => Err(unexpected(other, "object")),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        match self.0 {
            Value::Object(map) => visitor.visit_map(LenientMap::new(map, fields)),
            other => Err(unexpected(other, "object")),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        match self.0 {
            Value::String(s) => {
                let access: StrDeserializer<'_, Error> = s.as_str().into_deserializer();
                visitor.visit_enum(access)
            }
            Value::Object(map) => {
                let mut iter = map.iter();
                let (tag, value) = iter
                    .next()
                    .ok_or_else(|| de::Error::custom("expected enum object, found empty object"))?;
                if iter.next().is_some() {
                    return Err(de::Error::custom(
                        "expected enum object with a single variant key",
                    ));
                }
                visitor.visit_enum(LenientEnum { tag, value })
            }
            other => Err(unexpected(other, "string or object")),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        self.deserialize_any(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_unit()
    }

    serde::forward_to_deserialize_any! {
        bool char str string bytes byte_buf
    }
}

struct LenientSeq<'de> {
    iter: std::slice::Iter<'de, Value>,
}

impl<'de> SeqAccess<'de> for LenientSeq<'de> {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Error> {
        self.iter
            .next()
            .map(|value| seed.deserialize(Lenient(value)))
            .transpose()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct LenientMap<'de> {
    iter: serde_json::map::Iter<'de>,
    fields: &'static [&'static str],
    value: Option<&'de Value>,
}

impl<'de> LenientMap<'de> {
    fn new(map: &'de Map<String, Value>, fields: &'static [&'static str]) -> Self {
        Self {
            iter: map.iter(),
            fields,
            value: None,
        }
    }
}

impl<'de> MapAccess<'de> for LenientMap<'de> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, Error> {
        match self.iter.next() {
            Some((key, value)) => {
                self.value = Some(value);
                // Map the incoming key onto the declared field list so the
                // derived field matcher sees its own spelling.
                let canonical = self
                    .fields
                    .iter()
                    .find(|field| field.eq_ignore_ascii_case(key))
                    .copied()
                    .unwrap_or(key.as_str());
                let key_access: StrDeserializer<'_, Error> = canonical.into_deserializer();
                seed.deserialize(key_access).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Error> {
        match self.value.take() {
            Some(value) => seed.deserialize(Lenient(value)),
            None => Err(de::Error::custom("value requested before key")),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct LenientEnum<'de> {
    tag: &'de str,
    value: &'de Value,
}

impl<'de> EnumAccess<'de> for LenientEnum<'de> {
    type Error = Error;
    type Variant = LenientVariant<'de>;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, Self::Variant), Error> {
        let tag_access: StrDeserializer<'_, Error> = self.tag.into_deserializer();
        let tag = seed.deserialize(tag_access)?;
        Ok((tag, LenientVariant { value: self.value }))
    }
}

struct LenientVariant<'de> {
    value: &'de Value,
}

impl<'de> VariantAccess<'de> for LenientVariant<'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<(), Error> {
        match self.value {
            Value::Null => Ok(()),
            other => Err(unexpected(other, "null")),
        }
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value, Error> {
        seed.deserialize(Lenient(self.value))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, Error> {
        Lenient(self.value).deserialize_seq(visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        Lenient(self.value).deserialize_struct("", fields, visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        item_id: u64,
        display_name: String,
        score: f64,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Wrapper {
        item: Item,
        tags: Vec<String>,
        note: Option<String>,
    }

    #[test]
    fn case_insensitive_field_names() {
        let value = json!({"Item_Id": 7, "DISPLAY_NAME": "seven", "Score": 0.5});
        let item: Item = from_value_lenient(&value).unwrap();
        assert_eq!(
            item,
            Item {
                item_id: 7,
                display_name: "seven".to_string(),
                score: 0.5,
            }
        );
    }

    #[test]
    fn numbers_encoded_as_strings() {
        let value = json!({"item_id": "42", "display_name": "answer", "score": " 1.25 "});
        let item: Item = from_value_lenient(&value).unwrap();
        assert_eq!(item.item_id, 42);
        assert_eq!(item.score, 1.25);
    }

    #[test]
    fn leniency_applies_through_nesting() {
        let value = json!({
            "ITEM": {"item_ID": "3", "display_name": "x", "score": "2"},
            "Tags": ["a", "b"],
            "note": null
        });
        let wrapper: Wrapper = from_value_lenient(&value).unwrap();
        assert_eq!(wrapper.item.item_id, 3);
        assert_eq!(wrapper.tags, vec!["a", "b"]);
        assert_eq!(wrapper.note, None);
    }

    #[test]
    fn identity_on_value_target() {
        let value = json!({"a": [1, 2], "b": {"c": "d"}});
        let roundtrip: Value = from_value_lenient(&value).unwrap();
        assert_eq!(roundtrip, value);
    }

    #[test]
    fn garbage_string_for_numeric_target_fails() {
        let value = json!({"item_id": "forty-two", "display_name": "x", "score": 1.0});
        let err = from_value_lenient::<Item>(&value).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn strict_on_type_mismatch() {
        let value = json!({"item_id": true, "display_name": "x", "score": 1.0});
        assert!(from_value_lenient::<Item>(&value).is_err());
    }

    #[test]
    fn string_enum_variant() {
        #[derive(Debug, Deserialize, PartialEq)]
        enum Mode {
            Fast,
            Slow,
        }
        let mode: Mode = from_value_lenient(&json!("Fast")).unwrap();
        assert_eq!(mode, Mode::Fast);
    }
}
