// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::instance::Instance;
use crate::{Error, Result};
use bd_pb_wire::ScalarKind;
use bytes::Bytes;

//
// Value
//

/// A typed field value. Each scalar kind maps to exactly one variant; named types carry their
/// values as `Enum` numbers or nested `Message` instances. Repeated fields hold a `List`, map
/// fields an insertion-ordered `Map`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Bool(bool),
  I32(i32),
  I64(i64),
  U32(u32),
  U64(u64),
  F32(f32),
  F64(f64),
  String(String),
  Bytes(Bytes),
  Enum(i32),
  Message(Box<Instance>),
  List(Vec<Value>),
  Map(Vec<(MapKey, Value)>),
}

//
// MapKey
//

/// Map keys are restricted to integral, bool and string kinds by the wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapKey {
  Bool(bool),
  I32(i32),
  I64(i64),
  U32(u32),
  U64(u64),
  String(String),
}

/// The zero value a scalar field of `kind` defaults to.
#[must_use]
pub fn scalar_zero(kind: ScalarKind) -> Value {
  match kind {
    ScalarKind::Double => Value::F64(0.0),
    ScalarKind::Float => Value::F32(0.0),
    ScalarKind::Int32 | ScalarKind::Sint32 | ScalarKind::Sfixed32 => Value::I32(0),
    ScalarKind::Int64 | ScalarKind::Sint64 | ScalarKind::Sfixed64 => Value::I64(0),
    ScalarKind::Uint32 | ScalarKind::Fixed32 => Value::U32(0),
    ScalarKind::Uint64 | ScalarKind::Fixed64 => Value::U64(0),
    ScalarKind::Bool => Value::Bool(false),
    ScalarKind::String => Value::String(String::new()),
    ScalarKind::Bytes => Value::Bytes(Bytes::new()),
  }
}

/// Whether `value` carries the variant that `kind` stores.
#[must_use]
pub fn scalar_accepts(kind: ScalarKind, value: &Value) -> bool {
  match kind {
    ScalarKind::Double => matches!(value, Value::F64(_)),
    ScalarKind::Float => matches!(value, Value::F32(_)),
    ScalarKind::Int32 | ScalarKind::Sint32 | ScalarKind::Sfixed32 => matches!(value, Value::I32(_)),
    ScalarKind::Int64 | ScalarKind::Sint64 | ScalarKind::Sfixed64 => matches!(value, Value::I64(_)),
    ScalarKind::Uint32 | ScalarKind::Fixed32 => matches!(value, Value::U32(_)),
    ScalarKind::Uint64 | ScalarKind::Fixed64 => matches!(value, Value::U64(_)),
    ScalarKind::Bool => matches!(value, Value::Bool(_)),
    ScalarKind::String => matches!(value, Value::String(_)),
    ScalarKind::Bytes => matches!(value, Value::Bytes(_)),
  }
}

/// Whether `key` carries the variant that a map keyed by `kind` stores.
#[must_use]
pub fn map_key_accepts(kind: ScalarKind, key: &MapKey) -> bool {
  match kind {
    ScalarKind::Int32 | ScalarKind::Sint32 | ScalarKind::Sfixed32 => matches!(key, MapKey::I32(_)),
    ScalarKind::Int64 | ScalarKind::Sint64 | ScalarKind::Sfixed64 => matches!(key, MapKey::I64(_)),
    ScalarKind::Uint32 | ScalarKind::Fixed32 => matches!(key, MapKey::U32(_)),
    ScalarKind::Uint64 | ScalarKind::Fixed64 => matches!(key, MapKey::U64(_)),
    ScalarKind::Bool => matches!(key, MapKey::Bool(_)),
    ScalarKind::String => matches!(key, MapKey::String(_)),
    _ => false,
  }
}

fn value_type_error(kind: ScalarKind, json: &serde_json::Value) -> Error {
  Error::ValueType(kind.as_str().to_string(), format!("got {json}"))
}

/// Converts a JSON property value to the typed value a scalar field of `kind` stores. Bytes are
/// accepted as an array of byte numbers.
pub fn scalar_from_json(kind: ScalarKind, json: &serde_json::Value) -> Result<Value> {
  let err = || value_type_error(kind, json);
  Ok(match kind {
    ScalarKind::Double => Value::F64(json.as_f64().ok_or_else(err)?),
    ScalarKind::Float => {
      let wide = json.as_f64().ok_or_else(err)?;
      #[allow(clippy::cast_possible_truncation)]
      let narrow = wide as f32;
      Value::F32(narrow)
    },
    ScalarKind::Int32 | ScalarKind::Sint32 | ScalarKind::Sfixed32 => {
      Value::I32(json.as_i64().and_then(|v| i32::try_from(v).ok()).ok_or_else(err)?)
    },
    ScalarKind::Int64 | ScalarKind::Sint64 | ScalarKind::Sfixed64 => {
      Value::I64(json.as_i64().ok_or_else(err)?)
    },
    ScalarKind::Uint32 | ScalarKind::Fixed32 => {
      Value::U32(json.as_u64().and_then(|v| u32::try_from(v).ok()).ok_or_else(err)?)
    },
    ScalarKind::Uint64 | ScalarKind::Fixed64 => Value::U64(json.as_u64().ok_or_else(err)?),
    ScalarKind::Bool => Value::Bool(json.as_bool().ok_or_else(err)?),
    ScalarKind::String => Value::String(json.as_str().ok_or_else(err)?.to_string()),
    ScalarKind::Bytes => {
      let array = json.as_array().ok_or_else(err)?;
      let bytes = array
        .iter()
        .map(|b| b.as_u64().and_then(|v| u8::try_from(v).ok()).ok_or_else(err))
        .collect::<Result<Vec<_>>>()?;
      Value::Bytes(bytes.into())
    },
  })
}

/// Parses a JSON object key into a typed map key. JSON object keys are always strings, so
/// integral and bool keys arrive in their decimal/literal spelling.
pub fn map_key_from_str(kind: ScalarKind, key: &str) -> Result<MapKey> {
  let err = || Error::ValueType(kind.as_str().to_string(), format!("got map key '{key}'"));
  Ok(match kind {
    ScalarKind::Int32 | ScalarKind::Sint32 | ScalarKind::Sfixed32 => {
      MapKey::I32(key.parse().map_err(|_| err())?)
    },
    ScalarKind::Int64 | ScalarKind::Sint64 | ScalarKind::Sfixed64 => {
      MapKey::I64(key.parse().map_err(|_| err())?)
    },
    ScalarKind::Uint32 | ScalarKind::Fixed32 => MapKey::U32(key.parse().map_err(|_| err())?),
    ScalarKind::Uint64 | ScalarKind::Fixed64 => MapKey::U64(key.parse().map_err(|_| err())?),
    ScalarKind::Bool => match key {
      "true" => MapKey::Bool(true),
      "false" => MapKey::Bool(false),
      _ => return Err(err()),
    },
    ScalarKind::String => MapKey::String(key.to_string()),
    _ => return Err(err()),
  })
}
