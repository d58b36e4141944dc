// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./instance_test.rs"]
mod instance_test;

use crate::schema::{ChildRef, Field, FieldId, FieldKind, NamespaceRef, ResolvedType, Rule, Schema, TypeId};
use crate::value::{map_key_accepts, map_key_from_str, scalar_accepts, scalar_from_json, Value};
use crate::{Error, Result};

//
// Instance
//

/// A message instance: a fixed-shape record with one slot per field of its type (addressed by
/// position in the type's `fields_array`) plus per-oneof bookkeeping of the currently-set field.
///
/// Slots are presence-tracked: an empty slot reads as the field's default. Field access goes
/// through the owning [`Schema`], which instances deliberately do not hold a reference to.
#[derive(Debug, Clone)]
pub struct Instance {
  type_id: TypeId,
  values: Vec<Option<Value>>,
  oneof_set: Vec<Option<FieldId>>,
}

impl Instance {
  // Slots grow on demand, so an instance can be built before its type's shape is final (the
  // empty default message a resolving field captures).
  pub(crate) const fn detached(type_id: TypeId) -> Self {
    Self {
      type_id,
      values: Vec::new(),
      oneof_set: Vec::new(),
    }
  }

  #[must_use]
  pub const fn type_id(&self) -> TypeId {
    self.type_id
  }

  /// The stored value at a field position, if one is present. Positions index the type's
  /// `fields_array`.
  #[must_use]
  pub fn value_at(&self, pos: usize) -> Option<&Value> {
    self.values.get(pos).and_then(Option::as_ref)
  }

  fn slot_mut(&mut self, pos: usize) -> &mut Option<Value> {
    if self.values.len() <= pos {
      self.values.resize_with(pos + 1, || None);
    }
    &mut self.values[pos]
  }

  fn oneof_current(&self, pos: usize) -> Option<FieldId> {
    self.oneof_set.get(pos).copied().flatten()
  }

  fn oneof_slot_mut(&mut self, pos: usize) -> &mut Option<FieldId> {
    if self.oneof_set.len() <= pos {
      self.oneof_set.resize_with(pos + 1, || None);
    }
    &mut self.oneof_set[pos]
  }

  fn field_by_name(&self, schema: &Schema, name: &str) -> Result<(FieldId, usize)> {
    let ns = NamespaceRef::Type(self.type_id);
    match schema.get(ns, name) {
      Some(ChildRef::Field(f)) => {
        let pos = schema
          .message_type(self.type_id)
          .field_position(f)
          .ok_or(Error::Unresolved)?;
        Ok((f, pos))
      },
      _ => Err(Error::NotFound(name.to_string(), schema.ns_name(ns))),
    }
  }

  /// Reads a field: the stored value, or the field's default when unset.
  pub fn get<'a>(&'a self, schema: &'a Schema, name: &str) -> Result<&'a Value> {
    let (field, pos) = self.field_by_name(schema, name)?;
    match self.value_at(pos) {
      Some(value) => Ok(value),
      None => schema.field(field).default_value().ok_or(Error::Unresolved),
    }
  }

  /// Writes a field. `None` unsets it, restoring the default. Setting a oneof member resets the
  /// group's previously-set member to its default; unsetting the currently-set member clears the
  /// group.
  pub fn set(&mut self, schema: &Schema, name: &str, value: Option<Value>) -> Result<()> {
    let (field_id, pos) = self.field_by_name(schema, name)?;
    let field = schema.field(field_id);
    if let Some(ref value) = value {
      check_value(schema, field, value)?;
    }
    let Some(oneof) = field.part_of() else {
      *self.slot_mut(pos) = value;
      return Ok(());
    };

    let ty = schema.message_type(self.type_id);
    let oneof_pos = ty.oneof_position(oneof).ok_or(Error::Unresolved)?;
    match value {
      None => {
        if self.oneof_current(oneof_pos) == Some(field_id) {
          *self.oneof_slot_mut(oneof_pos) = None;
        }
        *self.slot_mut(pos) = None;
      },
      Some(value) => {
        if let Some(previous) = self.oneof_current(oneof_pos) {
          if previous != field_id {
            if let Some(previous_pos) = ty.field_position(previous) {
              *self.slot_mut(previous_pos) = None;
            }
          }
        }
        *self.slot_mut(pos) = Some(value);
        *self.oneof_slot_mut(oneof_pos) = Some(field_id);
      },
    }
    Ok(())
  }

  /// Unsets a field, restoring its default.
  pub fn clear(&mut self, schema: &Schema, name: &str) -> Result<()> {
    self.set(schema, name, None)
  }

  /// The name of the currently-set field of a oneof, if any.
  pub fn which_oneof<'a>(&self, schema: &'a Schema, name: &str) -> Result<Option<&'a str>> {
    let ns = NamespaceRef::Type(self.type_id);
    match schema.get(ns, name) {
      Some(ChildRef::OneOf(o)) => {
        let pos = schema
          .message_type(self.type_id)
          .oneof_position(o)
          .ok_or(Error::Unresolved)?;
        Ok(self.oneof_current(pos).map(|f| schema.field(f).name()))
      },
      _ => Err(Error::NotFound(name.to_string(), schema.ns_name(ns))),
    }
  }
}

// Slot vectors grow lazily, so equality pads the shorter side with absent slots.
impl PartialEq for Instance {
  fn eq(&self, other: &Self) -> bool {
    fn slots_eq<T: PartialEq>(a: &[Option<T>], b: &[Option<T>]) -> bool {
      let len = a.len().max(b.len());
      (0 .. len).all(|i| {
        a.get(i).and_then(Option::as_ref) == b.get(i).and_then(Option::as_ref)
      })
    }
    self.type_id == other.type_id
      && slots_eq(&self.values, &other.values)
      && slots_eq(&self.oneof_set, &other.oneof_set)
  }
}

fn value_type_error(field: &Field, expected: &str) -> Error {
  Error::ValueType(field.name().to_string(), expected.to_string())
}

fn check_value(schema: &Schema, field: &Field, value: &Value) -> Result<()> {
  if let Some(key_kind) = field.key_kind() {
    let Value::Map(entries) = value else {
      return Err(value_type_error(field, "expected a map"));
    };
    for (key, entry_value) in entries {
      if !map_key_accepts(key_kind, key) {
        return Err(value_type_error(field, "map key kind mismatch"));
      }
      check_element(schema, field, entry_value)?;
    }
    return Ok(());
  }
  if field.rule() == Rule::Repeated {
    let Value::List(items) = value else {
      return Err(value_type_error(field, "expected a list"));
    };
    for item in items {
      check_element(schema, field, item)?;
    }
    return Ok(());
  }
  check_element(schema, field, value)
}

fn check_element(schema: &Schema, field: &Field, value: &Value) -> Result<()> {
  match field.kind() {
    FieldKind::Scalar(kind) => {
      if !scalar_accepts(*kind, value) {
        return Err(value_type_error(field, kind.as_str()));
      }
      Ok(())
    },
    FieldKind::Named(_) => match field.resolved_type() {
      Some(ResolvedType::Enum(_)) => {
        if !matches!(value, Value::Enum(_)) {
          return Err(value_type_error(field, "an enum number"));
        }
        Ok(())
      },
      Some(ResolvedType::Message(expected)) => match value {
        Value::Message(instance) if instance.type_id() == expected => Ok(()),
        Value::Message(instance) => Err(value_type_error(
          field,
          &format!(
            "an instance of {}",
            schema.message_type(instance.type_id()).name()
          ),
        )),
        _ => Err(value_type_error(field, "a message instance")),
      },
      None => Err(Error::Unresolved),
    },
  }
}

//
// Instance construction through the schema
//

impl Schema {
  /// Materializes an empty instance of a message type. The schema must be resolved first.
  pub fn create(&self, id: TypeId) -> Result<Instance> {
    if !self.is_sealed() {
      return Err(Error::Unresolved);
    }
    Ok(Instance::detached(id))
  }

  /// Materializes an instance and applies an object of initial properties through the setter
  /// path, in the object's order. Enum values are accepted by number or symbolic name, bytes as
  /// arrays of byte numbers, nested messages as nested objects.
  pub fn create_from_json(&self, id: TypeId, properties: &serde_json::Value) -> Result<Instance> {
    let mut instance = self.create(id)?;
    let Some(object) = properties.as_object() else {
      return Err(Error::ValueType(
        self.message_type(id).name().to_string(),
        "expected an object of properties".to_string(),
      ));
    };
    for (name, json) in object {
      let (field_id, _) = instance.field_by_name(self, name)?;
      let value = self.field_value_from_json(self.field(field_id), json)?;
      instance.set(self, name, Some(value))?;
    }
    Ok(instance)
  }

  fn field_value_from_json(&self, field: &Field, json: &serde_json::Value) -> Result<Value> {
    if let Some(key_kind) = field.key_kind() {
      let Some(object) = json.as_object() else {
        return Err(value_type_error(field, "expected a map object"));
      };
      let entries = object
        .iter()
        .map(|(key, entry)| {
          Ok((
            map_key_from_str(key_kind, key)?,
            self.element_from_json(field, entry)?,
          ))
        })
        .collect::<Result<Vec<_>>>()?;
      return Ok(Value::Map(entries));
    }
    if field.rule() == Rule::Repeated {
      let Some(items) = json.as_array() else {
        return Err(value_type_error(field, "expected an array"));
      };
      let items = items
        .iter()
        .map(|item| self.element_from_json(field, item))
        .collect::<Result<Vec<_>>>()?;
      return Ok(Value::List(items));
    }
    self.element_from_json(field, json)
  }

  fn element_from_json(&self, field: &Field, json: &serde_json::Value) -> Result<Value> {
    match field.kind() {
      FieldKind::Scalar(kind) => scalar_from_json(*kind, json),
      FieldKind::Named(_) => match field.resolved_type() {
        Some(ResolvedType::Enum(e)) => {
          if let Some(number) = json.as_i64().and_then(|v| i32::try_from(v).ok()) {
            return Ok(Value::Enum(number));
          }
          json
            .as_str()
            .and_then(|name| self.enum_type(e).value_by_name(name))
            .map(Value::Enum)
            .ok_or_else(|| value_type_error(field, "an enum number or value name"))
        },
        Some(ResolvedType::Message(t)) => {
          Ok(Value::Message(Box::new(self.create_from_json(t, json)?)))
        },
        None => Err(Error::Unresolved),
      },
    }
  }
}
