// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./encoder_test.rs"]
mod encoder_test;

use crate::{Error, Result};
use bd_pb_reflect::{Field, Instance, MapKey, ResolvedType, Rule, Schema, TypeId, Value};
use bd_pb_wire::{ScalarKind, WireType, Writer};

/// Encodes an instance to the canonical wire format by walking its type's fields in declaration
/// order. This is the reflective path; [`crate::CompiledEncoders`] is the byte-equivalent
/// specialized one.
///
/// On failure the writer's contents are undefined and must be discarded.
pub fn encode(schema: &Schema, instance: &Instance, writer: &mut Writer) -> Result<()> {
  if !schema.is_sealed() {
    return Err(Error::Unresolved);
  }
  encode_message(schema, instance, writer)?;
  log::trace!("encoded message: {} bytes", writer.len());
  Ok(())
}

fn encode_message(schema: &Schema, instance: &Instance, writer: &mut Writer) -> Result<()> {
  let ty = schema.message_type(instance.type_id());
  for (pos, &field_id) in ty.fields_array().iter().enumerate() {
    encode_field(schema, schema.field(field_id), instance.value_at(pos), writer)?;
  }
  Ok(())
}

fn encode_field(
  schema: &Schema,
  field: &Field,
  stored: Option<&Value>,
  writer: &mut Writer,
) -> Result<()> {
  if field.is_map() {
    return encode_map(schema, field, stored, writer);
  }
  if field.rule() == Rule::Repeated {
    return encode_repeated(schema, field, stored, writer);
  }
  match element_type(field)? {
    ElementType::Message(_) => {
      // Presence controls emission; a required message emits its (possibly default) value
      // unconditionally.
      let value = match (stored, field.rule()) {
        (Some(value), _) => value,
        (None, Rule::Required) => field.default_value().ok_or(Error::Unresolved)?,
        (None, _) => return Ok(()),
      };
      let Value::Message(nested) = value else {
        return Err(value_mismatch(field.name(), "a message instance"));
      };
      writer.tag(field.id(), WireType::LengthDelimited);
      writer.fork();
      encode_message(schema, nested, writer)?;
      writer.ldelim()?;
    },
    ElementType::Enum => {
      let default = field.default_value().ok_or(Error::Unresolved)?;
      let value = stored.unwrap_or(default);
      if field.rule() == Rule::Required || value != default {
        writer.tag(field.id(), WireType::Varint);
        write_enum(writer, value, field.name())?;
      }
    },
    ElementType::Scalar(kind) => {
      let default = field.default_value().ok_or(Error::Unresolved)?;
      let value = stored.unwrap_or(default);
      if field.rule() == Rule::Required || value != default {
        writer.tag(field.id(), kind.wire_type());
        write_scalar(writer, kind, value, field.name())?;
      }
    },
  }
  Ok(())
}

fn encode_repeated(
  schema: &Schema,
  field: &Field,
  stored: Option<&Value>,
  writer: &mut Writer,
) -> Result<()> {
  let Some(value) = stored else {
    return Ok(());
  };
  let Value::List(items) = value else {
    return Err(value_mismatch(field.name(), "a list"));
  };
  if items.is_empty() {
    return Ok(());
  }
  match element_type(field)? {
    ElementType::Scalar(kind) if field.packed() && kind.is_packable() => {
      writer.tag(field.id(), WireType::LengthDelimited);
      writer.fork();
      for item in items {
        write_scalar(writer, kind, item, field.name())?;
      }
      writer.ldelim()?;
    },
    ElementType::Enum if field.packed() => {
      writer.tag(field.id(), WireType::LengthDelimited);
      writer.fork();
      for item in items {
        write_enum(writer, item, field.name())?;
      }
      writer.ldelim()?;
    },
    ElementType::Scalar(kind) => {
      for item in items {
        writer.tag(field.id(), kind.wire_type());
        write_scalar(writer, kind, item, field.name())?;
      }
    },
    ElementType::Enum => {
      for item in items {
        writer.tag(field.id(), WireType::Varint);
        write_enum(writer, item, field.name())?;
      }
    },
    ElementType::Message(_) => {
      for item in items {
        let Value::Message(nested) = item else {
          return Err(value_mismatch(field.name(), "message instances"));
        };
        writer.tag(field.id(), WireType::LengthDelimited);
        writer.fork();
        encode_message(schema, nested, writer)?;
        writer.ldelim()?;
      }
    },
  }
  Ok(())
}

// Map entries encode as repeated synthetic messages { key = 1; value = 2; }, keys in insertion
// order, key and value both always written.
fn encode_map(
  schema: &Schema,
  field: &Field,
  stored: Option<&Value>,
  writer: &mut Writer,
) -> Result<()> {
  let Some(value) = stored else {
    return Ok(());
  };
  let Value::Map(entries) = value else {
    return Err(value_mismatch(field.name(), "a map"));
  };
  let Some(key_kind) = field.key_kind() else {
    return Err(value_mismatch(field.name(), "a map field"));
  };
  let element = element_type(field)?;
  for (key, entry_value) in entries {
    writer.tag(field.id(), WireType::LengthDelimited);
    writer.fork();
    writer.tag(1, key_kind.wire_type());
    write_map_key(writer, key_kind, key, field.name())?;
    match element {
      ElementType::Scalar(kind) => {
        writer.tag(2, kind.wire_type());
        write_scalar(writer, kind, entry_value, field.name())?;
      },
      ElementType::Enum => {
        writer.tag(2, WireType::Varint);
        write_enum(writer, entry_value, field.name())?;
      },
      ElementType::Message(_) => {
        let Value::Message(nested) = entry_value else {
          return Err(value_mismatch(field.name(), "message map values"));
        };
        writer.tag(2, WireType::LengthDelimited);
        writer.fork();
        encode_message(schema, nested, writer)?;
        writer.ldelim()?;
      },
    }
    writer.ldelim()?;
  }
  Ok(())
}

//
// ElementType
//

// What a field's elements are after resolution, collapsing the scalar/enum/message dispatch the
// wire format cares about.
#[derive(Clone, Copy)]
pub(crate) enum ElementType {
  Scalar(ScalarKind),
  Enum,
  Message(TypeId),
}

pub(crate) fn element_type(field: &Field) -> Result<ElementType> {
  if let Some(kind) = field.scalar_kind() {
    return Ok(ElementType::Scalar(kind));
  }
  match field.resolved_type() {
    Some(ResolvedType::Enum(_)) => Ok(ElementType::Enum),
    Some(ResolvedType::Message(t)) => Ok(ElementType::Message(t)),
    None => Err(Error::Unresolved),
  }
}

pub(crate) fn value_mismatch(field_name: &str, expected: &str) -> Error {
  Error::Encode(field_name.to_string(), format!("expected {expected}"))
}

// Enum numbers travel as sign-preserving int32 varints, byte-identical to the reference encoder
// for negative aliases.
pub(crate) fn write_enum(writer: &mut Writer, value: &Value, field_name: &str) -> Result<()> {
  let Value::Enum(number) = value else {
    return Err(value_mismatch(field_name, "an enum number"));
  };
  writer.int32(*number);
  Ok(())
}

pub(crate) fn write_scalar(
  writer: &mut Writer,
  kind: ScalarKind,
  value: &Value,
  field_name: &str,
) -> Result<()> {
  match (kind, value) {
    (ScalarKind::Double, Value::F64(v)) => writer.double(*v),
    (ScalarKind::Float, Value::F32(v)) => writer.float(*v),
    (ScalarKind::Int32, Value::I32(v)) => writer.int32(*v),
    (ScalarKind::Int64, Value::I64(v)) => writer.int64(*v),
    (ScalarKind::Uint32, Value::U32(v)) => writer.uint32(*v),
    (ScalarKind::Uint64, Value::U64(v)) => writer.uint64(*v),
    (ScalarKind::Sint32, Value::I32(v)) => writer.sint32(*v),
    (ScalarKind::Sint64, Value::I64(v)) => writer.sint64(*v),
    (ScalarKind::Fixed32, Value::U32(v)) => writer.fixed32(*v),
    (ScalarKind::Fixed64, Value::U64(v)) => writer.fixed64(*v),
    (ScalarKind::Sfixed32, Value::I32(v)) => writer.sfixed32(*v),
    (ScalarKind::Sfixed64, Value::I64(v)) => writer.sfixed64(*v),
    (ScalarKind::Bool, Value::Bool(v)) => writer.bool(*v),
    (ScalarKind::String, Value::String(v)) => writer.string(v),
    (ScalarKind::Bytes, Value::Bytes(v)) => writer.bytes(v),
    _ => return Err(value_mismatch(field_name, kind.as_str())),
  }
  Ok(())
}

pub(crate) fn write_map_key(
  writer: &mut Writer,
  kind: ScalarKind,
  key: &MapKey,
  field_name: &str,
) -> Result<()> {
  match (kind, key) {
    (ScalarKind::Int32, MapKey::I32(v)) => writer.int32(*v),
    (ScalarKind::Sint32, MapKey::I32(v)) => writer.sint32(*v),
    (ScalarKind::Sfixed32, MapKey::I32(v)) => writer.sfixed32(*v),
    (ScalarKind::Int64, MapKey::I64(v)) => writer.int64(*v),
    (ScalarKind::Sint64, MapKey::I64(v)) => writer.sint64(*v),
    (ScalarKind::Sfixed64, MapKey::I64(v)) => writer.sfixed64(*v),
    (ScalarKind::Uint32, MapKey::U32(v)) => writer.uint32(*v),
    (ScalarKind::Fixed32, MapKey::U32(v)) => writer.fixed32(*v),
    (ScalarKind::Uint64, MapKey::U64(v)) => writer.uint64(*v),
    (ScalarKind::Fixed64, MapKey::U64(v)) => writer.fixed64(*v),
    (ScalarKind::Bool, MapKey::Bool(v)) => writer.bool(*v),
    (ScalarKind::String, MapKey::String(v)) => writer.string(v),
    _ => return Err(value_mismatch(field_name, "a matching map key kind")),
  }
  Ok(())
}
