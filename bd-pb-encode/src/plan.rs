// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./plan_test.rs"]
mod plan_test;

use crate::encoder::{element_type, value_mismatch, write_map_key, write_scalar, ElementType};
use crate::{Error, Result};
use ahash::AHashMap;
use bd_pb_reflect::{Instance, Rule, Schema, TypeId, Value};
use bd_pb_wire::{ScalarKind, WireType, Writer};

const fn make_tag(field_id: u32, wire_type: WireType) -> u32 {
  (field_id << 3) | wire_type as u32
}

//
// Op
//

// One field's encoding, specialized at generation time: tag varints are precomputed and nested
// message types are captured as indices into the plan's side table rather than consulted in the
// schema.
#[derive(Debug)]
enum Op {
  Scalar {
    tag: u32,
    kind: ScalarKind,
    pos: usize,
    default: Value,
    always: bool,
  },
  Enum {
    tag: u32,
    pos: usize,
    default: i32,
    always: bool,
  },
  Message {
    tag: u32,
    pos: usize,
    nested: usize,
    // The field's default instance, present iff the field is required and therefore emitted
    // even when unset.
    default: Option<Value>,
  },
  PackedScalar {
    tag: u32,
    kind: ScalarKind,
    pos: usize,
  },
  PackedEnum {
    tag: u32,
    pos: usize,
  },
  RepeatedScalar {
    tag: u32,
    kind: ScalarKind,
    pos: usize,
  },
  RepeatedEnum {
    tag: u32,
    pos: usize,
  },
  RepeatedMessage {
    tag: u32,
    pos: usize,
    nested: usize,
  },
  Map {
    tag: u32,
    key_tag: u32,
    key_kind: ScalarKind,
    pos: usize,
    value: MapValueOp,
  },
}

#[derive(Debug)]
enum MapValueOp {
  Scalar { tag: u32, kind: ScalarKind },
  Enum { tag: u32 },
  Message { tag: u32, nested: usize },
}

#[derive(Debug)]
struct Step {
  name: String,
  op: Op,
}

//
// EncodePlan
//

#[derive(Debug)]
struct EncodePlan {
  steps: Vec<Step>,
  // Captured nested message types, indexed by the ops' `nested` slots.
  nested: Vec<TypeId>,
}

//
// PlanBuilder
//

// The small builder the generator emits plans through.
#[derive(Debug, Default)]
struct PlanBuilder {
  steps: Vec<Step>,
  nested: Vec<TypeId>,
}

impl PlanBuilder {
  fn nested_ref(&mut self, id: TypeId) -> usize {
    if let Some(index) = self.nested.iter().position(|&t| t == id) {
      return index;
    }
    self.nested.push(id);
    self.nested.len() - 1
  }

  fn step(&mut self, name: &str, op: Op) {
    self.steps.push(Step {
      name: name.to_string(),
      op,
    });
  }

  fn build(self) -> EncodePlan {
    EncodePlan {
      steps: self.steps,
      nested: self.nested,
    }
  }
}

fn compile(schema: &Schema, id: TypeId) -> Result<EncodePlan> {
  let mut builder = PlanBuilder::default();
  let ty = schema.message_type(id);
  for (pos, &field_id) in ty.fields_array().iter().enumerate() {
    let field = schema.field(field_id);
    let element = element_type(field)?;
    let op = if let Some(key_kind) = field.key_kind() {
      Op::Map {
        tag: make_tag(field.id(), WireType::LengthDelimited),
        key_tag: make_tag(1, key_kind.wire_type()),
        key_kind,
        pos,
        value: match element {
          ElementType::Scalar(kind) => MapValueOp::Scalar {
            tag: make_tag(2, kind.wire_type()),
            kind,
          },
          ElementType::Enum => MapValueOp::Enum {
            tag: make_tag(2, WireType::Varint),
          },
          ElementType::Message(nested) => MapValueOp::Message {
            tag: make_tag(2, WireType::LengthDelimited),
            nested: builder.nested_ref(nested),
          },
        },
      }
    } else if field.rule() == Rule::Repeated {
      match element {
        ElementType::Scalar(kind) if field.packed() && kind.is_packable() => Op::PackedScalar {
          tag: make_tag(field.id(), WireType::LengthDelimited),
          kind,
          pos,
        },
        ElementType::Enum if field.packed() => Op::PackedEnum {
          tag: make_tag(field.id(), WireType::LengthDelimited),
          pos,
        },
        ElementType::Scalar(kind) => Op::RepeatedScalar {
          tag: make_tag(field.id(), kind.wire_type()),
          kind,
          pos,
        },
        ElementType::Enum => Op::RepeatedEnum {
          tag: make_tag(field.id(), WireType::Varint),
          pos,
        },
        ElementType::Message(nested) => Op::RepeatedMessage {
          tag: make_tag(field.id(), WireType::LengthDelimited),
          pos,
          nested: builder.nested_ref(nested),
        },
      }
    } else {
      let always = field.rule() == Rule::Required;
      match element {
        ElementType::Scalar(kind) => Op::Scalar {
          tag: make_tag(field.id(), kind.wire_type()),
          kind,
          pos,
          default: field.default_value().ok_or(Error::Unresolved)?.clone(),
          always,
        },
        ElementType::Enum => {
          let Some(Value::Enum(default)) = field.default_value() else {
            return Err(Error::Unresolved);
          };
          Op::Enum {
            tag: make_tag(field.id(), WireType::Varint),
            pos,
            default: *default,
            always,
          }
        },
        ElementType::Message(nested) => Op::Message {
          tag: make_tag(field.id(), WireType::LengthDelimited),
          pos,
          nested: builder.nested_ref(nested),
          default: always.then(|| field.default_value().cloned()).flatten(),
        },
      }
    };
    builder.step(field.name(), op);
  }
  Ok(builder.build())
}

//
// CompiledEncoders
//

/// Per-type encoders specialized at schema-resolution time.
///
/// [`CompiledEncoders::generate`] compiles every message type into a flat plan of per-field ops
/// with precomputed tags; execution never consults the schema graph. Output is byte-identical to
/// the reflective [`crate::encode`] for every input.
#[derive(Debug)]
pub struct CompiledEncoders {
  plans: AHashMap<TypeId, EncodePlan>,
}

impl CompiledEncoders {
  /// Compiles plans for every message type of a sealed schema.
  pub fn generate(schema: &Schema) -> Result<Self> {
    if !schema.is_sealed() {
      return Err(Error::Unresolved);
    }
    let mut plans = AHashMap::new();
    for id in schema.type_ids() {
      plans.insert(id, compile(schema, id)?);
    }
    log::debug!("compiled {} message encode plans", plans.len());
    Ok(Self { plans })
  }

  /// Encodes an instance with its type's specialized plan.
  ///
  /// On failure the writer's contents are undefined and must be discarded.
  pub fn encode(&self, instance: &Instance, writer: &mut Writer) -> Result<()> {
    self.encode_as(instance.type_id(), instance, writer)
  }

  fn encode_as(&self, id: TypeId, instance: &Instance, writer: &mut Writer) -> Result<()> {
    let plan = self.plans.get(&id).ok_or(Error::Unresolved)?;
    for step in &plan.steps {
      self.run_step(plan, step, instance, writer)?;
    }
    Ok(())
  }

  #[allow(clippy::too_many_lines)]
  fn run_step(
    &self,
    plan: &EncodePlan,
    step: &Step,
    instance: &Instance,
    writer: &mut Writer,
  ) -> Result<()> {
    let name = step.name.as_str();
    match &step.op {
      Op::Scalar {
        tag,
        kind,
        pos,
        default,
        always,
      } => {
        let value = instance.value_at(*pos).unwrap_or(default);
        if *always || value != default {
          writer.uint32(*tag);
          write_scalar(writer, *kind, value, name)?;
        }
      },
      Op::Enum {
        tag,
        pos,
        default,
        always,
      } => {
        let number = match instance.value_at(*pos) {
          Some(Value::Enum(number)) => *number,
          Some(_) => return Err(value_mismatch(name, "an enum number")),
          None => *default,
        };
        if *always || number != *default {
          writer.uint32(*tag);
          writer.int32(number);
        }
      },
      Op::Message {
        tag,
        pos,
        nested,
        default,
      } => {
        let value = match (instance.value_at(*pos), default) {
          (Some(value), _) => value,
          (None, Some(value)) => value,
          (None, None) => return Ok(()),
        };
        let Value::Message(inner) = value else {
          return Err(value_mismatch(name, "a message instance"));
        };
        writer.uint32(*tag);
        writer.fork();
        self.encode_as(plan.nested[*nested], inner, writer)?;
        writer.ldelim()?;
      },
      Op::PackedScalar { tag, kind, pos } => {
        let Some(items) = list_at(instance, *pos, name)? else {
          return Ok(());
        };
        writer.uint32(*tag);
        writer.fork();
        for item in items {
          write_scalar(writer, *kind, item, name)?;
        }
        writer.ldelim()?;
      },
      Op::PackedEnum { tag, pos } => {
        let Some(items) = list_at(instance, *pos, name)? else {
          return Ok(());
        };
        writer.uint32(*tag);
        writer.fork();
        for item in items {
          let Value::Enum(number) = item else {
            return Err(value_mismatch(name, "enum numbers"));
          };
          writer.int32(*number);
        }
        writer.ldelim()?;
      },
      Op::RepeatedScalar { tag, kind, pos } => {
        let Some(items) = list_at(instance, *pos, name)? else {
          return Ok(());
        };
        for item in items {
          writer.uint32(*tag);
          write_scalar(writer, *kind, item, name)?;
        }
      },
      Op::RepeatedEnum { tag, pos } => {
        let Some(items) = list_at(instance, *pos, name)? else {
          return Ok(());
        };
        for item in items {
          let Value::Enum(number) = item else {
            return Err(value_mismatch(name, "enum numbers"));
          };
          writer.uint32(*tag);
          writer.int32(*number);
        }
      },
      Op::RepeatedMessage { tag, pos, nested } => {
        let Some(items) = list_at(instance, *pos, name)? else {
          return Ok(());
        };
        for item in items {
          let Value::Message(inner) = item else {
            return Err(value_mismatch(name, "message instances"));
          };
          writer.uint32(*tag);
          writer.fork();
          self.encode_as(plan.nested[*nested], inner, writer)?;
          writer.ldelim()?;
        }
      },
      Op::Map {
        tag,
        key_tag,
        key_kind,
        pos,
        value,
      } => {
        let Some(stored) = instance.value_at(*pos) else {
          return Ok(());
        };
        let Value::Map(entries) = stored else {
          return Err(value_mismatch(name, "a map"));
        };
        for (key, entry_value) in entries {
          writer.uint32(*tag);
          writer.fork();
          writer.uint32(*key_tag);
          write_map_key(writer, *key_kind, key, name)?;
          match value {
            MapValueOp::Scalar { tag, kind } => {
              writer.uint32(*tag);
              write_scalar(writer, *kind, entry_value, name)?;
            },
            MapValueOp::Enum { tag } => {
              let Value::Enum(number) = entry_value else {
                return Err(value_mismatch(name, "enum map values"));
              };
              writer.uint32(*tag);
              writer.int32(*number);
            },
            MapValueOp::Message { tag, nested } => {
              let Value::Message(inner) = entry_value else {
                return Err(value_mismatch(name, "message map values"));
              };
              writer.uint32(*tag);
              writer.fork();
              self.encode_as(plan.nested[*nested], inner, writer)?;
              writer.ldelim()?;
            },
          }
          writer.ldelim()?;
        }
      },
    }
    Ok(())
  }
}

// A repeated slot: absent and empty both elide.
fn list_at<'a>(instance: &'a Instance, pos: usize, name: &str) -> Result<Option<&'a [Value]>> {
  match instance.value_at(pos) {
    None => Ok(None),
    Some(Value::List(items)) if items.is_empty() => Ok(None),
    Some(Value::List(items)) => Ok(Some(items)),
    Some(_) => Err(value_mismatch(name, "a list")),
  }
}
