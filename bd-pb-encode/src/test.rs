// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::CompiledEncoders;
use bd_pb_reflect::{Instance, NamespaceRef, Schema, TypeId};
use bd_pb_wire::Writer;
use itertools::Itertools;

pub fn sealed_schema(descriptor: &serde_json::Value) -> Schema {
  let mut schema = Schema::from_json(descriptor).unwrap();
  schema.resolve_all().unwrap();
  schema
}

pub fn root_type(schema: &Schema, name: &str) -> TypeId {
  schema.lookup_type(NamespaceRef::Root, name).unwrap()
}

pub fn hex(bytes: &[u8]) -> String {
  bytes.iter().map(|b| format!("{b:02x}")).join(" ")
}

/// Reflective encode to spaced hex. Also asserts the specialized path agrees, so every byte
/// expectation in the suite doubles as an equivalence check.
pub fn encode_hex(schema: &Schema, instance: &Instance) -> String {
  let mut writer = Writer::new();
  crate::encode(schema, instance, &mut writer).unwrap();
  let reflective = hex(&writer.finish().unwrap());

  let encoders = CompiledEncoders::generate(schema).unwrap();
  let mut writer = Writer::new();
  encoders.encode(instance, &mut writer).unwrap();
  let specialized = hex(&writer.finish().unwrap());

  assert_eq!(reflective, specialized, "encoder paths disagree");
  reflective
}
