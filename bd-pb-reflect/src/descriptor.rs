// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./descriptor_test.rs"]
mod descriptor_test;

use crate::schema::{
  ChildRef,
  EnumId,
  FieldId,
  FieldKind,
  FieldSpec,
  NamespaceRef,
  OneOfId,
  Options,
  Rule,
  Schema,
  TypeId,
};
use crate::{Error, Result};
use bd_pb_wire::ScalarKind;
use serde::{Deserialize, Serialize};

//
// FieldDescriptor
//

// The JSON shape of a field. Field order here is the key order emitted on round-trip.
#[derive(Debug, Serialize, Deserialize)]
struct FieldDescriptor {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  rule: Option<String>,
  #[serde(rename = "type")]
  type_name: String,
  id: u32,
  #[serde(rename = "keyType", default, skip_serializing_if = "Option::is_none")]
  key_type: Option<String>,
  #[serde(default, skip_serializing_if = "Options::is_empty")]
  options: Options,
}

impl FieldDescriptor {
  fn into_spec(self, name: &str) -> Result<FieldSpec> {
    let rule = match self.rule.as_deref() {
      None | Some("optional") => Rule::Optional,
      Some("required") => Rule::Required,
      Some("repeated") => Rule::Repeated,
      Some(other) => {
        return Err(Error::InvalidDescriptor(format!(
          "unknown rule '{other}' on field '{name}'"
        )));
      },
    };
    let kind = ScalarKind::from_name(&self.type_name)
      .map_or_else(|| FieldKind::Named(self.type_name.clone()), FieldKind::Scalar);
    let key_kind = self
      .key_type
      .map(|key_type| {
        ScalarKind::from_name(&key_type).ok_or_else(|| {
          Error::InvalidDescriptor(format!(
            "map key type '{key_type}' on field '{name}' is not a scalar kind"
          ))
        })
      })
      .transpose()?;
    Ok(FieldSpec {
      name: name.to_string(),
      id: self.id,
      kind,
      rule,
      key_kind,
      options: self.options,
    })
  }
}

//
// OneOfDescriptor
//

#[derive(Debug, Serialize, Deserialize)]
struct OneOfDescriptor {
  oneof: Vec<String>,
  #[serde(default, skip_serializing_if = "Options::is_empty")]
  options: Options,
}

fn as_object<'a>(
  json: &'a serde_json::Value,
  what: &str,
) -> Result<&'a serde_json::Map<String, serde_json::Value>> {
  json
    .as_object()
    .ok_or_else(|| Error::InvalidDescriptor(format!("{what} must be an object")))
}

impl Schema {
  /// Builds a schema graph from its JSON descriptor form: a namespace object whose `nested` map
  /// holds message and enum nodes in declaration order. The graph is returned unresolved;
  /// callers seal it with [`Schema::resolve_all`].
  pub fn from_json(json: &serde_json::Value) -> Result<Self> {
    let mut schema = Self::new();
    let object = as_object(json, "the schema descriptor")?;
    if let Some(nested) = object.get("nested") {
      for (name, node) in as_object(nested, "'nested'")? {
        schema.load_node(NamespaceRef::Root, name, node)?;
      }
    }
    Ok(schema)
  }

  fn load_node(&mut self, ns: NamespaceRef, name: &str, node: &serde_json::Value) -> Result<()> {
    let object = as_object(node, &format!("node '{name}'"))?;
    if object.contains_key("values") {
      self.load_enum(ns, name, object)
    } else {
      self.load_type(ns, name, object)
    }
  }

  fn load_enum(
    &mut self,
    ns: NamespaceRef,
    name: &str,
    object: &serde_json::Map<String, serde_json::Value>,
  ) -> Result<()> {
    let e = self.new_enum(name)?;
    if let Some(options) = object.get("options") {
      self.set_options(ChildRef::Enum(e), as_object(options, "'options'")?.clone())?;
    }
    self.add(ns, ChildRef::Enum(e))?;
    for (value_name, number) in as_object(&object["values"], "'values'")? {
      let number = number
        .as_i64()
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| {
          Error::InvalidDescriptor(format!("enum value '{name}.{value_name}' must be a 32-bit number"))
        })?;
      self.add_enum_value(e, value_name, number)?;
    }
    Ok(())
  }

  fn load_type(
    &mut self,
    ns: NamespaceRef,
    name: &str,
    object: &serde_json::Map<String, serde_json::Value>,
  ) -> Result<()> {
    let t = self.new_type(name)?;
    if let Some(options) = object.get("options") {
      self.set_options(ChildRef::Type(t), as_object(options, "'options'")?.clone())?;
    }
    self.add(ns, ChildRef::Type(t))?;
    // Fields land before oneofs so an attaching oneof can claim the members it declares.
    if let Some(fields) = object.get("fields") {
      for (field_name, descriptor) in as_object(fields, "'fields'")? {
        let descriptor: FieldDescriptor =
          serde_json::from_value(descriptor.clone()).map_err(|e| {
            Error::InvalidDescriptor(format!("field '{name}.{field_name}': {e}"))
          })?;
        let f = self.new_field(descriptor.into_spec(field_name)?)?;
        self.add(NamespaceRef::Type(t), ChildRef::Field(f))?;
      }
    }
    if let Some(oneofs) = object.get("oneofs") {
      for (oneof_name, descriptor) in as_object(oneofs, "'oneofs'")? {
        let descriptor: OneOfDescriptor =
          serde_json::from_value(descriptor.clone()).map_err(|e| {
            Error::InvalidDescriptor(format!("oneof '{name}.{oneof_name}': {e}"))
          })?;
        let o = self.new_oneof(oneof_name, descriptor.oneof)?;
        self.set_options(ChildRef::OneOf(o), descriptor.options)?;
        self.add(NamespaceRef::Type(t), ChildRef::OneOf(o))?;
      }
    }
    if let Some(nested) = object.get("nested") {
      for (nested_name, node) in as_object(nested, "'nested'")? {
        self.load_node(NamespaceRef::Type(t), nested_name, node)?;
      }
    }
    Ok(())
  }

  /// The schema's JSON descriptor form. Inverse of [`Schema::from_json`] up to key ordering of
  /// absent sections.
  #[must_use]
  pub fn to_json(&self) -> serde_json::Value {
    let mut root = serde_json::Map::new();
    if !self.root_children().is_empty() {
      root.insert("nested".to_string(), self.nested_to_json(self.root_children()));
    }
    serde_json::Value::Object(root)
  }

  fn nested_to_json(&self, children: &[ChildRef]) -> serde_json::Value {
    let mut nested = serde_json::Map::new();
    for &child in children {
      match child {
        ChildRef::Type(t) => {
          nested.insert(self.message_type(t).name().to_string(), self.type_to_json(t));
        },
        ChildRef::Enum(e) => {
          nested.insert(self.enum_type(e).name().to_string(), self.enum_to_json(e));
        },
        ChildRef::Field(_) | ChildRef::OneOf(_) => {},
      }
    }
    serde_json::Value::Object(nested)
  }

  fn type_to_json(&self, id: TypeId) -> serde_json::Value {
    let ty = self.message_type(id);
    let mut node = serde_json::Map::new();
    if !ty.options().is_empty() {
      node.insert("options".to_string(), serde_json::Value::Object(ty.options().clone()));
    }
    let mut oneofs = serde_json::Map::new();
    let mut fields = serde_json::Map::new();
    let mut has_nested = false;
    for &child in ty.children() {
      match child {
        ChildRef::OneOf(o) => {
          oneofs.insert(self.oneof(o).name().to_string(), self.oneof_to_json(o));
        },
        ChildRef::Field(f) => {
          fields.insert(self.field(f).name().to_string(), self.field_to_json(f));
        },
        ChildRef::Type(_) | ChildRef::Enum(_) => has_nested = true,
      }
    }
    if !oneofs.is_empty() {
      node.insert("oneofs".to_string(), serde_json::Value::Object(oneofs));
    }
    node.insert("fields".to_string(), serde_json::Value::Object(fields));
    if has_nested {
      node.insert("nested".to_string(), self.nested_to_json(ty.children()));
    }
    serde_json::Value::Object(node)
  }

  fn field_to_json(&self, id: FieldId) -> serde_json::Value {
    let field = self.field(id);
    let descriptor = FieldDescriptor {
      rule: match field.rule() {
        Rule::Optional => None,
        Rule::Required => Some("required".to_string()),
        Rule::Repeated => Some("repeated".to_string()),
      },
      type_name: match field.kind() {
        FieldKind::Scalar(kind) => kind.as_str().to_string(),
        FieldKind::Named(name) => name.clone(),
      },
      id: field.id(),
      key_type: field.key_kind().map(|kind| kind.as_str().to_string()),
      options: field.options().clone(),
    };
    // A struct of plain JSON shapes never fails to serialize.
    serde_json::to_value(descriptor).unwrap_or(serde_json::Value::Null)
  }

  fn oneof_to_json(&self, id: OneOfId) -> serde_json::Value {
    let oneof = self.oneof(id);
    let descriptor = OneOfDescriptor {
      oneof: oneof.declared().to_vec(),
      options: oneof.options().clone(),
    };
    serde_json::to_value(descriptor).unwrap_or(serde_json::Value::Null)
  }

  fn enum_to_json(&self, id: EnumId) -> serde_json::Value {
    let enum_type = self.enum_type(id);
    let mut node = serde_json::Map::new();
    if !enum_type.options().is_empty() {
      node.insert(
        "options".to_string(),
        serde_json::Value::Object(enum_type.options().clone()),
      );
    }
    let mut values = serde_json::Map::new();
    for (name, number) in enum_type.values() {
      values.insert(name.clone(), serde_json::Value::from(*number));
    }
    node.insert("values".to_string(), serde_json::Value::Object(values));
    serde_json::Value::Object(node)
  }
}
