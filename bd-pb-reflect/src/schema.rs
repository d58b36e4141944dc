// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./schema_test.rs"]
mod schema_test;

use crate::instance::Instance;
use crate::value::{scalar_zero, Value};
use crate::{Error, Result};
use ahash::AHashMap;
use bd_pb_wire::ScalarKind;

pub type Options = serde_json::Map<String, serde_json::Value>;

const MAX_FIELD_ID: u32 = (1 << 29) - 1;

//
// Ids
//

// Arena indices into the owning Schema. Ids are only meaningful for the schema that minted them;
// handing an id to a different schema indexes into unrelated nodes.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OneOfId(pub(crate) usize);

/// A namespace that can hold children: the schema root or a message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceRef {
  Root,
  Type(TypeId),
}

/// Any named schema entity, as held by its parent namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildRef {
  Type(TypeId),
  Enum(EnumId),
  Field(FieldId),
  OneOf(OneOfId),
}

//
// FieldKind / Rule / ResolvedType
//

/// A field's declared type: a scalar kind or a (possibly dotted) reference to a named type which
/// resolution later binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
  Scalar(ScalarKind),
  Named(String),
}

impl From<ScalarKind> for FieldKind {
  fn from(kind: ScalarKind) -> Self {
    Self::Scalar(kind)
  }
}

impl FieldKind {
  #[must_use]
  pub fn named(name: impl Into<String>) -> Self {
    Self::Named(name.into())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rule {
  #[default]
  Optional,
  Required,
  Repeated,
}

/// What a named type reference resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedType {
  Enum(EnumId),
  Message(TypeId),
}

//
// Members
//

// A namespace's children: declaration order plus a name index.
#[derive(Debug, Default)]
struct Members {
  children: Vec<ChildRef>,
  by_name: AHashMap<String, ChildRef>,
}

impl Members {
  fn insert(&mut self, name: String, child: ChildRef) {
    self.children.push(child);
    self.by_name.insert(name, child);
  }

  fn remove(&mut self, name: &str) {
    if let Some(child) = self.by_name.remove(name) {
      self.children.retain(|&c| c != child);
    }
  }

  fn get(&self, name: &str) -> Option<ChildRef> {
    self.by_name.get(name).copied()
  }
}

//
// MessageType
//

/// A message type: a namespace of fields, oneofs, nested types and enums.
#[derive(Debug)]
pub struct MessageType {
  name: String,
  options: Options,
  parent: Option<NamespaceRef>,
  members: Members,
  // Memoized by Schema::resolve_all.
  fields_array: Vec<FieldId>,
  oneofs_array: Vec<OneOfId>,
  field_pos: AHashMap<FieldId, usize>,
  oneof_pos: AHashMap<OneOfId, usize>,
}

impl MessageType {
  #[must_use]
  pub fn name(&self) -> &str {
    &self.name
  }

  #[must_use]
  pub const fn options(&self) -> &Options {
    &self.options
  }

  #[must_use]
  pub const fn parent(&self) -> Option<NamespaceRef> {
    self.parent
  }

  /// All children in declaration order.
  #[must_use]
  pub fn children(&self) -> &[ChildRef] {
    &self.members.children
  }

  /// The type's fields in declaration order. Empty until the schema is resolved.
  #[must_use]
  pub fn fields_array(&self) -> &[FieldId] {
    &self.fields_array
  }

  /// The type's oneofs in declaration order. Empty until the schema is resolved.
  #[must_use]
  pub fn oneofs_array(&self) -> &[OneOfId] {
    &self.oneofs_array
  }

  /// Position of a field in [`Self::fields_array`].
  #[must_use]
  pub fn field_position(&self, field: FieldId) -> Option<usize> {
    self.field_pos.get(&field).copied()
  }

  /// Position of a oneof in [`Self::oneofs_array`].
  #[must_use]
  pub fn oneof_position(&self, oneof: OneOfId) -> Option<usize> {
    self.oneof_pos.get(&oneof).copied()
  }
}

//
// EnumType
//

/// An enum: an ordered symbolic name to number mapping. Names are unique, numbers may alias.
#[derive(Debug)]
pub struct EnumType {
  name: String,
  options: Options,
  parent: Option<NamespaceRef>,
  values: Vec<(String, i32)>,
}

impl EnumType {
  #[must_use]
  pub fn name(&self) -> &str {
    &self.name
  }

  #[must_use]
  pub const fn options(&self) -> &Options {
    &self.options
  }

  #[must_use]
  pub const fn parent(&self) -> Option<NamespaceRef> {
    self.parent
  }

  #[must_use]
  pub fn values(&self) -> &[(String, i32)] {
    &self.values
  }

  #[must_use]
  pub fn value_by_name(&self, name: &str) -> Option<i32> {
    self
      .values
      .iter()
      .find(|(n, _)| n.as_str() == name)
      .map(|&(_, number)| number)
  }

  /// The number of the first declared value, which enum-typed fields default to. Zero for an
  /// empty enum.
  #[must_use]
  pub fn first_value_number(&self) -> i32 {
    self.values.first().map_or(0, |&(_, number)| number)
  }
}

//
// Field
//

/// A message field. Constructed detached via [`Schema::new_field`], attached with
/// [`Schema::add`], and bound to its referenced type by [`Schema::resolve_field`].
#[derive(Debug)]
pub struct Field {
  name: String,
  id: u32,
  kind: FieldKind,
  rule: Rule,
  packed: bool,
  key_kind: Option<ScalarKind>,
  options: Options,
  parent: Option<TypeId>,
  part_of: Option<OneOfId>,
  resolved: bool,
  resolved_type: Option<ResolvedType>,
  default_value: Option<Value>,
  long: bool,
}

impl Field {
  #[must_use]
  pub fn name(&self) -> &str {
    &self.name
  }

  /// The wire tag number.
  #[must_use]
  pub const fn id(&self) -> u32 {
    self.id
  }

  #[must_use]
  pub const fn kind(&self) -> &FieldKind {
    &self.kind
  }

  #[must_use]
  pub const fn rule(&self) -> Rule {
    self.rule
  }

  #[must_use]
  pub const fn packed(&self) -> bool {
    self.packed
  }

  /// The map key kind; present iff this is a map field.
  #[must_use]
  pub const fn key_kind(&self) -> Option<ScalarKind> {
    self.key_kind
  }

  #[must_use]
  pub const fn is_map(&self) -> bool {
    self.key_kind.is_some()
  }

  #[must_use]
  pub const fn options(&self) -> &Options {
    &self.options
  }

  #[must_use]
  pub const fn parent(&self) -> Option<TypeId> {
    self.parent
  }

  #[must_use]
  pub const fn part_of(&self) -> Option<OneOfId> {
    self.part_of
  }

  #[must_use]
  pub const fn is_resolved(&self) -> bool {
    self.resolved
  }

  #[must_use]
  pub const fn resolved_type(&self) -> Option<ResolvedType> {
    self.resolved_type
  }

  /// The element kind for scalar fields, None for named type references.
  #[must_use]
  pub fn scalar_kind(&self) -> Option<ScalarKind> {
    match self.kind {
      FieldKind::Scalar(kind) => Some(kind),
      FieldKind::Named(_) => None,
    }
  }

  /// The field's default value. None until resolved.
  #[must_use]
  pub const fn default_value(&self) -> Option<&Value> {
    self.default_value.as_ref()
  }

  /// True iff the kind is a 64-bit integer.
  #[must_use]
  pub const fn long(&self) -> bool {
    self.long
  }
}

//
// OneOf
//

/// A oneof: a group of fields of which at most one may carry a value on an instance. A oneof may
/// be built detached, own fields directly, and be grafted into a message later; attachment
/// re-parents its owned fields into the message.
#[derive(Debug)]
pub struct OneOf {
  name: String,
  options: Options,
  // Field names this oneof claims, including names not materialized yet.
  declared: Vec<String>,
  fields: Vec<FieldId>,
  parent: Option<TypeId>,
}

impl OneOf {
  #[must_use]
  pub fn name(&self) -> &str {
    &self.name
  }

  #[must_use]
  pub const fn options(&self) -> &Options {
    &self.options
  }

  #[must_use]
  pub fn declared(&self) -> &[String] {
    &self.declared
  }

  /// Fields owned by or claimed into this oneof, in claim order.
  #[must_use]
  pub fn fields(&self) -> &[FieldId] {
    &self.fields
  }

  #[must_use]
  pub const fn parent(&self) -> Option<TypeId> {
    self.parent
  }
}

//
// FieldSpec
//

/// Construction-time description of a field, handed to [`Schema::new_field`].
#[derive(Debug)]
pub struct FieldSpec {
  pub name: String,
  pub id: u32,
  pub kind: FieldKind,
  pub rule: Rule,
  pub key_kind: Option<ScalarKind>,
  pub options: Options,
}

impl FieldSpec {
  pub fn new(name: impl Into<String>, id: u32, kind: impl Into<FieldKind>) -> Self {
    Self {
      name: name.into(),
      id,
      kind: kind.into(),
      rule: Rule::Optional,
      key_kind: None,
      options: Options::new(),
    }
  }

  #[must_use]
  pub const fn rule(mut self, rule: Rule) -> Self {
    self.rule = rule;
    self
  }

  #[must_use]
  pub fn map_key(mut self, kind: ScalarKind) -> Self {
    self.key_kind = Some(kind);
    self
  }

  #[must_use]
  pub fn option(mut self, name: &str, value: serde_json::Value) -> Self {
    self.options.insert(name.to_string(), value);
    self
  }
}

//
// Schema
//

/// The root of a schema graph. Owns every reflection node in arenas and hands out ids; all
/// structural operations (attach, detach, lookup, resolution) go through it.
///
/// Graphs are mutated during construction only. [`Schema::resolve_all`] resolves every attached
/// field, memoizes the per-type field/oneof arrays and seals the graph; mutation after sealing is
/// rejected.
#[derive(Debug, Default)]
pub struct Schema {
  types: Vec<MessageType>,
  enums: Vec<EnumType>,
  fields: Vec<Field>,
  oneofs: Vec<OneOf>,
  root: Members,
  sealed: bool,
}

impl Schema {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub const fn is_sealed(&self) -> bool {
    self.sealed
  }

  fn ensure_mutable(&self) -> Result<()> {
    if self.sealed {
      return Err(Error::Sealed);
    }
    Ok(())
  }

  fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('.') {
      return Err(Error::InvalidDescriptor(format!("invalid name '{name}'")));
    }
    Ok(())
  }

  //
  // Node construction. All nodes start detached.
  //

  pub fn new_type(&mut self, name: &str) -> Result<TypeId> {
    self.ensure_mutable()?;
    Self::validate_name(name)?;
    self.types.push(MessageType {
      name: name.to_string(),
      options: Options::new(),
      parent: None,
      members: Members::default(),
      fields_array: Vec::new(),
      oneofs_array: Vec::new(),
      field_pos: AHashMap::new(),
      oneof_pos: AHashMap::new(),
    });
    Ok(TypeId(self.types.len() - 1))
  }

  pub fn new_enum(&mut self, name: &str) -> Result<EnumId> {
    self.ensure_mutable()?;
    Self::validate_name(name)?;
    self.enums.push(EnumType {
      name: name.to_string(),
      options: Options::new(),
      parent: None,
      values: Vec::new(),
    });
    Ok(EnumId(self.enums.len() - 1))
  }

  pub fn new_oneof(&mut self, name: &str, declared: Vec<String>) -> Result<OneOfId> {
    self.ensure_mutable()?;
    Self::validate_name(name)?;
    self.oneofs.push(OneOf {
      name: name.to_string(),
      options: Options::new(),
      declared,
      fields: Vec::new(),
      parent: None,
    });
    Ok(OneOfId(self.oneofs.len() - 1))
  }

  pub fn new_field(&mut self, spec: FieldSpec) -> Result<FieldId> {
    self.ensure_mutable()?;
    Self::validate_name(&spec.name)?;
    if spec.id == 0 || spec.id > MAX_FIELD_ID {
      return Err(Error::InvalidDescriptor(format!(
        "field id {} out of range for '{}'",
        spec.id, spec.name
      )));
    }
    if let Some(key_kind) = spec.key_kind {
      if !key_kind.is_map_key() {
        return Err(Error::InvalidDescriptor(format!(
          "'{}' is not a valid map key kind for '{}'",
          key_kind.as_str(),
          spec.name
        )));
      }
      if spec.rule != Rule::Optional {
        return Err(Error::InvalidDescriptor(format!(
          "map field '{}' cannot carry a rule",
          spec.name
        )));
      }
    }
    // Repeated packable fields pack unless the option says otherwise.
    let packed = spec.options.get("packed") != Some(&serde_json::Value::Bool(false));
    self.fields.push(Field {
      name: spec.name,
      id: spec.id,
      kind: spec.kind,
      rule: spec.rule,
      packed,
      key_kind: spec.key_kind,
      options: spec.options,
      parent: None,
      part_of: None,
      resolved: false,
      resolved_type: None,
      default_value: None,
      long: false,
    });
    Ok(FieldId(self.fields.len() - 1))
  }

  pub fn set_options(&mut self, child: ChildRef, options: Options) -> Result<()> {
    self.ensure_mutable()?;
    match child {
      ChildRef::Type(t) => self.types[t.0].options = options,
      ChildRef::Enum(e) => self.enums[e.0].options = options,
      ChildRef::Field(f) => self.fields[f.0].options = options,
      ChildRef::OneOf(o) => self.oneofs[o.0].options = options,
    }
    Ok(())
  }

  //
  // Node access
  //

  #[must_use]
  pub fn message_type(&self, id: TypeId) -> &MessageType {
    &self.types[id.0]
  }

  #[must_use]
  pub fn enum_type(&self, id: EnumId) -> &EnumType {
    &self.enums[id.0]
  }

  #[must_use]
  pub fn field(&self, id: FieldId) -> &Field {
    &self.fields[id.0]
  }

  #[must_use]
  pub fn oneof(&self, id: OneOfId) -> &OneOf {
    &self.oneofs[id.0]
  }

  pub fn type_ids(&self) -> impl Iterator<Item = TypeId> {
    (0 .. self.types.len()).map(TypeId)
  }

  /// The root's children in declaration order.
  #[must_use]
  pub fn root_children(&self) -> &[ChildRef] {
    &self.root.children
  }

  //
  // Names
  //

  fn child_name(&self, child: ChildRef) -> &str {
    match child {
      ChildRef::Type(t) => &self.types[t.0].name,
      ChildRef::Enum(e) => &self.enums[e.0].name,
      ChildRef::Field(f) => &self.fields[f.0].name,
      ChildRef::OneOf(o) => &self.oneofs[o.0].name,
    }
  }

  /// Dotted name of a namespace from the root, for diagnostics.
  #[must_use]
  pub fn ns_name(&self, ns: NamespaceRef) -> String {
    match ns {
      NamespaceRef::Root => "<root>".to_string(),
      NamespaceRef::Type(t) => self.type_full_name(t),
    }
  }

  fn type_full_name(&self, id: TypeId) -> String {
    let mut parts = vec![self.types[id.0].name.clone()];
    let mut parent = self.types[id.0].parent;
    while let Some(NamespaceRef::Type(p)) = parent {
      parts.push(self.types[p.0].name.clone());
      parent = self.types[p.0].parent;
    }
    parts.reverse();
    parts.join(".")
  }

  //
  // Namespace operations
  //

  fn members(&self, ns: NamespaceRef) -> &Members {
    match ns {
      NamespaceRef::Root => &self.root,
      NamespaceRef::Type(t) => &self.types[t.0].members,
    }
  }

  fn members_mut(&mut self, ns: NamespaceRef) -> &mut Members {
    match ns {
      NamespaceRef::Root => &mut self.root,
      NamespaceRef::Type(t) => &mut self.types[t.0].members,
    }
  }

  /// Direct child lookup.
  #[must_use]
  pub fn get(&self, ns: NamespaceRef, name: &str) -> Option<ChildRef> {
    self.members(ns).get(name)
  }

  fn parent_of(&self, ns: NamespaceRef) -> Option<NamespaceRef> {
    match ns {
      NamespaceRef::Root => None,
      NamespaceRef::Type(t) => self.types[t.0].parent,
    }
  }

  /// The namespace currently holding `child`, if attached.
  #[must_use]
  pub fn parent_of_child(&self, child: ChildRef) -> Option<NamespaceRef> {
    match child {
      ChildRef::Type(t) => self.types[t.0].parent,
      ChildRef::Enum(e) => self.enums[e.0].parent,
      ChildRef::Field(f) => self.fields[f.0].parent.map(NamespaceRef::Type),
      ChildRef::OneOf(o) => self.oneofs[o.0].parent.map(NamespaceRef::Type),
    }
  }

  fn set_parent(&mut self, child: ChildRef, parent: NamespaceRef) {
    match child {
      ChildRef::Type(t) => self.types[t.0].parent = Some(parent),
      ChildRef::Enum(e) => self.enums[e.0].parent = Some(parent),
      ChildRef::Field(f) => {
        if let NamespaceRef::Type(t) = parent {
          self.fields[f.0].parent = Some(t);
        }
      },
      ChildRef::OneOf(o) => {
        if let NamespaceRef::Type(t) = parent {
          self.oneofs[o.0].parent = Some(t);
        }
      },
    }
  }

  fn clear_parent(&mut self, child: ChildRef) {
    match child {
      ChildRef::Type(t) => self.types[t.0].parent = None,
      ChildRef::Enum(e) => self.enums[e.0].parent = None,
      ChildRef::Field(f) => self.fields[f.0].parent = None,
      ChildRef::OneOf(o) => self.oneofs[o.0].parent = None,
    }
  }

  fn field_id_in_use(&self, ns: TypeId, wire_id: u32) -> bool {
    self
      .types[ns.0]
      .members
      .children
      .iter()
      .any(|&c| matches!(c, ChildRef::Field(f) if self.fields[f.0].id == wire_id))
  }

  /// Attaches a detached child, or re-parents an attached one. Rejected adds leave the graph
  /// unchanged.
  ///
  /// # Errors
  /// `DuplicateName` for a same-named sibling, `DuplicateFieldId` for a tag number already used
  /// by the message, `InvalidDescriptor` for a field or oneof added outside a message type,
  /// `Sealed` after resolution.
  pub fn add(&mut self, parent: NamespaceRef, child: ChildRef) -> Result<()> {
    self.ensure_mutable()?;
    let name = self.child_name(child).to_string();
    if self.get(parent, &name).is_some() {
      return Err(Error::DuplicateName(name, self.ns_name(parent)));
    }
    match child {
      ChildRef::Field(f) => {
        let NamespaceRef::Type(t) = parent else {
          return Err(Error::InvalidDescriptor(format!(
            "field '{name}' may only be added to a message type"
          )));
        };
        if self.field_id_in_use(t, self.fields[f.0].id) {
          return Err(Error::DuplicateFieldId(self.fields[f.0].id, self.ns_name(parent)));
        }
      },
      ChildRef::OneOf(o) => {
        let NamespaceRef::Type(t) = parent else {
          return Err(Error::InvalidDescriptor(format!(
            "oneof '{name}' may only be added to a message type"
          )));
        };
        self.validate_oneof_promotion(t, o)?;
      },
      ChildRef::Type(_) | ChildRef::Enum(_) => {},
    }

    if let Some(previous) = self.parent_of_child(child) {
      self.remove(previous, child)?;
    }
    self.members_mut(parent).insert(name, child);
    self.set_parent(child, parent);
    self.run_on_add(parent, child)
  }

  // Checks that grafting the oneof's owned fields into `target` cannot fail, so the subsequent
  // promotion never leaves a half-attached oneof. Fields held by another message count as
  // pending: re-parenting the oneof releases them first.
  fn validate_oneof_promotion(&self, target: TypeId, oneof: OneOfId) -> Result<()> {
    let mut pending_names: Vec<&str> = Vec::new();
    let mut pending_ids: Vec<u32> = Vec::new();
    for &fid in &self.oneofs[oneof.0].fields {
      let field = &self.fields[fid.0];
      if field.parent == Some(target) {
        continue;
      }
      if self.get(NamespaceRef::Type(target), &field.name).is_some()
        || pending_names.contains(&field.name.as_str())
      {
        return Err(Error::DuplicateName(
          field.name.clone(),
          self.type_full_name(target),
        ));
      }
      if self.field_id_in_use(target, field.id) || pending_ids.contains(&field.id) {
        return Err(Error::DuplicateFieldId(field.id, self.type_full_name(target)));
      }
      pending_names.push(&field.name);
      pending_ids.push(field.id);
    }
    Ok(())
  }

  fn run_on_add(&mut self, parent: NamespaceRef, child: ChildRef) -> Result<()> {
    let ChildRef::OneOf(oneof) = child else {
      return Ok(());
    };
    // Claim declared fields already present on the parent, then re-parent the owned ones that
    // were built against the detached oneof.
    let declared = self.oneofs[oneof.0].declared.clone();
    for field_name in declared {
      if let Some(ChildRef::Field(f)) = self.get(parent, &field_name) {
        if self.fields[f.0].part_of.is_none() {
          self.fields[f.0].part_of = Some(oneof);
          self.oneofs[oneof.0].fields.push(f);
        }
      }
    }
    self.promote_oneof_fields(oneof)
  }

  fn promote_oneof_fields(&mut self, oneof: OneOfId) -> Result<()> {
    let Some(target) = self.oneofs[oneof.0].parent else {
      return Ok(());
    };
    let owned = self.oneofs[oneof.0].fields.clone();
    for fid in owned {
      if self.fields[fid.0].parent.is_none() {
        self.add(NamespaceRef::Type(target), ChildRef::Field(fid))?;
      }
    }
    Ok(())
  }

  /// Detaches a child from its parent namespace.
  ///
  /// # Errors
  /// `NotFound` if `child` is not currently a child of `parent`, `Sealed` after resolution.
  pub fn remove(&mut self, parent: NamespaceRef, child: ChildRef) -> Result<()> {
    self.ensure_mutable()?;
    if self.parent_of_child(child) != Some(parent) {
      return Err(Error::NotFound(
        self.child_name(child).to_string(),
        self.ns_name(parent),
      ));
    }
    self.run_on_remove(child)?;
    let name = self.child_name(child).to_string();
    self.members_mut(parent).remove(&name);
    self.clear_parent(child);
    Ok(())
  }

  fn run_on_remove(&mut self, child: ChildRef) -> Result<()> {
    let ChildRef::OneOf(oneof) = child else {
      return Ok(());
    };
    // Owned fields leave the message with the oneof but stay owned by it, part_of intact.
    let owned = self.oneofs[oneof.0].fields.clone();
    for fid in owned {
      if let Some(t) = self.fields[fid.0].parent {
        self.remove(NamespaceRef::Type(t), ChildRef::Field(fid))?;
      }
    }
    Ok(())
  }

  //
  // OneOf membership
  //

  /// Adds a field to a oneof. The oneof takes ownership; if it is already attached to a message
  /// the field is immediately re-parented into that message, otherwise promotion happens when
  /// the oneof itself is attached.
  pub fn oneof_add(&mut self, oneof: OneOfId, field: FieldId) -> Result<()> {
    self.ensure_mutable()?;
    match self.fields[field.0].part_of {
      Some(o) if o == oneof => return Ok(()),
      Some(_) => {
        return Err(Error::InvalidDescriptor(format!(
          "field '{}' already belongs to a oneof",
          self.fields[field.0].name
        )));
      },
      None => {},
    }
    let target = self.oneofs[oneof.0].parent;
    if let Some(t) = target {
      if self.fields[field.0].parent != Some(t) {
        let field_name = self.fields[field.0].name.clone();
        if self.get(NamespaceRef::Type(t), &field_name).is_some() {
          return Err(Error::DuplicateName(field_name, self.type_full_name(t)));
        }
        if self.field_id_in_use(t, self.fields[field.0].id) {
          return Err(Error::DuplicateFieldId(self.fields[field.0].id, self.type_full_name(t)));
        }
      }
    }
    // A field held by some other message moves out of it first.
    if let Some(p) = self.fields[field.0].parent {
      if target != Some(p) {
        self.remove(NamespaceRef::Type(p), ChildRef::Field(field))?;
      }
    }
    let name = self.fields[field.0].name.clone();
    self.oneofs[oneof.0].declared.push(name);
    self.oneofs[oneof.0].fields.push(field);
    self.fields[field.0].part_of = Some(oneof);
    self.promote_oneof_fields(oneof)
  }

  /// Removes a field from a oneof, detaching it from the enclosing message as well.
  pub fn oneof_remove(&mut self, oneof: OneOfId, field: FieldId) -> Result<()> {
    self.ensure_mutable()?;
    let Some(index) = self.oneofs[oneof.0].fields.iter().position(|&f| f == field) else {
      return Err(Error::NotFound(
        self.fields[field.0].name.clone(),
        self.oneofs[oneof.0].name.clone(),
      ));
    };
    self.oneofs[oneof.0].fields.remove(index);
    let name = self.fields[field.0].name.clone();
    self.oneofs[oneof.0].declared.retain(|n| n != &name);
    if let Some(t) = self.fields[field.0].parent {
      self.remove(NamespaceRef::Type(t), ChildRef::Field(field))?;
    }
    self.fields[field.0].part_of = None;
    Ok(())
  }

  //
  // Enum values
  //

  pub fn add_enum_value(&mut self, id: EnumId, name: &str, number: i32) -> Result<()> {
    self.ensure_mutable()?;
    Self::validate_name(name)?;
    if self.enums[id.0].value_by_name(name).is_some() {
      return Err(Error::DuplicateName(name.to_string(), self.enums[id.0].name.clone()));
    }
    self.enums[id.0].values.push((name.to_string(), number));
    Ok(())
  }

  pub fn remove_enum_value(&mut self, id: EnumId, name: &str) -> Result<()> {
    self.ensure_mutable()?;
    let Some(index) = self.enums[id.0].values.iter().position(|(n, _)| n == name) else {
      return Err(Error::NotFound(name.to_string(), self.enums[id.0].name.clone()));
    };
    self.enums[id.0].values.remove(index);
    Ok(())
  }

  //
  // Lookup
  //

  /// Walks a dotted path from `from` upward until a match, the way field type references
  /// resolve. A leading dot anchors the path at the root.
  #[must_use]
  pub fn lookup(&self, from: NamespaceRef, path: &str) -> Option<ChildRef> {
    if let Some(absolute) = path.strip_prefix('.') {
      return self.lookup_down(NamespaceRef::Root, absolute);
    }
    let mut scope = Some(from);
    while let Some(ns) = scope {
      if let Some(found) = self.lookup_down(ns, path) {
        return Some(found);
      }
      scope = self.parent_of(ns);
    }
    None
  }

  fn lookup_down(&self, ns: NamespaceRef, path: &str) -> Option<ChildRef> {
    let mut current = ns;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
      let child = self.get(current, segment)?;
      if segments.peek().is_none() {
        return Some(child);
      }
      match child {
        ChildRef::Type(t) => current = NamespaceRef::Type(t),
        _ => return None,
      }
    }
    None
  }

  #[must_use]
  pub fn lookup_type(&self, from: NamespaceRef, path: &str) -> Option<TypeId> {
    match self.lookup(from, path) {
      Some(ChildRef::Type(t)) => Some(t),
      _ => None,
    }
  }

  #[must_use]
  pub fn lookup_enum(&self, from: NamespaceRef, path: &str) -> Option<EnumId> {
    match self.lookup(from, path) {
      Some(ChildRef::Enum(e)) => Some(e),
      _ => None,
    }
  }

  //
  // Resolution
  //

  fn field_scope(&self, field: FieldId) -> Option<NamespaceRef> {
    let f = &self.fields[field.0];
    f.parent
      .or_else(|| f.part_of.and_then(|o| self.oneofs[o.0].parent))
      .map(NamespaceRef::Type)
  }

  fn container_default(&self, field: FieldId) -> Option<Value> {
    let f = &self.fields[field.0];
    if f.is_map() {
      Some(Value::Map(Vec::new()))
    } else if f.rule == Rule::Repeated {
      Some(Value::List(Vec::new()))
    } else {
      None
    }
  }

  /// Binds a field's named type reference and derives its default value. Idempotent.
  ///
  /// # Errors
  /// `Resolve` if the named type cannot be found from the field's scope. The field and its
  /// enclosing type remain usable; other fields still resolve.
  pub fn resolve_field(&mut self, field: FieldId) -> Result<()> {
    if self.fields[field.0].resolved {
      return Ok(());
    }
    let kind = self.fields[field.0].kind.clone();
    let (resolved_type, default_value, long) = match kind {
      FieldKind::Scalar(k) => {
        let default = self.container_default(field).unwrap_or_else(|| scalar_zero(k));
        (None, default, k.is_long())
      },
      FieldKind::Named(type_name) => {
        let scope = self.field_scope(field).ok_or_else(|| {
          Error::Resolve(type_name.clone(), "a detached field".to_string())
        })?;
        match self.lookup(scope, &type_name) {
          Some(ChildRef::Enum(e)) => {
            let default = self
              .container_default(field)
              .unwrap_or_else(|| Value::Enum(self.enums[e.0].first_value_number()));
            (Some(ResolvedType::Enum(e)), default, false)
          },
          Some(ChildRef::Type(t)) => {
            let default = self
              .container_default(field)
              .unwrap_or_else(|| Value::Message(Box::new(Instance::detached(t))));
            (Some(ResolvedType::Message(t)), default, false)
          },
          _ => return Err(Error::Resolve(type_name, self.ns_name(scope))),
        }
      },
    };
    let f = &mut self.fields[field.0];
    f.resolved_type = resolved_type;
    f.default_value = Some(default_value);
    f.long = long;
    f.resolved = true;
    log::trace!("resolved field '{}' (id {})", f.name, f.id);
    Ok(())
  }

  /// Resolves every attached field, memoizes the per-type declaration-order arrays and seals the
  /// graph.
  pub fn resolve_all(&mut self) -> Result<()> {
    if self.sealed {
      return Ok(());
    }
    for index in 0 .. self.fields.len() {
      let field = FieldId(index);
      if self.field_scope(field).is_some() {
        self.resolve_field(field)?;
      }
    }
    for index in 0 .. self.types.len() {
      let mut fields_array = Vec::new();
      let mut oneofs_array = Vec::new();
      for &child in &self.types[index].members.children {
        match child {
          ChildRef::Field(f) => fields_array.push(f),
          ChildRef::OneOf(o) => oneofs_array.push(o),
          _ => {},
        }
      }
      let ty = &mut self.types[index];
      ty.field_pos = fields_array.iter().enumerate().map(|(pos, &f)| (f, pos)).collect();
      ty.oneof_pos = oneofs_array.iter().enumerate().map(|(pos, &o)| (o, pos)).collect();
      ty.fields_array = fields_array;
      ty.oneofs_array = oneofs_array;
    }
    self.sealed = true;
    log::debug!(
      "sealed schema: {} types, {} enums, {} fields",
      self.types.len(),
      self.enums.len(),
      self.fields.len()
    );
    Ok(())
  }
}
