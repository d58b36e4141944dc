// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

pub mod descriptor;
pub mod instance;
pub mod schema;
pub mod value;

pub use crate::instance::Instance;
pub use crate::schema::{
  ChildRef,
  EnumId,
  EnumType,
  Field,
  FieldId,
  FieldKind,
  FieldSpec,
  MessageType,
  NamespaceRef,
  OneOf,
  OneOfId,
  Options,
  ResolvedType,
  Rule,
  Schema,
  TypeId,
};
pub use crate::value::{MapKey, Value};

#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("duplicate name '{0}' in {1}")]
  DuplicateName(String, String),

  #[error("duplicate field id {0} in {1}")]
  DuplicateFieldId(u32, String),

  #[error("'{0}' is not a member of {1}")]
  NotFound(String, String),

  #[error("unresolvable type reference '{0}' from {1}")]
  Resolve(String, String),

  #[error("invalid descriptor: {0}")]
  InvalidDescriptor(String),

  #[error("schema is sealed against further mutation")]
  Sealed,

  #[error("schema is not resolved; call resolve_all first")]
  Unresolved,

  #[error("value does not fit field '{0}': {1}")]
  ValueType(String, String),
}

pub type Result<T> = std::result::Result<T, Error>;
