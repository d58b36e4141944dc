// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

//
// WireType
//

/// The 3-bit on-wire framing classifier carried in every field tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
  Varint = 0,
  Fixed64 = 1,
  LengthDelimited = 2,
  Fixed32 = 5,
}

//
// ScalarKind
//

/// The scalar field kinds of the Protocol Buffers type system. Named types (messages and enums)
/// are not scalar kinds; enums travel as varints and messages as length-delimited regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
  Double,
  Float,
  Int32,
  Int64,
  Uint32,
  Uint64,
  Sint32,
  Sint64,
  Fixed32,
  Fixed64,
  Sfixed32,
  Sfixed64,
  Bool,
  String,
  Bytes,
}

impl ScalarKind {
  /// The wire type a singular field of this kind is framed with.
  #[must_use]
  pub const fn wire_type(self) -> WireType {
    match self {
      Self::Int32
      | Self::Int64
      | Self::Uint32
      | Self::Uint64
      | Self::Sint32
      | Self::Sint64
      | Self::Bool => WireType::Varint,
      Self::Fixed64 | Self::Sfixed64 | Self::Double => WireType::Fixed64,
      Self::String | Self::Bytes => WireType::LengthDelimited,
      Self::Fixed32 | Self::Sfixed32 | Self::Float => WireType::Fixed32,
    }
  }

  /// Whether a repeated field of this kind may use the packed representation. All numeric kinds
  /// and bool pack; strings and bytes never do.
  #[must_use]
  pub const fn is_packable(self) -> bool {
    !matches!(self, Self::String | Self::Bytes)
  }

  /// Whether this kind may serve as a map key. Floating point kinds and bytes are excluded by the
  /// wire format.
  #[must_use]
  pub const fn is_map_key(self) -> bool {
    !matches!(self, Self::Double | Self::Float | Self::Bytes)
  }

  /// 64-bit integer kinds, which force strict comparison against the field default.
  #[must_use]
  pub const fn is_long(self) -> bool {
    matches!(
      self,
      Self::Int64 | Self::Uint64 | Self::Sint64 | Self::Fixed64 | Self::Sfixed64
    )
  }

  /// The kind's name as it appears in schema descriptors.
  #[must_use]
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Double => "double",
      Self::Float => "float",
      Self::Int32 => "int32",
      Self::Int64 => "int64",
      Self::Uint32 => "uint32",
      Self::Uint64 => "uint64",
      Self::Sint32 => "sint32",
      Self::Sint64 => "sint64",
      Self::Fixed32 => "fixed32",
      Self::Fixed64 => "fixed64",
      Self::Sfixed32 => "sfixed32",
      Self::Sfixed64 => "sfixed64",
      Self::Bool => "bool",
      Self::String => "string",
      Self::Bytes => "bytes",
    }
  }

  /// Parses a descriptor type name. Returns None for named type references.
  #[must_use]
  pub fn from_name(name: &str) -> Option<Self> {
    Some(match name {
      "double" => Self::Double,
      "float" => Self::Float,
      "int32" => Self::Int32,
      "int64" => Self::Int64,
      "uint32" => Self::Uint32,
      "uint64" => Self::Uint64,
      "sint32" => Self::Sint32,
      "sint64" => Self::Sint64,
      "fixed32" => Self::Fixed32,
      "fixed64" => Self::Fixed64,
      "sfixed32" => Self::Sfixed32,
      "sfixed64" => Self::Sfixed64,
      "bool" => Self::Bool,
      "string" => Self::String,
      "bytes" => Self::Bytes,
      _ => return None,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wire_types_match_the_encoding_spec() {
    assert_eq!(ScalarKind::Int32.wire_type(), WireType::Varint);
    assert_eq!(ScalarKind::Sint64.wire_type(), WireType::Varint);
    assert_eq!(ScalarKind::Bool.wire_type(), WireType::Varint);
    assert_eq!(ScalarKind::Fixed64.wire_type(), WireType::Fixed64);
    assert_eq!(ScalarKind::Double.wire_type(), WireType::Fixed64);
    assert_eq!(ScalarKind::String.wire_type(), WireType::LengthDelimited);
    assert_eq!(ScalarKind::Bytes.wire_type(), WireType::LengthDelimited);
    assert_eq!(ScalarKind::Float.wire_type(), WireType::Fixed32);
    assert_eq!(ScalarKind::Sfixed32.wire_type(), WireType::Fixed32);
  }

  #[test]
  fn packability_and_key_eligibility() {
    assert!(ScalarKind::Int32.is_packable());
    assert!(ScalarKind::Double.is_packable());
    assert!(ScalarKind::Bool.is_packable());
    assert!(!ScalarKind::String.is_packable());
    assert!(!ScalarKind::Bytes.is_packable());

    assert!(ScalarKind::String.is_map_key());
    assert!(ScalarKind::Uint64.is_map_key());
    assert!(ScalarKind::Bool.is_map_key());
    assert!(!ScalarKind::Double.is_map_key());
    assert!(!ScalarKind::Bytes.is_map_key());
  }

  #[test]
  fn name_round_trip() {
    for kind in [
      ScalarKind::Double,
      ScalarKind::Float,
      ScalarKind::Int32,
      ScalarKind::Int64,
      ScalarKind::Uint32,
      ScalarKind::Uint64,
      ScalarKind::Sint32,
      ScalarKind::Sint64,
      ScalarKind::Fixed32,
      ScalarKind::Fixed64,
      ScalarKind::Sfixed32,
      ScalarKind::Sfixed64,
      ScalarKind::Bool,
      ScalarKind::String,
      ScalarKind::Bytes,
    ] {
      assert_eq!(ScalarKind::from_name(kind.as_str()), Some(kind));
    }
    assert_eq!(ScalarKind::from_name("Message"), None);
  }
}
