// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::test::{encode_hex, root_type, sealed_schema};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn required_scalar_emits_and_default_optional_elides() {
  let schema = sealed_schema(&json!({
    "nested": {
      "M": {
        "fields": {
          "a": {"rule": "required", "type": "int32", "id": 1},
          "b": {"type": "string", "id": 2},
        },
      },
    },
  }));
  let m = root_type(&schema, "M");
  let instance = schema.create_from_json(m, &json!({"a": 150, "b": ""})).unwrap();
  assert_eq!(encode_hex(&schema, &instance), "08 96 01");
}

#[test]
fn required_fields_emit_their_defaults() {
  let schema = sealed_schema(&json!({
    "nested": {
      "M": {"fields": {"a": {"rule": "required", "type": "int32", "id": 1}}},
    },
  }));
  let m = root_type(&schema, "M");
  let instance = schema.create(m).unwrap();
  assert_eq!(encode_hex(&schema, &instance), "08 00");
}

#[test]
fn an_all_default_message_encodes_to_nothing() {
  let schema = sealed_schema(&json!({
    "nested": {
      "M": {
        "fields": {
          "a": {"type": "int32", "id": 1},
          "b": {"type": "string", "id": 2},
          "c": {"type": "bool", "id": 3},
          "xs": {"rule": "repeated", "type": "int32", "id": 4},
          "m": {"keyType": "string", "type": "int32", "id": 5},
        },
      },
    },
  }));
  let m = root_type(&schema, "M");
  let instance = schema
    .create_from_json(m, &json!({"a": 0, "b": "", "c": false, "xs": [], "m": {}}))
    .unwrap();
  assert_eq!(encode_hex(&schema, &instance), "");
}

#[test]
fn oneof_encode_emits_the_last_set_member() {
  let schema = sealed_schema(&json!({
    "nested": {
      "M": {
        "oneofs": {"x": {"oneof": ["p", "q"]}},
        "fields": {
          "p": {"type": "int32", "id": 1},
          "q": {"type": "string", "id": 2},
        },
      },
    },
  }));
  let m = root_type(&schema, "M");
  let mut instance = schema.create(m).unwrap();
  instance
    .set(&schema, "p", Some(bd_pb_reflect::Value::I32(5)))
    .unwrap();
  instance
    .set(&schema, "q", Some(bd_pb_reflect::Value::String("hi".to_string())))
    .unwrap();
  assert_eq!(
    instance.get(&schema, "p").unwrap(),
    &bd_pb_reflect::Value::I32(0)
  );
  assert_eq!(instance.which_oneof(&schema, "x").unwrap(), Some("q"));
  assert_eq!(encode_hex(&schema, &instance), "12 02 68 69");
}

#[test]
fn packed_repeated_concatenates_elements() {
  let schema = sealed_schema(&json!({
    "nested": {
      "M": {"fields": {"xs": {"rule": "repeated", "type": "int32", "id": 3}}},
    },
  }));
  let m = root_type(&schema, "M");
  let instance = schema.create_from_json(m, &json!({"xs": [1, 2, 150]})).unwrap();
  assert_eq!(encode_hex(&schema, &instance), "1a 04 01 02 96 01");
}

#[test]
fn unpacked_repeated_tags_every_element() {
  let schema = sealed_schema(&json!({
    "nested": {
      "M": {
        "fields": {
          "xs": {"rule": "repeated", "type": "int32", "id": 4, "options": {"packed": false}},
          "names": {"rule": "repeated", "type": "string", "id": 5},
        },
      },
    },
  }));
  let m = root_type(&schema, "M");
  let instance = schema
    .create_from_json(m, &json!({"xs": [1, 150], "names": ["a", "b"]}))
    .unwrap();
  assert_eq!(
    encode_hex(&schema, &instance),
    "20 01 20 96 01 2a 01 61 2a 01 62"
  );
}

#[test]
fn string_map_entries_frame_key_and_value() {
  let schema = sealed_schema(&json!({
    "nested": {
      "M": {"fields": {"m": {"keyType": "string", "type": "int32", "id": 7}}},
    },
  }));
  let m = root_type(&schema, "M");
  let instance = schema.create_from_json(m, &json!({"m": {"a": 1}})).unwrap();
  assert_eq!(encode_hex(&schema, &instance), "3a 05 0a 01 61 10 01");
}

#[test]
fn map_keys_follow_their_kind_and_insertion_order() {
  let schema = sealed_schema(&json!({
    "nested": {
      "M": {
        "fields": {
          "by_number": {"keyType": "int64", "type": "string", "id": 1},
          "by_flag": {"keyType": "bool", "type": "int32", "id": 2},
        },
      },
    },
  }));
  let m = root_type(&schema, "M");
  let instance = schema
    .create_from_json(
      m,
      &json!({"by_number": {"5": "x"}, "by_flag": {"true": 1, "false": 2}}),
    )
    .unwrap();
  assert_eq!(
    encode_hex(&schema, &instance),
    "0a 05 08 05 12 01 78 12 04 08 01 10 01 12 04 08 00 10 02"
  );
}

#[test]
fn message_map_values_nest_a_length_delimited_region() {
  let schema = sealed_schema(&json!({
    "nested": {
      "Inner": {"fields": {"a": {"type": "int32", "id": 1}}},
      "M": {"fields": {"m": {"keyType": "string", "type": "Inner", "id": 1}}},
    },
  }));
  let m = root_type(&schema, "M");
  let instance = schema.create_from_json(m, &json!({"m": {"k": {"a": 1}}})).unwrap();
  assert_eq!(encode_hex(&schema, &instance), "0a 07 0a 01 6b 12 02 08 01");
}

#[test]
fn nested_messages_emit_on_presence() {
  let schema = sealed_schema(&json!({
    "nested": {
      "Inner": {"fields": {"a": {"type": "int32", "id": 1}}},
      "Outer": {"fields": {"inner": {"type": "Inner", "id": 1}}},
    },
  }));
  let outer = root_type(&schema, "Outer");

  let unset = schema.create(outer).unwrap();
  assert_eq!(encode_hex(&schema, &unset), "");

  let empty = schema.create_from_json(outer, &json!({"inner": {}})).unwrap();
  assert_eq!(encode_hex(&schema, &empty), "0a 00");

  let set = schema
    .create_from_json(outer, &json!({"inner": {"a": 150}}))
    .unwrap();
  assert_eq!(encode_hex(&schema, &set), "0a 03 08 96 01");
}

#[test]
fn a_required_message_emits_its_default_recursively() {
  let schema = sealed_schema(&json!({
    "nested": {
      "Inner": {"fields": {"score": {"rule": "required", "type": "sint32", "id": 1}}},
      "Outer": {"fields": {"inner": {"rule": "required", "type": "Inner", "id": 1}}},
    },
  }));
  let outer = root_type(&schema, "Outer");
  let instance = schema.create(outer).unwrap();
  assert_eq!(encode_hex(&schema, &instance), "0a 02 08 00");
}

#[test]
fn enum_fields_elide_the_first_declared_value() {
  let schema = sealed_schema(&json!({
    "nested": {
      "E": {"values": {"A": 1, "B": 2}},
      "M": {"fields": {"e": {"type": "E", "id": 1}}},
    },
  }));
  let m = root_type(&schema, "M");

  let at_default = schema.create_from_json(m, &json!({"e": "A"})).unwrap();
  assert_eq!(encode_hex(&schema, &at_default), "");

  let set = schema.create_from_json(m, &json!({"e": "B"})).unwrap();
  assert_eq!(encode_hex(&schema, &set), "08 02");
}

#[test]
fn negative_enum_numbers_sign_extend() {
  let schema = sealed_schema(&json!({
    "nested": {
      "E": {"values": {"ZERO": 0, "NEG": -1}},
      "M": {"fields": {"e": {"type": "E", "id": 1}}},
    },
  }));
  let m = root_type(&schema, "M");
  let instance = schema.create_from_json(m, &json!({"e": "NEG"})).unwrap();
  assert_eq!(
    encode_hex(&schema, &instance),
    "08 ff ff ff ff ff ff ff ff ff 01"
  );
}

#[test]
fn scalar_kinds_use_their_wire_framing() {
  let schema = sealed_schema(&json!({
    "nested": {
      "M": {
        "fields": {
          "d": {"type": "double", "id": 1},
          "f": {"type": "float", "id": 2},
          "s": {"type": "sint32", "id": 3},
          "fx": {"type": "fixed32", "id": 4},
          "payload": {"type": "bytes", "id": 5},
        },
      },
    },
  }));
  let m = root_type(&schema, "M");
  let instance = schema
    .create_from_json(
      m,
      &json!({"d": 1.0, "f": 1.5, "s": -1, "fx": 1, "payload": [1, 2]}),
    )
    .unwrap();
  assert_eq!(
    encode_hex(&schema, &instance),
    "09 00 00 00 00 00 00 f0 3f 15 00 00 c0 3f 18 01 25 01 00 00 00 2a 02 01 02"
  );
}

#[test]
fn sixty_four_bit_extremes_encode_canonically() {
  let schema = sealed_schema(&json!({
    "nested": {
      "M": {
        "fields": {
          "u": {"type": "uint64", "id": 1},
          "i": {"type": "int64", "id": 2},
        },
      },
    },
  }));
  let m = root_type(&schema, "M");
  let instance = schema
    .create_from_json(m, &json!({"u": u64::MAX, "i": i64::MIN}))
    .unwrap();
  assert_eq!(
    encode_hex(&schema, &instance),
    "08 ff ff ff ff ff ff ff ff ff 01 10 80 80 80 80 80 80 80 80 80 01"
  );
}

#[test]
fn fields_emit_in_declaration_order_not_id_order() {
  let schema = sealed_schema(&json!({
    "nested": {
      "M": {
        "fields": {
          "b": {"type": "string", "id": 2},
          "a": {"type": "int32", "id": 1},
        },
      },
    },
  }));
  let m = root_type(&schema, "M");
  let instance = schema.create_from_json(m, &json!({"b": "x", "a": 1})).unwrap();
  assert_eq!(encode_hex(&schema, &instance), "12 01 78 08 01");
}

#[test]
fn large_field_ids_spill_into_multi_byte_tags() {
  let schema = sealed_schema(&json!({
    "nested": {
      "M": {"fields": {"a": {"type": "int32", "id": 300}}},
    },
  }));
  let m = root_type(&schema, "M");
  let instance = schema.create_from_json(m, &json!({"a": 1})).unwrap();
  assert_eq!(encode_hex(&schema, &instance), "e0 12 01");
}

#[test]
fn non_ascii_strings_emit_utf8_bytes() {
  let schema = sealed_schema(&json!({
    "nested": {
      "M": {"fields": {"s": {"type": "string", "id": 1}}},
    },
  }));
  let m = root_type(&schema, "M");
  let instance = schema.create_from_json(m, &json!({"s": "é"})).unwrap();
  assert_eq!(encode_hex(&schema, &instance), "0a 02 c3 a9");
}
