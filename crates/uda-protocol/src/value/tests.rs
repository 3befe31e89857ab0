use rstest::{fixture, rstest};

use super::*;
use crate::types::FieldDescriptor;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn point_layout() -> TypeDescriptor {
    TypeDescriptor::record(
        "point",
        vec![
            FieldDescriptor::new("x", TypeKind::Atomic(Primitive::Float64)),
            FieldDescriptor::new("y", TypeKind::Atomic(Primitive::Float64)),
        ],
    )
}

fn link_layout() -> TypeDescriptor {
    TypeDescriptor::record(
        "link",
        vec![
            FieldDescriptor::new("id", TypeKind::Atomic(Primitive::Int32)),
            FieldDescriptor::new("next", TypeKind::Compound(String::from("link"))),
        ],
    )
}

/// Two segments sharing one end point.
#[fixture]
fn shared_value() -> Value {
    let types = TypeTable::new().with(point_layout()).with(TypeDescriptor::record(
        "segment",
        vec![
            FieldDescriptor::new("from", TypeKind::Compound(String::from("point"))),
            FieldDescriptor::new("to", TypeKind::Compound(String::from("point"))),
        ],
    ));
    let mut ledger = AllocationLedger::new();
    let x = ledger.alloc(Node::scalar(ArrayData::Float64(vec![1.0]))).unwrap();
    let y = ledger.alloc(Node::scalar(ArrayData::Float64(vec![2.0]))).unwrap();
    let shared = ledger.alloc(Node::record("point", vec![Some(x), Some(y)])).unwrap();
    let first = ledger.alloc(Node::record("segment", vec![Some(shared), Some(shared)])).unwrap();
    let second = ledger.alloc(Node::record("segment", vec![Some(shared), None])).unwrap();
    let root = ledger.alloc(Node::list(vec![first, second])).unwrap();
    Value::new(types, ledger, root).unwrap()
}

/// A two-element ring: each link's `next` points at the other.
fn ring(first_id: i32, second_id: i32) -> Value {
    let types = TypeTable::new().with(link_layout());
    let mut ledger = AllocationLedger::new();
    let first_tag = ledger.alloc(Node::scalar(ArrayData::Int32(vec![first_id]))).unwrap();
    let second_tag = ledger.alloc(Node::scalar(ArrayData::Int32(vec![second_id]))).unwrap();
    let first = ledger.alloc(Node::record("link", vec![Some(first_tag), None])).unwrap();
    let second = ledger.alloc(Node::record("link", vec![Some(second_tag), Some(first)])).unwrap();
    let NodeData::Record(record) = ledger.get_mut(first).unwrap().data_mut() else {
        panic!("first link is a record");
    };
    assert!(record.set_field(1, Some(second)));
    Value::new(types, ledger, first).unwrap()
}

// ---------------------------------------------------------------------------
// Construction and validation
// ---------------------------------------------------------------------------

#[rstest]
fn shared_children_are_stored_once(shared_value: Value) {
    assert_eq!(shared_value.allocation_count(), 6);
    assert_eq!(shared_value.kind(), TypeKind::List);
    assert_eq!(shared_value.shape(), &[2]);
}

#[test]
fn cyclic_graph_is_accepted() {
    let value = ring(1, 2);
    assert_eq!(value.kind(), TypeKind::Compound(String::from("link")));
    let next = value.field("next").expect("next link");
    assert_eq!(next.kind(), TypeKind::Compound(String::from("link")));
}

#[test]
fn unknown_layout_is_rejected() {
    let mut ledger = AllocationLedger::new();
    let root = ledger.alloc(Node::record("missing", Vec::new())).unwrap();
    let error = Value::new(TypeTable::new(), ledger, root).unwrap_err();
    assert_eq!(
        error,
        ValueError::UnknownLayout {
            layout: String::from("missing")
        }
    );
}

#[test]
fn field_count_must_match_layout() {
    let mut ledger = AllocationLedger::new();
    let root = ledger.alloc(Node::record("point", vec![None])).unwrap();
    let error = Value::new(TypeTable::new().with(point_layout()), ledger, root).unwrap_err();
    assert!(matches!(error, ValueError::FieldCount { expected: 2, found: 1, .. }));
}

#[test]
fn field_kind_must_match_layout() {
    let mut ledger = AllocationLedger::new();
    let wrong = ledger.alloc(Node::string("north")).unwrap();
    let root = ledger.alloc(Node::record("point", vec![Some(wrong), None])).unwrap();
    let error = Value::new(TypeTable::new().with(point_layout()), ledger, root).unwrap_err();
    assert!(matches!(error, ValueError::FieldKind { ref field, .. } if field == "x"));
}

#[test]
fn dangling_child_is_rejected() {
    let mut ledger = AllocationLedger::new();
    let root = ledger.alloc(Node::list(vec![NodeId::from_index(9)])).unwrap();
    let error = Value::new(TypeTable::new(), ledger, root).unwrap_err();
    assert_eq!(error, ValueError::DanglingNode { parent: 0, child: 9 });
}

#[rstest]
#[case::too_few(vec![2, 3], 5)]
#[case::scalar_with_two(Vec::new(), 2)]
fn shape_must_match_payload(#[case] shape: Vec<u64>, #[case] elements: usize) {
    let node = Node::shaped(ArrayData::Int8(vec![0; elements]), shape);
    assert!(matches!(
        Value::from_node(node),
        Err(ValueError::ShapeMismatch { .. })
    ));
}

#[test]
fn error_array_must_match_element_count() {
    let value = Value::array(ArrayData::Float32(vec![1.0, 2.0])).unwrap();
    let error = value.with_errors(ArrayData::Float32(vec![0.1])).unwrap_err();
    assert_eq!(error, ValueError::ErrorShape { expected: 2, found: 1 });
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

#[test]
fn accessors_report_root_metadata() {
    let value = Value::from_node(Node::shaped(
        ArrayData::Int16(vec![1, 2, 3, 4, 5, 6]),
        vec![2, 3],
    ))
    .unwrap()
    .with_label("Plasma current")
    .with_units("kA")
    .with_description("two by three");

    assert_eq!(value.rank(), 2);
    assert_eq!(value.count(), 6);
    assert_eq!(value.label(), Some("Plasma current"));
    assert_eq!(value.units(), Some("kA"));
    assert_eq!(value.description(), Some("two by three"));
    let descriptor = value.descriptor();
    assert_eq!(descriptor.kind(), &TypeKind::Atomic(Primitive::Int16));
    assert_eq!(descriptor.element_size(), 2);
    assert_eq!(
        value.cast(Primitive::Float64),
        Some(ArrayData::Float64(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))
    );
    assert_eq!(value.raw_bytes().map(|bytes| bytes.len()), Some(12));
}

#[test]
fn float_casts_truncate_toward_zero_then_wrap() {
    let floats = ArrayData::Float64(vec![2.9, -1.7, 300.5]);
    assert_eq!(floats.cast(Primitive::Int16), ArrayData::Int16(vec![2, -1, 300]));
    assert_eq!(floats.cast(Primitive::UInt8), ArrayData::UInt8(vec![2, 255, 44]));
}

#[test]
fn byte_value_is_uint8_array() {
    let value = Value::bytes(vec![9, 8, 7]).unwrap();
    assert_eq!(value.kind(), TypeKind::Atomic(Primitive::UInt8));
    assert_eq!(value.count(), 3);
    assert_eq!(value.as_array(), Some(&ArrayData::UInt8(vec![9, 8, 7])));
    assert!(value.as_text().is_none());
}

// ---------------------------------------------------------------------------
// Structural equality
// ---------------------------------------------------------------------------

#[rstest]
fn clone_is_structurally_equal(shared_value: Value) {
    let copy = shared_value.clone();
    assert_eq!(copy, shared_value);
}

#[rstest]
fn sharing_is_part_of_structure(shared_value: Value) {
    // Same shape and payload, but the first segment's ends are distinct nodes.
    let types = shared_value.types().clone();
    let mut ledger = AllocationLedger::new();
    let x = ledger.alloc(Node::scalar(ArrayData::Float64(vec![1.0]))).unwrap();
    let y = ledger.alloc(Node::scalar(ArrayData::Float64(vec![2.0]))).unwrap();
    let from = ledger.alloc(Node::record("point", vec![Some(x), Some(y)])).unwrap();
    let to = ledger.alloc(Node::record("point", vec![Some(x), Some(y)])).unwrap();
    let first = ledger.alloc(Node::record("segment", vec![Some(from), Some(to)])).unwrap();
    let second = ledger.alloc(Node::record("segment", vec![Some(from), None])).unwrap();
    let root = ledger.alloc(Node::list(vec![first, second])).unwrap();
    let unshared = Value::new(types, ledger, root).unwrap();

    assert_ne!(unshared, shared_value);
}

#[test]
fn cycles_compare_without_looping() {
    assert_eq!(ring(1, 2), ring(1, 2));
    assert_ne!(ring(1, 2), ring(1, 3));
}

#[test]
fn metadata_participates_in_equality() {
    let plain = Value::text("x").unwrap();
    let labelled = Value::text("x").unwrap().with_label("name");
    assert_ne!(plain, labelled);
}
