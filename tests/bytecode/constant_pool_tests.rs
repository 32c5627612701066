use std::rc::Rc;

use ember::bytecode::{CodeBuilder, ConstantPool, Operand};
use ember::runtime::{NativeFunction, RuntimeError, Value};

#[test]
fn test_equal_tag_and_payload_share_an_index() {
    let mut pool = ConstantPool::new();
    let five = pool.get_or_create(5i32).unwrap();
    let seven = pool.get_or_create(7i32).unwrap();
    let five_wide = pool.get_or_create(5i64).unwrap();
    let five_text = pool.get_or_create("5").unwrap();

    assert_eq!(pool.get_or_create(5i32).unwrap(), five);
    assert_eq!((five, seven, five_wide, five_text), (0, 1, 2, 3));
    assert_eq!(pool.len(), 4);
    assert_eq!(pool.get_at(five_wide).unwrap(), &Value::Int64(5));
}

#[test]
fn test_reals_compare_by_bits() {
    let mut pool = ConstantPool::new();
    let nan = pool.get_or_create(f64::NAN).unwrap();
    assert_eq!(pool.get_or_create(f64::NAN).unwrap(), nan);

    let zero = pool.get_or_create(0.0f64).unwrap();
    let negative_zero = pool.get_or_create(-0.0f64).unwrap();
    assert_ne!(zero, negative_zero);
}

#[test]
fn test_natives_are_identified_by_allocation() {
    let mut pool = ConstantPool::new();
    let print = NativeFunction::new("print", |_, _| Ok(()));
    let other = NativeFunction::new("print", |_, _| Ok(()));

    let first = pool.get_or_create(print.clone()).unwrap();
    assert_eq!(pool.get_or_create(print).unwrap(), first);
    assert_ne!(pool.get_or_create(other).unwrap(), first);
}

#[test]
fn test_shared_strings_deduplicate() {
    let mut pool = ConstantPool::new();
    let owned = pool.get_or_create(String::from("name")).unwrap();
    let shared: Rc<str> = Rc::from("name");
    assert_eq!(pool.get_or_create(shared).unwrap(), owned);
}

#[test]
fn test_out_of_range_read() {
    let mut pool = ConstantPool::new();
    pool.get_or_create(true).unwrap();
    assert_eq!(
        pool.get_at(9),
        Err(RuntimeError::ConstantIndex { index: 9, size: 1 })
    );
}

#[test]
fn test_indices_stay_stable_across_growth() {
    let mut pool = ConstantPool::new();
    let indices: Vec<usize> = (0..100i32)
        .map(|n| pool.get_or_create(n).unwrap())
        .collect();
    assert_eq!(indices, (0..100).collect::<Vec<_>>());
    assert!(pool.capacity() >= pool.len());
    assert_eq!(pool.get_or_create(42i32).unwrap(), 42);
}

fn returning(value: i32) -> ember::bytecode::CodeUnit {
    let mut builder = CodeBuilder::new(0);
    let constant = builder.constant(value).unwrap();
    builder.emit_move(0, constant).unwrap();
    builder.emit_return(Operand::Register(0)).unwrap();
    builder.finish().unwrap()
}

#[test]
fn test_fingerprint_follows_contents() {
    assert_eq!(returning(1).fingerprint(), returning(1).fingerprint());
    assert_ne!(returning(1).fingerprint(), returning(2).fingerprint());
    assert_eq!(returning(1).fingerprint_hex().len(), 64);
}
