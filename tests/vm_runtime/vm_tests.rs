use ember::bytecode::{CodeBuilder, Operand, op_code::OpCode};
use ember::runtime::{
    ClassDescriptor, Procedure, ProcessState, RuntimeConfig, RuntimeError, Value,
};

const R0: Operand = Operand::Register(0);
const R1: Operand = Operand::Register(1);
const R2: Operand = Operand::Register(2);
const R3: Operand = Operand::Register(3);

fn define(state: &mut ProcessState, name: &str, params: &[&str], builder: CodeBuilder) {
    let params = params.iter().map(|p| p.to_string()).collect();
    state
        .define_global_procedure(Procedure::interpreted(
            name,
            params,
            builder.finish().unwrap(),
        ))
        .unwrap();
}

fn countdown_sum(state: &mut ProcessState) {
    let mut b = CodeBuilder::new(1);
    let zero = b.constant(0i32).unwrap();
    let one = b.constant(1i32).unwrap();
    b.emit_move(1, zero).unwrap();
    b.label("loop").unwrap();
    b.emit_binary(OpCode::Greater, 2, R0, zero).unwrap();
    b.emit_jump_unless(R2, "done").unwrap();
    b.emit_binary(OpCode::Add, 1, R1, R0).unwrap();
    b.emit_binary(OpCode::Sub, 0, R0, one).unwrap();
    b.emit_jump("loop").unwrap();
    b.label("done").unwrap();
    b.emit_return(R1).unwrap();
    define(state, "sum", &["n"], b);
}

fn factorial(state: &mut ProcessState) {
    let mut b = CodeBuilder::new(1);
    let one = b.constant(1i64).unwrap();
    let fact = b.constant("fact").unwrap();
    b.emit_binary(OpCode::LessEqual, 1, R0, one).unwrap();
    b.emit_jump_unless(R1, "recurse").unwrap();
    b.emit_return(one).unwrap();
    b.label("recurse").unwrap();
    b.emit_binary(OpCode::Sub, 2, R0, one).unwrap();
    b.emit_invoke(3, fact, &[R2]).unwrap();
    b.emit_binary(OpCode::Mul, 1, R0, R3).unwrap();
    b.emit_return(R1).unwrap();
    define(state, "fact", &["n"], b);
}

fn allocation_loop(state: &mut ProcessState) {
    let mut node = ClassDescriptor::new("Node", None);
    node.add_variable("next").unwrap();
    state.define_global_class(node).unwrap();

    let mut b = CodeBuilder::new(1);
    let zero = b.constant(0i32).unwrap();
    let one = b.constant(1i32).unwrap();
    b.label("loop").unwrap();
    b.emit_binary(OpCode::Greater, 1, R0, zero).unwrap();
    b.emit_jump_unless(R1, "done").unwrap();
    b.emit_new(2, "Node").unwrap();
    b.emit_binary(OpCode::Sub, 0, R0, one).unwrap();
    b.emit_jump("loop").unwrap();
    b.label("done").unwrap();
    b.emit_return(R2).unwrap();
    define(state, "churn", &["n"], b);
}

#[test]
fn test_loop_sums_countdown() {
    let mut state = ProcessState::startup();
    countdown_sum(&mut state);
    assert_eq!(state.run("sum", vec![Value::Int32(4)]).unwrap(), Value::Int32(10));
    assert_eq!(state.run("sum", vec![Value::Int32(0)]).unwrap(), Value::Int32(0));
}

#[test]
fn test_recursive_factorial() {
    let mut state = ProcessState::startup();
    factorial(&mut state);
    assert_eq!(
        state.run("fact", vec![Value::Int64(10)]).unwrap(),
        Value::Int64(3_628_800)
    );
    assert_eq!(state.main_thread().unwrap().call_depth(), 0);
}

#[test]
fn test_arithmetic_overflow_faults() {
    let mut state = ProcessState::startup();
    factorial(&mut state);
    let err = state.run("fact", vec![Value::Int64(25)]).unwrap_err();
    assert!(matches!(err, RuntimeError::ArgumentValue(m) if m.contains("overflow")));
}

#[test]
fn test_argument_count_is_checked_at_entry() {
    let mut state = ProcessState::startup();
    countdown_sum(&mut state);
    assert_eq!(
        state.run("sum", vec![]).unwrap_err(),
        RuntimeError::ArgumentCount {
            callee: "sum".to_string(),
            expected: 1,
            got: 0
        }
    );
}

#[test]
fn test_mixed_operand_types_fault() {
    let mut state = ProcessState::startup();
    countdown_sum(&mut state);
    assert_eq!(
        state.run("sum", vec![Value::Int64(3)]).unwrap_err(),
        RuntimeError::ArgumentType {
            expected: "Int64",
            found: "Int32"
        }
    );
}

#[test]
fn test_instruction_budget_stops_runaway_loops() {
    let config = RuntimeConfig {
        instruction_budget: Some(50),
        ..RuntimeConfig::default()
    };
    let mut state = ProcessState::with_config(config).unwrap();
    countdown_sum(&mut state);
    assert!(state.run("sum", vec![Value::Int32(3)]).is_ok());
    assert!(matches!(
        state.run("sum", vec![Value::Int32(1000)]),
        Err(RuntimeError::OperationFailed(_))
    ));
}

#[test]
fn test_traced_run_produces_same_result() {
    let config = RuntimeConfig {
        trace: true,
        ..RuntimeConfig::default()
    };
    let mut state = ProcessState::with_config(config).unwrap();
    countdown_sum(&mut state);
    assert_eq!(state.run("sum", vec![Value::Int32(3)]).unwrap(), Value::Int32(6));
}

#[test]
fn test_allocation_triggers_collection() {
    let config = RuntimeConfig {
        gc_threshold: 1024,
        ..RuntimeConfig::default()
    };
    let mut state = ProcessState::with_config(config).unwrap();
    allocation_loop(&mut state);

    let last = state.run("churn", vec![Value::Int32(3000)]).unwrap();
    assert!(matches!(last, Value::Object(_)));
    assert_eq!(state.heap().total_allocations(), 3000);
    assert!(state.heap().total_collections() >= 1);
    assert!(state.heap().live_count() < 3000);
}

#[test]
fn test_disabled_collector_keeps_everything() {
    let config = RuntimeConfig {
        gc_enabled: false,
        gc_threshold: 1024,
        ..RuntimeConfig::default()
    };
    let mut state = ProcessState::with_config(config).unwrap();
    allocation_loop(&mut state);

    state.run("churn", vec![Value::Int32(2000)]).unwrap();
    assert_eq!(state.heap().total_collections(), 0);
    assert_eq!(state.heap().live_count(), 2000);
}

#[test]
fn test_new_completes_class_on_first_use() {
    let mut state = ProcessState::startup();
    allocation_loop(&mut state);
    assert!(!state.get_class("Node").unwrap().borrow().is_complete());
    state.run("churn", vec![Value::Int32(1)]).unwrap();
    assert!(state.get_class("Node").unwrap().borrow().is_complete());
}
