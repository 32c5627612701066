use std::rc::Rc;

use ember::bytecode::CodeBuilder;
use ember::runtime::{
    NativeFunction, Procedure, RuntimeConfig, RuntimeError, Thread, ThreadId, Value,
    frame::FrameKind,
};

fn interpreted(name: &str) -> Rc<Procedure> {
    let mut builder = CodeBuilder::new(0);
    builder.emit_return_void().unwrap();
    Rc::new(Procedure::interpreted(name, vec![], builder.finish().unwrap()))
}

fn native(name: &str) -> NativeFunction {
    NativeFunction::new(name, |_, _| Ok(()))
}

#[test]
fn test_call_frames_balance() {
    for calls in [0usize, 1, 5, 64] {
        let mut thread = Thread::new(ThreadId::MAIN);
        let start = thread.call_depth();
        for i in 0..calls {
            if i % 2 == 0 {
                thread.begin_procedure_call(i, interpreted("p")).unwrap();
            } else {
                thread.begin_foreign_procedure_call(i, native("n")).unwrap();
            }
        }
        assert_eq!(thread.call_depth(), start + calls);

        for i in (0..calls).rev() {
            let frame = thread.end_call().unwrap();
            assert_eq!(frame.return_ip(), i);
        }
        assert_eq!(thread.call_depth(), start);
        assert_eq!(thread.end_call().unwrap_err(), RuntimeError::CallStackUnderflow);
        assert_eq!(thread.call_depth(), start);
    }
}

#[test]
fn test_frame_kinds_follow_callee() {
    let mut thread = Thread::new(ThreadId(3));
    thread.begin_procedure_call(0, interpreted("outer")).unwrap();
    let frame = thread.begin_foreign_procedure_call(4, native("inner")).unwrap();
    assert_eq!(frame.kind(), FrameKind::Native);
    assert_eq!(frame.callee().name(), "inner");
    assert_eq!(frame.previous(), Some(0));

    assert_eq!(thread.frames()[0].kind(), FrameKind::Interpreted);
    assert_eq!(thread.backtrace(), vec!["inner", "outer"]);
}

#[test]
fn test_call_target_is_recorded() {
    let mut thread = Thread::new(ThreadId::MAIN);
    let frame = thread.begin_procedure_call(12, interpreted("callee")).unwrap();
    assert_eq!(frame.target(), None);
    frame.set_target(5);
    assert_eq!(thread.current_call().unwrap().target(), Some(5));
}

#[test]
fn test_configured_register_bank() {
    let config = RuntimeConfig {
        general_registers: 512,
        parameter_registers: 64,
        ..RuntimeConfig::default()
    };
    let mut thread = Thread::with_config(ThreadId(1), &config);
    assert_eq!(thread.register_capacity(), 512);
    assert_eq!(thread.parameter_capacity(), 64);
    thread.set_register(511, Value::Int32(1)).unwrap();
    assert!(thread.set_register(512, Value::Void).is_err());
    thread.set_parameter(63, Value::Int32(2)).unwrap();
    assert_eq!(thread.parameters(64).unwrap()[63], Value::Int32(2));
    assert!(thread.parameters(65).is_err());
}

#[test]
fn test_saved_registers_travel_with_the_frame() {
    let mut thread = Thread::new(ThreadId::MAIN);
    thread.set_register(0, Value::from("caller")).unwrap();

    let saved = thread.save_registers(1).unwrap();
    thread
        .begin_procedure_call(0, interpreted("callee"))
        .unwrap()
        .attach_registers(saved);
    thread.set_register(0, Value::from("callee")).unwrap();

    let mut frame = thread.end_call().unwrap();
    let saved = frame.take_registers().unwrap();
    thread.restore_registers(saved);
    assert_eq!(thread.register_at(0).unwrap(), &Value::from("caller"));
}

#[test]
fn test_save_window_beyond_bank_fails() {
    let mut thread = Thread::new(ThreadId::MAIN);
    assert_eq!(
        thread.save_registers(257).unwrap_err(),
        RuntimeError::RegisterIndex {
            index: 256,
            capacity: 256
        }
    );
}

#[test]
fn test_thread_id_display() {
    assert_eq!(ThreadId(7).to_string(), "thread#7");
    assert_eq!(Thread::new(ThreadId::MAIN).id(), ThreadId::MAIN);
}
