use std::{cell::RefCell, rc::Rc};

use ember::runtime::{
    NativeRegistry, ProcessState, RuntimeError, Value, loader::Loader,
};

const ANIMALS: &str = r#"[
  {"kind": "class", "name": "Animal", "variables": ["name"],
   "methods": [
     {"name": "speak", "body": {"code": [
       {"op": "return", "value": {"const": {"string": "..."}}}
     ]}},
     {"name": "greet", "body": {"code": [
       {"op": "invoke_method", "target": 1, "receiver": {"reg": 0}, "method": "speak"},
       {"op": "get_field", "target": 2, "object": {"reg": 0}, "field": "name"},
       {"op": "binary", "operator": "add", "target": 3,
        "left": {"reg": 2}, "right": {"const": {"string": " says "}}},
       {"op": "binary", "operator": "add", "target": 3, "left": {"reg": 3}, "right": {"reg": 1}},
       {"op": "return", "value": {"reg": 3}}
     ]}}
   ],
   "constructors": [
     {"name": "init", "parameters": ["name"], "body": {"code": [
       {"op": "set_field", "object": {"reg": 0}, "field": "name", "value": {"reg": 1}},
       {"op": "return", "value": {"reg": 0}}
     ]}}
   ]},
  {"kind": "class", "name": "Dog", "extends": "Animal", "variables": ["breed"],
   "methods": [
     {"name": "speak", "body": {"code": [
       {"op": "return", "value": {"const": {"string": "Woof"}}}
     ]}}
   ]},
  {"kind": "procedure", "name": "main", "parameters": ["name"], "body": {"code": [
    {"op": "new", "target": 1, "class": "Dog"},
    {"op": "invoke_method", "target": 1, "receiver": {"reg": 1}, "method": "init",
     "args": [{"reg": 0}]},
    {"op": "invoke_method", "target": 2, "receiver": {"reg": 1}, "method": "greet"},
    {"op": "invoke", "target": 3, "callee": {"const": {"string": "print"}}, "args": [{"reg": 2}]},
    {"op": "return", "value": {"reg": 2}}
  ]}}
]"#;

fn recording_natives() -> (NativeRegistry, Rc<RefCell<Vec<String>>>) {
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = lines.clone();
    let mut natives = NativeRegistry::new();
    natives.register("print", move |_, args| {
        let line: Vec<String> = args.iter().map(Value::to_string_value).collect();
        sink.borrow_mut().push(line.join(" "));
        Ok(())
    });
    (natives, lines)
}

fn load(source: &str) -> (ProcessState, Rc<RefCell<Vec<String>>>) {
    let (natives, lines) = recording_natives();
    let mut state = ProcessState::startup();
    Loader::new(&natives)
        .load_json(
            &mut state,
            r#"[{"kind": "procedure", "name": "print", "parameters": ["line"],
                 "body": {"native": "print"}}]"#,
        )
        .unwrap();
    Loader::new(&natives).load_json(&mut state, source).unwrap();
    (state, lines)
}

#[test]
fn test_polymorphic_dispatch_through_inherited_method() {
    let (mut state, lines) = load(ANIMALS);
    state.complete_all().unwrap();

    let result = state.run("main", vec![Value::from("Rex")]).unwrap();
    assert_eq!(result, Value::from("Rex says Woof"));
    assert_eq!(*lines.borrow(), vec!["Rex says Woof".to_string()]);
}

#[test]
fn test_loaded_layouts_match_declarations() {
    let (state, _) = load(ANIMALS);
    let dog = state.complete_class("Dog").unwrap();
    let dog = dog.borrow();
    assert_eq!(dog.variable_index("name"), Some(0));
    assert_eq!(dog.variable_index("breed"), Some(1));
    assert_eq!(dog.method_index("speak"), Some(0));
    assert_eq!(dog.method_index("greet"), Some(1));
    assert_eq!(dog.method_index("init"), Some(2));
    assert_eq!(dog.lookup_method("speak").unwrap().owner, "Dog");
}

#[test]
fn test_hello_world_from_definitions() {
    let (mut state, lines) = load(
        r#"[{"kind": "procedure", "name": "main", "body": {"code": [
              {"op": "invoke", "target": 0,
               "callee": {"const": {"string": "print"}},
               "args": [{"const": {"string": "Hello, World!"}}]},
              {"op": "return"}
           ]}}]"#,
    );
    assert_eq!(state.run("main", vec![]).unwrap(), Value::Void);
    assert_eq!(*lines.borrow(), vec!["Hello, World!".to_string()]);
}

#[test]
fn test_native_literal_is_invoked_directly() {
    let (mut state, lines) = load(
        r#"[{"kind": "procedure", "name": "main", "body": {"code": [
              {"op": "move", "target": 0, "source": {"const": {"native": "print"}}},
              {"op": "invoke", "target": 1, "callee": {"reg": 0},
               "args": [{"const": {"int32": 7}}, {"const": {"bool": true}}]},
              {"op": "return", "value": {"reg": 1}}
           ]}}]"#,
    );
    assert_eq!(state.run("main", vec![]).unwrap(), Value::Void);
    assert_eq!(*lines.borrow(), vec!["7 true".to_string()]);
}

#[test]
fn test_branches_and_labels() {
    let (mut state, _) = load(
        r#"[{"kind": "procedure", "name": "sign", "parameters": ["n"], "body": {"code": [
              {"op": "binary", "operator": "less", "target": 1,
               "left": {"reg": 0}, "right": {"const": {"real": 0.0}}},
              {"op": "jump_if", "condition": {"reg": 1}, "label": "negative"},
              {"op": "return", "value": {"const": {"string": "non-negative"}}},
              {"op": "label", "name": "negative"},
              {"op": "return", "value": {"const": {"string": "negative"}}}
           ]}}]"#,
    );
    assert_eq!(
        state.run("sign", vec![Value::Real(-2.5)]).unwrap(),
        Value::from("negative")
    );
    assert_eq!(
        state.run("sign", vec![Value::Real(1.0)]).unwrap(),
        Value::from("non-negative")
    );
}

#[test]
fn test_raise_reports_message_and_backtrace() {
    let (mut state, _) = load(
        r#"[{"kind": "procedure", "name": "main", "body": {"code": [
              {"op": "raise", "value": {"const": {"string": "bad input"}}}
           ]}}]"#,
    );
    assert_eq!(
        state.run("main", vec![]).unwrap_err(),
        RuntimeError::Raised("bad input".to_string())
    );
    assert_eq!(state.last_backtrace(), ["main"]);
}

#[test]
fn test_duplicate_definition_is_rejected() {
    let (natives, _) = recording_natives();
    let mut state = ProcessState::startup();
    let err = Loader::new(&natives)
        .load_json(
            &mut state,
            r#"[{"kind": "class", "name": "foo"},
                {"kind": "procedure", "name": "foo", "body": {"code": []}}]"#,
        )
        .unwrap_err();
    assert_eq!(err, RuntimeError::AlreadyExists("class `foo`".to_string()));
}

#[test]
fn test_unknown_label_fails_at_load() {
    let (natives, _) = recording_natives();
    let mut state = ProcessState::startup();
    let err = Loader::new(&natives)
        .load_json(
            &mut state,
            r#"[{"kind": "procedure", "name": "main", "body": {"code": [
                  {"op": "jump", "label": "nowhere"}
               ]}}]"#,
        )
        .unwrap_err();
    assert_eq!(err, RuntimeError::ArgumentValue("unknown label `nowhere`".to_string()));
}

#[test]
fn test_empty_code_body_returns_void() {
    let (mut state, _) = load(r#"[{"kind": "procedure", "name": "idle", "body": {"code": []}}]"#);
    assert_eq!(state.run("idle", vec![]).unwrap(), Value::Void);
}

#[test]
fn test_demo_file_runs() {
    let (natives, lines) = recording_natives();
    let mut state = ProcessState::startup();
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/animals.json");
    assert_eq!(Loader::new(&natives).load_file(&mut state, path).unwrap(), 5);
    state.complete_all().unwrap();

    assert_eq!(state.run("main", vec![]).unwrap(), Value::Void);
    assert_eq!(
        *lines.borrow(),
        vec![
            "Hello, World!".to_string(),
            "generic: ...".to_string(),
            "Rex: Woof".to_string()
        ]
    );
}

#[test]
fn test_missing_file_is_an_operation_failure() {
    let (natives, _) = recording_natives();
    let mut state = ProcessState::startup();
    assert!(matches!(
        Loader::new(&natives).load_file(&mut state, "/nonexistent/defs.json"),
        Err(RuntimeError::OperationFailed(_))
    ));
}
