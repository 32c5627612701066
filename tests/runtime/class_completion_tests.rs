use ember::runtime::{
    ClassDescriptor, NativeFunction, Procedure, ProcessState, RuntimeError,
    procedure::MemberKind,
};
use insta::assert_snapshot;

fn method(name: &str) -> Procedure {
    Procedure::native(name, vec![], NativeFunction::new(name, |_, _| Ok(())))
}

fn class(name: &str, parent: Option<&str>, variables: &[&str], methods: &[&str]) -> ClassDescriptor {
    let mut class = ClassDescriptor::new(name, parent);
    for variable in variables {
        class.add_variable(*variable).unwrap();
    }
    for name in methods {
        class.add_method(method(name)).unwrap();
    }
    class
}

fn animals() -> ProcessState {
    let mut state = ProcessState::startup();
    state
        .define_global_class(class("Animal", None, &["name"], &["speak"]))
        .unwrap();
    state
        .define_global_class(class("Dog", Some("Animal"), &["breed"], &["bark"]))
        .unwrap();
    state
}

#[test]
fn test_animal_and_dog_layouts() {
    let state = animals();
    let dog = state.complete_class("Dog").unwrap();
    let animal = state.get_class("Animal").unwrap();

    let animal = animal.borrow();
    assert!(animal.is_complete());
    assert_eq!(animal.variable_index("name"), Some(0));
    assert_eq!(animal.member("speak").unwrap().index(), Some(0));

    let dog = dog.borrow();
    assert_eq!(dog.variable_index("name"), Some(0));
    assert_eq!(dog.variable_index("breed"), Some(1));
    assert_eq!(dog.method_index("speak"), Some(0));
    assert_eq!(dog.member("bark").unwrap().index(), Some(1));
    assert_eq!(dog.variable_count(), 2);
    assert_eq!(dog.method_count(), 2);
    assert_eq!(dog.parent().unwrap().borrow().name(), "Animal");
}

#[test]
fn test_describe_completed_layout() {
    let state = animals();
    let dog = state.complete_class("Dog").unwrap();
    assert_snapshot!(dog.borrow().describe(), @r"
    class Dog extends Animal
      variables:
        0 name (Animal)
        1 breed (Dog)
      dispatch:
        0 speak (method, Animal)
        1 bark (method, Dog)
    ");
}

#[test]
fn test_describe_incomplete_class() {
    let state = animals();
    let dog = state.get_class("Dog").unwrap();
    assert_eq!(dog.borrow().describe(), "class Dog extends Animal (incomplete)\n");
}

#[test]
fn test_completion_is_idempotent() {
    let state = animals();
    let dog = state.complete_class("Dog").unwrap();
    let first = dog.borrow().describe();
    state.complete_class("Dog").unwrap();
    state.complete_all().unwrap();
    assert_eq!(dog.borrow().describe(), first);
}

#[test]
fn test_inherited_offsets_survive_two_levels() {
    let mut state = ProcessState::startup();
    state
        .define_global_class(class("Z", None, &["z0", "z1"], &["m"]))
        .unwrap();
    state
        .define_global_class(class("Y", Some("Z"), &["y0"], &[]))
        .unwrap();
    state
        .define_global_class(class("X", Some("Y"), &["x0"], &["m", "n"]))
        .unwrap();
    state.complete_class("X").unwrap();

    for name in ["Z", "Y", "X"] {
        let class = state.get_class(name).unwrap();
        let class = class.borrow();
        assert_eq!(class.variable_index("z0"), Some(0), "{}", name);
        assert_eq!(class.variable_index("z1"), Some(1), "{}", name);
        assert_eq!(class.method_index("m"), Some(0), "{}", name);
    }
    let x = state.get_class("X").unwrap();
    let x = x.borrow();
    assert_eq!(x.variable_index("y0"), Some(2));
    assert_eq!(x.variable_index("x0"), Some(3));
    assert_eq!(x.method_index("n"), Some(1));
}

#[test]
fn test_override_reuses_parent_slot() {
    let mut state = ProcessState::startup();
    state
        .define_global_class(class("Shape", None, &[], &["area", "name"]))
        .unwrap();
    state
        .define_global_class(class("Square", Some("Shape"), &[], &["name"]))
        .unwrap();
    let square = state.complete_class("Square").unwrap();
    let square = square.borrow();

    assert_eq!(square.method_count(), 2);
    let slot = square.lookup_method("name").unwrap();
    assert_eq!(slot.owner, "Square");
    assert_eq!(square.member("name").unwrap().index(), Some(1));
    assert_eq!(square.lookup_method("area").unwrap().owner, "Shape");
}

#[test]
fn test_constructors_share_the_dispatch_space() {
    let mut state = ProcessState::startup();
    let mut point = class("Point", None, &["x", "y"], &["norm"]);
    point.add_constructor(method("init")).unwrap();
    state.define_global_class(point).unwrap();
    let point = state.complete_class("Point").unwrap();
    let point = point.borrow();

    let init = point.member("init").unwrap();
    assert_eq!(init.kind(), MemberKind::Constructor);
    assert_eq!(init.index(), Some(1));
}

#[test]
fn test_extension_cycle_is_detected() {
    let mut state = ProcessState::startup();
    state
        .define_global_class(class("A", Some("B"), &[], &[]))
        .unwrap();
    state
        .define_global_class(class("B", Some("A"), &[], &[]))
        .unwrap();

    let err = state.complete_class("A").unwrap_err();
    assert_eq!(
        err,
        RuntimeError::ExtensionCycle {
            chain: vec!["A".to_string(), "B".to_string(), "A".to_string()]
        }
    );
    assert!(!state.get_class("A").unwrap().borrow().is_complete());
    assert!(!state.get_class("B").unwrap().borrow().is_complete());
}

#[test]
fn test_self_extension_is_a_cycle() {
    let mut state = ProcessState::startup();
    state
        .define_global_class(class("Ouroboros", Some("Ouroboros"), &[], &[]))
        .unwrap();
    assert!(matches!(
        state.complete_class("Ouroboros"),
        Err(RuntimeError::ExtensionCycle { .. })
    ));
}

#[test]
fn test_missing_parent_is_not_found() {
    let mut state = ProcessState::startup();
    state
        .define_global_class(class("Orphan", Some("Missing"), &[], &[]))
        .unwrap();
    assert_eq!(
        state.complete_class("Orphan").unwrap_err(),
        RuntimeError::NotFound("global `Missing`".to_string())
    );
}

#[test]
fn test_duplicate_members_are_rejected() {
    let mut descriptor = ClassDescriptor::new("Cat", None);
    descriptor.add_variable("lives").unwrap();
    assert_eq!(
        descriptor.add_variable("lives"),
        Err(RuntimeError::DuplicateMember {
            class: "Cat".to_string(),
            member: "lives".to_string()
        })
    );
    descriptor.add_method(method("purr")).unwrap();
    assert!(matches!(
        descriptor.add_constructor(method("purr")),
        Err(RuntimeError::DuplicateMember { .. })
    ));
}

#[test]
fn test_completed_class_rejects_new_members() {
    let state = animals();
    let animal = state.complete_class("Animal").unwrap();
    let err = animal.borrow_mut().add_variable("age").unwrap_err();
    assert!(matches!(err, RuntimeError::OperationInvalid(_)));
}
