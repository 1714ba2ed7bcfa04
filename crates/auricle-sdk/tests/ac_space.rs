use auricle_sdk::{AcBuffer, AcDataType, AcError, AcSpace, AcVariable, Complex32, Waveform};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn valid_name() -> impl Strategy<Value = String> {
    "[A-Za-z_][A-Za-z0-9_.:]{0,15}"
}

proptest! {
    #[test]
    fn inserted_variables_are_returned_unchanged(
        name in valid_name(),
        values in prop::collection::vec(-1.0e3f32..1.0e3, 1..32),
    ) {
        let space = AcSpace::new();
        let buffer = AcBuffer::new(values);
        let variable = buffer.variable();
        space.insert(&name, variable.clone()).expect("insert");
        prop_assert_eq!(space.get(&name).expect("get"), variable);
    }

    #[test]
    fn names_with_whitespace_are_always_rejected(
        prefix in "[a-z]{0,6}",
        suffix in "[a-z]{0,6}",
        gap in "[ \t\n]",
        locked in any::<bool>(),
    ) {
        let space = AcSpace::new();
        space.set_locked(locked);
        let buffer = AcBuffer::scalar(1_i32);
        let name = format!("{prefix}{gap}{suffix}");
        prop_assert_eq!(
            space.insert(&name, buffer.variable()),
            Err(AcError::InvalidName(name.clone()))
        );
    }
}

#[test]
fn empty_name_is_rejected_locked_or_not() {
    let space = AcSpace::new();
    let buffer = AcBuffer::scalar(0_i32);
    assert_eq!(
        space.insert("", buffer.variable()),
        Err(AcError::InvalidName(String::new()))
    );
    space.set_locked(true);
    assert_eq!(
        space.insert("", buffer.variable()),
        Err(AcError::InvalidName(String::new()))
    );
}

#[test]
fn erasing_an_absent_name_depends_on_the_lock() {
    let space = AcSpace::new();
    space.erase_by_name("nothing").expect("unlocked erase of absent name");

    space.set_locked(true);
    let err = space
        .erase_by_name("nothing")
        .expect_err("locked erase always fails");
    assert_eq!(
        err,
        AcError::StructuralMutationWhilePrepared {
            operation: "erase",
            names: vec!["nothing".into()],
        }
    );
}

#[test]
fn erase_by_address_removes_every_alias() {
    let space = AcSpace::new();
    let shared = AcBuffer::new(vec![0.0_f32; 8]);
    let other = AcBuffer::scalar(2_i32);
    space.insert("level", shared.variable()).expect("insert");
    space.insert("other", other.variable()).expect("insert");
    space.insert("level_alias", shared.variable()).expect("insert");
    let before = space.entries().len();

    let removed = space.erase_by_address(shared.address()).expect("unlocked");
    assert_eq!(removed, vec!["level".to_string(), "level_alias".to_string()]);
    assert_eq!(space.entries(), vec!["other".to_string()]);
    assert_eq!(before - space.entries().len(), 2);
}

#[test]
fn locked_erase_by_address_removes_nothing_and_names_all_aliases() {
    let space = AcSpace::new();
    let shared = AcBuffer::new(vec![0.0_f32; 8]);
    space.insert("a", shared.variable()).expect("insert");
    space.insert("b", shared.variable()).expect("insert");
    space.set_locked(true);

    let err = space
        .erase_by_address(shared.address())
        .expect_err("sealed");
    match err {
        AcError::StructuralMutationWhilePrepared { names, .. } => {
            assert_eq!(names, vec!["a".to_string(), "b".to_string()])
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(space.entries(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn entries_follow_insertion_order_and_ignore_value_updates() {
    let space = AcSpace::new();
    let first = AcBuffer::scalar(1_i32);
    let second = AcBuffer::scalar(2.5_f64);
    space.insert("zeta", first.variable()).expect("insert");
    space.insert("alpha", second.variable()).expect("insert");

    first.publish(|values| values[0] = 10);
    assert_eq!(space.entries(), vec!["zeta".to_string(), "alpha".to_string()]);
    assert_eq!(space.get_int("zeta").expect("int"), 10);
}

#[test]
fn float_accessor_widens_and_narrows_scalars() {
    let space = AcSpace::new();
    let int = AcBuffer::scalar(3_i32);
    let double = AcBuffer::scalar(0.25_f64);
    let real = AcBuffer::scalar(1.5_f32);
    space.insert("int", int.variable()).expect("insert");
    space.insert("double", double.variable()).expect("insert");
    space
        .insert("float", real.variable().with_data_type(AcDataType::Float))
        .expect("insert");

    assert_eq!(space.get_float("int").expect("int"), 3.0);
    assert_eq!(space.get_float("double").expect("double"), 0.25);
    assert_eq!(space.get_float("float").expect("float"), 1.5);
    assert_eq!(space.get_double("float").expect("float"), 1.5);

    let err = space.get_int("double").expect_err("double is not int");
    assert!(matches!(err, AcError::TypeMismatch { .. }));
}

#[test]
fn scalar_accessors_require_exactly_one_entry() {
    let space = AcSpace::new();
    let buffer = AcBuffer::new(vec![1_i32, 2]);
    space.insert("pair", buffer.variable()).expect("insert");
    let err = space.get_int("pair").expect_err("two entries");
    assert_eq!(err.to_string(), "The variable \"pair\" contains not exactly one entry.");
}

#[test]
fn missing_variable_is_reported_by_name() {
    let space = AcSpace::new();
    assert_eq!(
        space.get("absent"),
        Err(AcError::NoSuchVariable("absent".into()))
    );
}

#[test]
fn waveform_accessor_uses_stride_as_channel_count() {
    let space = AcSpace::new();
    let wave = Waveform::from_interleaved(2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).expect("wave");
    let buffer = AcBuffer::from_waveform(&wave);
    space
        .insert("mic", buffer.waveform_variable(2))
        .expect("insert");

    let view = space.waveform("mic").expect("waveform");
    assert_eq!((view.frames(), view.channels()), (3, 2));
    assert_eq!(view.value(2, 1), 6.0);
    assert_eq!(view.to_waveform(), wave);
}

#[test]
fn waveform_accessor_validates_stride() {
    let space = AcSpace::new();
    let buffer = AcBuffer::new(vec![0.0_f32; 6]);
    space
        .insert("zero", buffer.variable().with_stride(0))
        .expect("insert");
    space
        .insert("ragged", buffer.variable().with_stride(4))
        .expect("insert");
    let empty = AcBuffer::<f32>::new(Vec::new());
    space.insert("empty", empty.variable()).expect("insert");

    let zero = space.waveform("zero").err().expect("zero stride");
    assert_eq!(
        zero.to_string(),
        "The variable \"zero\" has invalid stride settings (0)."
    );
    let ragged = space.waveform("ragged").err().expect("ragged stride");
    assert!(ragged
        .to_string()
        .ends_with("Not an integer fraction of entries."));
    assert!(space.waveform("empty").is_err());
}

#[test]
fn spectrum_accessor_requires_complex_data() {
    let space = AcSpace::new();
    let bins = AcBuffer::new(vec![Complex32::new(1.0, 0.0); 10]);
    let reals = AcBuffer::new(vec![0.0_f32; 10]);
    space
        .insert("spec", bins.spectrum_variable(5))
        .expect("insert");
    space
        .insert("reals", reals.variable().with_stride(5))
        .expect("insert");

    let view = space.spectrum("spec").expect("spectrum");
    assert_eq!((view.bins(), view.channels()), (5, 2));
    assert!(matches!(
        space.spectrum("reals"),
        Err(AcError::TypeMismatch { .. })
    ));
}

#[test]
fn user_values_can_be_published_and_erased_by_address() {
    let space = AcSpace::new();
    let value = std::sync::Arc::new(vec![1_u64, 2, 3]);
    let variable = AcVariable::user(&value);
    let address = variable.address();
    space.insert("table", variable).expect("insert");
    assert_eq!(
        space.get_user::<Vec<u64>>("table").expect("user").len(),
        3
    );
    assert_eq!(
        space.erase_by_address(address).expect("erase"),
        vec!["table".to_string()]
    );
    assert!(space.is_empty());
}
