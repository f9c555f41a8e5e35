//! Behaviour every `Backend` implementation has to share.

use arbor_types::{ClassBean, ContainerDescriptor, Id, RawValue, SingleFeatureKey};

use crate::error::BackendError;
use crate::traits::Backend;
use crate::TransientBackend;

pub(crate) type Factory<'a> = &'a dyn Fn() -> Box<dyn Backend>;

pub(crate) fn run_all(factory: Factory<'_>) {
    containers(factory().as_ref());
    metaclass_first_write_wins(factory().as_ref());
    single_values(factory().as_ref());
    append_and_read(factory().as_ref());
    insert_shifts(factory().as_ref());
    remove_shifts(factory().as_ref());
    move_keeps_order(factory().as_ref());
    clear_is_not_unset(factory().as_ref());
    unset_is_idempotent(factory().as_ref());
    bounds_are_checked(factory().as_ref());
    index_search(factory().as_ref());
    copy_preserves_records(factory().as_ref());
    closed_rejects_calls(factory().as_ref());
}

fn lit(s: &str) -> RawValue {
    RawValue::Literal(s.to_string())
}

fn values(backend: &dyn Backend, key: &SingleFeatureKey) -> Vec<String> {
    backend
        .all_values_of(key)
        .unwrap()
        .into_iter()
        .map(|v| match v {
            RawValue::Literal(s) => s,
            RawValue::Reference(id) => id.to_string(),
        })
        .collect()
}

fn filled(backend: &dyn Backend, items: &[&str]) -> SingleFeatureKey {
    let key = SingleFeatureKey::new(Id::generate(), "items");
    backend
        .append_all_values(&key, items.iter().map(|s| lit(s)).collect())
        .unwrap();
    key
}

fn containers(backend: &dyn Backend) {
    let child = Id::generate();
    let parent = Id::generate();
    assert_eq!(backend.container_of(child).unwrap(), None);
    backend
        .container_for(child, ContainerDescriptor::new(parent, "children"))
        .unwrap();
    assert_eq!(
        backend.container_of(child).unwrap(),
        Some(ContainerDescriptor::new(parent, "children"))
    );
    backend.unset_container(child).unwrap();
    assert_eq!(backend.container_of(child).unwrap(), None);
}

fn metaclass_first_write_wins(backend: &dyn Backend) {
    let id = Id::generate();
    let a = ClassBean::new("A", "urn:t");
    let b = ClassBean::new("B", "urn:t");
    assert!(backend.metaclass_for(id, &a).unwrap());
    assert!(!backend.metaclass_for(id, &b).unwrap());
    assert_eq!(backend.metaclass_of(id).unwrap(), Some(a.clone()));

    match backend.all_instances_of(&[a]) {
        Ok(ids) => assert_eq!(ids, vec![id]),
        Err(e) => assert!(e.is_unsupported()),
    }
}

fn single_values(backend: &dyn Backend) {
    let key = SingleFeatureKey::new(Id::generate(), "name");
    assert!(!backend.has_value(&key).unwrap());
    assert_eq!(backend.value_for(&key, lit("a")).unwrap(), None);
    assert_eq!(backend.value_for(&key, lit("b")).unwrap(), Some(lit("a")));
    assert_eq!(backend.value_of(&key).unwrap(), Some(lit("b")));
    assert!(backend.has_value(&key).unwrap());
    backend.unset_value(&key).unwrap();
    assert_eq!(backend.value_of(&key).unwrap(), None);
    assert!(!backend.has_value(&key).unwrap());
}

fn append_and_read(backend: &dyn Backend) {
    let key = SingleFeatureKey::new(Id::generate(), "items");
    assert_eq!(backend.size_of(&key).unwrap(), None);
    assert_eq!(backend.append_value(&key, lit("a")).unwrap(), 0);
    assert_eq!(backend.append_all_values(&key, vec![lit("b"), lit("c")]).unwrap(), 1);
    assert_eq!(backend.size_of(&key).unwrap(), Some(3));
    assert_eq!(backend.value_at(&key.at(1)).unwrap(), Some(lit("b")));
    assert_eq!(backend.value_at(&key.at(3)).unwrap(), None);
    assert_eq!(values(backend, &key), vec!["a", "b", "c"]);

    let old = backend.set_value_at(&key.at(2), lit("z")).unwrap();
    assert_eq!(old, lit("c"));
    assert_eq!(values(backend, &key), vec!["a", "b", "z"]);
}

fn insert_shifts(backend: &dyn Backend) {
    let key = filled(backend, &["a", "c"]);
    backend.add_value(&key.at(1), lit("b")).unwrap();
    backend.add_value(&key.at(0), lit("_")).unwrap();
    backend.add_value(&key.at(4), lit("d")).unwrap();
    assert_eq!(values(backend, &key), vec!["_", "a", "b", "c", "d"]);
    backend
        .add_all_values(&key.at(2), vec![lit("x"), lit("y")])
        .unwrap();
    assert_eq!(values(backend, &key), vec!["_", "a", "x", "y", "b", "c", "d"]);
}

fn remove_shifts(backend: &dyn Backend) {
    let key = filled(backend, &["a", "b", "c", "d"]);
    assert_eq!(backend.remove_value(&key.at(1)).unwrap(), lit("b"));
    assert_eq!(values(backend, &key), vec!["a", "c", "d"]);
    assert_eq!(backend.remove_value(&key.at(2)).unwrap(), lit("d"));
    assert_eq!(backend.size_of(&key).unwrap(), Some(2));
    assert_eq!(backend.value_at(&key.at(2)).unwrap(), None);
}

fn move_keeps_order(backend: &dyn Backend) {
    let key = filled(backend, &["a", "b", "c", "d"]);
    assert_eq!(backend.move_value(&key.at(0), 2).unwrap(), lit("a"));
    assert_eq!(values(backend, &key), vec!["b", "c", "a", "d"]);
    backend.move_value(&key.at(3), 0).unwrap();
    assert_eq!(values(backend, &key), vec!["d", "b", "c", "a"]);
}

fn clear_is_not_unset(backend: &dyn Backend) {
    let key = filled(backend, &["a", "b"]);
    backend.clear_values(&key).unwrap();
    assert!(backend.has_value(&key).unwrap());
    assert_eq!(backend.size_of(&key).unwrap(), Some(0));

    let never = SingleFeatureKey::new(Id::generate(), "items");
    backend.clear_values(&never).unwrap();
    assert!(backend.has_value(&never).unwrap());
}

fn unset_is_idempotent(backend: &dyn Backend) {
    let key = filled(backend, &["a", "b"]);
    backend.unset_value(&key).unwrap();
    backend.unset_value(&key).unwrap();
    assert!(!backend.has_value(&key).unwrap());
    assert_eq!(backend.size_of(&key).unwrap(), None);
    assert_eq!(backend.value_at(&key.at(0)).unwrap(), None);
    assert!(backend.all_values_of(&key).unwrap().is_empty());
}

fn bounds_are_checked(backend: &dyn Backend) {
    let key = filled(backend, &["a"]);
    assert!(matches!(
        backend.remove_value(&key.at(1)),
        Err(BackendError::IndexOutOfBounds { index: 1, size: 1 })
    ));
    assert!(matches!(
        backend.add_value(&key.at(3), lit("x")),
        Err(BackendError::IndexOutOfBounds { .. })
    ));
    assert!(matches!(
        backend.set_value_at(&key.at(1), lit("x")),
        Err(BackendError::IndexOutOfBounds { .. })
    ));
    assert!(matches!(
        backend.move_value(&key.at(0), 1),
        Err(BackendError::IndexOutOfBounds { .. })
    ));
    assert_eq!(values(backend, &key), vec!["a"]);
}

fn index_search(backend: &dyn Backend) {
    let target = Id::generate();
    let key = SingleFeatureKey::new(Id::generate(), "refs");
    backend
        .append_all_values(
            &key,
            vec![lit("x"), RawValue::Reference(target), lit("x")],
        )
        .unwrap();
    assert_eq!(
        backend.index_of_value(&key, &RawValue::Reference(target)).unwrap(),
        Some(1)
    );
    assert_eq!(backend.index_of_value(&key, &lit("x")).unwrap(), Some(0));
    assert_eq!(backend.last_index_of_value(&key, &lit("x")).unwrap(), Some(2));
    assert_eq!(backend.index_of_value(&key, &lit("y")).unwrap(), None);
}

fn copy_preserves_records(backend: &dyn Backend) {
    let id = Id::generate();
    let parent = Id::generate();
    let class = ClassBean::new("A", "urn:t");
    backend.metaclass_for(id, &class).unwrap();
    backend
        .container_for(id, ContainerDescriptor::new(parent, "children"))
        .unwrap();
    let name = SingleFeatureKey::new(id, "name");
    backend.value_for(&name, lit("n")).unwrap();
    let items = SingleFeatureKey::new(id, "items");
    backend
        .append_all_values(&items, vec![lit("a"), lit("b")])
        .unwrap();
    let empty = SingleFeatureKey::new(id, "empty");
    backend.clear_values(&empty).unwrap();

    let target = TransientBackend::new();
    backend.copy_to(&target).unwrap();
    assert_eq!(target.metaclass_of(id).unwrap(), Some(class));
    assert_eq!(
        target.container_of(id).unwrap(),
        Some(ContainerDescriptor::new(parent, "children"))
    );
    assert_eq!(target.value_of(&name).unwrap(), Some(lit("n")));
    assert_eq!(values(&target, &items), vec!["a", "b"]);
    assert_eq!(target.size_of(&empty).unwrap(), Some(0));
}

fn closed_rejects_calls(backend: &dyn Backend) {
    let key = SingleFeatureKey::new(Id::generate(), "name");
    backend.value_for(&key, lit("a")).unwrap();
    backend.close().unwrap();
    assert!(backend.is_closed());
    assert!(matches!(backend.value_of(&key), Err(BackendError::Closed)));
    assert!(matches!(
        backend.append_value(&key, lit("b")),
        Err(BackendError::Closed)
    ));
    backend.close().unwrap();
}
