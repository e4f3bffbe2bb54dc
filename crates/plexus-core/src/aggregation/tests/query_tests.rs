use std::sync::Arc;

use crate::aggregation::{query, query_aggregate, query_all, query_all_aggregate, Aggregate, Component};

trait Find: Send + Sync {
    fn origin(&self) -> &'static str;
}

trait Replace: Send + Sync {
    fn origin(&self) -> &'static str;
}

struct Named(&'static str);

impl Find for Named {
    fn origin(&self) -> &'static str {
        self.0
    }
}

impl Replace for Named {
    fn origin(&self) -> &'static str {
        self.0
    }
}

fn finder(name: &'static str) -> Component {
    Component::builder(name).provide::<dyn Find>(Arc::new(Named(name))).build()
}

fn replacer(name: &'static str) -> Component {
    Component::builder(name).provide::<dyn Replace>(Arc::new(Named(name))).build()
}

#[test]
fn test_query_standalone_component() {
    let component = finder("lonely");
    assert_eq!(query::<dyn Find>(&component).unwrap().origin(), "lonely");
    assert!(query::<dyn Replace>(&component).is_none());
    assert_eq!(query_all::<dyn Find>(&component).len(), 1);
    assert!(query_all::<dyn Replace>(&component).is_empty());
}

#[test]
fn test_query_reaches_siblings() {
    let find = finder("find");
    let replace = replacer("replace");
    let aggregate = Aggregate::new();
    aggregate.add(&find).unwrap();
    aggregate.add(&replace).unwrap();

    assert_eq!(query::<dyn Replace>(&find).unwrap().origin(), "replace");
    assert_eq!(query::<dyn Find>(&replace).unwrap().origin(), "find");
}

#[test]
fn test_own_capability_wins() {
    let first = finder("first");
    let second = finder("second");
    let aggregate = Aggregate::new();
    aggregate.add(&first).unwrap();
    aggregate.add(&second).unwrap();

    assert_eq!(query::<dyn Find>(&second).unwrap().origin(), "second");
    let all: Vec<&'static str> = query_all::<dyn Find>(&second).iter().map(|f| f.origin()).collect();
    assert_eq!(all, vec!["first", "second"]);
}

#[test]
fn test_concrete_type_capability() {
    let named = Arc::new(Named("concrete"));
    let component = Component::builder("concrete").provide::<Named>(named.clone()).build();

    let found = query::<Named>(&component).unwrap();
    assert!(Arc::ptr_eq(&found, &named));
    assert!(component.provides::<Named>());
    assert!(!component.provides::<dyn Find>());
}

#[test]
fn test_provide_twice_keeps_last() {
    let component = Component::builder("twice")
        .provide::<dyn Find>(Arc::new(Named("old")))
        .provide::<dyn Find>(Arc::new(Named("new")))
        .build();

    assert_eq!(component.capability_names().len(), 1);
    assert_eq!(component.capability::<dyn Find>().unwrap().origin(), "new");
}

#[test]
fn test_query_optional_aggregate() {
    assert!(query_aggregate::<dyn Find>(None).is_none());
    assert!(query_all_aggregate::<dyn Find>(None).is_empty());

    let component = finder("in aggregate");
    let aggregate = Aggregate::new();
    aggregate.add(&component).unwrap();

    assert_eq!(query_aggregate::<dyn Find>(Some(&aggregate)).unwrap().origin(), "in aggregate");
    assert_eq!(query_all_aggregate::<dyn Find>(Some(&aggregate)).len(), 1);
    assert!(query_aggregate::<dyn Replace>(Some(&aggregate)).is_none());
}

#[test]
fn test_query_after_sibling_dropped() {
    let find = finder("find");
    let replace = replacer("replace");
    let aggregate = Aggregate::new();
    aggregate.add(&find).unwrap();
    aggregate.add(&replace).unwrap();

    drop(replace);

    assert!(query::<dyn Replace>(&find).is_none());
    assert_eq!(aggregate.len(), 1);
}
