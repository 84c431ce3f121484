//! End-to-end model behaviour over a scripted REST transport.
//!
//! Covers:
//! - POST for new records, PATCH with only the delta for keyed ones
//! - listing through `ModelClass::all` reconciling with the identity cache
//! - REST failures surfacing as errors without publishing anything
//! - `Deleted` reaching instance, class and collection exactly once

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use fundle_core::{
    ApiClient, ApiError, ApiRequest, ApiResponse, ChangeKind, Collection, FieldKind, Method,
    ModelClass, ModelError, ModelSchema, Registry, Value,
};
use pretty_assertions::assert_eq;
use serde_json::json;

// =============================================================================
// Scripted transport
// =============================================================================

type Reply = Result<ApiResponse, ApiError>;

#[derive(Clone, Default)]
struct Script {
    replies: Rc<RefCell<VecDeque<Reply>>>,
    sent: Rc<RefCell<Vec<ApiRequest>>>,
}

impl Script {
    fn reply(&self, status: u16, body: &str) {
        self.replies
            .borrow_mut()
            .push_back(Ok(ApiResponse::new(status, body)));
    }

    fn fail(&self, message: &str) {
        self.replies
            .borrow_mut()
            .push_back(Err(ApiError::Transport(message.to_owned())));
    }

    fn client(&self) -> ApiClient {
        let script = self.clone();
        ApiClient::new(move |request: &ApiRequest| {
            script.sent.borrow_mut().push(request.clone());
            script
                .replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(ApiResponse::new(204, "")))
        })
    }

    fn last(&self) -> ApiRequest {
        self.sent.borrow().last().cloned().expect("a request was sent")
    }
}

fn users(script: &Script) -> (Registry, ModelClass) {
    let registry = Registry::with_api(script.client());
    let users = registry
        .define(
            ModelSchema::new("User")
                .field("id", FieldKind::Number)
                .field("name", FieldKind::String)
                .field("age", FieldKind::Number)
                .endpoint("/users"),
        )
        .unwrap();
    (registry, users)
}

fn counter(class: &ModelClass, kind: ChangeKind) -> (Rc<Cell<usize>>, fundle_core::Subscription) {
    let hits = Rc::new(Cell::new(0));
    let h = Rc::clone(&hits);
    let sub = class.on(kind, move |_| h.set(h.get() + 1));
    (hits, sub)
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn new_record_is_posted_and_cached_from_response() {
    let script = Script::default();
    let (_registry, users) = users(&script);
    let (created, _sub) = counter(&users, ChangeKind::Created);

    let draft = users.create(json!({"name": "Ada"})).unwrap();
    assert_eq!(created.get(), 0, "no key, nothing cached");

    script.reply(201, r#"{"id": 7, "name": "Ada"}"#);
    draft.save().unwrap();

    let sent = script.last();
    assert_eq!(sent.method, Method::Post);
    assert_eq!(sent.url, "/api/users/");
    assert_eq!(sent.body, Some(json!({"name": "Ada"})));

    assert_eq!(draft.primary_key(), Value::Number(7.0));
    assert_eq!(users.find(7), Some(draft));
    assert_eq!(created.get(), 1);
}

#[test]
fn keyed_record_patches_only_the_delta() {
    let script = Script::default();
    let (_registry, users) = users(&script);
    let user = users
        .create(json!({"id": 3, "name": "Grace", "age": 40}))
        .unwrap();

    user.set("age", 41).unwrap();
    script.reply(200, r#"{"id": 3, "age": 41}"#);
    user.save().unwrap();

    let sent = script.last();
    assert_eq!(sent.method, Method::Patch);
    assert_eq!(sent.url, "/api/users/3");
    assert_eq!(sent.body, Some(json!({"age": 41})));
    assert!(!user.has_changes());
}

#[test]
fn clean_keyed_record_does_not_hit_the_network() {
    let script = Script::default();
    let (_registry, users) = users(&script);
    let user = users.create(json!({"id": 4})).unwrap();

    user.save().unwrap();
    assert!(script.sent.borrow().is_empty());
}

#[test]
fn transport_failure_keeps_batch_and_stays_silent() {
    let script = Script::default();
    let (_registry, users) = users(&script);
    let user = users.create(json!({"id": 5, "name": "a"})).unwrap();
    let changed = Rc::new(Cell::new(0));
    let c = Rc::clone(&changed);
    let _sub = user.on(ChangeKind::Changed, move |_| c.set(c.get() + 1));

    user.set("name", "b").unwrap();
    script.fail("offline");
    let err = user.save().unwrap_err();

    assert!(matches!(err, ModelError::Api(ApiError::Transport(_))));
    assert_eq!(changed.get(), 0);
    assert!(user.has_changes());
}

#[test]
fn server_rejection_carries_status_and_body() {
    let script = Script::default();
    let (_registry, users) = users(&script);
    let user = users.create(json!({"id": 6})).unwrap();
    user.set("name", "").unwrap();

    script.reply(422, "name required");
    let err = user.save().unwrap_err();
    assert_eq!(err.to_string(), "API error: 422 - name required");
}

#[test]
fn delete_calls_endpoint_then_cascades() {
    let script = Script::default();
    let (_registry, users) = users(&script);
    let user = users.create(json!({"id": 8})).unwrap();
    let list = Collection::with_entries(&users, [&user]).unwrap();

    user.delete().unwrap();
    let sent = script.last();
    assert_eq!(sent.method, Method::Delete);
    assert_eq!(sent.url, "/api/users/8");
    assert!(list.is_empty());
    assert_eq!(users.find(8), None);
}

#[test]
fn failed_delete_keeps_the_cached_instance() {
    let script = Script::default();
    let (_registry, users) = users(&script);
    let user = users.create(json!({"id": 9})).unwrap();
    let list = Collection::with_entries(&users, [&user]).unwrap();
    let (deleted, _sub) = counter(&users, ChangeKind::Deleted);

    script.reply(500, "boom");
    let err = user.delete().unwrap_err();
    assert!(matches!(err, ModelError::Api(ApiError::Status { status: 500, .. })));

    assert_eq!(users.find(9), Some(user.clone()));
    assert_eq!(users.create(json!({"id": 9})).unwrap(), user);
    assert_eq!(list.len(), 1);
    assert_eq!(deleted.get(), 0);
}

#[test]
fn delete_publishes_once_on_each_bus() {
    let script = Script::default();
    let (_registry, users) = users(&script);
    let user = users.create(json!({"id": 10, "name": "Lin"})).unwrap();
    let list = Collection::with_entries(&users, [&user]).unwrap();

    let on_instance = Rc::new(Cell::new(0));
    let i = Rc::clone(&on_instance);
    let _instance_sub = user.on(ChangeKind::Deleted, move |_| i.set(i.get() + 1));
    let (on_class, _class_sub) = counter(&users, ChangeKind::Deleted);
    let on_collection = Rc::new(Cell::new(0));
    let c = Rc::clone(&on_collection);
    let _collection_sub = list.on(ChangeKind::Deleted, move |_| c.set(c.get() + 1));

    user.delete().unwrap();
    assert_eq!(
        (on_instance.get(), on_class.get(), on_collection.get()),
        (1, 1, 1)
    );
    assert!(list.is_empty());
}

#[test]
fn all_fetches_and_reconciles_with_cache() {
    let script = Script::default();
    let (_registry, users) = users(&script);
    let known = users.create(json!({"id": 1, "name": "old"})).unwrap();

    script.reply(200, r#"[{"id": 1, "name": "new"}, {"id": 2, "name": "two"}]"#);
    let listing = users.all(&[]).unwrap();

    assert_eq!(script.last().url, "/api/users/");
    assert_eq!(listing.len(), 2);
    assert_eq!(listing.get(0), Some(known.clone()));
    assert_eq!(known.get("name"), Some(Value::from("new")));
    assert_eq!(users.cached_len(), 2);
}

#[test]
fn all_rejects_non_list_payload() {
    let script = Script::default();
    let (_registry, users) = users(&script);
    script.reply(200, r#"{"items": []}"#);
    assert!(matches!(
        users.all(&[]),
        Err(ModelError::NotAList { found: "object", .. })
    ));
}

#[test]
fn nested_endpoint_takes_params() {
    let script = Script::default();
    let registry = Registry::with_api(script.client());
    let members = registry
        .define(
            ModelSchema::new("Member")
                .field("id", FieldKind::Number)
                .endpoint("/teams/:team/members"),
        )
        .unwrap();

    script.reply(200, "[]");
    let listing = members.all(&[("team", "core")]).unwrap();
    assert!(listing.is_empty());
    assert_eq!(script.last().url, "/api/teams/core/members/");
}

mod identity {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn cache_holds_one_instance_per_truthy_key(ids in proptest::collection::vec(0u8..12, 0..40)) {
            let registry = Registry::new();
            let items = registry
                .define(ModelSchema::new("Item").field("id", FieldKind::Number))
                .unwrap();

            let mut distinct: Vec<u8> = ids.iter().copied().filter(|id| *id != 0).collect();
            distinct.sort_unstable();
            distinct.dedup();

            for id in &ids {
                let model = items.create(json!({"id": id})).unwrap();
                if *id != 0 {
                    prop_assert_eq!(items.find(*id), Some(model));
                }
            }
            prop_assert_eq!(items.cached_len(), distinct.len());
        }
    }
}
