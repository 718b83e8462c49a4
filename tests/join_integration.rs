//! Integration tests for joins.
//!
//! These tests verify:
//! - Batched joins issue one lookup per join across all rows
//! - Unresolved references leave the destination unset
//! - Instance-level single and multi joins
//! - Joins over raw rows

use docmap::memory::{MemoryStore, OpKind};
use docmap::prelude::*;
use pretty_assertions::assert_eq;

struct User;

impl Model for User {
    const NAME: &'static str = "User";
    const COLLECTION_NAME: Option<&'static str> = Some("users");
}

struct Team;

impl Model for Team {
    const NAME: &'static str = "Team";
    const COLLECTION_NAME: Option<&'static str> = Some("teams");
}

struct Comment;

impl Model for Comment {
    const NAME: &'static str = "Comment";
    const COLLECTION_NAME: Option<&'static str> = Some("comments");
}

struct Fixture {
    store: MemoryStore,
    db: Database,
    alice: ObjectId,
    bob: ObjectId,
}

fn fixture() -> Fixture {
    let alice = ObjectId::new();
    let bob = ObjectId::new();
    let store = MemoryStore::new();
    store.seed(
        "users",
        vec![
            doc! { "_id": alice, "name": "Alice", "email": "alice@example.com" },
            doc! { "_id": bob, "name": "Bob", "email": "bob@example.com" },
        ],
    );
    store.seed(
        "comments",
        vec![
            doc! { "body": "first", "author": alice },
            doc! { "body": "second", "author": bob },
            doc! { "body": "anonymous" },
        ],
    );
    let db = Database::single(store.clone());
    Fixture {
        store,
        db,
        alice,
        bob,
    }
}

#[test]
fn test_join_batches_one_lookup() {
    let f = fixture();
    let mut mapper = Comment::find(&f.db, doc! {}, None).unwrap();
    mapper.join::<User>("author", None, None);
    let comments = mapper.get_joined().unwrap();

    let finds = f.store.operations_of(OpKind::Find);
    let user_finds: Vec<_> = finds.iter().filter(|op| op.collection == "users").collect();
    assert_eq!(user_finds.len(), 1);
    assert_eq!(
        user_finds[0].filter,
        doc! { "_id": { "$in": [f.alice, f.bob] } }
    );

    let bodies: Vec<_> = comments.iter().filter_map(|c| c.get_str("body")).collect();
    assert_eq!(bodies, vec!["first", "second", "anonymous"]);

    let first = comments[0].object("author").unwrap();
    assert!(first.is::<User>());
    assert_eq!(first.get_str("name"), Some("Alice"));
    assert_eq!(comments[1].object("author").unwrap().get_str("name"), Some("Bob"));
    assert!(comments[2].get("author").is_none());
}

#[test]
fn test_get_does_not_resolve_joins() {
    let f = fixture();
    let mut mapper = Comment::find(&f.db, doc! {}, None).unwrap();
    mapper.join::<User>("author", None, None);
    let comments = mapper.get().unwrap();

    assert!(comments[0].object("author").is_none());
    assert_eq!(
        comments[0].get("author").and_then(Value::as_object_id),
        Some(f.alice)
    );
    assert!(f.store.operations_of(OpKind::Find).iter().all(|op| op.collection == "comments"));
}

#[test]
fn test_join_into_separate_destination_with_projection() {
    let f = fixture();
    let mut mapper = Comment::find(&f.db, doc! { "author": { "$exists": true } }, None).unwrap();
    mapper.join::<User>("author", Some("author_profile"), Some(doc! { "name": 1 }));
    let comments = mapper.get_joined().unwrap();

    for comment in &comments {
        assert!(comment.get("author").and_then(Value::as_object_id).is_some());
        let profile = comment.object("author_profile").unwrap();
        assert!(profile.get_str("name").is_some());
        assert!(profile.get("email").is_none());
    }
}

#[test]
fn test_unresolved_reference_leaves_destination_unset() {
    let f = fixture();
    f.store
        .seed("comments", vec![doc! { "body": "ghost", "author": ObjectId::new() }]);

    let mut mapper = Comment::find(&f.db, doc! { "body": "ghost" }, None).unwrap();
    mapper.join::<User>("author", Some("writer"), None);
    let comments = mapper.get_joined().unwrap();

    assert_eq!(comments.len(), 1);
    assert!(comments[0].get("writer").is_none());
}

#[test]
fn test_joins_run_in_registration_order() {
    let f = fixture();
    let team = ObjectId::new();
    f.store.seed("teams", vec![doc! { "_id": team, "name": "Core" }]);
    f.store.seed(
        "comments",
        vec![doc! { "body": "team note", "author": f.alice, "team": team }],
    );

    let mut mapper = Comment::find(&f.db, doc! { "body": "team note" }, None).unwrap();
    mapper
        .join::<User>("author", None, None)
        .join::<Team>("team", None, None);
    let comments = mapper.get_joined().unwrap();

    let lookups: Vec<_> = f
        .store
        .operations_of(OpKind::Find)
        .into_iter()
        .map(|op| op.collection)
        .collect();
    assert_eq!(lookups, vec!["comments", "users", "teams"]);
    assert_eq!(comments[0].object("team").unwrap().get_str("name"), Some("Core"));
}

#[test]
fn test_resolve_joins_over_raw_rows() {
    let f = fixture();
    let mut mapper = Comment::find(&f.db, doc! {}, None).unwrap();
    mapper.join::<User>("author", None, None);

    let mut rows = mapper.get_raw().unwrap();
    mapper.resolve_joins(&mut rows).unwrap();

    let author = rows[0].get_document("author").unwrap();
    assert_eq!(author.get_str("name").unwrap(), "Alice");
    assert!(rows[2].get("author").is_none());
}

#[test]
fn test_join_one_on_instance() {
    let f = fixture();
    let mut comment = Comment::find_one(&f.db, doc! { "body": "second" }, None)
        .unwrap()
        .unwrap();

    comment.join_one::<User>(&f.db, "author", None, None).unwrap();
    let author = comment.object("author").unwrap();
    assert_eq!(author.id(), Some(f.bob.to_hex()));
}

#[test]
fn test_join_one_miss_clears_destination() {
    let f = fixture();
    let mut comment = Comment::create(doc! { "body": "orphaned", "author": ObjectId::new() });

    comment.join_one::<User>(&f.db, "author", None, None).unwrap();
    assert!(comment.get("author").is_none());

    let mut comment = Comment::create(doc! {
        "body": "stale",
        "author": ObjectId::new(),
        "profile": "old value",
    });
    comment
        .join_one::<User>(&f.db, "author", Some("profile"), None)
        .unwrap();
    assert!(comment.get("profile").is_none());
    assert!(comment.get("author").is_some());
}

#[test]
fn test_join_one_without_reference_is_noop() {
    let f = fixture();
    let mut comment = Comment::find_one(&f.db, doc! { "body": "anonymous" }, None)
        .unwrap()
        .unwrap();
    f.store.clear_operations();

    comment.join_one::<User>(&f.db, "author", None, None).unwrap();
    assert!(comment.get("author").is_none());
    assert!(f.store.operations().is_empty());
}

#[test]
fn test_join_many_on_instance() {
    let f = fixture();
    let mut team = Team::create(doc! { "name": "Core", "members": [f.alice, f.bob] });
    team.join_many::<User>(&f.db, "members", Some("member_records"), Some(doc! { "name": 1 }))
        .unwrap();

    let members = team.keyed("member_records").unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[&f.alice.to_hex()].get_str("name"), Some("Alice"));
    assert_eq!(members[&f.bob.to_hex()].get_str("name"), Some("Bob"));
    assert!(matches!(team.get_bson("members"), Some(Bson::Array(ids)) if ids.len() == 2));
    assert_eq!(f.store.operations_of(OpKind::Find).len(), 1);
}

#[test]
fn test_join_many_with_empty_list_is_noop() {
    let f = fixture();
    let mut team = Team::create(doc! { "name": "Empty", "members": [] });
    team.join_many::<User>(&f.db, "members", None, None).unwrap();

    assert!(team.keyed("members").is_none());
    assert!(f.store.operations().is_empty());
}
