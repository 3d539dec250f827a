/// Entity writes: values become visible only after the server confirms them,
/// and a rejected write leaves the entity untouched

use std::{cell::RefCell, rc::Rc};

use serde::Deserialize;
use serde_json::{json, Value};

use replica_client::{
    Broadcast, ChangeCause, Client, ClientError, EntityProxy, Fields, RecordId, RemoteError,
    Request,
};
use replica_test::{assert_field, assert_ids, test_client, ChangeLog, LocalChannel, Outcome};

fn loaded() -> (LocalChannel, Client, EntityProxy) {
    let channel = LocalChannel::new();
    let client = test_client(&channel);
    let todos = client.collection("todos");
    channel.ack_next_of(
        "retrieveAll",
        Ok(json!([
            { "_id": "1", "title": "write tests", "done": false, "tags": ["work"] },
            { "_id": "2", "title": "ship", "done": false }
        ])),
    );
    channel.clear_sent();
    let entity = todos.show("1").unwrap();
    (channel, client, entity)
}

#[test]
fn write_is_invisible_until_acknowledged() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (channel, _client, entity) = loaded();
    let outcome = Outcome::new();

    entity.write("done", json!(true), outcome.callback()).unwrap();

    let mut expected = Fields::new();
    expected.insert("done".to_string(), json!(true));
    assert_eq!(
        channel.sent(),
        vec![Request::UpdateOne {
            collection: "todos".to_string(),
            id: RecordId::from("1"),
            fields: expected,
        }]
    );
    assert_field!(entity, "done", false);
    assert!(!outcome.is_settled());

    channel.ack_next(Ok(json!({ "_id": "1", "done": true })));

    assert_field!(entity, "done", true);
    assert_eq!(outcome.take(), Some(Ok(json!({ "_id": "1", "done": true }))));
}

#[test]
fn confirmed_write_shows_through_every_handle() {
    let (channel, client, entity) = loaded();
    let other = client.collection("todos").show("1").unwrap();
    assert!(entity.ptr_eq(&other));

    entity.write("title", json!("write more tests"), |_| {}).unwrap();
    channel.ack_next(Ok(Value::Null));

    assert_field!(other, "title", "write more tests");
    assert_field!(client.collection("todos").list()[0], "title", "write more tests");
}

#[test]
fn rejected_write_keeps_previous_value() {
    let (channel, _client, entity) = loaded();
    let outcome = Outcome::new();

    entity.write("title", json!(""), outcome.callback()).unwrap();
    channel.ack_next(Err(RemoteError::new("title must not be empty")));

    assert_field!(entity, "title", "write tests");
    assert_eq!(
        outcome.take(),
        Some(Err(ClientError::OperationFailed {
            operation: "updateOne",
            message: "title must not be empty".to_string(),
        }))
    );
}

#[test]
fn write_accepts_any_value_shape() {
    let (channel, _client, entity) = loaded();

    entity.write("tags", json!(["work", "urgent"]), |_| {}).unwrap();
    entity.write("done", Value::Null, |_| {}).unwrap();
    channel.ack_next(Ok(Value::Null));
    channel.ack_next(Ok(Value::Null));

    assert_field!(entity, "tags", ["work", "urgent"]);
    assert_field!(entity, "done", null);
    assert!(entity.has_field("done"));
}

#[test]
fn observers_run_after_the_callback() {
    let (channel, client, entity) = loaded();
    let order = Rc::new(RefCell::new(Vec::new()));

    let observed = order.clone();
    client.subscribe(move |change| observed.borrow_mut().push(format!("{:?}", change.cause)));

    let called = order.clone();
    entity
        .write("done", json!(true), move |_| called.borrow_mut().push("callback".to_string()))
        .unwrap();
    channel.ack_next(Ok(Value::Null));

    assert_eq!(*order.borrow(), vec!["callback".to_string(), "EntityWritten".to_string()]);
}

#[test]
fn failed_write_still_notifies() {
    let (channel, client, entity) = loaded();
    let log = ChangeLog::attach(&client);

    entity.write("done", json!(true), |_| {}).unwrap();
    assert_eq!(log.count(), 0);
    channel.ack_next(Err(RemoteError::new("offline")));

    assert_eq!(log.causes(), vec![ChangeCause::Failed]);
    assert_eq!(log.changes()[0].collection, "todos");
}

#[test]
fn update_waits_for_the_broadcast() {
    let (channel, _client, entity) = loaded();
    let outcome = Outcome::new();

    let mut fields = Fields::new();
    fields.insert("done".to_string(), json!(true));
    fields.insert("priority".to_string(), json!(3));
    entity.update(fields.clone(), outcome.callback()).unwrap();

    assert_eq!(
        channel.sent(),
        vec![Request::UpdateOne {
            collection: "todos".to_string(),
            id: RecordId::from("1"),
            fields,
        }]
    );

    channel.ack_next(Ok(json!({ "updated": 1 })));
    assert!(outcome.is_settled());
    assert_field!(entity, "done", false);
    assert!(!entity.has_field("priority"));

    channel.broadcast(Broadcast::updated(
        "todos",
        vec![json!({ "_id": "1", "done": true, "priority": 3 })],
    ));
    assert_field!(entity, "done", true);
    assert_field!(entity, "priority", 3);
}

#[test]
fn update_can_introduce_fields_that_write_refuses() {
    let (channel, _client, entity) = loaded();

    assert!(entity.write("priority", json!(1), |_| {}).is_err());

    let mut fields = Fields::new();
    fields.insert("priority".to_string(), json!(1));
    entity.update(fields, |_| {}).unwrap();
    channel.ack_next(Ok(Value::Null));
    channel.broadcast(Broadcast::updated("todos", vec![json!({ "_id": "1", "priority": 1 })]));

    entity.write("priority", json!(2), |_| {}).unwrap();
    channel.ack_next(Ok(Value::Null));
    assert_field!(entity, "priority", 2);
}

#[test]
fn delete_keeps_entity_until_the_broadcast() {
    let (channel, client, entity) = loaded();
    let todos = client.collection("todos");
    let log = ChangeLog::attach(&client);
    let outcome = Outcome::new();

    entity.delete(outcome.callback()).unwrap();
    assert_eq!(
        channel.sent(),
        vec![Request::DeleteOne {
            collection: "todos".to_string(),
            id: RecordId::from("1"),
        }]
    );

    channel.ack_next(Ok(json!({ "deleted": 1 })));
    assert_eq!(outcome.take(), Some(Ok(json!({ "deleted": 1 }))));
    assert_ids!(&todos, ["1", "2"]);

    channel.broadcast(Broadcast::deleted_one("todos", vec![json!({ "_id": "1" })]));
    assert_ids!(&todos, ["2"]);
    assert_eq!(
        log.causes(),
        vec![
            ChangeCause::EntityDeleted,
            ChangeCause::Reconciled(replica_client::BroadcastKind::DeletedOne),
        ]
    );
}

#[test]
fn removed_entity_handle_stays_readable() {
    let (channel, client, entity) = loaded();

    channel.broadcast(Broadcast::deleted_one("todos", vec![json!("1")]));

    assert!(client.collection("todos").show("1").is_none());
    assert_field!(entity, "title", "write tests");
    assert_eq!(entity.collection(), "todos");
}

#[derive(Debug, Deserialize, PartialEq)]
struct Todo {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    done: bool,
    #[serde(default)]
    tags: Vec<String>,
}

#[test]
fn typed_access() {
    let (_channel, client, entity) = loaded();

    assert_eq!(
        entity.to_typed::<Todo>().unwrap(),
        Todo {
            id: "1".to_string(),
            title: "write tests".to_string(),
            done: false,
            tags: vec!["work".to_string()],
        }
    );
    assert_eq!(entity.get_as::<bool>("done").unwrap(), Some(false));
    assert_eq!(entity.get_as::<bool>("missing").unwrap(), None);
    assert!(entity.get_as::<u32>("title").is_err());

    let second = client.collection("todos").show("2").unwrap();
    assert!(second.to_typed::<Todo>().unwrap().tags.is_empty());
}

#[test]
fn field_names_follow_the_record() {
    let (_channel, _client, entity) = loaded();
    let mut names = entity.field_names();
    names.sort();
    assert_eq!(names, vec!["_id", "done", "tags", "title"]);
}

#[test]
fn numeric_identifier_is_sent_back_as_a_number() {
    let channel = LocalChannel::new();
    let client = test_client(&channel);
    let todos = client.collection("todos");
    channel.ack_next_of("retrieveAll", Ok(json!([{ "_id": 12, "title": "a" }])));
    channel.clear_sent();

    let entity = todos.show("12").unwrap();
    entity.write("title", json!("b"), |_| {}).unwrap();
    entity.delete(|_| {}).unwrap();
    channel.broadcast(Broadcast::created("todos", vec![json!({ "_id": 13 })]));

    let args: Vec<Value> = channel.sent().iter().map(|request| request.args()[1].clone()).collect();
    assert_eq!(args, vec![json!(12), json!(12), json!(13)]);
    assert_eq!(
        serde_json::to_value(&channel.sent()[0]).unwrap()["id"],
        json!(12)
    );

    channel.ack_next(Ok(Value::Null));
    assert_field!(entity, "title", "b");
    assert_field!(entity, "_id", 12);
}
