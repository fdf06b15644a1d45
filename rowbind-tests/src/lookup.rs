use crate::record_error;
use rowbind::{
    Connection, Filter, Materialize, Materialized, Order, RecordError, SchemaCache,
    SchemaCacheConfig, TableBinding, TableSchema, Value,
};
use std::sync::Arc;

pub async fn lookup<C: Connection>(connection: &mut C) {
    // Setup
    connection
        .execute(
            r#"
            DROP TABLE IF EXISTS "lookup_item";
            CREATE TABLE "lookup_item" (
                "id" INTEGER PRIMARY KEY,
                "name" TEXT NOT NULL,
                "score" INTEGER,
                "tag" TEXT
            );
            "#
            .into(),
        )
        .await
        .expect("Failed to create the lookup_item table");
    let cache = SchemaCache::new(SchemaCacheConfig::in_memory());
    let items = TableBinding::bind(connection, &cache, "lookup_item")
        .await
        .expect("Failed to bind the lookup_item table");
    for i in 1..=10 {
        let mut record = items.new_record();
        let tag = match i {
            _ if i % 5 == 0 => None,
            _ if i % 2 == 0 => Some("even"),
            _ => Some("odd"),
        };
        record
            .set_many([
                ("name", Value::from(format!("item {}", i))),
                ("score", Value::from(i * 10)),
                ("tag", Value::from(tag.map(String::from))),
            ])
            .expect("Failed to set the item values");
        record
            .commit(connection)
            .await
            .expect("Failed to insert the item");
    }

    // Single
    let item = items
        .find_one(connection, [("name", "item 3")])
        .await
        .expect("Failed to look up item 3")
        .expect("Item 3 should exist");
    assert_eq!(item.get_as::<i64>("score").expect("Failed to get score"), 30);
    assert_eq!(
        item.get_as::<Option<String>>("tag").expect("Failed to get tag"),
        Some("odd".into())
    );
    assert!(
        items
            .find_one(connection, [("tag", "even")])
            .await
            .expect("Failed to look up the even items")
            .is_none(),
        "Several rows match, nothing is returned"
    );
    assert!(
        items
            .find_one(connection, [("name", "item 42")])
            .await
            .expect("Failed to look up item 42")
            .is_none()
    );
    let by_pk = items
        .find_by_pk(connection, item.get("id").expect("Failed to get id").clone())
        .await
        .expect("Failed to look up by primary key")
        .expect("The item should exist");
    assert_eq!(by_pk.get("name").expect("Failed to get name"), &Value::from("item 3"));
    // Filter values are coerced to the column type
    let by_text = items
        .find_one(connection, [("score", "70")])
        .await
        .expect("Failed to look up by score")
        .expect("Item 7 should exist");
    assert_eq!(by_text.get("name").expect("Failed to get name"), &Value::from("item 7"));

    // Multiple
    let even = items
        .find_all(connection, [("tag", "even")])
        .await
        .expect("Failed to find the even items");
    assert_eq!(even.len(), 4);
    assert!(
        even.iter()
            .all(|v| v.get("tag").expect("Failed to get tag") == &Value::from("even"))
    );
    let untagged = items
        .find_all(connection, [("tag", Value::Null)])
        .await
        .expect("Failed to find the untagged items");
    assert_eq!(
        untagged
            .iter()
            .map(|v| v.get_as::<String>("name").expect("Failed to get name"))
            .collect::<Vec<_>>(),
        ["item 5", "item 10"]
    );
    let top = items
        .find_all(
            connection,
            Filter::new()
                .ge("score", 40)
                .is_not_null("tag")
                .order_by("score", Order::Desc)
                .limit(3),
        )
        .await
        .expect("Failed to find the top items");
    assert_eq!(
        top.iter()
            .map(|v| v.get_as::<i64>("score").expect("Failed to get score"))
            .collect::<Vec<_>>(),
        [90, 80, 70]
    );
    let some = items
        .find_all(
            connection,
            Filter::new()
                .is_in("name", ["item 1", "item 2", "item 99"])
                .order_by("id", Order::Asc),
        )
        .await
        .expect("Failed to find the items in the list");
    assert_eq!(some.len(), 2);
    assert_eq!(
        items
            .find_all(connection, Filter::new().is_in("name", Vec::<&str>::new()))
            .await
            .expect("Failed to find the items in the empty list")
            .len(),
        0
    );
    assert_eq!(
        items
            .find_all(connection, Filter::new().like("name", "item 1%"))
            .await
            .expect("Failed to find the items like")
            .len(),
        2
    );
    assert_eq!(
        items
            .find_all(connection, Filter::new().lt("score", 30).ne("tag", "odd"))
            .await
            .expect("Failed to find the low items")
            .len(),
        1
    );

    // Count
    for filter in [
        Filter::new(),
        Filter::from([("tag", "odd")]),
        Filter::new().gt("score", 55),
        Filter::new().is_null("tag"),
        Filter::new().limit(3),
        Filter::new().eq("tag", "even").limit(10),
    ] {
        let count = items
            .count(connection, filter.clone())
            .await
            .expect("Failed to count");
        let all = items
            .find_all(connection, filter.clone())
            .await
            .expect("Failed to find all");
        assert_eq!(count, all.len() as u64, "Count of {:?}", filter);
    }
    assert_eq!(
        items
            .count(connection, Filter::new())
            .await
            .expect("Failed to count"),
        10
    );
    assert_eq!(
        items
            .count(connection, Filter::new().limit(3))
            .await
            .expect("Failed to count"),
        3
    );

    // Iterator
    let mut iterator = items
        .find_iter(connection, Filter::new().order_by("id", Order::Asc))
        .expect("Failed to open the iterator");
    let mut names = Vec::new();
    while iterator.has_next().await.expect("Failed to check the next item") {
        assert!(
            iterator.has_next().await.expect("Failed to check again"),
            "has_next does not consume"
        );
        let record = iterator
            .next()
            .await
            .expect("Failed to read the next item")
            .expect("has_next promised a record");
        names.push(record.get_as::<String>("name").expect("Failed to get name"));
    }
    assert_eq!(names.len(), 10);
    assert_eq!(names.first().map(String::as_str), Some("item 1"));
    assert_eq!(names.last().map(String::as_str), Some("item 10"));
    assert!(!iterator.has_next().await.expect("Failed to check the end"));
    assert!(iterator.next().await.expect("Failed after the end").is_none());
    assert!(iterator.next().await.expect("Failed after the end").is_none());
    assert!(iterator.is_closed());
    drop(iterator);

    let mut iterator = items
        .find_iter(connection, [("tag", "odd")])
        .expect("Failed to open the iterator");
    let first = iterator
        .next()
        .await
        .expect("Failed to read the first odd item")
        .expect("There are odd items");
    assert_eq!(first.get("tag").expect("Failed to get tag"), &Value::from("odd"));
    iterator.close();
    assert!(iterator.is_closed());
    assert!(iterator.next().await.expect("Failed after close").is_none());
    drop(iterator);
    // The executor is available again once the iterator is gone
    assert_eq!(
        items
            .count(connection, [("tag", "odd")])
            .await
            .expect("Failed to count"),
        4
    );

    // Materialization modes through the generic entry point
    match items
        .query(connection, [("tag", "even")], Materialize::Count)
        .await
        .expect("Failed to query the count")
    {
        Materialized::Count(count) => assert_eq!(count, 4),
        other => panic!("Unexpected result {:?}", other),
    }
    match items
        .query(connection, [("name", "item 4")], Materialize::Single)
        .await
        .expect("Failed to query the single item")
    {
        Materialized::Single(Some(record)) => {
            assert_eq!(record.get_as::<i64>("score").expect("Failed to get score"), 40)
        }
        other => panic!("Unexpected result {:?}", other),
    }
    match items
        .query(connection, Filter::new(), Materialize::Multiple)
        .await
        .expect("Failed to query every item")
    {
        Materialized::Multiple(records) => assert_eq!(records.len(), 10),
        other => panic!("Unexpected result {:?}", other),
    }
    match items
        .query(connection, Filter::new().limit(2), Materialize::Iterator)
        .await
        .expect("Failed to query the iterator")
    {
        Materialized::Iterator(mut iterator) => {
            let mut count = 0;
            while let Some(..) = iterator.next().await.expect("Failed to iterate") {
                count += 1;
            }
            assert_eq!(count, 2);
        }
        other => panic!("Unexpected result {:?}", other),
    }

    // Errors
    let error = items
        .find_all(connection, [("missing", 1)])
        .await
        .expect_err("Filters on unknown columns must fail");
    assert!(matches!(
        record_error(&error),
        Some(RecordError::UnknownField { field, .. }) if field == "missing"
    ));
    let schema: Arc<TableSchema> = items.schema().clone();
    let elsewhere = TableBinding::with_schema("some://other/database", schema);
    let error = elsewhere
        .count(connection, Filter::new())
        .await
        .expect_err("The executor targets another database");
    assert!(matches!(
        record_error(&error),
        Some(RecordError::DatabaseMismatch { .. })
    ));
}
