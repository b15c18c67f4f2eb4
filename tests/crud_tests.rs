use modelkit::testing::{RecordingConnection, row};
use modelkit::{
    Comparison, ErrorKind, ExecutorError, Model, ModelExt, Orm, PlaceholderStyle, Result,
    Statement, Value,
};

#[derive(Model, Debug, Clone, PartialEq)]
struct Person {
    id: Option<i64>,
    name: String,
    age: i64,
    nickname: Option<String>,
}

fn joe() -> Person {
    Person {
        id: None,
        name: "Joe".to_string(),
        age: 38,
        nickname: None,
    }
}

fn setup() -> (std::sync::Arc<RecordingConnection>, Orm) {
    let conn = RecordingConnection::new();
    let orm = Orm::default().with_default_database(conn.database());
    (conn, orm)
}

#[tokio::test]
async fn test_save_returns_a_copy_with_the_new_identity() -> Result<()> {
    let (conn, orm) = setup();
    conn.push_rows(vec![row([("id", 1)])]);

    let person = joe();
    let saved = orm.save(&person, None).await?;

    assert_eq!(saved.id, Some(1));
    assert_eq!(saved.name, person.name);
    assert_eq!(saved.age, person.age);
    assert_eq!(person.id, None);

    // Null optionals and the identity are left out of the insert
    let executed = conn.executed();
    assert_eq!(
        executed[0].statement,
        Statement::Insert {
            table: "Persons".to_string(),
            columns: vec!["name".to_string(), "age".to_string()],
            returning: Some("id".to_string()),
        }
    );
    assert_eq!(
        executed[0].parameters,
        vec![Value::Text("Joe".into()), Value::Integer(38)]
    );
    assert_eq!(
        executed[0].statement.to_sql(PlaceholderStyle::Numbered),
        r#"INSERT INTO "Persons" ("name", "age") VALUES (?1, ?2) RETURNING "id""#
    );
    Ok(())
}

#[tokio::test]
async fn test_save_requires_a_usable_returned_identity() -> Result<()> {
    let (conn, orm) = setup();

    // 1. No rows at all
    conn.push_rows(Vec::new());
    let err = orm.save(&joe(), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // 2. Row without the identity column
    conn.push_rows(vec![row([("name", "Joe")])]);
    let err = orm.save(&joe(), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // 3. Null identity
    conn.push_rows(vec![row([("id", Value::Null)])]);
    let err = orm.save(&joe(), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // 4. Identity that is not an integer
    conn.push_rows(vec![row([("id", "abc")])]);
    let err = orm.save(&joe(), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalError);
    assert_eq!(err.reason(), Some("Unable to convert identifier"));

    // 5. Textual identity is accepted
    conn.push_rows(vec![row([("id", "17")])]);
    assert_eq!(orm.save(&joe(), None).await?.id, Some(17));
    Ok(())
}

#[tokio::test]
async fn test_executor_failures_are_mapped() -> Result<()> {
    let (conn, orm) = setup();

    conn.push_error(ExecutorError::Database("unique violation".into()));
    let err = orm.save(&joe(), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryError);
    assert_eq!(err.reason(), Some("unique violation"));

    conn.push_error(ExecutorError::Connection("reset by peer".into()));
    let err = orm.find_all::<Person>(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
    Ok(())
}

#[tokio::test]
async fn test_update_writes_every_column_keyed_by_identity() -> Result<()> {
    let (conn, orm) = setup();
    let person = Person {
        id: Some(5),
        ..joe()
    };

    let updated = orm.update(&person, None).await?;
    assert_eq!(updated, person);

    let executed = conn.executed();
    assert_eq!(
        executed[0].statement.to_sql(PlaceholderStyle::Numbered),
        r#"UPDATE "Persons" SET "name" = ?1, "age" = ?2, "nickname" = ?3 WHERE "Persons"."id" = ?4"#
    );
    assert_eq!(
        executed[0].parameters,
        vec![
            Value::Text("Joe".into()),
            Value::Integer(38),
            Value::Null,
            Value::Integer(5)
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_update_and_delete_need_a_saved_entity() -> Result<()> {
    let (conn, orm) = setup();

    let err = orm.update(&joe(), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IdentifierError);

    let err = orm.delete(&joe(), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IdentifierError);

    assert_eq!(conn.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_delete_statements() -> Result<()> {
    let (conn, orm) = setup();

    orm.delete(&Person { id: Some(3), ..joe() }, None).await?;
    orm.delete_all::<Person>(None).await?;

    let executed = conn.executed();
    assert_eq!(
        executed[0].statement.to_sql(PlaceholderStyle::Numbered),
        r#"DELETE FROM "Persons" WHERE "Persons"."id" = ?1"#
    );
    assert_eq!(executed[0].parameters, vec![Value::Integer(3)]);
    assert_eq!(
        executed[1].statement.to_sql(PlaceholderStyle::Numbered),
        r#"DELETE FROM "Persons""#
    );
    Ok(())
}

#[tokio::test]
async fn test_find_decodes_the_first_row() -> Result<()> {
    let (conn, orm) = setup();
    conn.push_rows(vec![row([
        ("id", Value::Integer(7)),
        ("name", Value::Text("Ann".into())),
        ("age", Value::Integer(29)),
        ("nickname", Value::Text("Annie".into())),
    ])]);

    let found = orm.find::<Person>(7, None).await?;
    assert_eq!(
        found,
        Person {
            id: Some(7),
            name: "Ann".to_string(),
            age: 29,
            nickname: Some("Annie".to_string()),
        }
    );

    let executed = conn.executed();
    match &executed[0].statement {
        Statement::Select { filter: Some(filter), .. } => {
            let predicates = filter.predicates();
            assert_eq!(predicates.len(), 1);
            assert_eq!(predicates[0].column, "id");
            assert_eq!(predicates[0].comparison, Comparison::Equal);
        }
        other => panic!("Expected a filtered select, got {:?}", other),
    }
    assert_eq!(executed[0].parameters, vec![Value::Integer(7)]);
    Ok(())
}

#[tokio::test]
async fn test_not_found_semantics() -> Result<()> {
    let (conn, orm) = setup();

    conn.push_rows(Vec::new());
    let err = orm.find::<Person>(99, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    conn.push_rows(Vec::new());
    assert!(orm.find_all::<Person>(None).await?.is_empty());

    // Success without rows is an empty result as well
    assert!(orm.find_all::<Person>(None).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_find_reports_undecodable_rows() -> Result<()> {
    let (conn, orm) = setup();

    conn.push_rows(vec![row([
        ("id", Value::Integer(1)),
        ("name", Value::Text("Joe".into())),
        ("age", Value::Text("old".into())),
    ])]);
    let err = orm.find::<Person>(1, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DatabaseDecodingError);

    conn.push_rows(vec![
        row([
            ("id", Value::Integer(1)),
            ("name", Value::Text("Joe".into())),
            ("age", Value::Integer(38)),
        ]),
        row([("id", Value::Integer(2))]),
    ]);
    let err = orm.find_all::<Person>(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DatabaseDecodingError);
    Ok(())
}

#[tokio::test]
async fn test_missing_database_fails_before_the_executor() -> Result<()> {
    // 1. Wired, then unset
    let (conn, mut orm) = setup();
    orm.set_default_database(None);

    // 2. Every operation stops at handle resolution
    let err = orm.save(&joe(), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DatabaseNotInitialized);
    assert_eq!(err.code(), 700);

    assert_eq!(
        orm.create_table::<Person>(None).await.unwrap_err().kind(),
        ErrorKind::DatabaseNotInitialized
    );
    assert_eq!(
        orm.find_all::<Person>(None).await.unwrap_err().kind(),
        ErrorKind::DatabaseNotInitialized
    );

    assert_eq!(conn.call_count(), 0);
    assert!(orm.schema_cache().is_empty()?);

    // 3. An explicit handle still reaches the same executor
    conn.push_rows(vec![row([("id", 4)])]);
    assert_eq!(orm.save(&joe(), Some(&conn.database())).await?.id, Some(4));
    assert_eq!(conn.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_explicit_database_overrides_the_default() -> Result<()> {
    let (default_conn, orm) = setup();
    let other = RecordingConnection::new();
    other.push_rows(vec![row([("id", 9)])]);

    let saved = orm.save(&joe(), Some(&other.database())).await?;
    assert_eq!(saved.id, Some(9));
    assert_eq!(other.call_count(), 1);
    assert_eq!(default_conn.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_model_level_shorthands() -> Result<()> {
    let (conn, orm) = setup();

    Person::create_table(&orm).await?;
    conn.push_rows(vec![row([("id", 1)])]);
    let saved = joe().save(&orm).await?;
    assert_eq!(saved.id, Some(1));

    conn.push_rows(vec![row([
        ("id", Value::Integer(1)),
        ("name", Value::Text("Joe".into())),
        ("age", Value::Integer(38)),
    ])]);
    let found = Person::find(&orm, 1).await?;
    assert_eq!(found, saved);

    saved.delete(&orm).await?;
    assert_eq!(conn.call_count(), 4);
    Ok(())
}

#[derive(Model, Debug, Clone, PartialEq)]
struct Note {
    id: Option<i64>,
    body: Option<String>,
}

#[tokio::test]
async fn test_save_with_only_unset_optionals_inserts_defaults() -> Result<()> {
    let (conn, orm) = setup();
    conn.push_rows(vec![row([("id", 12)])]);

    let saved = orm.save(&Note { id: None, body: None }, None).await?;
    assert_eq!(saved.id, Some(12));

    let executed = conn.executed();
    assert!(executed[0].parameters.is_empty());
    assert_eq!(
        executed[0].statement.to_sql(PlaceholderStyle::Numbered),
        r#"INSERT INTO "Notes" DEFAULT VALUES RETURNING "id""#
    );
    Ok(())
}
