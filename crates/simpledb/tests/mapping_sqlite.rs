use simpledb::{
    DatabaseInfo, DatabaseManager, DatabaseObject, Error, MappingErrorKind, Query, Registry, Value,
};
use std::convert::Infallible;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

#[derive(Debug, Default, Clone, PartialEq, DatabaseObject)]
#[database(constructor)]
#[database(row_constructor(columns("id", "name")))]
struct Person {
    #[database(field)]
    id: i64,
    #[database(field)]
    name: String,
    #[database(groups(2))]
    age: i32,
}

impl Person {
    fn new(id: i64, name: String) -> Self {
        Self {
            id,
            name,
            age: -1,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, DatabaseObject)]
#[database(row_constructor(columns("id", "title")))]
struct Ticket {
    #[database(field)]
    id: Uuid,
    #[database(field)]
    title: String,
}

impl Ticket {
    fn new(id: Uuid, title: String) -> Self {
        Self { id, title }
    }
}

#[derive(Debug, DatabaseObject)]
struct Unregistered {
    #[database(field)]
    id: i64,
}

struct Db {
    manager: DatabaseManager,
    _dir: TempDir,
}

fn open() -> Db {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = Registry::with_standard_builders();
    registry.register_object::<Person>();
    registry.register_object::<Ticket>();
    let manager =
        DatabaseManager::connect(DatabaseInfo::file(dir.path(), "people"), Arc::new(registry)).unwrap();
    manager
        .execute_statement(&Query::raw(
            "CREATE TABLE people (id INTEGER, name TEXT, age INTEGER)",
        ))
        .unwrap();
    manager
        .execute_statement(&Query::raw("CREATE TABLE tickets (id TEXT, title TEXT)"))
        .unwrap();
    Db { manager, _dir: dir }
}

fn insert(db: &Db, person: &Person, groups: &[i32]) {
    let mut query = Query::new("INSERT", "people");
    query.add_values(&db.manager.mapper(), person, groups).unwrap();
    assert_eq!(db.manager.execute_statement(&query).unwrap(), 1);
}

#[test]
fn inserted_object_reads_back_equal() {
    let db = open();
    let person = Person {
        id: 1,
        name: "a".into(),
        age: 0,
    };

    let mut query = Query::new("INSERT", "people");
    query.add_values(&db.manager.mapper(), &person, &[0]).unwrap();
    assert_eq!(
        query.values(),
        [
            ("id".to_string(), "1".to_string()),
            ("name".to_string(), "a".to_string())
        ]
    );
    db.manager.execute_statement(&query).unwrap();

    let found: Option<Person> = db.manager.table("people").object(&person, "SELECT", &[0]).unwrap();
    assert_eq!(found, Some(person));
}

#[test]
fn object_lookup_without_match_is_none() {
    let db = open();
    let ghost = Person {
        id: 9,
        name: "nobody".into(),
        age: 0,
    };
    let found: Option<Person> = db.manager.table("people").object(&ghost, "SELECT", &[0]).unwrap();
    assert_eq!(found, None);
}

#[test]
fn column_skips_values_of_other_kinds() {
    let db = open();
    db.manager
        .execute_statement(&Query::raw("CREATE TABLE mixed (v)"))
        .unwrap();
    db.manager
        .execute_statement(&Query::raw("INSERT INTO mixed (v) VALUES (1), ('two'), (3)"))
        .unwrap();

    let table = db.manager.table("mixed");
    let by_name: Vec<i64> = table.column("SELECT", "v").unwrap();
    assert_eq!(by_name, [1, 3]);
    let by_index: Vec<i64> = table.column("SELECT", 0_usize).unwrap();
    assert_eq!(by_index, [1, 3]);
    let texts: Vec<String> = table.column("SELECT", "v").unwrap();
    assert_eq!(texts, ["two"]);
}

#[test]
fn column_overflow_is_a_type_error() {
    let db = open();
    db.manager
        .execute_statement(&Query::raw("INSERT INTO people (id, name) VALUES (300, 'big')"))
        .unwrap();
    let result: simpledb::Result<Vec<i8>> = db.manager.table("people").column("SELECT", "id");
    assert!(matches!(result, Err(Error::Type(_))));
}

#[test]
fn packed_column() {
    let db = open();
    insert(&db, &Person::new(1, "ann".into()), &[0]);
    insert(&db, &Person::new(2, "bartholomew".into()), &[0]);

    let lengths: Vec<usize> = db
        .manager
        .table("people")
        .column_packed("SELECT", "name", |name: String| Ok::<_, Infallible>(name.len()))
        .unwrap();
    assert_eq!(lengths, [3, 11]);

    let failed = db
        .manager
        .table("people")
        .column_packed("SELECT", "id", |id: i64| if id > 1 { Err("too large") } else { Ok(id) });
    assert!(matches!(failed, Err(Error::Type(_))));
}

#[test]
fn objects_honour_group_filter() {
    let db = open();
    let ann = Person {
        id: 1,
        name: "ann".into(),
        age: 30,
    };
    insert(&db, &ann, &[0, 2]);

    let table = db.manager.table("people");
    let without_age: Vec<Person> = table.objects("SELECT", &[0]).unwrap();
    assert_eq!(without_age[0].age, 0);
    assert_eq!(without_age[0].name, "ann");

    let with_age: Vec<Person> = table.objects("SELECT", &[0, 2]).unwrap();
    assert_eq!(with_age, [ann]);
}

#[test]
fn objects_from_prepared_query() {
    let db = open();
    insert(&db, &Person::new(1, "ann".into()), &[0]);
    insert(&db, &Person::new(2, "bob".into()), &[0]);

    let table = db.manager.table("people");
    let query = table.query("SELECT").value("name", "bob");
    let found: Vec<Person> = table.objects(&query, &[0]).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, 2);
}

#[test]
fn row_constructor_read_path() {
    let db = open();
    insert(&db, &Person::new(7, "zed".into()), &[0]);
    db.manager
        .execute_statement(&Query::raw("INSERT INTO people (id, name) VALUES (NULL, 'anon')"))
        .unwrap();

    let people: Vec<Person> = db.manager.table("people").objects_from_columns("SELECT").unwrap();
    assert_eq!(people, [Person::new(7, "zed".into()), Person::new(0, "anon".into())]);
}

#[test]
fn uuid_field_writes_text_and_reads_back() {
    let db = open();
    let ticket = Ticket::new(
        Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef),
        "flaky build".into(),
    );

    let mut query = Query::new("INSERT", "tickets");
    query.add_values(&db.manager.mapper(), &ticket, &[0]).unwrap();
    assert_eq!(query.values()[0].1, "01234567-89ab-cdef-0123-456789abcdef");
    db.manager.execute_statement(&query).unwrap();

    let tickets: Vec<Ticket> = db.manager.table("tickets").objects_from_columns("SELECT").unwrap();
    assert_eq!(tickets, [ticket]);
}

#[test]
fn text_in_integer_column_is_a_type_error() {
    let db = open();
    db.manager
        .execute_statement(&Query::raw("INSERT INTO people (id, name) VALUES ('x', 'n')"))
        .unwrap();
    let result: simpledb::Result<Vec<Person>> = db.manager.table("people").objects("SELECT", &[0]);
    match result {
        Err(Error::Type(e)) => {
            assert_eq!(e.actual, "TEXT");
            assert_eq!(e.column.as_deref(), Some("id"));
        }
        other => panic!("expected type error, got {other:?}"),
    }
}

#[test]
fn unregistered_type_is_a_schema_mismatch() {
    let db = open();
    let result: simpledb::Result<Vec<Unregistered>> =
        db.manager.table("people").objects("SELECT", &[0]);
    let err = result.unwrap_err();
    assert_eq!(err.mapping_kind(), Some(MappingErrorKind::SchemaMismatch));
}

#[test]
fn bound_parameters_keep_quotes_intact() {
    let db = open();
    let (values, params) = simpledb::placeholder_list(&[
        ("id".to_string(), "5".to_string()),
        ("name".to_string(), "o'neil".to_string()),
    ]);
    let query = Query::raw(format!("INSERT INTO people {}", values)).with_params(params);
    db.manager.execute_statement(&query).unwrap();

    let rows = db
        .manager
        .execute_query(
            &Query::raw("SELECT name FROM people WHERE id = ?").with_params(vec![Value::BigInt(5)]),
        )
        .unwrap();
    assert_eq!(rows[0].get_named::<String>("name").unwrap(), "o'neil");
}
