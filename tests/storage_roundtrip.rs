//! End-to-end tests against a real PostgreSQL server.
//!
//! Run with: `cargo test -- --ignored`, using the
//! `BOTKIT_STORAGE_POSTGRES_*` variables to point at the server. Each test
//! drops and recreates its own database.

#![allow(clippy::panic, missing_docs)]

use botkit_storage_postgres::{
    ClientDefaults, Collection, Storage, StorageConfig, StorageError, StorageOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{Connection, Executor, PgConnection};

fn options(database: &str) -> StorageOptions {
    StorageOptions {
        database: Some(database.to_string()),
        ..StorageOptions::default()
    }
}

async fn drop_database(database: &str) {
    let Ok(config) = StorageConfig::from_input(options(database).into()) else {
        panic!("valid configuration");
    };
    let Ok(admin_options) = config.maintenance_connect_options(&ClientDefaults::default()) else {
        panic!("valid connect options");
    };
    let Ok(mut admin) = PgConnection::connect_with(&admin_options).await else {
        panic!("maintenance database reachable");
    };
    let statement = format!("DROP DATABASE IF EXISTS \"{database}\" WITH (FORCE)");
    if let Err(err) = admin.execute(statement.as_str()).await {
        panic!("could not drop {database}: {err}");
    }
    let _ = admin.close().await;
}

async fn fresh_storage(database: &str) -> Storage {
    drop_database(database).await;
    match Storage::connect(options(database), ClientDefaults::default()).await {
        Ok(storage) => storage,
        Err(err) => panic!("bootstrap failed: {err}"),
    }
}

#[tokio::test]
#[ignore = "requires database"]
async fn example_scenario_on_users() {
    let storage = fresh_storage("botkit_test_scenario").await;
    let record = json!({"id": "TEST0", "foo": "bar0"});

    let Ok(()) = storage.users.save(&record).await else {
        panic!("save failed");
    };

    let Ok(fetched) = storage.users.get::<Value>("TEST0").await else {
        panic!("get failed");
    };
    assert_eq!(fetched, record);

    let Err(err) = storage.users.get::<Value>("missing").await else {
        panic!("missing id must not be found");
    };
    assert!(err.is_not_found());

    let Ok(all) = storage.users.all::<Value>().await else {
        panic!("all failed");
    };
    assert_eq!(all, vec![record]);

    let Ok(()) = storage.end().await else {
        panic!("end failed");
    };
}

#[tokio::test]
#[ignore = "requires database"]
async fn save_overwrites_existing_id() {
    let storage = fresh_storage("botkit_test_upsert").await;

    for foo in ["first", "second", "third"] {
        let Ok(()) = storage.teams.save(&json!({"id": "T1", "foo": foo})).await else {
            panic!("save failed");
        };
    }

    let Ok(team) = storage.teams.get::<Value>("T1").await else {
        panic!("get failed");
    };
    assert_eq!(team, json!({"id": "T1", "foo": "third"}));

    let Ok(all) = storage.teams.all::<Value>().await else {
        panic!("all failed");
    };
    assert_eq!(all.len(), 1);
    let _ = storage.end().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn ids_with_trailing_whitespace_round_trip() {
    let storage = fresh_storage("botkit_test_padded_ids").await;
    let record = json!({"id": "U1  ", "name": "padded"});

    let Ok(()) = storage.users.save(&record).await else {
        panic!("save failed");
    };
    let Ok(fetched) = storage.users.get::<Value>("U1  ").await else {
        panic!("a record saved under a padded id must be readable by that id");
    };
    assert_eq!(fetched, record);

    let Ok(()) = storage.users.save(&json!({"id": "U1  ", "name": "again"})).await else {
        panic!("second save failed");
    };
    let Ok(all) = storage.users.all::<Value>().await else {
        panic!("all failed");
    };
    assert_eq!(all, vec![json!({"id": "U1  ", "name": "again"})]);
    let _ = storage.end().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn all_returns_every_saved_record() {
    let storage = fresh_storage("botkit_test_all").await;
    let records: Vec<Value> = (0..5)
        .map(|i| json!({"id": format!("C{i}"), "name": format!("channel-{i}")}))
        .collect();

    for record in &records {
        let Ok(()) = storage.channels.save(record).await else {
            panic!("save failed");
        };
    }

    let Ok(mut all) = storage.channels.all::<Value>().await else {
        panic!("all failed");
    };
    assert_eq!(all.len(), records.len());
    all.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));
    assert_eq!(all, records);
    let _ = storage.end().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn collections_are_isolated() {
    let storage = fresh_storage("botkit_test_isolation").await;

    let Ok(()) = storage.users.save(&json!({"id": "SHARED", "kind": "user"})).await else {
        panic!("save failed");
    };

    for collection in [Collection::Teams, Collection::Channels] {
        let repo = storage.collection(collection);
        let Err(err) = repo.get::<Value>("SHARED").await else {
            panic!("{collection} must not see a user record");
        };
        assert!(err.is_not_found());
        let Ok(all) = repo.all::<Value>().await else {
            panic!("all failed");
        };
        assert!(all.is_empty());
    }
    let _ = storage.end().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn typed_records_round_trip() {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Team {
        id: String,
        name: String,
        bot: Option<String>,
    }

    let storage = fresh_storage("botkit_test_typed").await;
    let team = Team {
        id: "T024BE7LD".to_string(),
        name: "core".to_string(),
        bot: None,
    };
    let Ok(()) = storage.teams.save(&team).await else {
        panic!("save failed");
    };
    let Ok(back) = storage.teams.get::<Team>(&team.id).await else {
        panic!("get failed");
    };
    assert_eq!(back, team);
    let _ = storage.end().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn invalid_records_are_rejected_before_touching_the_database() {
    let storage = fresh_storage("botkit_test_invalid").await;
    let Err(err) = storage.users.save(&json!({"foo": "no id"})).await else {
        panic!("record without id must be rejected");
    };
    assert!(matches!(err, StorageError::InvalidRecord(_)));
    let _ = storage.end().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn callback_convention_matches_async() {
    let storage = fresh_storage("botkit_test_callbacks").await;

    let (tx, rx) = tokio::sync::oneshot::channel();
    let _ = storage
        .users
        .save_with(json!({"id": "CB1", "foo": "bar"}), move |result| {
            let _ = tx.send(result);
        })
        .await;
    let Ok(Ok(())) = rx.await else {
        panic!("save callback reported failure");
    };

    let (tx, rx) = tokio::sync::oneshot::channel();
    let _ = storage
        .users
        .get_with::<Value, _>("nope", move |result| {
            let _ = tx.send(result);
        })
        .await;
    let Ok(Err(err)) = rx.await else {
        panic!("get callback should report NotFound");
    };
    assert!(err.is_not_found());

    let (tx, rx) = tokio::sync::oneshot::channel();
    let _ = storage
        .users
        .all_with::<Value, _>(move |result| {
            let _ = tx.send(result);
        })
        .await;
    let Ok(Ok(all)) = rx.await else {
        panic!("all callback reported failure");
    };
    assert_eq!(all, vec![json!({"id": "CB1", "foo": "bar"})]);

    let (tx, rx) = tokio::sync::oneshot::channel();
    let _ = storage
        .end_with(move |result| {
            let _ = tx.send(result);
        })
        .await;
    assert_eq!(rx.await.ok(), Some(Ok(())));
}

#[tokio::test]
#[ignore = "requires database"]
async fn concurrent_construction_against_fresh_database() {
    let database = "botkit_test_concurrent";
    drop_database(database).await;

    let attempts = futures_util::future::join_all((0..4).map(|_| async {
        Storage::connect(options(database), ClientDefaults::default()).await
    }))
    .await;

    for attempt in attempts {
        let storage = match attempt {
            Ok(storage) => storage,
            Err(err) => panic!("concurrent bootstrap failed: {err}"),
        };
        let Ok(()) = storage.users.save(&json!({"id": "RACE"})).await else {
            panic!("save after concurrent bootstrap failed");
        };
        let _ = storage.end().await;
    }
}

#[tokio::test]
#[ignore = "requires database"]
async fn operations_queue_beyond_pool_size() {
    let database = "botkit_test_pool_bound";
    drop_database(database).await;
    let options = StorageOptions {
        max_clients: Some(2),
        ..options(database)
    };
    let storage = match Storage::connect(options, ClientDefaults::default()).await {
        Ok(storage) => storage,
        Err(err) => panic!("bootstrap failed: {err}"),
    };

    let saves = futures_util::future::join_all((0..20).map(|i| {
        let users = storage.users.clone();
        async move { users.save(&json!({"id": format!("U{i}")})).await }
    }))
    .await;
    assert!(saves.iter().all(Result::is_ok));

    let Ok(all) = storage.users.all::<Value>().await else {
        panic!("all failed");
    };
    assert_eq!(all.len(), 20);
    let _ = storage.end().await;
}
