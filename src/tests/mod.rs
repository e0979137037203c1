use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::{EncryptionType, Error, PromptOr, SecretService, Settings};


use mock::{MockService, Mode};

fn connect(mock: &MockService, encryption: EncryptionType) -> SecretService {
    SecretService::connect_with(Box::new(mock.clone()), Settings::new(encryption))
        .expect("Can't connect to the mock service")
}

fn generate_random_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|_| fastrand::u8(..)).collect()
}

fn random_label() -> String {
    format!("test-{}", fastrand::u32(..))
}

#[test]
fn test_missing_service() {
    let mock = MockService::new(Mode::Absent);
    let result = SecretService::connect_with(Box::new(mock), Settings::default());
    assert!(matches!(result, Err(Error::ServiceNotAvailable(_))));
}

#[test]
fn test_activatable_service() {
    let mock = MockService::new(Mode::Activatable);
    let ss = connect(&mock, EncryptionType::Dh);
    assert_eq!(ss.session().encryption(), EncryptionType::Dh);
    assert_eq!(mock.open_sessions(), 1);
}

#[test]
fn test_degenerate_dh_reply_is_a_session_error() {
    let mock = MockService::new(Mode::DegenerateDh);
    let result = SecretService::connect_with(Box::new(mock.clone()), Settings::default());
    match result {
        Err(Error::Session(message)) => assert!(message.contains("degenerate")),
        other => panic!("Unexpected result: {other:?}"),
    }
    // the half-made session was closed and no plain one was opened
    assert_eq!(mock.open_sessions(), 0);
}

#[test]
fn test_refused_dh_is_not_downgraded() {
    let mock = MockService::new(Mode::RefuseDh);
    let result = SecretService::connect_with(Box::new(mock.clone()), Settings::default());
    match result {
        Err(Error::Session(message)) => {
            assert!(message.contains("org.freedesktop.DBus.Error.AccessDenied"))
        }
        other => panic!("Unexpected result: {other:?}"),
    }
    assert_eq!(mock.open_sessions(), 0);
    // asking for plain outright still works
    let ss = connect(&mock, EncryptionType::Plain);
    assert_eq!(ss.session().encryption(), EncryptionType::Plain);
}

#[test]
fn test_connection_can_be_shared_across_threads() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<SecretService>();
    assert_send::<Mutex<SecretService>>();
    assert_sync::<Mutex<SecretService>>();

    let mock = MockService::new(Mode::Normal);
    let ss = Arc::new(Mutex::new(connect(&mock, EncryptionType::Dh)));
    {
        let ss = ss.lock().unwrap();
        let collection = ss.create_collection("Shared", "default").unwrap();
        collection
            .create_item("demo", HashMap::from([("app", "demo")]), b"hunter2", false, "text/plain")
            .unwrap();
    }
    let worker = Arc::clone(&ss);
    let secret = thread::spawn(move || {
        let ss = worker.lock().unwrap();
        let found = ss.search_items(HashMap::from([("app", "demo")])).unwrap();
        let secret = found.unlocked[0].get_secret().unwrap();
        secret
    })
    .join()
    .unwrap();
    assert_eq!(secret, b"hunter2");
}

#[test]
fn test_create_search_and_read() {
    let mock = MockService::new(Mode::Normal);
    let ss = connect(&mock, EncryptionType::Dh);
    assert_eq!(ss.session().encryption(), EncryptionType::Dh);
    let collection = ss.create_collection("Test", "default").unwrap();
    match ss.begin_unlock(&[collection.path()]).unwrap() {
        PromptOr::Direct(paths) => assert_eq!(paths, vec![collection.path().clone()]),
        PromptOr::NeedsPrompt(_) => panic!("an unlocked collection shouldn't prompt"),
    }
    let item = collection
        .create_item(
            "demo",
            HashMap::from([("app", "demo")]),
            b"hunter2",
            false,
            "text/plain",
        )
        .unwrap();
    let found = ss.search_items(HashMap::from([("app", "demo")])).unwrap();
    assert!(found.locked.is_empty());
    assert_eq!(found.unlocked.len(), 1);
    assert_eq!(found.unlocked[0].path(), item.path());
    assert_eq!(found.unlocked[0].get_secret().unwrap(), b"hunter2");
    assert!(
        ss.search_items(HashMap::from([("app", "other")]))
            .unwrap()
            .unlocked
            .is_empty()
    );
}

#[test]
fn test_secret_is_encrypted_on_the_wire() {
    let mock = MockService::new(Mode::Normal);
    let ss = connect(&mock, EncryptionType::Dh);
    let collection = ss.create_collection(&random_label(), "").unwrap();
    let item = collection
        .create_item("demo", HashMap::new(), b"hunter2", false, "text/plain")
        .unwrap();
    let (parameters, value) = mock.last_secret().unwrap();
    assert_eq!(parameters.len(), 16);
    assert_eq!(value.len(), 16);
    assert_ne!(&value[..7], b"hunter2");
    assert_eq!(mock.stored_secret(item.path()).unwrap(), b"hunter2");
    item.set_secret(b"hunter3", "text/plain").unwrap();
    let (second, _) = mock.last_secret().unwrap();
    assert_ne!(second, parameters, "each secret needs a fresh IV");
}

#[test]
fn test_plain_only_service_falls_back() {
    let mock = MockService::new(Mode::PlainOnly);
    let ss = connect(&mock, EncryptionType::Dh);
    assert_eq!(ss.session().encryption(), EncryptionType::Plain);
    let collection = ss.create_collection(&random_label(), "").unwrap();
    let item = collection
        .create_item("demo", HashMap::new(), b"hunter2", false, "text/plain")
        .unwrap();
    let (parameters, value) = mock.last_secret().unwrap();
    assert!(parameters.is_empty());
    assert_eq!(value, b"hunter2");
    assert_eq!(item.get_secret().unwrap(), b"hunter2");
}

#[test]
fn test_explicit_plain_session() {
    let mock = MockService::new(Mode::Normal);
    let ss = connect(&mock, EncryptionType::Plain);
    assert_eq!(ss.session().encryption(), EncryptionType::Plain);
    let collection = ss.create_collection(&random_label(), "").unwrap();
    collection
        .create_item("demo", HashMap::new(), b"", false, "text/plain")
        .unwrap();
    let (parameters, value) = mock.last_secret().unwrap();
    assert!(parameters.is_empty());
    assert!(value.is_empty());
}

#[test]
fn test_round_trips_through_the_service() {
    for encryption in [EncryptionType::Dh, EncryptionType::Plain] {
        let mock = MockService::new(Mode::Normal);
        let ss = connect(&mock, encryption);
        let collection = ss.create_collection(&random_label(), "").unwrap();
        for len in 0..=64 {
            let secret = generate_random_bytes(len);
            let n = len.to_string();
            let item = collection
                .create_item(
                    "round trip",
                    HashMap::from([("n", n.as_str())]),
                    &secret,
                    false,
                    "application/octet-stream",
                )
                .unwrap();
            assert_eq!(item.get_secret().unwrap(), secret, "length {len}");
        }
    }
}

#[test]
fn test_sessions_are_per_connection() {
    let mock = MockService::new(Mode::Normal);
    let first = connect(&mock, EncryptionType::Dh);
    let second = connect(&mock, EncryptionType::Dh);
    assert_ne!(first.session().path(), second.session().path());
    assert_eq!(mock.open_sessions(), 2);
    let collection = first.create_collection("Shared", "default").unwrap();
    let item = collection
        .create_item("demo", HashMap::from([("app", "demo")]), b"hunter2", false, "text/plain")
        .unwrap();
    let other = second.get_default_collection().unwrap();
    let items = other.search_items(HashMap::from([("app", "demo")])).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].path(), item.path());
    assert_eq!(items[0].get_secret().unwrap(), b"hunter2");
    second.disconnect().unwrap();
    assert_eq!(mock.open_sessions(), 1);
    assert_eq!(item.get_secret().unwrap(), b"hunter2");
}

#[test]
fn test_locked_collection_needs_unlock() {
    let mock = MockService::new(Mode::Lock);
    let ss = connect(&mock, EncryptionType::Dh);
    let collection = ss.get_default_collection().unwrap();
    assert!(collection.is_locked().unwrap());
    assert!(matches!(collection.ensure_unlocked(), Err(Error::Locked(_))));
    let found = ss.search_items(HashMap::from([("app", "demo")])).unwrap();
    assert!(found.unlocked.is_empty());
    assert_eq!(found.locked.len(), 1);
    let item = &found.locked[0];
    assert!(item.is_locked().unwrap());
    assert!(matches!(item.get_secret(), Err(Error::Locked(_))));
    assert!(matches!(
        collection.create_item("x", HashMap::new(), b"x", false, "text/plain"),
        Err(Error::Locked(_))
    ));
    let unlocked = ss.unlock(&[item.path()]).unwrap();
    assert_eq!(unlocked, vec![item.path().clone()]);
    assert!(!collection.is_locked().unwrap());
    collection.ensure_unlocked().unwrap();
    item.ensure_unlocked().unwrap();
    assert_eq!(item.get_secret().unwrap(), b"hunter2");
    assert_eq!(mock.subscription_count(), 0);
}

#[test]
fn test_dismissed_unlock() {
    let mock = MockService::new(Mode::Lock);
    mock.dismiss_prompts(true);
    let ss = connect(&mock, EncryptionType::Dh);
    let collection = ss.get_default_collection().unwrap();
    assert!(matches!(collection.unlock(), Err(Error::PromptDismissed)));
    assert!(collection.is_locked().unwrap());
    assert_eq!(mock.subscription_count(), 0);
    mock.dismiss_prompts(false);
    collection.unlock().unwrap();
    assert!(!collection.is_locked().unwrap());
}

#[test]
fn test_begin_unlock_hands_back_the_prompt() {
    let mock = MockService::new(Mode::Lock);
    let ss = connect(&mock, EncryptionType::Dh);
    let collection = ss.get_default_collection().unwrap();
    let prompt = match ss.begin_unlock(&[collection.path()]).unwrap() {
        PromptOr::NeedsPrompt(prompt) => prompt,
        PromptOr::Direct(_) => panic!("a locked collection should prompt"),
    };
    assert!(collection.is_locked().unwrap());
    let outcome = prompt.complete().unwrap();
    assert!(!outcome.is_dismissed());
    assert_eq!(outcome.into_result().unwrap(), vec![collection.path().clone()]);
    assert!(!collection.is_locked().unwrap());
}

#[test]
fn test_prompt_dismiss() {
    let mock = MockService::new(Mode::Lock);
    let ss = connect(&mock, EncryptionType::Dh);
    let collection = ss.get_default_collection().unwrap();
    let PromptOr::NeedsPrompt(prompt) = ss.begin_unlock(&[collection.path()]).unwrap() else {
        panic!("a locked collection should prompt");
    };
    assert!(prompt.dismiss().unwrap().is_dismissed());
    assert!(collection.is_locked().unwrap());
    assert_eq!(mock.subscription_count(), 0);
}

#[test]
fn test_create_collection_with_prompt() {
    let mock = MockService::new(Mode::Lock);
    let ss = connect(&mock, EncryptionType::Dh);
    let label = random_label();
    assert!(matches!(
        ss.begin_create_collection(&label, "").unwrap(),
        PromptOr::NeedsPrompt(_)
    ));
    let collection = ss.create_collection(&label, "").unwrap();
    assert_eq!(collection.get_label().unwrap(), label);
    assert_eq!(
        ss.find_collection_by_label(&label).unwrap().path(),
        collection.path()
    );
    mock.dismiss_prompts(true);
    assert!(matches!(
        ss.create_collection("never", ""),
        Err(Error::PromptDismissed)
    ));
    assert!(matches!(
        ss.find_collection_by_label("never"),
        Err(Error::CollectionNotFound(_))
    ));
}

#[test]
fn test_item_properties() {
    let mock = MockService::new(Mode::Normal);
    let ss = connect(&mock, EncryptionType::Dh);
    let collection = ss.create_collection(&random_label(), "").unwrap();
    let item = collection
        .create_item(
            "label one",
            HashMap::from([("app", "demo"), ("user", "alice")]),
            b"{\"k\": 1}",
            false,
            "application/json",
        )
        .unwrap();
    assert_eq!(item.get_label().unwrap(), "label one");
    item.set_label("label two").unwrap();
    assert_eq!(item.get_label().unwrap(), "label two");
    let attributes = item.get_attributes().unwrap();
    assert_eq!(attributes.len(), 2);
    assert_eq!(attributes["user"], "alice");
    let before = item.modified().unwrap();
    item.set_attributes(HashMap::from([("app", "demo2")])).unwrap();
    assert_eq!(
        item.get_attributes().unwrap(),
        HashMap::from([("app".to_string(), "demo2".to_string())])
    );
    assert!(item.modified().unwrap() > before);
    assert!(item.created().unwrap() <= item.modified().unwrap());
    assert_eq!(item.get_secret_content_type().unwrap(), "application/json");
    item.set_secret(b"plain words", "text/plain").unwrap();
    assert_eq!(item.get_secret_content_type().unwrap(), "text/plain");
    assert_eq!(item.get_secret().unwrap(), b"plain words");
}

#[test]
fn test_collection_properties() {
    let mock = MockService::new(Mode::Normal);
    let ss = connect(&mock, EncryptionType::Dh);
    let collection = ss.create_collection("before", "").unwrap();
    assert_eq!(collection.get_label().unwrap(), "before");
    collection.set_label("after").unwrap();
    assert_eq!(collection.get_label().unwrap(), "after");
    assert!(collection.created().unwrap() <= collection.modified().unwrap());
    assert!(collection.get_all_items().unwrap().is_empty());
    let item = collection
        .create_item("demo", HashMap::new(), b"x", false, "text/plain")
        .unwrap();
    let items = collection.get_all_items().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].path(), item.path());
}

#[test]
fn test_replace_item() {
    let mock = MockService::new(Mode::Normal);
    let ss = connect(&mock, EncryptionType::Dh);
    let collection = ss.create_collection(&random_label(), "").unwrap();
    let attributes = HashMap::from([("app", "demo")]);
    let first = collection
        .create_item("demo", attributes.clone(), b"one", true, "text/plain")
        .unwrap();
    let second = collection
        .create_item("demo", attributes.clone(), b"two", true, "text/plain")
        .unwrap();
    assert_eq!(first.path(), second.path());
    assert_eq!(first.get_secret().unwrap(), b"two");
    let third = collection
        .create_item("demo", attributes.clone(), b"three", false, "text/plain")
        .unwrap();
    assert_ne!(first.path(), third.path());
    assert_eq!(collection.search_items(attributes).unwrap().len(), 2);
}

#[test]
fn test_delete_makes_handles_stale() {
    let mock = MockService::new(Mode::Normal);
    let ss = connect(&mock, EncryptionType::Dh);
    let collection = ss.create_collection(&random_label(), "").unwrap();
    let item = collection
        .create_item("demo", HashMap::new(), b"x", false, "text/plain")
        .unwrap();
    item.delete().unwrap();
    assert!(matches!(item.get_secret(), Err(Error::ItemNotFound(_))));
    assert!(matches!(item.get_label(), Err(Error::ItemNotFound(_))));
    collection.delete().unwrap();
    assert!(matches!(
        collection.get_label(),
        Err(Error::CollectionNotFound(_))
    ));
    assert!(matches!(
        collection.search_items(HashMap::new()),
        Err(Error::CollectionNotFound(_))
    ));
}

#[test]
fn test_delete_locked_item_prompts() {
    let mock = MockService::new(Mode::Lock);
    let ss = connect(&mock, EncryptionType::Dh);
    let found = ss.search_items(HashMap::from([("app", "demo")])).unwrap();
    let item = &found.locked[0];
    assert!(matches!(item.begin_delete().unwrap(), PromptOr::NeedsPrompt(_)));
    item.delete().unwrap();
    assert!(
        ss.search_items(HashMap::from([("app", "demo")]))
            .unwrap()
            .locked
            .is_empty()
    );
}

#[test]
fn test_aliases() {
    let mock = MockService::new(Mode::Normal);
    let ss = connect(&mock, EncryptionType::Dh);
    assert!(ss.read_alias("default").unwrap().is_none());
    assert!(matches!(
        ss.get_default_collection(),
        Err(Error::CollectionNotFound(_))
    ));
    assert!(matches!(
        ss.get_any_collection(),
        Err(Error::CollectionNotFound(_))
    ));
    let first = ss.create_collection("first", "").unwrap();
    assert_eq!(ss.get_any_collection().unwrap().path(), first.path());
    let second = ss.create_collection("second", "session").unwrap();
    assert_eq!(ss.get_any_collection().unwrap().path(), second.path());
    ss.set_alias("default", Some(&first)).unwrap();
    assert_eq!(ss.get_default_collection().unwrap().path(), first.path());
    assert_eq!(ss.get_any_collection().unwrap().path(), first.path());
    ss.set_alias("default", None).unwrap();
    assert!(ss.read_alias("default").unwrap().is_none());
    assert_eq!(ss.get_all_collections().unwrap().len(), 2);
}

#[test]
fn test_get_secrets_in_one_call() {
    let mock = MockService::new(Mode::Normal);
    let ss = connect(&mock, EncryptionType::Dh);
    let collection = ss.create_collection(&random_label(), "").unwrap();
    let a = collection
        .create_item("a", HashMap::from([("n", "a")]), b"alpha", false, "text/plain")
        .unwrap();
    let b = collection
        .create_item("b", HashMap::from([("n", "b")]), b"beta", false, "text/plain")
        .unwrap();
    let secrets = ss.get_secrets(&[&a, &b]).unwrap();
    assert_eq!(secrets.len(), 2);
    assert_eq!(secrets[a.path()], b"alpha");
    assert_eq!(secrets[b.path()], b"beta");
}

#[test]
fn test_lock_and_unlock_items() {
    let mock = MockService::new(Mode::Normal);
    let ss = connect(&mock, EncryptionType::Dh);
    let collection = ss.create_collection(&random_label(), "").unwrap();
    let item = collection
        .create_item("demo", HashMap::new(), b"x", false, "text/plain")
        .unwrap();
    let locked = ss.lock_all(&[&item]).unwrap();
    assert_eq!(locked, vec![item.path().clone()]);
    assert!(item.is_locked().unwrap());
    assert!(collection.is_locked().unwrap());
    assert!(ss.get_secrets(&[&item]).unwrap().is_empty());
    let unlocked = ss.unlock_all(&[&item]).unwrap();
    assert_eq!(unlocked, vec![item.path().clone()]);
    assert!(!item.is_locked().unwrap());
    collection.lock().unwrap();
    item.unlock().unwrap();
    assert!(!collection.is_locked().unwrap());
}

#[test]
fn test_disconnect_closes_the_session() {
    let mock = MockService::new(Mode::Normal);
    let ss = connect(&mock, EncryptionType::Dh);
    assert_eq!(mock.open_sessions(), 1);
    ss.disconnect().unwrap();
    assert_eq!(mock.open_sessions(), 0);
}

#[test]
fn test_settings_reach_the_connection() {
    let mock = MockService::new(Mode::Normal);
    let config = HashMap::from([("encryption", "plain"), ("window-id", "x11:42")]);
    let settings = Settings::from_config(&config).unwrap();
    let ss = SecretService::connect_with(Box::new(mock), settings).unwrap();
    assert_eq!(ss.session().encryption(), EncryptionType::Plain);
    assert_eq!(ss.settings().window_id, "x11:42");
}
