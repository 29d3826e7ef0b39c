//! End-to-end relay scenarios driven through `ConnectionEvents`.

mod common;

use assert_matches::assert_matches;
use common::{Client, roster};
use parlor_core::Response;
use parlor_core::names::{MAX_NAME_LEN, MIN_NAME_LEN};
use parlor_relay::{ChatService, ConnectionEvents};

#[test]
fn register_accepts_only_lengths_four_through_twenty_four() {
    for len in 0..=MAX_NAME_LEN + 6 {
        let svc = ChatService::new();
        let alice = Client::connect(&svc, "a");
        let name = "n".repeat(len);

        alice.register(&svc, &name);

        let responses = alice.sink.responses();
        if (MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
            assert_eq!(
                responses,
                vec![Response::connection(name.as_str()), roster(&[name.as_str()])],
                "length {len}"
            );
        } else {
            assert_eq!(
                responses,
                vec![Response::error("Name is of incorrect length.")],
                "length {len}"
            );
            assert!(svc.registry().roster().is_empty());
        }
    }
}

#[test]
fn boundary_lengths() {
    let svc = ChatService::new();
    let c = Client::connect(&svc, "c");

    c.register(&svc, "abc");
    c.register(&svc, &"z".repeat(25));
    assert_eq!(svc.registry().named_count(), 0);

    c.register(&svc, "abcd");
    assert_eq!(svc.registry().roster(), vec!["abcd".to_string()]);

    c.register(&svc, &"z".repeat(24));
    assert_eq!(svc.registry().roster(), vec!["z".repeat(24)]);
}

#[test]
fn named_disconnect_announces_once_then_roster() {
    let svc = ChatService::new();
    let alice = Client::connect(&svc, "a");
    let watcher = Client::connect(&svc, "w");
    alice.register(&svc, "Alice");
    watcher.register(&svc, "Watcher");
    watcher.sink.clear();

    alice.leave(&svc);

    assert_eq!(
        watcher.sink.responses(),
        vec![Response::disconnect("Alice"), roster(&["Watcher"])]
    );

    // a repeated disconnect from the transport changes nothing
    alice.leave(&svc);
    assert_eq!(watcher.sink.responses().len(), 2);
}

#[test]
fn anonymous_disconnect_sends_roster_only() {
    let svc = ChatService::new();
    let lurker = Client::connect(&svc, "l");
    let alice = Client::connect(&svc, "a");
    alice.register(&svc, "Alice");
    alice.sink.clear();

    lurker.leave(&svc);

    assert_eq!(alice.sink.responses(), vec![roster(&["Alice"])]);
}

#[test]
fn rename_announces_with_old_name_then_roster() {
    let svc = ChatService::new();
    let alice = Client::connect(&svc, "a");
    let other = Client::connect(&svc, "o");
    alice.register(&svc, "Alice");
    other.sink.clear();

    alice.rename(&svc, "Bobby");

    let responses = other.sink.responses();
    assert_eq!(responses.len(), 2);
    assert_matches!(&responses[0], Response::NameChange { message } if message == "Alice is now known as Bobby");
    assert_eq!(responses[1], roster(&["Bobby"]));
}

#[test]
fn rename_to_three_letter_name_is_rejected() {
    let svc = ChatService::new();
    let alice = Client::connect(&svc, "a");
    let other = Client::connect(&svc, "o");
    alice.register(&svc, "Alice");
    alice.sink.clear();
    other.sink.clear();

    alice.rename(&svc, "Bob");

    assert_eq!(
        alice.sink.responses(),
        vec![Response::error("Name is of incorrect length.")]
    );
    assert!(other.sink.frames().is_empty());
    assert_eq!(svc.registry().roster(), vec!["Alice".to_string()]);
}

#[test]
fn roster_follows_registration_order() {
    let svc = ChatService::new();
    let clients: Vec<_> = (0..6)
        .map(|i| Client::connect(&svc, &format!("c{i}")))
        .collect();
    let names = ["Zelda", "Mario", "Luigi", "Peach", "Wario", "Daisy"];

    // c4 stays anonymous
    for (client, name) in clients.iter().zip(names) {
        if client.id.as_str() != "c4" {
            client.register(&svc, name);
        }
    }

    let last = clients[0].sink.responses().pop().unwrap();
    assert_eq!(last, roster(&["Zelda", "Mario", "Luigi", "Peach", "Daisy"]));
}

#[test]
fn messages_carry_sender_name_or_empty() {
    let svc = ChatService::new();
    let alice = Client::connect(&svc, "a");
    let anon = Client::connect(&svc, "x");
    alice.register(&svc, "Alice");
    alice.sink.clear();

    alice.say(&svc, "hello");
    anon.say(&svc, "psst");

    assert_eq!(
        alice.sink.responses(),
        vec![
            Response::message("Alice", "hello"),
            Response::message("", "psst"),
        ]
    );
}

#[test]
fn garbage_from_one_client_does_not_disturb_others() {
    let svc = ChatService::new();
    let alice = Client::connect(&svc, "a");
    let bad = Client::connect(&svc, "b");
    alice.register(&svc, "Alice");
    alice.sink.clear();
    bad.sink.clear();

    for frame in ["", "[]", "{}", r#"{"Type":"zero"}"#, r#"{"Type":1}"#, r#"{"Type":42}"#] {
        svc.on_receive(&bad.id, frame);
    }
    alice.say(&svc, "still here");

    assert_eq!(alice.sink.responses(), vec![Response::message("Alice", "still here")]);
    let errors = bad.sink.responses();
    assert_eq!(errors.len(), 7);
    assert!(errors[..6].iter().all(|r| matches!(r, Response::Error { .. })));
    assert_eq!(svc.registry().len(), 2);
}
