//! Authorization matrix for the server core.
//!
//! Covers the contract every transport relies on: untrusted callers get
//! exactly one `error` event and nothing runs, trust must be unanimous
//! across co-signers, replays execute once, and stale signatures lose to
//! the freshness window no matter how trusted the signer is.

mod common;

use std::time::Duration;

use common::{collect, server_for, server_with_max_age, split_terminal, TestNode};
use missive_core::protocol::{signed_command, Event, COMMAND_INFO, COMMAND_LIST, COMMAND_POST};
use missive_core::store::MessageStore;
use missive_core::Message;
use serde_json::json;

fn expect_error(terminal: &Event) -> (&str, u16) {
    match terminal {
        Event::Error {
            message,
            status_code,
        } => (message.as_str(), *status_code),
        Event::End => panic!("expected an error event, stream ended cleanly"),
        Event::Data { .. } => unreachable!("data is not terminal"),
    }
}

#[tokio::test]
async fn untrusted_caller_gets_one_error_and_no_data() {
    let serving = TestNode::new();
    let server = server_for(&serving, &[]);
    let stranger = TestNode::new();

    let command = signed_command(&stranger.identity, COMMAND_LIST, json!({})).unwrap();
    let events = collect(server.handle(command)).await;

    assert_eq!(events.len(), 1, "exactly one event, no data");
    let (payloads, terminal) = split_terminal(events);
    assert!(payloads.is_empty());
    let (message, _status) = expect_error(&terminal);
    assert_eq!(message, "not allowed to run list");
}

#[tokio::test]
async fn trusted_caller_runs_info() {
    let serving = TestNode::new();
    let caller = TestNode::new();
    let server = server_for(&serving, &[caller.identity.public_key_hex()]);

    let command = signed_command(&caller.identity, COMMAND_INFO, json!(null)).unwrap();
    let (payloads, terminal) = split_terminal(collect(server.handle(command)).await);

    assert_eq!(terminal, Event::End);
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["public_key"], serving.identity.public_key_hex());
}

#[tokio::test]
async fn trust_must_be_unanimous_across_cosigners() {
    let serving = TestNode::new();
    let trusted = TestNode::new();
    let stranger = TestNode::new();
    let server = server_for(&serving, &[trusted.identity.public_key_hex()]);

    // Trusted alone would suffice; the untrusted co-signer vetoes.
    let mut command = Message::command(COMMAND_LIST, json!({})).finish().unwrap();
    command.sign(&trusted.identity).unwrap();
    command.sign(&stranger.identity).unwrap();

    let (payloads, terminal) = split_terminal(collect(server.handle(command)).await);
    assert!(payloads.is_empty());
    let (message, _status) = expect_error(&terminal);
    assert_eq!(message, "not allowed to run list");
}

#[tokio::test]
async fn cosigned_command_runs_when_every_signer_is_trusted() {
    let serving = TestNode::new();
    let first = TestNode::new();
    let second = TestNode::new();
    let server = server_for(
        &serving,
        &[
            first.identity.public_key_hex(),
            second.identity.public_key_hex(),
        ],
    );

    let mut command = Message::command(COMMAND_INFO, json!(null)).finish().unwrap();
    command.sign(&first.identity).unwrap();
    command.sign(&second.identity).unwrap();

    let (payloads, terminal) = split_terminal(collect(server.handle(command)).await);
    assert_eq!(terminal, Event::End);
    assert_eq!(payloads.len(), 1);
}

#[tokio::test]
async fn identical_command_executes_once_then_replays_reject() {
    let serving = TestNode::new();
    let caller = TestNode::new();
    let server = server_for(&serving, &[caller.identity.public_key_hex()]);

    let message = Message::plain("payload").finish().unwrap();
    let command =
        signed_command(&caller.identity, COMMAND_POST, json!({ "message": message })).unwrap();

    let (_, first_terminal) = split_terminal(collect(server.handle(command.clone())).await);
    assert_eq!(first_terminal, Event::End);
    assert_eq!(serving.store.len().await.unwrap(), 1);

    let (payloads, second_terminal) = split_terminal(collect(server.handle(command)).await);
    assert!(payloads.is_empty());
    let (reason, status) = expect_error(&second_terminal);
    assert_eq!(reason, "command has already been run");
    assert_eq!(status, 400);
    assert_eq!(serving.store.len().await.unwrap(), 1, "no re-execution");
}

#[tokio::test]
async fn concurrent_identical_commands_execute_once() {
    let serving = TestNode::new();
    let caller = TestNode::new();
    let server = server_for(&serving, &[caller.identity.public_key_hex()]);

    let message = Message::plain("racy payload").finish().unwrap();
    let command =
        signed_command(&caller.identity, COMMAND_POST, json!({ "message": message })).unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let server = server.clone();
        let command = command.clone();
        handles.push(tokio::spawn(
            async move { collect(server.handle(command)).await },
        ));
    }

    let mut successes = 0;
    let mut replays = 0;
    for handle in handles {
        let (_, terminal) = split_terminal(handle.await.unwrap());
        match terminal {
            Event::End => successes += 1,
            Event::Error { message, .. } => {
                assert_eq!(message, "command has already been run");
                replays += 1;
            }
            Event::Data { .. } => unreachable!(),
        }
    }
    assert_eq!(successes, 1, "exactly one submission may execute");
    assert_eq!(replays, 7);
    assert_eq!(serving.store.len().await.unwrap(), 1);
}

#[tokio::test]
async fn stale_signatures_are_rejected_even_from_trusted_keys() {
    let serving = TestNode::new();
    let caller = TestNode::new();
    let server = server_with_max_age(
        &serving,
        &[caller.identity.public_key_hex()],
        Duration::from_millis(50),
    );

    let command = signed_command(&caller.identity, COMMAND_INFO, json!(null)).unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;

    let (payloads, terminal) = split_terminal(collect(server.handle(command)).await);
    assert!(payloads.is_empty());
    let (message, status) = expect_error(&terminal);
    assert_eq!(message, "signature is not recent enough");
    assert_eq!(status, 401);
}

#[tokio::test]
async fn freshness_is_judged_by_the_oldest_cosignature() {
    let serving = TestNode::new();
    let early = TestNode::new();
    let late = TestNode::new();
    let server = server_with_max_age(
        &serving,
        &[early.identity.public_key_hex(), late.identity.public_key_hex()],
        Duration::from_millis(100),
    );

    let mut command = Message::command(COMMAND_INFO, json!(null)).finish().unwrap();
    command.sign(&early.identity).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    // The second endorsement is fresh; the first is not, and it decides.
    command.sign(&late.identity).unwrap();

    let (_, terminal) = split_terminal(collect(server.handle(command)).await);
    let (message, status) = expect_error(&terminal);
    assert_eq!(message, "signature is not recent enough");
    assert_eq!(status, 401);
}

#[tokio::test]
async fn non_command_messages_are_rejected_up_front() {
    let serving = TestNode::new();
    let server = server_for(&serving, &[]);

    let mut message = Message::plain("just a message").finish().unwrap();
    message.sign(&serving.identity).unwrap();

    let (_, terminal) = split_terminal(collect(server.handle(message)).await);
    let (reason, status) = expect_error(&terminal);
    assert_eq!(reason, "not a command");
    assert_eq!(status, 400);
}
