#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use common::{Client, TestServer};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use votifier_protocol::{Challenge, TokenStore, VoteValidator};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_clients_each_deliver_one_vote() {
    let mut server = TestServer::start().await;
    let key = Arc::new(server.key("alpha"));
    let clients = 64usize;

    let mut tasks = JoinSet::new();
    for i in 0..clients {
        let key = Arc::clone(&key);
        let addr = server.addr;
        tasks.spawn(async move {
            let mut client = Client::connect(addr).await;
            client.send_vote("alpha", &format!("player{i}"), &key).await;
            client.closed().await;
        });
    }
    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }

    let mut seen = HashSet::new();
    for _ in 0..clients {
        let vote = server.votes.recv().await.unwrap();
        assert!(seen.insert(vote.username));
    }
    assert!(server.errors.try_recv().is_err());

    let snapshot = server.server.metrics().snapshot();
    assert_eq!(snapshot.connections_total, clients as u64);
    assert_eq!(snapshot.votes_accepted, clients as u64);
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn shared_validator_across_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let tokens = TokenStore::initialize(dir.path().join("tokens.json"), &["alpha"], true).unwrap();
    let challenge = Challenge::generate().unwrap();
    let validator = Arc::new(VoteValidator::new(
        Arc::new(challenge.clone()),
        Arc::new(tokens),
    ));
    let key = validator.tokens().get("alpha").unwrap().key().to_vec();

    let mut tasks = JoinSet::new();
    for i in 0..8usize {
        let validator = Arc::clone(&validator);
        let key = key.clone();
        let challenge = challenge.to_string();
        tasks.spawn(async move {
            for j in 0..500usize {
                let frame = common::signed_frame("alpha", &format!("p{i}-{j}"), &challenge, &key);
                let vote = validator.validate(&frame).unwrap();
                assert_eq!(vote.username, format!("p{i}-{j}"));
            }
        });
    }

    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }
}
