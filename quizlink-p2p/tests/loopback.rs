//! Two real transports over localhost playing full sessions.

use quizlink_core::domain::question::OPTION_COUNT;
use quizlink_core::traits::{EmoteInventory, NullResultSink};
use quizlink_core::{Question, Session, SessionEffect, Verdict};
use quizlink_p2p::{
    BeaconConfig, BeaconTransport, EstablishedLink, GroupConfig, GroupTransport, PeerRef,
    SessionRuntime, Transport, TransportEvent, UiTrigger,
};
use std::collections::HashSet;
use tokio::sync::mpsc;

struct NoEmotes;

impl EmoteInventory for NoEmotes {
    fn owned_emote_ids(&self) -> HashSet<String> {
        HashSet::new()
    }
}

/// Five questions, option 1 always correct
fn bank() -> Vec<Question> {
    (1..=5)
        .map(|id| {
            let options: [String; OPTION_COUNT] =
                ["A".to_string(), "B".to_string(), "C".to_string(), "D".to_string()];
            Question::new(id, format!("Question {id}"), options, 1).unwrap()
        })
        .collect()
}

async fn wait_for_link(events: &mut mpsc::Receiver<TransportEvent>) -> EstablishedLink {
    loop {
        let event = events.recv().await.expect("event channel closed before connect");
        if let Some(link) = EstablishedLink::from_event(&event) {
            return link;
        }
    }
}

/// Answer every presented question with a fixed option until the session
/// finishes.
fn auto_answer(
    mut handle: quizlink_p2p::RuntimeHandle,
    option: u8,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(effect) = handle.effects.recv().await {
            match effect {
                SessionEffect::PresentQuestion { .. } => {
                    if handle.triggers.send(UiTrigger::Answer(option)).await.is_err() {
                        break;
                    }
                }
                SessionEffect::Finished(_) => break,
                _ => {}
            }
        }
    })
}

async fn beacon_pair() -> (
    BeaconTransport,
    mpsc::Receiver<TransportEvent>,
    EstablishedLink,
    BeaconTransport,
    mpsc::Receiver<TransportEvent>,
    EstablishedLink,
) {
    let (host_tx, mut host_rx) = mpsc::channel(64);
    let mut host = BeaconTransport::new(
        BeaconConfig::new("Alice").with_beacon_port(0),
        host_tx,
    );
    host.listen().await.unwrap();
    let port = host.local_addr().unwrap().port();

    let (client_tx, mut client_rx) = mpsc::channel(64);
    let mut client = BeaconTransport::new(
        BeaconConfig::new("Bob").with_beacon_port(0),
        client_tx,
    );
    client
        .connect(&PeerRef::new("Alice", format!("127.0.0.1:{port}")))
        .await
        .unwrap();

    let host_link = wait_for_link(&mut host_rx).await;
    let client_link = wait_for_link(&mut client_rx).await;

    (host, host_rx, host_link, client, client_rx, client_link)
}

#[tokio::test(flavor = "multi_thread")]
async fn beacon_roles_resolve_once() {
    let (mut host, _hrx, host_link, mut client, _crx, client_link) = beacon_pair().await;

    assert!(host_link.is_host());
    assert!(!client_link.is_host());
    assert_eq!(client_link.peer_name, "Alice");

    host.stop().await;
    client.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn beacon_full_game_host_wins() {
    let (host, host_rx, host_link, client, client_rx, client_link) = beacon_pair().await;

    let host_session = Session::host(bank(), "Alice").unwrap();
    let client_session = Session::client("Bob");

    let (host_rt, host_handle) = SessionRuntime::versus(
        host_link,
        host_session,
        Box::new(host),
        host_rx,
        Box::new(NullResultSink),
        Box::new(NoEmotes),
    );
    let (client_rt, client_handle) = SessionRuntime::versus(
        client_link,
        client_session,
        Box::new(client),
        client_rx,
        Box::new(NullResultSink),
        Box::new(NoEmotes),
    );

    // Host always answers correctly, client always wrong
    let host_driver = auto_answer(host_handle, 1);
    let client_driver = auto_answer(client_handle, 2);

    let (host_outcome, client_outcome) = tokio::join!(host_rt.run(), client_rt.run());
    let host_outcome = host_outcome.unwrap();
    let client_outcome = client_outcome.unwrap();

    assert_eq!(host_outcome.local_score, 125);
    assert_eq!(host_outcome.remote_score, Some(0));
    assert_eq!(host_outcome.verdict, Verdict::Win);

    assert_eq!(client_outcome.local_score, 0);
    assert_eq!(client_outcome.remote_score, Some(125));
    assert_eq!(client_outcome.verdict, Verdict::Loss);

    host_driver.await.unwrap();
    client_driver.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn beacon_peer_drop_awards_bonus() {
    let (host, host_rx, host_link, mut client, mut client_rx, _client_link) = beacon_pair().await;

    let host_session = Session::host(bank(), "Alice").unwrap();
    let (host_rt, host_handle) = SessionRuntime::versus(
        host_link,
        host_session,
        Box::new(host),
        host_rx,
        Box::new(NullResultSink),
        Box::new(NoEmotes),
    );
    let host_driver = auto_answer(host_handle, 1);

    // The far side reads the host's opening messages, then vanishes
    let killer = tokio::spawn(async move {
        let mut seen_answer = false;
        while !seen_answer {
            match client_rx.recv().await.expect("client events closed") {
                TransportEvent::Message(message) => {
                    let json = serde_json::to_string(&message).unwrap();
                    seen_answer = json.contains("AnswerSubmitted");
                }
                _ => {}
            }
        }
        client.stop().await;
    });

    let outcome = host_rt.run().await.unwrap();
    // One correct answer plus the disconnect bonus
    assert_eq!(outcome.local_score, 25 + 20);
    assert_eq!(outcome.verdict, Verdict::Win);

    killer.await.unwrap();
    host_driver.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn group_negotiation_resolves_one_owner() {
    let (a_tx, mut a_rx) = mpsc::channel(64);
    let mut a = GroupTransport::new(
        GroupConfig::new("Alice")
            .with_negotiation_port(0)
            .with_tcp_port(49321)
            .with_owner_intent(15),
        a_tx,
    );
    a.listen().await.unwrap();
    let addr = a.local_addr().unwrap();

    let (b_tx, mut b_rx) = mpsc::channel(64);
    let mut b = GroupTransport::new(
        GroupConfig::new("Bob")
            .with_negotiation_port(0)
            .with_tcp_port(49322)
            .with_owner_intent(0),
        b_tx,
    );
    b.connect(&PeerRef::new("Alice", format!("127.0.0.1:{}", addr.port())))
        .await
        .unwrap();

    let a_link = wait_for_link(&mut a_rx).await;
    let b_link = wait_for_link(&mut b_rx).await;

    // Exactly one owner, and the intent decided it
    assert!(a_link.is_host());
    assert!(!b_link.is_host());
    assert_eq!(a_link.peer_name, "Bob");
    assert_eq!(b_link.peer_name, "Alice");

    // The data stream carries frames both ways
    b.send(quizlink_core::Message::name_request()).await;
    loop {
        match a_rx.recv().await.expect("a events closed") {
            TransportEvent::Message(m) => {
                assert_eq!(m, quizlink_core::Message::name_request());
                break;
            }
            other => panic!("unexpected event before message: {other:?}"),
        }
    }

    a.stop().await;
    b.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn group_full_game_over_negotiated_link() {
    let (a_tx, mut a_rx) = mpsc::channel(64);
    let mut a = GroupTransport::new(
        GroupConfig::new("Alice")
            .with_negotiation_port(0)
            .with_tcp_port(49331)
            .with_owner_intent(15),
        a_tx,
    );
    a.listen().await.unwrap();
    let addr = a.local_addr().unwrap();

    let (b_tx, mut b_rx) = mpsc::channel(64);
    let mut b = GroupTransport::new(
        GroupConfig::new("Bob")
            .with_negotiation_port(0)
            .with_tcp_port(49332)
            .with_owner_intent(0),
        b_tx,
    );
    b.connect(&PeerRef::new("Alice", format!("127.0.0.1:{}", addr.port())))
        .await
        .unwrap();

    let a_link = wait_for_link(&mut a_rx).await;
    let b_link = wait_for_link(&mut b_rx).await;
    assert!(a_link.is_host());

    let (host_rt, host_handle) = SessionRuntime::versus(
        a_link,
        Session::host(bank(), "Alice").unwrap(),
        Box::new(a),
        a_rx,
        Box::new(NullResultSink),
        Box::new(NoEmotes),
    );
    let (client_rt, client_handle) = SessionRuntime::versus(
        b_link,
        Session::client("Bob"),
        Box::new(b),
        b_rx,
        Box::new(NullResultSink),
        Box::new(NoEmotes),
    );

    // Both answer correctly every time: a draw
    let host_driver = auto_answer(host_handle, 1);
    let client_driver = auto_answer(client_handle, 1);

    let (host_outcome, client_outcome) = tokio::join!(host_rt.run(), client_rt.run());
    let host_outcome = host_outcome.unwrap();
    let client_outcome = client_outcome.unwrap();

    assert_eq!(host_outcome.local_score, 125);
    assert_eq!(host_outcome.remote_score, Some(125));
    assert_eq!(host_outcome.verdict, Verdict::Draw);
    assert_eq!(client_outcome.verdict, Verdict::Draw);

    host_driver.await.unwrap();
    client_driver.await.unwrap();
}
