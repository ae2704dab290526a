mod common;

use intentflow::kernel::event::InboundMessage;
use intentflow::kernel::runtime::DialogRuntime;
use intentflow::kernel::telemetry::event::{SwitchKind, TelemetryEvent};
use intentflow::kernel::telemetry::recorder::TelemetryRecorder;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_failed_turn_posts_notice_and_keeps_running() {
    let (dialog, _) = common::travel_dialog();
    let (_tx, rx) = mpsc::channel(10);
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let mut runtime = DialogRuntime::new(dialog, rx, out_tx, CancellationToken::new());

    // 1. Nothing recognisable
    runtime.step(InboundMessage::text("conv-1", "hello there")).await;
    let notice = out_rx.try_recv().unwrap();
    assert_eq!(notice.conversation_id, "conv-1");
    assert_eq!(notice.text, "Sorry, I could not process that.");
    assert!(runtime.session("conv-1").is_none());

    // 2. Next turn works normally
    runtime.step(InboundMessage::text("conv-1", "Book a flight to Paris")).await;
    assert_eq!(out_rx.try_recv().unwrap().text, "Which city are you departing from?");
}

#[tokio::test]
async fn test_conversations_have_separate_sessions() {
    let (dialog, seen) = common::travel_dialog();
    let (tx, rx) = mpsc::channel(10);
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let mut runtime = DialogRuntime::new(dialog, rx, out_tx, CancellationToken::new());

    tx.send(InboundMessage::text("alice", "Book a flight to Paris")).await.unwrap();
    tx.send(InboundMessage::text("bob", "find hotels in Oslo")).await.unwrap();
    tx.send(InboundMessage::text("alice", "Boston")).await.unwrap();
    drop(tx);

    // Returns once the sender is gone and the queue is drained.
    runtime.run().await;

    let mut posted = Vec::new();
    while let Ok(message) = out_rx.try_recv() {
        posted.push((message.conversation_id, message.text));
    }
    assert_eq!(
        posted,
        vec![
            ("alice".to_string(), "Which city are you departing from?".to_string()),
            ("bob".to_string(), "How many nights?".to_string()),
            ("alice".to_string(), "Flight booked: Boston / Paris".to_string()),
        ]
    );
    assert!(runtime.session("alice").is_none());
    assert!(!runtime.session("bob").unwrap().is_idle());
    assert_eq!(runtime.session_count(), 1);
    assert_eq!(*seen.lock().unwrap(), vec!["BookFlight"]);
}

#[tokio::test]
async fn test_finished_conversations_are_not_retained() {
    let (dialog, _) = common::travel_dialog();
    let (_tx, rx) = mpsc::channel(10);
    let (out_tx, _out_rx) = mpsc::unbounded_channel();
    let mut runtime = DialogRuntime::new(dialog, rx, out_tx, CancellationToken::new());

    // 1. Many one-turn conversations
    for i in 0..1000 {
        runtime
            .step(InboundMessage::text(&format!("conv-{}", i), "cancel booking AB1234"))
            .await;
    }
    assert_eq!(runtime.session_count(), 0);

    // 2. A parked flow keeps its session until the flow completes
    runtime.step(InboundMessage::text("open", "Book a flight to Paris")).await;
    assert_eq!(runtime.session_count(), 1);
    runtime.step(InboundMessage::text("open", "Boston")).await;
    assert_eq!(runtime.session_count(), 0);
}

#[tokio::test]
async fn test_dropping_the_runtime_lets_a_printer_drain_every_reply() {
    let (dialog, _) = common::travel_dialog();
    let (tx, rx) = mpsc::channel(10);
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let mut runtime = DialogRuntime::new(dialog, rx, out_tx, CancellationToken::new());

    let printer = tokio::spawn(async move {
        let mut printed = Vec::new();
        while let Some(message) = out_rx.recv().await {
            printed.push(message.text);
        }
        printed
    });

    tx.send(InboundMessage::text("conv-1", "Book a flight to Paris")).await.unwrap();
    tx.send(InboundMessage::text("conv-1", "Boston")).await.unwrap();
    drop(tx);
    runtime.run().await;

    // The printer only finishes once the runtime's sender is gone.
    drop(runtime);
    let printed = tokio::time::timeout(std::time::Duration::from_secs(1), printer)
        .await
        .expect("printer did not finish")
        .unwrap();
    assert_eq!(
        printed,
        vec!["Which city are you departing from?", "Flight booked: Boston / Paris"]
    );
}

#[tokio::test]
async fn test_shutdown_stops_the_loop() {
    let (dialog, _) = common::travel_dialog();
    let (_tx, rx) = mpsc::channel::<InboundMessage>(10);
    let (out_tx, _out_rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();
    let mut runtime = DialogRuntime::new(dialog, rx, out_tx, shutdown.clone());

    shutdown.cancel();
    tokio::time::timeout(std::time::Duration::from_secs(1), runtime.run())
        .await
        .expect("runtime did not stop");
}

#[tokio::test]
async fn test_telemetry_counts_a_full_conversation() {
    let (dialog, _) = common::travel_dialog();
    let mut conv = common::Conversation::new(dialog);

    conv.say("Book a flight to Paris").await.unwrap();
    conv.say("cancel my booking").await.unwrap();
    conv.say("yes").await.unwrap();
    conv.say("AB1234").await.unwrap();
    let _ = conv.say("hello there").await;

    let snapshot = conv.dialog.telemetry();
    assert_eq!(snapshot.turns_with_winner, 1);
    assert_eq!(snapshot.turns_without_winner, 1);
    assert_eq!(snapshot.prompts, 2);
    assert_eq!(snapshot.switches.confirm_requested, 1);
    assert_eq!(snapshot.switches.replaced, 1);
    assert_eq!(snapshot.dispatched, 1);
}

#[test]
fn test_recorder_is_bounded() {
    let mut recorder = TelemetryRecorder::new();
    for _ in 0..10_050 {
        recorder.record(TelemetryEvent::NoWinner);
    }
    recorder.record(TelemetryEvent::ContextSwitch {
        from: "A".into(),
        to: "B".into(),
        kind: SwitchKind::Refused,
    });

    assert_eq!(recorder.events().count(), 10_000);
    let snapshot = recorder.snapshot();
    assert_eq!(snapshot.turns_without_winner, 9_999);
    assert_eq!(snapshot.switches.refused, 1);

    recorder.clear();
    assert_eq!(recorder.snapshot(), Default::default());
}
