//! FIFO guarantees of the command queue under concurrent producers.

use std::sync::Arc;

use observe_client::command::{command_queue, Command};
use observe_client::events::{EventPublisher, LogLevel, SessionEvent};
use observe_client::transport::mock::MockTransport;
use observe_client::Instrument;

#[tokio::test]
async fn drains_in_enqueue_order() {
    let transport = MockTransport::new();
    let (events, _rx) = EventPublisher::channel();
    let (sender, mut queue) = command_queue();

    for n in 0..20 {
        sender
            .enqueue(Command::spectrograph(format!("SPCH 1 {}", n)))
            .unwrap();
    }
    assert_eq!(queue.drain_and_execute_all(&transport, &events).await, 20);

    let lines: Vec<_> = transport
        .executed()
        .into_iter()
        .map(|c| c.args[0].clone())
        .collect();
    let expected: Vec<_> = (0..20).map(|n| format!("SPCH 1 {}", n)).collect();
    assert_eq!(lines, expected);

    // Nothing left for the next cycle.
    assert_eq!(queue.drain_and_execute_all(&transport, &events).await, 0);
}

#[tokio::test]
async fn concurrent_producers_keep_their_own_order() {
    let transport = MockTransport::new();
    let (events, _rx) = EventPublisher::channel();
    let (sender, mut queue) = command_queue();

    let producers: Vec<_> = Instrument::DETECTORS
        .into_iter()
        .map(|instrument| {
            let sender = sender.clone();
            std::thread::spawn(move || {
                for n in 0..50 {
                    sender
                        .enqueue(Command::expose(instrument, "expose_set_key", [n.to_string()]))
                        .unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    assert_eq!(queue.drain_and_execute_all(&transport, &events).await, 150);

    let executed = transport.executed();
    for instrument in Instrument::DETECTORS {
        let sequence: Vec<u32> = executed
            .iter()
            .filter(|c| c.target == instrument)
            .map(|c| c.args[0].parse().unwrap())
            .collect();
        assert_eq!(sequence, (0..50).collect::<Vec<_>>(), "{}", instrument);
    }
}

#[tokio::test]
async fn drain_order_matches_interleaved_enqueue_order() {
    let transport = Arc::new(MockTransport::new());
    let (events, _rx) = EventPublisher::channel();
    let (sender, mut queue) = command_queue();

    let a = sender.clone();
    let b = sender.clone();
    a.enqueue(Command::telescope("TSGM 1")).unwrap();
    b.enqueue(Command::spectrograph("SPCH 2 1")).unwrap();
    a.enqueue(Command::telescope("TSGM 0")).unwrap();

    queue
        .drain_and_execute_all(transport.as_ref(), &events)
        .await;

    let order: Vec<_> = transport
        .executed()
        .into_iter()
        .map(|c| (c.target, c.args[0].clone()))
        .collect();
    assert_eq!(
        order,
        vec![
            (Instrument::Telescope, "TSGM 1".to_string()),
            (Instrument::Spectrograph, "SPCH 2 1".to_string()),
            (Instrument::Telescope, "TSGM 0".to_string()),
        ]
    );
}

#[tokio::test]
async fn every_command_is_audited() {
    let transport = MockTransport::new();
    let (events, mut rx) = EventPublisher::channel();
    let (sender, mut queue) = command_queue();

    sender
        .enqueue(Command::expose(
            Instrument::Ccd700,
            "expose_set_key",
            ["OBJECT", "HD 1234"],
        ))
        .unwrap();
    queue.drain_and_execute_all(&transport, &events).await;

    let mut info = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let SessionEvent::Log {
            level: LogLevel::Info,
            message,
        } = event
        {
            info.push(message);
        }
    }
    assert_eq!(
        info,
        vec!["ccd700 - expose_set_key(\"OBJECT\", \"HD 1234\")".to_string()]
    );
}
