//! Connection manager event ordering under dial failure and cancellation.
//!
//! No real broker is available in CI, so both scenarios run against loopback
//! port 8883 inside a single test to keep the port state deterministic:
//! first with nothing listening (the dial is refused), then with a silent
//! listener that holds the dial open long enough for cancellation to win.

use rewst_agent::config::Device;
use rewst_agent::transport::mqtt::IotHubBroker;
use rewst_agent::transport::{Broker, BrokerEvent};
use rewst_agent::{shutdown, AgentError};
use std::time::Duration;

fn test_device() -> Device {
    Device {
        device_id: "device-1".to_string(),
        rewst_org_id: "org-1".to_string(),
        rewst_engine_host: "engine.example.com".to_string(),
        shared_access_key: "c2VjcmV0".to_string(),
        azure_iot_hub_host: "localhost".to_string(),
        broker: None,
        logging_level: Default::default(),
        use_syslog: false,
    }
}

#[tokio::test]
async fn test_dial_failure_then_cancellation_ordering() {
    // Probe the broker port; if the host already runs something on 8883
    // neither scenario can be asserted safely.
    let probe = match tokio::net::TcpListener::bind("127.0.0.1:8883").await {
        Ok(listener) => listener,
        Err(_) => return,
    };
    drop(probe);

    // Scenario 1: nothing listening. The dial is refused on both transports
    // and the attempt ends in a connect error.
    let broker = IotHubBroker::new();
    let (_tx, rx) = shutdown::channel();
    let mut stream = broker.connect(&test_device(), rx);

    match stream.recv().await {
        Some(BrokerEvent::Connecting) => {}
        other => panic!("expected Connecting, got {other:?}"),
    }

    let event = tokio::time::timeout(Duration::from_secs(30), stream.recv())
        .await
        .expect("refused dial must fail promptly");
    match event {
        Some(BrokerEvent::Error(AgentError::Connect(_))) => {}
        other => panic!("expected connect error, got {other:?}"),
    }
    assert!(
        stream.recv().await.is_none(),
        "stream must close after terminal event"
    );

    // Scenario 2: a silent listener accepts the TCP connection and never
    // completes the handshake, so the connect acknowledgement cannot arrive
    // and cancellation must win the race.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:8883")
        .await
        .expect("port freed above");
    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            match listener.accept().await {
                Ok((stream, _)) => held.push(stream),
                Err(_) => break,
            }
        }
    });

    let (tx, rx) = shutdown::channel();
    let mut stream = broker.connect(&test_device(), rx);

    match stream.recv().await {
        Some(BrokerEvent::Connecting) => {}
        other => panic!("expected Connecting, got {other:?}"),
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(true).unwrap();

    let event = tokio::time::timeout(Duration::from_secs(10), stream.recv())
        .await
        .expect("cancellation must not wait for the dial");
    match event {
        Some(BrokerEvent::Cancelled) => {}
        other => panic!("expected Cancelled, got {other:?}"),
    }
    assert!(
        stream.recv().await.is_none(),
        "stream must close after terminal event"
    );
}
