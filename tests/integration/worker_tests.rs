//! Worker thread end-to-end: loopback broker → worker → GatewayHandle.

use std::time::Duration;

use binfleet::app::commands::{CommandKind, CommandRequest};
use binfleet::app::events::GatewayUpdate;
use binfleet::config::LINK_DEPTH;
use binfleet::error::{Error, TransportError, ValidationError};
use binfleet::fleet::BinStatus;
use binfleet::link::LinkState;

use super::mock_adapters::{MAIN, SUB, fast_config, start, start_with, wait_subscribed, wait_until};

#[test]
fn telemetry_reaches_snapshot() {
    let mut g = start();
    assert!(g.sim.inject(MAIN, b"status-3-2"));

    wait_until("bin 3 update", || {
        g.handle.snapshot().bins[2].status == BinStatus::TwoThirds
    });
    let snap = g.handle.snapshot();
    assert!(snap.bins[2].last_updated.is_some());
    assert_eq!(snap.events.back().unwrap().view().message, "Bin 3: 2/3 Full");
    assert!(g.handle.shutdown());
}

#[test]
fn collect_is_tracked_until_bin_reports_empty() {
    let mut g = start();

    assert_eq!(
        g.handle.submit_request(&CommandRequest::collect(2)),
        Ok(CommandKind::Collect)
    );
    assert_eq!(g.sim.published(), vec![(SUB.to_string(), b"2".to_vec())]);
    assert_eq!(
        g.handle.submit_request(&CommandRequest::collect(2)),
        Err(Error::Validation(ValidationError::AlreadyPending))
    );

    // The broker echoed "2" back on the command topic; it is not logged.
    let messages: Vec<String> = g
        .handle
        .snapshot()
        .events
        .iter()
        .map(|e| e.view().message)
        .collect();
    assert_eq!(messages, vec!["Collecting bin 2"]);

    g.sim.inject(MAIN, b"status-2-0");
    wait_until("collect cleared", || g.handle.snapshot().pending_collects == 0);
    assert_eq!(
        g.handle.submit_request(&CommandRequest::collect(2)),
        Ok(CommandKind::Collect)
    );
    assert!(g.handle.shutdown());
}

#[test]
fn invalid_requests_never_reach_the_broker() {
    let mut g = start();
    assert_eq!(
        g.handle.submit_request(&CommandRequest::collect(9)),
        Err(Error::Validation(ValidationError::UnknownBin))
    );
    assert_eq!(
        g.handle.submit_request(&CommandRequest::raw("", "x")),
        Err(Error::Validation(ValidationError::EmptyTopic))
    );
    assert!(g.sim.published().is_empty());
    assert!(g.handle.shutdown());
}

#[test]
fn startup_retries_until_broker_accepts() {
    let mut g = start_with(fast_config(), |sim| sim.refuse_connects(2));
    wait_subscribed(&g.handle);

    assert_eq!(g.sim.connects(), 3);
    assert_eq!(
        g.sink.link_states(),
        vec![
            LinkState::Connecting,
            LinkState::Degraded { attempt: 0 },
            LinkState::Connecting,
            LinkState::Degraded { attempt: 1 },
            LinkState::Connecting,
            LinkState::Subscribed,
        ]
    );
    assert!(g.handle.shutdown());
}

#[test]
fn dropped_connection_is_reestablished() {
    let mut config = fast_config();
    config.backoff_base_ms = 300;
    config.backoff_max_ms = 1_000;
    let mut g = start_with(config, |_| {});
    wait_subscribed(&g.handle);

    g.sim.drop_connection();
    wait_until("degraded", || {
        matches!(g.handle.snapshot().link, LinkState::Degraded { .. })
    });
    assert_eq!(
        g.handle.submit_request(&CommandRequest::new(CommandKind::Dock)),
        Err(Error::Unavailable)
    );

    wait_until("reconnected", || {
        g.sim.connects() == 2 && g.handle.snapshot().link == LinkState::Subscribed
    });
    assert_eq!(g.sim.subscriptions(), vec![MAIN.to_string(), SUB.to_string()]);
    assert_eq!(
        g.handle.submit_request(&CommandRequest::new(CommandKind::Dock)),
        Ok(CommandKind::Dock)
    );
    assert!(g.handle.shutdown());
}

#[test]
fn publish_failure_degrades_and_reconnects() {
    let mut g = start();
    g.sim.fail_publishes(1);

    assert_eq!(
        g.handle.submit_request(&CommandRequest::new(CommandKind::Dock)),
        Err(Error::Transport(TransportError::PublishFailed))
    );
    assert!(g.sink.link_states().contains(&LinkState::Degraded { attempt: 0 }));

    wait_until("reconnected", || {
        g.sim.connects() == 2 && g.handle.snapshot().link == LinkState::Subscribed
    });
    assert_eq!(
        g.handle.submit_request(&CommandRequest::new(CommandKind::Dock)),
        Ok(CommandKind::Dock)
    );
    assert_eq!(g.sim.published().len(), 1);
    assert!(g.handle.shutdown());
}

#[test]
fn loss_is_seen_while_link_channel_is_full() {
    let mut g = start();
    g.sim.stall_publishes(Duration::from_millis(300));

    std::thread::scope(|s| {
        let busy = s.spawn(|| g.handle.submit_request(&CommandRequest::new(CommandKind::Calibrate)));
        // The worker is stuck inside the publish and drains nothing.
        wait_until("publish started", || g.sim.published().len() == 1);
        for _ in 0..LINK_DEPTH + 4 {
            assert!(g.sim.inject(MAIN, b"status-1-2"));
        }
        g.sim.drop_connection();
        assert_eq!(busy.join().unwrap(), Ok(CommandKind::Calibrate));
    });
    g.sim.stall_publishes(Duration::ZERO);

    wait_until("reconnected", || {
        g.sim.connects() == 2 && g.handle.snapshot().link == LinkState::Subscribed
    });
    assert!(g.sink.link_states().contains(&LinkState::Degraded { attempt: 0 }));
    assert!(g.handle.shutdown());
}

#[test]
fn request_withdrawn_on_timeout_is_never_published() {
    let mut config = fast_config();
    config.reply_timeout_ms = 200;
    let mut g = start_with(config, |_| {});
    wait_subscribed(&g.handle);
    g.sim.stall_publishes(Duration::from_millis(600));

    std::thread::scope(|s| {
        let busy = s.spawn(|| g.handle.submit_request(&CommandRequest::new(CommandKind::Calibrate)));
        wait_until("publish started", || g.sim.published().len() == 1);
        // Queued behind the stalled publish and given up on.
        assert_eq!(
            g.handle.submit_request(&CommandRequest::new(CommandKind::Dock)),
            Err(Error::Unavailable)
        );
        // Already on the wire, so its caller waits for the real outcome.
        assert_eq!(busy.join().unwrap(), Ok(CommandKind::Calibrate));
    });
    g.sim.stall_publishes(Duration::ZERO);

    // The worker has drained the withdrawn request by now.
    assert_eq!(
        g.handle.submit_request(&CommandRequest::new(CommandKind::Calibrate)),
        Ok(CommandKind::Calibrate)
    );
    let payloads: Vec<Vec<u8>> = g.sim.published().into_iter().map(|(_, p)| p).collect();
    assert_eq!(payloads, vec![b"0".to_vec(), b"0".to_vec()]);
    assert!(g.handle.shutdown());
}

#[test]
fn subscribers_see_live_updates() {
    let mut g = start();
    {
        let mut sub = g.handle.subscribe().unwrap();
        g.sim.inject(MAIN, b"status-1-3");
        let mut seen = None;
        wait_until("bin update published", || {
            while let Some(update) = sub.try_next_message_pure() {
                if let GatewayUpdate::BinChanged(state) = update {
                    seen = Some(state);
                }
            }
            seen.is_some()
        });
        assert_eq!(seen.unwrap().status, BinStatus::Full);
    }
    assert!(g.handle.shutdown());
}

#[test]
fn shutdown_tears_down_and_refuses_requests() {
    let mut g = start();
    assert!(g.handle.shutdown());
    // Idempotent.
    assert!(g.handle.shutdown());

    assert!(!g.sim.is_connected());
    assert!(g.sim.subscriptions().is_empty());
    assert_eq!(g.sink.link_states().last(), Some(&LinkState::Disconnected));
    assert_eq!(
        g.handle.submit_request(&CommandRequest::new(CommandKind::Calibrate)),
        Err(Error::Unavailable)
    );
    let bin = g.handle.fleet().bin(1).unwrap();
    assert!(!g.handle.reset_bin(bin));
}
