//! Integration tests for the mover lifecycle.
//!
//! The worker runs on tokio's paused clock; sleeping past a check interval
//! lets exactly one more pass run.

mod support;

use std::time::Duration;

use idlemover_bot::{Controller, MoverConfig, StartOutcome, StopOutcome};
use support::{config, server, ACTIVE, HOLDING, LOBBY, LONG_IDLE};

/// A little more than one check interval of [`config`].
const ONE_PASS: Duration = Duration::from_secs(31);

#[tokio::test(start_paused = true)]
async fn test_mover_runs_passes_until_stopped() {
    let mock = server();
    let alice = mock.add_client(1, LOBBY, LONG_IDLE);
    let controller = Controller::new(mock.clone(), config());

    assert_eq!(controller.start().await.unwrap(), StartOutcome::Started);
    tokio::time::sleep(ONE_PASS).await;

    assert_eq!(mock.channel_of(alice), Some(HOLDING));
    let tracked = controller.tracked_snapshot().await.unwrap();
    assert_eq!(tracked.get(&alice), Some(&LOBBY));

    assert_eq!(controller.stop().await, StopOutcome::Stopped);
    let listings = mock.participant_listings();
    tokio::time::sleep(ONE_PASS * 3).await;
    assert_eq!(mock.participant_listings(), listings);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_drops_tracking_entry() {
    let mock = server();
    let alice = mock.add_client(1, LOBBY, LONG_IDLE);
    let controller = Controller::new(mock.clone(), config());
    controller.start().await.unwrap();
    tokio::time::sleep(ONE_PASS).await;
    assert_eq!(mock.channel_of(alice), Some(HOLDING));

    mock.remove_client(alice);
    assert!(controller.on_client_left(alice).await);
    assert!(!controller.on_client_left(alice).await);
    assert_eq!(controller.tracked_snapshot().await, Some(Default::default()));

    // The next pass has nobody to move back
    tokio::time::sleep(ONE_PASS).await;
    assert_eq!(mock.moves().len(), 1);

    controller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_restart_begins_with_empty_tracking() {
    let mock = server();
    let alice = mock.add_client(1, LOBBY, LONG_IDLE);
    let controller = Controller::new(mock.clone(), config());
    controller.start().await.unwrap();
    tokio::time::sleep(ONE_PASS).await;
    assert_eq!(controller.tracked_snapshot().await.map(|t| t.len()), Some(1));

    assert_eq!(controller.restart().await.unwrap(), StartOutcome::Started);
    assert_eq!(controller.tracked_snapshot().await, Some(Default::default()));

    // Forgotten across the restart: active again, but not moved back
    mock.set_idle(alice, ACTIVE);
    tokio::time::sleep(ONE_PASS).await;
    assert_eq!(mock.channel_of(alice), Some(HOLDING));

    controller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_clears_tracking() {
    let mock = server();
    mock.add_client(1, LOBBY, LONG_IDLE);
    let controller = Controller::new(mock.clone(), config());
    controller.start().await.unwrap();
    tokio::time::sleep(ONE_PASS).await;

    controller.stop().await;

    assert!(!controller.is_running().await);
    assert_eq!(controller.tracked_snapshot().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_pass_keeps_mover_running() {
    let mock = server();
    let alice = mock.add_client(1, LOBBY, LONG_IDLE);
    let controller = Controller::new(mock.clone(), config());
    controller.start().await.unwrap();

    mock.panic_on_listing(true);
    tokio::time::sleep(ONE_PASS).await;
    assert!(controller.is_running().await);

    mock.panic_on_listing(false);
    tokio::time::sleep(ONE_PASS).await;
    assert_eq!(mock.channel_of(alice), Some(HOLDING));

    assert_eq!(controller.stop().await, StopOutcome::Stopped);
}

#[tokio::test]
async fn test_missing_holding_channel_prevents_start() {
    let mock = server();
    let config = MoverConfig {
        holding_location_name: "Away".to_string(),
        ..config()
    };
    let controller = Controller::new(mock, config);

    assert!(controller.start().await.is_err());
    assert!(!controller.is_running().await);
}
