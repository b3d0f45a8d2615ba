//! Integration tests for the tracker daemon.
//!
//! These tests drive a complete tracker through its handle:
//! - Simulated positioning / geofence / power services
//! - Binary track file in a temporary directory
//! - Channel event sink
//!
//! Run with: `cargo test --test tracker_integration`

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use trackline::config::TrackerConfig;
use trackline::error::TrackerError;
use trackline::fix::Fix;
use trackline::observer::{ChannelEventSink, TrackerEvent};
use trackline::persistence::{TrackFile, TrackStore};
use trackline::ports::{AppState, AuthorizationStatus, BatteryState};
use trackline::sim::{
    GeofenceCommand, ManualClock, PositioningCommand, SimulatedGeofence, SimulatedPositioning,
    SimulatedPower,
};
use trackline::tracker::{
    TrackerDaemon, TrackerDaemonConfig, TrackerHandle, TrackerMachine, TrackerPorts, TrackerState,
};

// ============================================================================
// Test Helpers
// ============================================================================

const T0: i64 = 1_477_000_000;

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(T0 + secs, 0).unwrap()
}

fn fix(lat: f64, lon: f64, accuracy: f64, secs: i64) -> Fix {
    Fix::new(lat, lon, accuracy, at(secs))
}

struct Session {
    handle: TrackerHandle,
    events: UnboundedReceiver<TrackerEvent>,
    positioning: Arc<SimulatedPositioning>,
    geofence: Arc<SimulatedGeofence>,
    power: Arc<SimulatedPower>,
    clock: Arc<ManualClock>,
    track: TrackFile,
    shutdown: CancellationToken,
    task: JoinHandle<TrackerMachine>,
    _dir: TempDir,
}

impl Session {
    fn spawn() -> Self {
        Self::spawn_with(TrackerDaemonConfig::default())
    }

    fn spawn_with(daemon_config: TrackerDaemonConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let track = TrackFile::new(dir.path().join("track.bin"));

        let positioning = Arc::new(SimulatedPositioning::new());
        let geofence = Arc::new(SimulatedGeofence::new());
        let power = Arc::new(SimulatedPower::new());
        let clock = Arc::new(ManualClock::new(at(0)));
        let ports = TrackerPorts {
            positioning: positioning.clone(),
            geofence: geofence.clone(),
            power: power.clone(),
            clock: clock.clone(),
        };

        let (sink, events) = ChannelEventSink::new();
        let machine = TrackerMachine::new(
            TrackerConfig::default(),
            ports,
            Arc::new(track.clone()),
            Arc::new(sink),
        )
        .unwrap();
        let (daemon, handle) = TrackerDaemon::new(machine, daemon_config);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(daemon.run(shutdown.clone()));

        Self {
            handle,
            events,
            positioning,
            geofence,
            power,
            clock,
            track,
            shutdown,
            task,
            _dir: dir,
        }
    }

    /// Deliver a batch at the time of its newest fix and wait for it.
    async fn deliver(&mut self, batch: Vec<Fix>) -> Vec<TrackerEvent> {
        if let Some(newest) = batch.iter().map(|f| f.timestamp).max() {
            self.clock.set(newest);
        }
        self.handle.fixes(batch).unwrap();
        self.settle().await
    }

    /// Wait for every queued command, then collect the emitted events.
    async fn settle(&mut self) -> Vec<TrackerEvent> {
        self.handle.flush().await.unwrap();
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    fn state(&self) -> TrackerState {
        self.handle.status().state
    }

    async fn shutdown(self) -> TrackerMachine {
        self.shutdown.cancel();
        self.task.await.unwrap()
    }

    /// Shut down but hand back the temp directory so the track file outlives the session.
    async fn shutdown_keeping_dir(self) -> (TrackerMachine, TempDir) {
        self.shutdown.cancel();
        (self.task.await.unwrap(), self._dir)
    }
}

fn names(events: &[TrackerEvent]) -> Vec<&'static str> {
    events.iter().map(TrackerEvent::name).collect()
}

fn emitted(events: &[TrackerEvent]) -> Vec<Fix> {
    events
        .iter()
        .filter_map(|event| match event {
            TrackerEvent::LocationsUpdated(fixes) => Some(fixes.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_start_emits_started() {
    let mut session = Session::spawn();

    session.handle.start().unwrap();
    let events = session.settle().await;

    assert_eq!(names(&events), vec!["started"]);
    assert_eq!(session.state(), TrackerState::Started);
    assert_eq!(
        session.positioning.commands(),
        vec![PositioningCommand::StartUpdates]
    );

    session.shutdown().await;
}

#[tokio::test]
async fn test_significance_over_batches() {
    let mut session = Session::spawn();
    session.handle.start().unwrap();
    session.settle().await;

    let first = fix(37.0, -122.0, 5.0, 0);
    assert_eq!(emitted(&session.deliver(vec![first]).await), vec![first]);
    assert_eq!(session.handle.status().last_fix, Some(first));

    assert!(emitted(&session.deliver(vec![fix(37.0, -122.0, 5.0, 5)]).await).is_empty());

    let later = fix(37.0, -122.0, 5.0, 35);
    assert_eq!(emitted(&session.deliver(vec![later]).await), vec![later]);

    assert_eq!(session.track.read_all().unwrap(), vec![first, later]);
    assert_eq!(session.track.len().unwrap(), 2);

    session.shutdown().await;
}

#[tokio::test]
async fn test_stationary_region_exit_restarts() {
    let mut session = Session::spawn();
    session.handle.start().unwrap();
    session.settle().await;
    session.deliver(vec![fix(37.0, -122.0, 5.0, 0)]).await;

    session.clock.set(at(125));
    session.handle.fixes(Vec::new()).unwrap();
    session.settle().await;

    assert_eq!(session.state(), TrackerState::MonitoringRegion);
    let region = session.geofence.monitored_region().unwrap();
    assert_eq!(region.id, "trackline.region.1");
    assert_eq!(
        session.handle.status().region.as_deref(),
        Some("trackline.region.1")
    );

    session.handle.region_monitoring_started(&region.id).unwrap();
    session.handle.region_exited(&region.id).unwrap();
    let mut events = session.settle().await;

    // The restart runs as a separate unit of work
    let mut status = session.handle.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| s.state == TrackerState::Started),
    )
    .await
    .unwrap()
    .unwrap();

    events.extend(session.settle().await);
    assert_eq!(names(&events), vec!["started"]);
    assert!(session
        .geofence
        .commands()
        .contains(&GeofenceCommand::StopMonitoring("trackline.region.1".into())));

    session.shutdown().await;
}

#[tokio::test]
async fn test_low_battery_round_trip() {
    let mut session = Session::spawn();
    session.handle.start().unwrap();
    session.settle().await;
    session.deliver(vec![fix(37.0, -122.0, 5.0, 0)]).await;
    session.positioning.take_commands();

    session.power.set_level(0.15);
    session.handle.battery_level_changed(0.15).unwrap();
    let events = session.settle().await;

    assert_eq!(session.state(), TrackerState::PausedOnLowBattery);
    assert_eq!(names(&events), vec!["stopped"]);
    assert_eq!(
        session.positioning.take_commands(),
        vec![PositioningCommand::StopUpdates]
    );

    session.power.set_level(0.6);
    session.handle.battery_level_changed(0.6).unwrap();
    let events = session.settle().await;

    assert_eq!(session.state(), TrackerState::Started);
    assert_eq!(names(&events), vec!["started"]);

    session.power.set_state(BatteryState::Charging);
    session.handle.battery_state_changed(BatteryState::Charging).unwrap();
    session.settle().await;
    assert_eq!(session.state(), TrackerState::Started);

    session.shutdown().await;
}

#[tokio::test]
async fn test_authorization_flow() {
    let mut session = Session::spawn();
    session
        .positioning
        .set_authorization(AuthorizationStatus::NotDetermined);

    session.handle.start().unwrap();
    assert!(session.settle().await.is_empty());
    assert_eq!(
        session.positioning.take_commands(),
        vec![PositioningCommand::RequestAlwaysAuthorization]
    );

    session
        .positioning
        .set_authorization(AuthorizationStatus::AuthorizedAlways);
    session
        .handle
        .authorization_changed(AuthorizationStatus::AuthorizedAlways)
        .unwrap();
    assert_eq!(names(&session.settle().await), vec!["started"]);

    session
        .positioning
        .set_authorization(AuthorizationStatus::Denied);
    session
        .handle
        .authorization_changed(AuthorizationStatus::Denied)
        .unwrap();
    let events = session.settle().await;
    assert_eq!(names(&events), vec!["stopped", "authorization_refused"]);
    assert_eq!(session.state(), TrackerState::PausedOnAuthorizationRefused);

    session.shutdown().await;
}

#[tokio::test]
async fn test_background_deferring_and_foreground() {
    let mut session = Session::spawn();
    session.handle.start().unwrap();
    session.handle.app_state_changed(AppState::Background).unwrap();
    session.settle().await;
    session.positioning.take_commands();

    session.deliver(vec![fix(37.0, -122.0, 5.0, 0)]).await;
    session.deliver(vec![fix(37.0, -122.0, 5.0, 16)]).await;
    assert_eq!(session.state(), TrackerState::Deferring);

    // Deferred delivery hands over a batch out of order
    let batch = vec![
        fix(37.0, -122.0, 5.0, 90),
        fix(37.0, -122.0, 5.0, 50),
        fix(37.0, -122.0, 5.0, 60),
    ];
    let events = session.deliver(batch).await;
    let times: Vec<_> = emitted(&events).iter().map(|f| f.timestamp).collect();
    assert_eq!(times, vec![at(50), at(90)]);

    session.handle.app_state_changed(AppState::Foreground).unwrap();
    session.settle().await;
    assert_eq!(session.state(), TrackerState::Started);
    assert_eq!(
        session.positioning.commands().last(),
        Some(&PositioningCommand::DisallowDeferredUpdates)
    );

    session.shutdown().await;
}

#[tokio::test]
async fn test_persistence_failure_does_not_block() {
    let dir = TempDir::new().unwrap();
    let track = TrackFile::new(dir.path().join("gone").join("track.bin"));
    let clock = Arc::new(ManualClock::new(at(0)));
    let ports = TrackerPorts {
        positioning: Arc::new(SimulatedPositioning::new()),
        geofence: Arc::new(SimulatedGeofence::new()),
        power: Arc::new(SimulatedPower::new()),
        clock: clock.clone(),
    };
    let (sink, mut events) = ChannelEventSink::new();
    let machine = TrackerMachine::new(
        TrackerConfig::default(),
        ports,
        Arc::new(track),
        Arc::new(sink),
    )
    .unwrap();
    let (daemon, handle) = TrackerDaemon::new(machine, TrackerDaemonConfig::default());
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(daemon.run(shutdown.clone()));

    handle.start().unwrap();
    handle.fixes(vec![fix(37.0, -122.0, 5.0, 1)]).unwrap();
    handle.flush().await.unwrap();

    assert_eq!(events.recv().await.unwrap().name(), "started");
    assert_eq!(events.recv().await.unwrap().name(), "locations_updated");
    match events.recv().await.unwrap() {
        TrackerEvent::Error(e @ TrackerError::Persistence(_)) => {
            assert!(e.to_string().contains("track.bin"));
        }
        other => panic!("unexpected event: {other}"),
    }
    assert_eq!(handle.status().state, TrackerState::Started);

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_track_survives_tracker() {
    let mut session = Session::spawn();
    session.handle.start().unwrap();
    session.settle().await;
    session
        .deliver(vec![fix(37.0, -122.0, 5.0, 0), fix(37.001, -122.0, 5.0, 10)])
        .await;
    session.handle.stop().unwrap();
    session.settle().await;

    let track = session.track.clone();
    let (machine, _dir) = session.shutdown_keeping_dir().await;

    assert_eq!(machine.state(), TrackerState::Stopped);
    assert!(machine.track().last_fix.is_none());

    let stored = track.read_all().unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].latitude, 37.001);
}
