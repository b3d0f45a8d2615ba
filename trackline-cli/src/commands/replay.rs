//! Replay command - drive a tracker with a scripted fix sequence.
//!
//! The tracker runs against the simulated device services and a real track
//! file. Each batch is delivered at the time of its newest fix; everything
//! the tracker does in response (events, positioning and geofence commands)
//! is printed before the next batch.
//!
//! # Script Format
//!
//! ```text
//! # latitude,longitude,accuracy_m,unix_seconds
//! 37.3318,-122.0312,5,1477000000
//! 37.3320,-122.0312,5,1477000040
//!
//! 37.3330,-122.0312,8,1477000100
//! ```
//!
//! A blank line ends a batch. While the tracker is monitoring a stationary
//! region, the first batch with a fix outside the region triggers a region
//! exit before it is delivered.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use trackline::config::ConfigFile;
use trackline::fix::Fix;
use trackline::observer::{ChannelEventSink, TrackerEvent};
use trackline::persistence::{TrackFile, TrackStore};
use trackline::ports::{AppState, BatteryState};
use trackline::sim::{ManualClock, SimulatedGeofence, SimulatedPositioning, SimulatedPower};
use trackline::tracker::{
    TrackerDaemon, TrackerDaemonConfig, TrackerHandle, TrackerMachine, TrackerPorts, TrackerState,
};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Extra time allowed for a region restart beyond the configured delay.
const RESTART_GRACE: Duration = Duration::from_secs(1);

/// Arguments for the replay command.
#[derive(Debug)]
pub struct ReplayArgs {
    pub input: PathBuf,
    pub track: PathBuf,
    pub background: bool,
    pub battery: Option<f64>,
    pub clear: bool,
}

/// Run the replay command.
pub fn run(args: ReplayArgs, runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("replay");

    let script = read_script(&args.input)?;
    let batches = parse_script(&script)?;
    info!(
        input = %args.input.display(),
        batches = batches.len(),
        "Loaded replay script"
    );

    let track = TrackFile::new(&args.track);
    if args.clear {
        track.clear()?;
        println!("Cleared {}", args.track.display());
    }

    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    runtime.block_on(replay(batches, track, runner.config(), &args))
}

fn read_script(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|error| CliError::ScriptRead {
        path: path.to_path_buf(),
        error,
    })
}

/// Split a replay script into fix batches.
pub fn parse_script(script: &str) -> Result<Vec<Vec<Fix>>, CliError> {
    let mut batches = Vec::new();
    let mut current = Vec::new();

    for (index, raw) in script.lines().enumerate() {
        let line = raw.trim();
        if line.starts_with('#') {
            continue;
        }
        if line.is_empty() {
            if !current.is_empty() {
                batches.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push(parse_fix(line).map_err(|reason| CliError::ScriptParse {
            line: index + 1,
            reason,
        })?);
    }

    if !current.is_empty() {
        batches.push(current);
    }
    Ok(batches)
}

fn parse_fix(line: &str) -> Result<Fix, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 4 {
        return Err(format!("expected 4 fields, found {}", fields.len()));
    }

    let mut values = [0.0; 4];
    for (value, (field, name)) in values.iter_mut().zip(
        fields
            .iter()
            .zip(["latitude", "longitude", "accuracy", "timestamp"]),
    ) {
        *value = field
            .parse::<f64>()
            .map_err(|_| format!("invalid {} '{}'", name, field))?;
    }

    let [latitude, longitude, accuracy, unix_seconds] = values;
    Fix::from_unix_seconds(latitude, longitude, accuracy, unix_seconds)
        .ok_or_else(|| format!("timestamp {} is out of range", unix_seconds))
}

/// Simulated services shared between the tracker and the replay loop.
struct Devices {
    positioning: Arc<SimulatedPositioning>,
    geofence: Arc<SimulatedGeofence>,
    clock: Arc<ManualClock>,
}

async fn replay(
    batches: Vec<Vec<Fix>>,
    track: TrackFile,
    config: &ConfigFile,
    args: &ReplayArgs,
) -> Result<(), CliError> {
    let start = batches
        .iter()
        .flatten()
        .map(|fix| fix.timestamp)
        .min()
        .unwrap_or_else(Utc::now);

    let devices = Devices {
        positioning: Arc::new(SimulatedPositioning::new()),
        geofence: Arc::new(SimulatedGeofence::new()),
        clock: Arc::new(ManualClock::new(start)),
    };
    let power = Arc::new(match args.battery {
        Some(level) => SimulatedPower::with_level(level, BatteryState::Unplugged),
        None => SimulatedPower::new(),
    });
    let ports = TrackerPorts {
        positioning: devices.positioning.clone(),
        geofence: devices.geofence.clone(),
        power,
        clock: devices.clock.clone(),
    };

    let (sink, mut events) = ChannelEventSink::new();
    let machine = TrackerMachine::new(
        config.tracker,
        ports,
        Arc::new(track.clone()),
        Arc::new(sink),
    )?;
    let daemon_config = TrackerDaemonConfig::from(&config.daemon);
    let restart_wait = daemon_config.region_restart_delay + RESTART_GRACE;
    let (daemon, handle) = TrackerDaemon::new(machine, daemon_config);

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(daemon.run(shutdown.clone()));

    println!("-- start");
    handle.start()?;
    if args.background {
        handle.app_state_changed(AppState::Background)?;
    }
    handle.flush().await?;
    report(&mut events, &devices);

    for (index, batch) in batches.into_iter().enumerate() {
        leave_region_if_outside(&batch, &handle, &devices, restart_wait).await?;
        report(&mut events, &devices);

        if let Some(newest) = batch.iter().map(|fix| fix.timestamp).max() {
            devices.clock.set(newest);
        }
        println!("-- batch {} ({} fix(es))", index + 1, batch.len());
        handle.fixes(batch)?;
        handle.check_deadlines()?;
        handle.flush().await?;
        report(&mut events, &devices);
    }

    let status = handle.status();
    println!("-- final state: {}", status.state);
    if let Some(last) = status.last_fix {
        println!("   last fix: {}", last);
    }
    println!("   {} record(s) in {}", track.len()?, track.path().display());

    shutdown.cancel();
    if let Err(e) = task.await {
        warn!(error = %e, "Tracker task did not shut down cleanly");
    }
    Ok(())
}

/// Deliver a region exit when the batch leaves the monitored region, then
/// wait for the tracker to resume.
async fn leave_region_if_outside(
    batch: &[Fix],
    handle: &TrackerHandle,
    devices: &Devices,
    restart_wait: Duration,
) -> Result<(), CliError> {
    if handle.status().state != TrackerState::MonitoringRegion {
        return Ok(());
    }
    let Some(region) = devices.geofence.monitored_region() else {
        return Ok(());
    };
    let Some(outside) = batch
        .iter()
        .find(|fix| fix.distance_to(&region.center) > region.radius)
    else {
        return Ok(());
    };

    devices.clock.set(outside.timestamp);
    println!("-- exit {}", region.id);
    handle.region_exited(&region.id)?;

    let mut status = handle.subscribe();
    let resumed = tokio::time::timeout(
        restart_wait,
        status.wait_for(|status| status.state != TrackerState::MonitoringRegion),
    )
    .await
    .is_ok_and(|changed| changed.is_ok());
    if !resumed {
        warn!(region = %region.id, "Tracker did not leave region monitoring");
    }

    handle.flush().await?;
    Ok(())
}

/// Print everything the tracker did since the last report.
fn report(events: &mut UnboundedReceiver<TrackerEvent>, devices: &Devices) {
    for command in devices.positioning.take_commands() {
        println!("   positioning: {}", command);
    }
    for command in devices.geofence.take_commands() {
        println!("   geofence: {}", command);
    }
    while let Ok(event) = events.try_recv() {
        println!("   event: {}", event);
    }
}
