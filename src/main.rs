//! Photo Hunt Demo
//!
//! Plays one full round on simulated devices: photograph, hand over, walk to
//! the spot, share, then open the shared link as a second player.

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use photo_hunt::{
    challenge::{ShareChain, ShareError, ShareMethod, ManualCopy},
    core::geo::Position,
    game::{GameConfig, GameSession, Mode, PositionOutcome, StatusLevel},
    sensor::{CameraDevice, PositionSource},
    sim::{ScriptedShare, SimCamera, SimDetector, SimGps},
    vision::ObjectDetector,
    VERSION,
};

/// Sergels torg, Stockholm.
const PHOTO_LAT: f64 = 59.332_580;
const PHOTO_LNG: f64 = 18.064_900;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    let config = GameConfig::from_env();
    info!("Photo Hunt v{}", VERSION);
    info!(
        "Win distance: {}m, capture accuracy: {}",
        config.win_distance_m,
        config
            .capture_accuracy_m
            .map_or_else(|| "off".to_string(), |m| format!("{m}m"))
    );

    let link = demo_round(config.clone()).await?;
    demo_guest(config, &link).await?;
    Ok(())
}

/// Photographer's side: capture, hand over, walk until found, share.
async fn demo_round(config: GameConfig) -> Result<String> {
    info!("=== Starting Demo Round ===");

    let mut session = GameSession::new(
        config,
        SimCamera::new(),
        SimGps::fixed(PHOTO_LAT, PHOTO_LNG, 4.5),
        SimDetector::loading(),
    );
    session.start(None).await;

    session.detector_mut().finish_loading();
    session.on_model_ready();
    session.refresh_accuracy().await;
    drain_status(&mut session);

    session.capture().await.context("capture failed")?;
    info!("Items: {}", session.state().detected_items.join(", "));
    drain_status(&mut session);

    session.confirm();
    drain_status(&mut session);

    // Walk in from ~300m north.
    let steps = 12;
    for i in (0..=steps).rev() {
        let offset = 0.0027 * f64::from(i) / f64::from(steps);
        session
            .sensors_mut()
            .location_mut()
            .push(Position::with_accuracy(PHOTO_LAT + offset, PHOTO_LNG, 6.0));
    }

    let found = session
        .pump_positions()
        .iter()
        .any(|o| matches!(o, PositionOutcome::Progress(p) if p.newly_won));
    if !found {
        bail!("walked the whole route without finding the spot");
    }
    drain_status(&mut session);

    let mut chain = ShareChain::new()
        .with(ScriptedShare::failing(ShareMethod::Native, ShareError::Unavailable))
        .with(ScriptedShare::succeeding(ShareMethod::Clipboard))
        .with(ManualCopy::new());
    let outcome = session.share(&mut chain).await.context("share failed")?;
    info!("Shared via {:?}", outcome.method);
    drain_status(&mut session);

    let link = session.challenge_link().context("no challenge link")?;
    info!("Challenge link: {} chars", link.len());

    session.reset().await;
    drain_status(&mut session);
    Ok(link)
}

/// Guesser's side: open the link and land straight in Guessing.
async fn demo_guest(config: GameConfig, link: &str) -> Result<()> {
    info!("=== Opening Shared Challenge ===");

    let mut guest = GameSession::new(
        config,
        SimCamera::new(),
        SimGps::fixed(PHOTO_LAT, PHOTO_LNG, 5.0),
        SimDetector::loading(),
    );
    let mode = guest.start(Some(link)).await;
    if mode != Mode::Guessing {
        bail!("challenge link did not open in guessing mode");
    }
    info!(
        "Guest is guessing {} item(s), camera opened {} time(s)",
        guest.state().detected_items.len(),
        guest.sensors().camera().opens()
    );

    guest
        .sensors_mut()
        .location_mut()
        .push(Position::with_accuracy(PHOTO_LAT + 0.0001, PHOTO_LNG - 0.0001, 5.0));
    guest.next_position().await;
    drain_status(&mut guest);

    info!("Guest score: {}", guest.state().score());
    Ok(())
}

fn drain_status<C: CameraDevice, L: PositionSource, D: ObjectDetector>(session: &mut GameSession<C, L, D>) {
    for status in session.take_status() {
        match status.level() {
            StatusLevel::Error => tracing::warn!("[{}] {}", status.mode, status.message()),
            _ => info!("[{}] {}", status.mode, status.message()),
        }
    }
}
