// Session event loop
// Commands and frame ticks are handled one at a time inside a single task, so
// the controller never sees overlapping operations

use crate::commands::{self, CameraFactory, SessionCommand};
use crate::core::session::{SessionController, SessionResult};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Interval between frame pulls for a target frame rate
pub fn frame_period(target_fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / target_fps.max(1) as f64)
}

/// Drive the session until `quit` arrives or the command channel closes.
///
/// Frames are pulled on a fixed tick while streaming; ticks missed because
/// detection ran long are skipped, which drops those frames.
pub async fn run(
    session: &mut SessionController,
    mut open_camera: CameraFactory,
    mut commands: mpsc::Receiver<SessionCommand>,
) -> SessionResult<()> {
    let mut ticker = tokio::time::interval(frame_period(session.config().target_fps));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Session {} started ({})", session.id(), session.state().to_string());

    loop {
        tokio::select! {
            command = commands.recv() => {
                let command = match command {
                    None | Some(SessionCommand::Quit) => break,
                    Some(command) => command,
                };
                debug!("command: {:?}", command);
                match commands::execute(session, &mut open_camera, command).await {
                    Ok(reply) => info!("{}", reply),
                    Err(e) => warn!("{}", e),
                }
            }
            _ = ticker.tick(), if session.is_streaming() => {
                if let Err(e) = session.poll_frame().await {
                    warn!("Frame skipped: {}", e);
                }
            }
        }
    }

    session.stop_camera().await?;
    info!(
        "Session {} ended with {} captured pose(s)",
        session.id(),
        session.store().len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_period() {
        assert_eq!(frame_period(50), Duration::from_millis(20));
        assert_eq!(frame_period(0), Duration::from_secs(1));
    }
}
