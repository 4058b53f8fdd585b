//! Lab session countdown.
//!
//! # Usage
//!
//! ```bash
//! skilltrack lab run kubernetes-deployment
//! skilltrack lab run aws-ec2-setup --minutes 5
//! ```

use std::time::Duration;

use chrono::Utc;
use skilltrack_labs::catalog::Catalog;
use skilltrack_labs::lab_session::{LabSession, LabSessionState, Urgency, WARM_UP};
use tokio::time::MissedTickBehavior;

use super::CommandError;

/// Print the remaining time this often, or every ten seconds once time is
/// running low.
const REPORT_EVERY_SECS: u32 = 60;
const LOW_TIME_REPORT_EVERY_SECS: u32 = 10;

/// Run a lab session until the time runs out or Ctrl+C is pressed.
pub async fn run(catalog: &Catalog, lab_id: &str, minutes: Option<u32>) -> Result<(), CommandError> {
    let lab = catalog.lab(lab_id)?;
    let mut session = minutes.map_or_else(
        || LabSession::for_lab(lab),
        |minutes| LabSession::new(lab.id.clone(), minutes),
    );

    let session_id = session.start(Utc::now())?.to_owned();
    tracing::info!(session_id = %session_id, "Lab session starting");
    println!("Preparing {} environment...", lab.title);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tokio::select! {
        result = &mut ctrl_c => {
            result?;
            session.end()?;
            println!("Lab cancelled before it started.");
            return Ok(());
        }
        () = tokio::time::sleep(WARM_UP) => {}
    }

    session.ready()?;
    println!(
        "Lab is live: {} remaining. Press Ctrl+C to end.",
        session.format_remaining()
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result?;
                session.end()?;
                println!("Lab ended with {} left.", session.format_remaining());
                break;
            }
            _ = ticker.tick() => {
                if session.tick()? == LabSessionState::Ended {
                    println!("Time is up. Lab ended.");
                    break;
                }
                report(&session);
            }
        }
    }

    tracing::info!(
        session_id = %session_id,
        progress = session.progress_percent(),
        "Lab session ended"
    );
    Ok(())
}

fn report(session: &LabSession) {
    let remaining = session.remaining_secs();
    let every = if session.is_running_low() {
        LOW_TIME_REPORT_EVERY_SECS
    } else {
        REPORT_EVERY_SECS
    };
    if remaining % every != 0 {
        return;
    }

    let marker = match session.urgency() {
        Urgency::Comfortable => "",
        Urgency::Warning => " (past halfway)",
        Urgency::Critical => " (almost out of time)",
    };
    println!(
        "{} remaining, {}% used{marker}",
        session.format_remaining(),
        session.progress_percent()
    );
}
