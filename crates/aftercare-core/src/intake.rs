//! Bounded-wait access to the response intake source.

use std::{sync::mpsc, sync::Arc, thread, time::Duration};

use tracing::warn;

use aftercare_contracts::{
    error::{AftercareError, AftercareResult},
    intake::IntakeRecord,
};

use crate::traits::ResponseIntake;

/// Fetch `destination` from `intake`, giving up after `timeout`.
///
/// The fetch runs on a worker thread. On timeout the worker is abandoned and
/// its eventual result discarded; the caller gets `GatewayUnavailable`.
pub fn fetch_with_timeout(
    intake: &Arc<dyn ResponseIntake>,
    destination: &str,
    timeout: Duration,
) -> AftercareResult<IntakeRecord> {
    let (tx, rx) = mpsc::channel();
    let worker_intake = Arc::clone(intake);
    let worker_destination = destination.to_string();

    thread::Builder::new()
        .name("intake-fetch".to_string())
        .spawn(move || {
            // The receiver is gone if the caller already timed out.
            let _ = tx.send(worker_intake.fetch(&worker_destination));
        })
        .map_err(|e| AftercareError::gateway("intake", format!("cannot start fetch: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            warn!(
                destination = %destination,
                timeout_ms = timeout.as_millis() as u64,
                "intake fetch timed out"
            );
            Err(AftercareError::gateway(
                "intake",
                format!("no answer within {} ms", timeout.as_millis()),
            ))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(AftercareError::gateway(
            "intake",
            "fetch worker exited without a result",
        )),
    }
}
