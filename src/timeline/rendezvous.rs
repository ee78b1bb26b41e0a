//! Single-slot hand-off between the timeline and the participant
//!
//! The controller presents one screen at a time and then blocks until the
//! participant answers. Both directions are capacity-1 channels, so neither
//! side can run ahead of the other by more than one message. Dropping the
//! participant handle is how a closed page shows up to the controller.
//!
//! Every message carries the number of the trial it belongs to. The
//! participant handle stamps each input with the trial of the last screen
//! it received, and the controller drops inputs stamped for any trial other
//! than the one it is running. A double-clicked submit or a click during a
//! timed screen therefore never completes the following trial.

use tokio::sync::mpsc;
use tracing::debug;

use super::screen::{Input, Screen};

/// The other side has gone away
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Participant disconnected")]
pub struct Disconnected;

/// A message and the trial it was sent for
#[derive(Debug)]
struct Stamped<T> {
    trial: u64,
    value: T,
}

/// Controller end
pub struct Rendezvous {
    screens: mpsc::Sender<Stamped<Screen>>,
    inputs: mpsc::Receiver<Stamped<Input>>,
    trial: u64,
}

/// Participant end
pub struct ParticipantHandle {
    screens: mpsc::Receiver<Stamped<Screen>>,
    inputs: mpsc::Sender<Stamped<Input>>,
    /// Trial of the most recently received screen
    trial: u64,
}

/// Create a connected pair.
pub fn rendezvous() -> (Rendezvous, ParticipantHandle) {
    let (screen_tx, screen_rx) = mpsc::channel(1);
    let (input_tx, input_rx) = mpsc::channel(1);
    (
        Rendezvous {
            screens: screen_tx,
            inputs: input_rx,
            trial: 0,
        },
        ParticipantHandle {
            screens: screen_rx,
            inputs: input_tx,
            trial: 0,
        },
    )
}

impl Rendezvous {
    /// Move on to a new trial. Inputs sent for earlier trials are dropped
    /// from here on.
    pub fn begin_trial(&mut self) {
        self.trial += 1;
    }

    pub async fn present(&mut self, screen: Screen) -> Result<(), Disconnected> {
        self.screens
            .send(Stamped {
                trial: self.trial,
                value: screen,
            })
            .await
            .map_err(|_| Disconnected)
    }

    /// Next input sent for the current trial.
    pub async fn next_input(&mut self) -> Result<Input, Disconnected> {
        loop {
            let stamped = self.inputs.recv().await.ok_or(Disconnected)?;
            if stamped.trial == self.trial {
                return Ok(stamped.value);
            }
            debug!(
                sent_for = stamped.trial,
                current = self.trial,
                input = ?stamped.value,
                "Stale input dropped"
            );
        }
    }
}

impl ParticipantHandle {
    /// Next screen, or `None` once the session has ended.
    pub async fn next_screen(&mut self) -> Option<Screen> {
        let stamped = self.screens.recv().await?;
        self.trial = stamped.trial;
        Some(stamped.value)
    }

    /// Answer the most recently received screen.
    pub async fn send(&self, input: Input) -> Result<(), Disconnected> {
        self.inputs
            .send(Stamped {
                trial: self.trial,
                value: input,
            })
            .await
            .map_err(|_| Disconnected)
    }
}
