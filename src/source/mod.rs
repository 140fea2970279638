//! Traffic-state sources.
//!
//! A [`TrafficSource`] prefers a [`LiveBackend`] and falls back to the
//! [`SyntheticGenerator`]. The first backend failure of any kind demotes the
//! source permanently for the rest of the run; the demoted backend is closed
//! immediately and never retried.

pub mod backend;
pub mod bridge;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;
pub mod synthetic;

use std::fmt;

use tracing::{debug, info, warn};

pub use backend::{LaneMap, LiveBackend};
pub use bridge::{BridgeBackend, BridgeConfig};
pub use error::SourceError;
#[cfg(any(test, feature = "testing"))]
pub use scripted::{FaultPoint, ScriptedBackend, ScriptedProbe};
pub use synthetic::{SyntheticConfig, SyntheticGenerator, TrafficPattern};

use crate::intersection::{Direction, Phase, QueueLengths};

/// Which variant currently feeds observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Live,
    Synthetic,
}

/// Live-first traffic-state source with one-way fallback to synthetic data.
pub struct TrafficSource {
    backend: Option<Box<dyn LiveBackend>>,
    synthetic: SyntheticGenerator,
    mode: SourceMode,
    demotion: Option<SourceError>,
}

impl TrafficSource {
    /// Creates a source that will try `backend` first on [`Self::connect`].
    pub fn new(backend: Option<Box<dyn LiveBackend>>, synthetic: SyntheticGenerator) -> Self {
        Self {
            backend,
            synthetic,
            mode: SourceMode::Synthetic,
            demotion: None,
        }
    }

    /// A source that only ever uses the synthetic generator.
    pub fn synthetic(synthetic: SyntheticGenerator) -> Self {
        Self::new(None, synthetic)
    }

    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    pub fn is_live(&self) -> bool {
        self.mode == SourceMode::Live
    }

    /// The error that caused the fallback, if one happened.
    pub fn demotion(&self) -> Option<&SourceError> {
        self.demotion.as_ref()
    }

    /// Connects the live backend if one was provided.
    pub fn connect(&mut self) {
        let Some(backend) = self.backend.as_mut() else {
            info!("no live backend configured, using synthetic traffic");
            return;
        };
        match backend.connect() {
            Ok(()) => {
                info!(backend = backend.name(), "live backend connected");
                self.mode = SourceMode::Live;
            }
            Err(err) => self.demote(err),
        }
    }

    /// Steps the live simulator clock. No-op for synthetic data.
    pub fn advance(&mut self) {
        let Some(backend) = self.live_backend() else {
            return;
        };
        let result = backend.advance().and_then(|_| backend.is_exhausted());
        match result {
            Ok(false) => {}
            Ok(true) => {
                info!("live simulator has no more scheduled activity");
                self.demote(SourceError::query("advance", "simulation exhausted"));
            }
            Err(err) => self.demote(err),
        }
    }

    /// Current queue lengths.
    ///
    /// `phase` and `elapsed` drive the synthetic generator; the live backend
    /// ignores them.
    pub fn read_queues(&mut self, phase: Phase, elapsed: u64) -> QueueLengths {
        if let Some(backend) = self.live_backend() {
            match Self::read_live(backend.as_mut()) {
                Ok(queues) => return queues,
                Err(err) => self.demote(err),
            }
        }
        self.synthetic.next_queues(phase, elapsed)
    }

    /// Pushes the controller's phase to the live simulator and cross-checks
    /// the signal it reports.
    pub fn sync_phase(&mut self, phase: Phase) {
        let Some(backend) = self.live_backend() else {
            return;
        };
        let result = backend
            .set_phase(phase)
            .and_then(|_| backend.read_phase_signal());
        match result {
            Ok(signal) => {
                let reported = Phase::green_axis_from_signal(&signal);
                let expected = phase.is_green().then(|| phase.axis());
                if reported != expected {
                    debug!(%phase, %signal, "simulator signal disagrees with controller phase");
                }
            }
            Err(err) => self.demote(err),
        }
    }

    /// Releases the live backend. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.close();
            debug!(backend = backend.name(), "live backend released");
        }
        self.mode = SourceMode::Synthetic;
    }

    fn live_backend(&mut self) -> Option<&mut Box<dyn LiveBackend>> {
        match self.mode {
            SourceMode::Live => self.backend.as_mut(),
            SourceMode::Synthetic => None,
        }
    }

    fn read_live(backend: &mut dyn LiveBackend) -> Result<QueueLengths, SourceError> {
        let mut queues = QueueLengths::default();
        for direction in Direction::all() {
            queues[direction] = backend.read_queue(direction)?;
        }
        Ok(queues)
    }

    fn demote(&mut self, err: SourceError) {
        warn!(error = %err, "live backend failed, falling back to synthetic traffic");
        self.close();
        if self.demotion.is_none() {
            self.demotion = Some(err);
        }
    }
}

impl Drop for TrafficSource {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for TrafficSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrafficSource")
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("mode", &self.mode)
            .field("demotion", &self.demotion)
            .finish()
    }
}
