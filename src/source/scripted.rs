//! Deterministic in-process backend with fault injection.
//!
//! Replays a fixed list of queue snapshots and can be told to fail a given
//! operation after a number of successful calls. Used by tests and demos to
//! exercise the live path and the fallback path without a simulator; outside
//! this crate's own tests it requires the `testing` feature.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::backend::LiveBackend;
use super::error::SourceError;
use crate::intersection::{Direction, Phase};

/// Backend operation a fault can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    Connect,
    ReadQueue,
    PhaseSignal,
    SetPhase,
    Advance,
}

impl FaultPoint {
    fn operation(&self) -> &'static str {
        match self {
            FaultPoint::Connect => "connect",
            FaultPoint::ReadQueue => "read_queue",
            FaultPoint::PhaseSignal => "read_phase_signal",
            FaultPoint::SetPhase => "set_phase",
            FaultPoint::Advance => "advance",
        }
    }
}

/// Shared view of a [`ScriptedBackend`] that outlives moving it into a source.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProbe {
    closed: Arc<AtomicBool>,
    steps: Arc<AtomicUsize>,
    queue_reads: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of successful `advance` calls.
    pub fn steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }

    /// Number of successful `read_queue` calls.
    pub fn queue_reads(&self) -> usize {
        self.queue_reads.load(Ordering::SeqCst)
    }
}

/// Scripted stand-in for a live simulator.
#[derive(Debug)]
pub struct ScriptedBackend {
    snapshots: Vec<[u32; 4]>,
    cursor: usize,
    fault: Option<(FaultPoint, usize)>,
    calls: usize,
    step_budget: Option<usize>,
    signal: Phase,
    connected: bool,
    probe: ScriptedProbe,
}

impl ScriptedBackend {
    /// Creates a backend cycling through `snapshots` (`[n, s, e, w]`), advancing
    /// one snapshot per simulator step.
    pub fn new(snapshots: Vec<[u32; 4]>) -> Self {
        Self {
            snapshots,
            cursor: 0,
            fault: None,
            calls: 0,
            step_budget: None,
            signal: Phase::NsGreen,
            connected: false,
            probe: ScriptedProbe::default(),
        }
    }

    /// Fails `point` once `after` calls to it have succeeded.
    pub fn failing_at(mut self, point: FaultPoint, after: usize) -> Self {
        self.fault = Some((point, after));
        self
    }

    /// Reports exhaustion after `steps` simulator steps.
    pub fn with_step_budget(mut self, steps: usize) -> Self {
        self.step_budget = Some(steps);
        self
    }

    pub fn probe(&self) -> ScriptedProbe {
        self.probe.clone()
    }

    fn check(&mut self, point: FaultPoint) -> Result<(), SourceError> {
        if let Some((fault, after)) = self.fault {
            if fault == point {
                if self.calls >= after {
                    return Err(match point {
                        FaultPoint::Connect => {
                            SourceError::unavailable("scripted", "injected connect fault")
                        }
                        _ => SourceError::query(point.operation(), "injected fault"),
                    });
                }
                self.calls += 1;
            }
        }
        if point != FaultPoint::Connect && !self.connected {
            return Err(SourceError::query(point.operation(), "not connected"));
        }
        Ok(())
    }
}

impl LiveBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn connect(&mut self) -> Result<(), SourceError> {
        self.check(FaultPoint::Connect)?;
        self.connected = true;
        Ok(())
    }

    fn read_queue(&mut self, direction: Direction) -> Result<u32, SourceError> {
        self.check(FaultPoint::ReadQueue)?;
        let value = self
            .snapshots
            .get(self.cursor % self.snapshots.len().max(1))
            .map(|s| s[direction.index()])
            .unwrap_or(0);
        self.probe.queue_reads.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    fn read_phase_signal(&mut self) -> Result<String, SourceError> {
        self.check(FaultPoint::PhaseSignal)?;
        let signal = match self.signal {
            Phase::NsGreen => "GGrr",
            Phase::NsYellow => "yyrr",
            Phase::EwGreen => "rrGG",
            Phase::EwYellow => "rryy",
        };
        Ok(signal.to_string())
    }

    fn set_phase(&mut self, phase: Phase) -> Result<(), SourceError> {
        self.check(FaultPoint::SetPhase)?;
        self.signal = phase;
        Ok(())
    }

    fn advance(&mut self) -> Result<(), SourceError> {
        self.check(FaultPoint::Advance)?;
        self.cursor += 1;
        self.probe.steps.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_exhausted(&mut self) -> Result<bool, SourceError> {
        Ok(self
            .step_budget
            .map(|budget| self.cursor >= budget)
            .unwrap_or(false))
    }

    fn close(&mut self) {
        self.connected = false;
        self.probe.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_snapshots_per_step() {
        let mut backend = ScriptedBackend::new(vec![[1, 2, 3, 4], [5, 6, 7, 8]]);
        backend.connect().unwrap();
        assert_eq!(backend.read_queue(Direction::East).unwrap(), 3);
        backend.advance().unwrap();
        assert_eq!(backend.read_queue(Direction::East).unwrap(), 7);
        backend.advance().unwrap();
        assert_eq!(backend.read_queue(Direction::North).unwrap(), 1);
    }

    #[test]
    fn injected_fault_fires_after_n_calls() {
        let mut backend =
            ScriptedBackend::new(vec![[1, 1, 1, 1]]).failing_at(FaultPoint::ReadQueue, 2);
        backend.connect().unwrap();
        assert!(backend.read_queue(Direction::North).is_ok());
        assert!(backend.read_queue(Direction::South).is_ok());
        let err = backend.read_queue(Direction::East).unwrap_err();
        assert!(matches!(err, SourceError::BackendQueryError { .. }));
    }

    #[test]
    fn connect_fault_is_unavailable() {
        let mut backend = ScriptedBackend::new(vec![]).failing_at(FaultPoint::Connect, 0);
        let err = backend.connect().unwrap_err();
        assert!(matches!(err, SourceError::BackendUnavailable { .. }));
    }

    #[test]
    fn queries_before_connect_fail() {
        let mut backend = ScriptedBackend::new(vec![[1, 1, 1, 1]]);
        assert!(backend.read_queue(Direction::North).is_err());
    }

    #[test]
    fn step_budget_exhausts() {
        let mut backend = ScriptedBackend::new(vec![[0; 4]]).with_step_budget(2);
        backend.connect().unwrap();
        assert!(!backend.is_exhausted().unwrap());
        backend.advance().unwrap();
        backend.advance().unwrap();
        assert!(backend.is_exhausted().unwrap());
    }

    #[test]
    fn close_is_visible_through_probe() {
        let mut backend = ScriptedBackend::new(vec![[0; 4]]);
        let probe = backend.probe();
        backend.connect().unwrap();
        backend.close();
        backend.close();
        assert!(probe.is_closed());
    }

    #[test]
    fn signal_follows_set_phase() {
        let mut backend = ScriptedBackend::new(vec![[0; 4]]);
        backend.connect().unwrap();
        backend.set_phase(Phase::EwGreen).unwrap();
        let signal = backend.read_phase_signal().unwrap();
        assert_eq!(
            Phase::green_axis_from_signal(&signal),
            Some(crate::intersection::Axis::EastWest)
        );
    }
}
