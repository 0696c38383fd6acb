/*!
Local time and history driver for one mover.

A network layer normally owns the clock and decides when to tick, roll back and finalize.
`FixedStepLiaison` plays that role locally: it advances at a fixed step, remembers the input
and starting state of every recent frame, and on an authoritative correction rolls back and
replays the frames that followed with their original inputs.
*/

use std::collections::VecDeque;

use crate::driver::{FrameState, Mover, TickEndData, TickStartData};
use crate::error::MoverError;
use crate::sim::{AuxState, InputCmd, SyncState, TimeStep};

/// Default number of frames kept for resimulation.
pub const DEFAULT_HISTORY_CAPACITY: usize = 64;

/// What the core asks of whoever drives the simulation clock.
pub trait BackendLiaison {
    fn current_sim_time_ms(&self) -> f64;
    fn current_sim_frame(&self) -> i64;
}

/// One simulated frame as it was first run.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub time_step: TimeStep,
    pub input: InputCmd,
    /// State the frame started from.
    pub start: FrameState,
    /// State the frame produced.
    pub end: FrameState,
}

/// Fixed-step driver with a bounded input/state history.
#[derive(Debug)]
pub struct FixedStepLiaison {
    mover: Mover,
    step_ms: f32,
    frame: i64,
    sim_time_ms: f64,
    history: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl FixedStepLiaison {
    pub fn new(mover: Mover, step_ms: f32) -> Self {
        Self {
            mover,
            step_ms,
            frame: 0,
            sim_time_ms: 0.0,
            history: VecDeque::with_capacity(DEFAULT_HISTORY_CAPACITY),
            capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
        self
    }

    pub fn mover(&self) -> &Mover {
        &self.mover
    }

    pub fn mover_mut(&mut self) -> &mut Mover {
        &mut self.mover
    }

    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    pub fn step_ms(&self) -> f32 {
        self.step_ms
    }

    /// Tick once with input from the mover's input producer.
    pub fn advance(&mut self) -> TickEndData {
        let input = self.mover.produce_input(self.step_ms);
        self.advance_with_input(input)
    }

    /// Tick once with `input`, finalize the result and record the frame.
    pub fn advance_with_input(&mut self, input: InputCmd) -> TickEndData {
        let time_step = TimeStep::new(self.frame, self.sim_time_ms, self.step_ms);
        let start = self.mover.frame_state().clone();
        let end = self.tick(time_step, input.clone(), &start);

        self.history.push_back(HistoryEntry {
            time_step,
            input,
            start,
            end: FrameState {
                sync: end.sync.clone(),
                aux: end.aux.clone(),
            },
        });
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }

        self.frame += 1;
        self.sim_time_ms = time_step.end_time_ms();
        end
    }

    /// Replace the result of `frame` with an authoritative `state` and replay every later
    /// recorded frame with its original input.
    ///
    /// Fails without touching anything when `frame` has left the history.
    pub fn apply_correction(&mut self, frame: i64, state: &SyncState, aux: &AuxState) -> Result<(), MoverError> {
        let Some(index) = self.history.iter().position(|e| e.time_step.server_frame == frame) else {
            return Err(MoverError::FrameNotInHistory(frame));
        };
        if self.history[index].end.sync.digest() == state.digest() {
            log::trace!("frame {frame}: correction matches the prediction");
            return Ok(());
        }

        let current = self.mover.sync_state().clone();
        self.mover.rollback(&current, state, aux);
        self.history[index].end = FrameState {
            sync: state.clone(),
            aux: aux.clone(),
        };

        let replay = self.history.len() - index - 1;
        log::debug!("frame {frame}: correction received, resimulating {replay} frames");
        for i in index + 1..self.history.len() {
            let start = self.mover.frame_state().clone();
            let time_step = self.history[i].time_step;
            let input = self.history[i].input.clone();
            let end = self.tick(time_step, input, &start);
            let entry = &mut self.history[i];
            entry.start = start;
            entry.end = FrameState {
                sync: end.sync,
                aux: end.aux,
            };
        }
        Ok(())
    }

    fn tick(&mut self, time_step: TimeStep, input: InputCmd, start: &FrameState) -> TickEndData {
        let start_data = TickStartData {
            input,
            sync: start.sync.clone(),
            aux: start.aux.clone(),
        };
        let end = self.mover.simulation_tick(&time_step, &start_data);
        self.mover.finalize(&end.sync, &end.aux);
        end
    }
}

impl BackendLiaison for FixedStepLiaison {
    fn current_sim_time_ms(&self) -> f64 {
        self.sim_time_ms
    }

    fn current_sim_frame(&self) -> i64 {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::collision::{StaticEntry, StaticShape, StaticWorld, Transform, Vec3};
    use crate::driver::MoverBuilder;
    use crate::sim::MoverEvent;

    fn liaison() -> FixedStepLiaison {
        let world = StaticWorld::new(vec![StaticEntry::solid(
            1,
            StaticShape::Plane {
                normal: Vec3::z(),
                dist: 0.0,
            },
        )]);
        let mover = MoverBuilder::new(Arc::new(world))
            .with_default_modes()
            .initial_transform(Transform::from_translation(Vec3::new(0.0, 0.0, 90.05)))
            .build();
        FixedStepLiaison::new(mover, 16.0)
    }

    #[test]
    fn advancing_moves_the_clock() {
        let mut l = liaison();
        l.advance_with_input(InputCmd::default());
        l.advance_with_input(InputCmd::default());
        assert_eq!(l.current_sim_frame(), 2);
        assert_eq!(l.current_sim_time_ms(), 32.0);
        assert_eq!(l.history().count(), 2);
    }

    #[test]
    fn history_is_bounded() {
        let mut l = liaison().with_history_capacity(3);
        for _ in 0..5 {
            l.advance_with_input(InputCmd::default());
        }
        let frames: Vec<i64> = l.history().map(|e| e.time_step.server_frame).collect();
        assert_eq!(frames, vec![2, 3, 4]);
        assert!(matches!(
            l.apply_correction(0, &SyncState::default(), &AuxState::default()),
            Err(MoverError::FrameNotInHistory(0))
        ));
    }

    #[test]
    fn correction_replays_later_frames_as_resimulation() {
        let mut l = liaison();
        for _ in 0..4 {
            l.advance_with_input(InputCmd::directional(Vec3::x()));
        }
        let predicted = l.mover().sync_state().location;

        let mut corrected = l.history().nth(1).map(|e| e.end.sync.clone()).unwrap_or_default();
        corrected.location.y += 50.0;
        l.apply_correction(1, &corrected, &AuxState::default()).unwrap();

        let now = l.mover().sync_state().location;
        assert!((now.y - predicted.y - 50.0).abs() < 1.0);
        assert_eq!(l.mover().newest_time_step().server_frame, 3);
        let replayed = l.history().nth(2).map(|e| e.start.sync.location.y).unwrap_or_default();
        assert!((replayed - corrected.location.y).abs() < 1.0e-3);
    }

    #[test]
    fn matching_correction_is_a_no_op() {
        let mut l = liaison();
        for _ in 0..3 {
            l.advance_with_input(InputCmd::default());
        }
        let rollbacks = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = rollbacks.clone();
        l.mover_mut().subscribe(move |e| {
            if matches!(e, MoverEvent::PreRollback { .. }) {
                seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        });
        let same = l.history().nth(1).map(|e| e.end.sync.clone()).unwrap_or_default();
        l.apply_correction(1, &same, &AuxState::default()).unwrap();
        assert_eq!(rollbacks.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
