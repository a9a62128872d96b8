//! Traffic signal phase cycling at an intersection.
//!
//! Each intersection runs one light cycle per road approach. A cycle steps
//! Red -> Green -> Yellow -> Red, re-arming a one-shot timer with the new
//! phase's duration on every transition. Road 2 starts its cycle after a
//! configured offset so the two roads run out of phase. Nothing but elapsed
//! time drives the cycle; vehicles only read it.

use bevy::prelude::*;
use smallvec::SmallVec;

use crate::error::{ensure_non_negative, ensure_positive, ConfigError};
use crate::simulation::trajectory::RoadApproach;

/// Traffic light phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LightPhase {
    #[default]
    Red,
    Green,
    Yellow,
}

impl LightPhase {
    /// The phase that follows this one in the fixed cycle.
    pub fn next(self) -> Self {
        match self {
            LightPhase::Red => LightPhase::Green,
            LightPhase::Green => LightPhase::Yellow,
            LightPhase::Yellow => LightPhase::Red,
        }
    }

    /// Vehicles inside the intersection brake for both Yellow and Red.
    pub fn requires_braking(self) -> bool {
        matches!(self, LightPhase::Red | LightPhase::Yellow)
    }
}

/// Phase of both road approaches at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntersectionPhase {
    pub road1: LightPhase,
    pub road2: LightPhase,
}

impl IntersectionPhase {
    pub fn for_road(&self, road: RoadApproach) -> LightPhase {
        match road {
            RoadApproach::Road1 => self.road1,
            RoadApproach::Road2 => self.road2,
        }
    }
}

/// Phase durations shared by both roads, plus the start offset of road 2.
#[derive(Resource, Clone, Debug, PartialEq)]
pub struct SignalTimings {
    pub green_duration: f32,
    pub yellow_duration: f32,
    pub red_duration: f32,
    /// Delay before road 2 leaves its initial Red phase.
    pub road_offset: f32,
}

impl Default for SignalTimings {
    fn default() -> Self {
        Self {
            green_duration: 10.0,
            yellow_duration: 3.0,
            red_duration: 12.0,
            // Road 2 turns green as road 1 turns red
            road_offset: 13.0,
        }
    }
}

impl SignalTimings {
    pub fn duration(&self, phase: LightPhase) -> f32 {
        match phase {
            LightPhase::Green => self.green_duration,
            LightPhase::Yellow => self.yellow_duration,
            LightPhase::Red => self.red_duration,
        }
    }

    pub fn cycle_length(&self) -> f32 {
        self.green_duration + self.yellow_duration + self.red_duration
    }

    /// Delay before the given road's first transition out of Red.
    pub fn start_delay(&self, road: RoadApproach) -> f32 {
        match road {
            RoadApproach::Road1 => 0.0,
            RoadApproach::Road2 => self.road_offset,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("green_duration", self.green_duration)?;
        ensure_positive("yellow_duration", self.yellow_duration)?;
        ensure_positive("red_duration", self.red_duration)?;
        ensure_non_negative("road_offset", self.road_offset)?;
        Ok(())
    }

    /// Phase a road shows at time `t` according to the cumulative-duration
    /// schedule, without stepping any timers.
    pub fn scheduled_phase(&self, road: RoadApproach, t: f32) -> LightPhase {
        let local = t - self.start_delay(road);
        if local < 0.0 {
            return LightPhase::Red;
        }
        let position = local.rem_euclid(self.cycle_length());
        if position < self.green_duration {
            LightPhase::Green
        } else if position < self.green_duration + self.yellow_duration {
            LightPhase::Yellow
        } else {
            LightPhase::Red
        }
    }
}

/// Identifier of an intersection within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntersectionId(pub u32);

/// A single phase transition, reported for logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseChange {
    pub intersection: IntersectionId,
    pub road: RoadApproach,
    pub from: LightPhase,
    pub to: LightPhase,
}

pub type PhaseChanges = SmallVec<[PhaseChange; 2]>;

/// One road's light with its pending one-shot timer.
#[derive(Clone, Debug)]
struct RoadCycle {
    road: RoadApproach,
    phase: LightPhase,
    time_to_transition: f32,
}

impl RoadCycle {
    fn new(road: RoadApproach, start_delay: f32) -> Self {
        Self {
            road,
            phase: LightPhase::Red,
            time_to_transition: start_delay,
        }
    }

    fn advance(
        &mut self,
        intersection: IntersectionId,
        dt: f32,
        timings: &SignalTimings,
        changes: &mut PhaseChanges,
    ) {
        self.time_to_transition -= dt;

        // Durations are validated positive, so this terminates.
        while self.time_to_transition <= 0.0 {
            let from = self.phase;
            self.phase = from.next();
            self.time_to_transition += timings.duration(self.phase);
            changes.push(PhaseChange {
                intersection,
                road: self.road,
                from,
                to: self.phase,
            });
        }
    }
}

/// Two-road signal controller for one intersection.
#[derive(Clone, Debug)]
pub struct IntersectionSignal {
    id: IntersectionId,
    timings: SignalTimings,
    road1: RoadCycle,
    road2: RoadCycle,
    elapsed: f32,
}

impl IntersectionSignal {
    /// Create a signal with both roads Red and immediately fire every
    /// transition due at t = 0 (road 1 turns Green right away).
    pub fn new(id: IntersectionId, timings: SignalTimings) -> Self {
        let mut signal = Self {
            id,
            road1: RoadCycle::new(RoadApproach::Road1, timings.start_delay(RoadApproach::Road1)),
            road2: RoadCycle::new(RoadApproach::Road2, timings.start_delay(RoadApproach::Road2)),
            timings,
            elapsed: 0.0,
        };
        signal.step_cycles(0.0);
        signal
    }

    pub fn id(&self) -> IntersectionId {
        self.id
    }

    pub fn timings(&self) -> &SignalTimings {
        &self.timings
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn phase(&self) -> IntersectionPhase {
        IntersectionPhase {
            road1: self.road1.phase,
            road2: self.road2.phase,
        }
    }

    pub fn phase_for(&self, road: RoadApproach) -> LightPhase {
        self.phase().for_road(road)
    }

    /// Advance both timers by `dt` seconds, returning every transition fired.
    pub fn advance(&mut self, dt: f32) -> PhaseChanges {
        self.elapsed += dt;
        self.step_cycles(dt)
    }

    fn step_cycles(&mut self, dt: f32) -> PhaseChanges {
        let mut changes = PhaseChanges::new();
        self.road1.advance(self.id, dt, &self.timings, &mut changes);
        self.road2.advance(self.id, dt, &self.timings, &mut changes);

        for change in &changes {
            info!(
                "Intersection {}: {} changed to {:?}.",
                change.intersection.0,
                change.road.label(),
                change.to
            );
        }
        changes
    }
}

/// All signals in a session, looked up by id.
#[derive(Clone, Debug, Default)]
pub struct Intersections {
    signals: Vec<IntersectionSignal>,
}

impl Intersections {
    pub fn add(&mut self, timings: SignalTimings) -> IntersectionId {
        let id = IntersectionId(self.signals.len() as u32);
        self.signals.push(IntersectionSignal::new(id, timings));
        id
    }

    pub fn get(&self, id: IntersectionId) -> Option<&IntersectionSignal> {
        self.signals.iter().find(|signal| signal.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IntersectionSignal> {
        self.signals.iter()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Phase for one road at one intersection, or `None` if the intersection
    /// is unknown.
    pub fn phase_for(&self, id: IntersectionId, road: RoadApproach) -> Option<LightPhase> {
        self.get(id).map(|signal| signal.phase_for(road))
    }

    pub fn advance(&mut self, dt: f32) -> Vec<PhaseChange> {
        self.signals
            .iter_mut()
            .flat_map(|signal| signal.advance(dt))
            .collect()
    }
}
