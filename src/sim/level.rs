//! Level state machine
//!
//! Loading -> Intro -> Playing -> Victory | Defeat, with restart returning
//! a finished level to Loading. Only transitions write the state; every
//! transition is logged, delivered to subscribers and queued for the
//! simulation's event stream.

use std::collections::BTreeSet;

use glam::Vec3;
use rand::Rng;
use rand_pcg::Pcg32;

use crate::config::{LevelScript, PrototypeCatalog, WaveSpec, WinCondition};
use crate::consts::*;
use crate::look_rotation;

use super::entity::Entity;
use super::pool::{EntityPool, InstanceId, PrototypeId};
use super::schedule::Schedule;
use super::wave::{SequencerStatus, WaveSequencer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelState {
    #[default]
    Loading,
    Intro,
    Playing,
    Victory,
    Defeat,
}

impl LevelState {
    pub fn name(&self) -> &'static str {
        match self {
            LevelState::Loading => "Loading",
            LevelState::Intro => "Intro",
            LevelState::Playing => "Playing",
            LevelState::Victory => "Victory",
            LevelState::Defeat => "Defeat",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, LevelState::Victory | LevelState::Defeat)
    }
}

/// A state change, with the Playing time at which it happened
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelTransition {
    pub from: LevelState,
    pub to: LevelState,
    pub elapsed: f64,
}

/// Aggregate world state the win conditions read
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LevelObservation {
    pub live_enemies: usize,
    /// `None` when no score signal is wired up
    pub score: Option<u64>,
}

/// What the director may touch during a tick
pub struct LevelContext<'a> {
    pub pool: &'a mut EntityPool<Entity>,
    pub catalog: &'a PrototypeCatalog,
    pub rng: &'a mut Pcg32,
    /// World position waves are placed relative to
    pub origin: Vec3,
    pub observation: LevelObservation,
    /// Receives every enemy spawned this tick
    pub spawned: &'a mut Vec<InstanceId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ListenerId(u32);

type Listener = Box<dyn FnMut(&LevelTransition)>;

pub struct LevelDirector {
    script: Option<LevelScript>,
    state: LevelState,
    /// Director time, used for the intro dwell
    clock: f64,
    /// Playing time
    elapsed: f64,
    intro: Schedule<LevelState>,
    sequencer: WaveSequencer,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u32,
    transitions: Vec<LevelTransition>,
    /// Missing wave prototypes already reported
    warned: BTreeSet<PrototypeId>,
}

impl std::fmt::Debug for LevelDirector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelDirector")
            .field("state", &self.state)
            .field("elapsed", &self.elapsed)
            .field("wave_index", &self.sequencer.wave_index())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl LevelDirector {
    pub fn new(script: Option<LevelScript>) -> Self {
        Self {
            script,
            state: LevelState::Loading,
            clock: 0.0,
            elapsed: 0.0,
            intro: Schedule::new(),
            sequencer: WaveSequencer::new(),
            listeners: Vec::new(),
            next_listener: 0,
            transitions: Vec::new(),
            warned: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> LevelState {
        self.state
    }

    /// Seconds spent in Playing since the last transition into it
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn current_wave_index(&self) -> usize {
        self.sequencer.wave_index()
    }

    pub fn sequencer_status(&self) -> SequencerStatus {
        self.sequencer.status()
    }

    /// Register a transition listener
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&LevelTransition) + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        self.listeners.len() != before
    }

    /// Transitions since the last drain, oldest first
    pub fn drain_transitions(&mut self) -> Vec<LevelTransition> {
        std::mem::take(&mut self.transitions)
    }

    pub fn tick(&mut self, dt: f32, ctx: &mut LevelContext<'_>) {
        self.clock += f64::from(dt);
        match self.state {
            LevelState::Loading => {
                self.load(ctx);
                self.poll_intro(ctx);
            }
            LevelState::Intro => self.poll_intro(ctx),
            LevelState::Playing => {
                self.elapsed += f64::from(dt);
                self.run_waves(ctx);
                self.check_win(ctx);
            }
            LevelState::Victory | LevelState::Defeat => {}
        }
    }

    /// The host's player was destroyed
    pub fn player_destroyed(&mut self) {
        if self.state != LevelState::Playing {
            log::debug!("Player destroyed outside Playing ({}); ignored", self.state.name());
            return;
        }
        self.sequencer.cancel();
        self.transition(LevelState::Defeat);
    }

    /// Return a finished level to Loading, cancelling every pending
    /// continuation. Returns false when the level is not finished.
    pub fn restart(&mut self) -> bool {
        if !self.state.is_finished() {
            log::debug!("Restart requested in {}; ignored", self.state.name());
            return false;
        }
        self.sequencer.cancel();
        self.intro.cancel();
        self.transition(LevelState::Loading);
        self.elapsed = 0.0;
        true
    }

    fn load(&mut self, ctx: &mut LevelContext<'_>) {
        ctx.pool.reinitialize_pools(ctx.catalog.iter().cloned());
        self.warned.clear();
        self.transition(LevelState::Intro);
        let dwell = self
            .script
            .as_ref()
            .map_or(INTRO_DURATION, |script| script.intro_duration);
        self.intro.at(self.clock + f64::from(dwell), LevelState::Playing);
    }

    fn poll_intro(&mut self, ctx: &mut LevelContext<'_>) {
        if self.intro.poll(self.clock).is_some() {
            self.enter_playing(ctx);
        }
    }

    fn enter_playing(&mut self, ctx: &mut LevelContext<'_>) {
        self.elapsed = 0.0;
        self.transition(LevelState::Playing);
        match &self.script {
            Some(script) => self.sequencer.start(0.0, script),
            None => log::warn!("No level script; waves will not spawn"),
        }
        self.run_waves(ctx);
        self.check_win(ctx);
    }

    fn run_waves(&mut self, ctx: &mut LevelContext<'_>) {
        let Self {
            script,
            sequencer,
            warned,
            elapsed,
            ..
        } = self;
        let Some(script) = script.as_ref() else {
            return;
        };
        sequencer.pump(*elapsed, script, |index, wave| {
            if let Some(id) = spawn_enemy(ctx, warned, index, wave) {
                ctx.spawned.push(id);
            }
        });
    }

    fn check_win(&mut self, ctx: &LevelContext<'_>) {
        if self.state != LevelState::Playing {
            return;
        }
        let Some(script) = &self.script else {
            return;
        };
        let won = match script.win_condition {
            WinCondition::SurvivalTime { seconds } => self.elapsed >= f64::from(seconds),
            WinCondition::ClearAllWaves => {
                let live = ctx.observation.live_enemies + ctx.spawned.len();
                self.sequencer.status() == SequencerStatus::Completed
                    && (!script.require_clear_arena || live == 0)
            }
            WinCondition::ScoreTarget { score } => {
                ctx.observation.score.is_some_and(|current| current >= score)
            }
        };
        if won {
            self.sequencer.cancel();
            self.transition(LevelState::Victory);
        }
    }

    fn transition(&mut self, to: LevelState) {
        let change = LevelTransition {
            from: self.state,
            to,
            elapsed: self.elapsed,
        };
        self.state = to;
        log::info!(
            "Level {} -> {} at {:.2}s",
            change.from.name(),
            change.to.name(),
            change.elapsed
        );
        for (_, listener) in &mut self.listeners {
            listener(&change);
        }
        self.transitions.push(change);
    }
}

/// Place one enemy of `wave` around the spawn origin
fn spawn_enemy(
    ctx: &mut LevelContext<'_>,
    warned: &mut BTreeSet<PrototypeId>,
    index: usize,
    wave: &WaveSpec,
) -> Option<InstanceId> {
    let (Some(prototype), Some(enemy)) = (ctx.catalog.get(wave.enemy), ctx.catalog.enemy(wave.enemy))
    else {
        if warned.insert(wave.enemy) {
            log::warn!(
                "Wave {} names {} which is not a loaded enemy prototype; skipping",
                index + 1,
                wave.enemy
            );
        }
        return None;
    };

    let half = wave.random_range * 0.5;
    let jitter = Vec3::new(
        symmetric(ctx.rng, half.x),
        symmetric(ctx.rng, half.y),
        symmetric(ctx.rng, half.z),
    );
    let position = ctx.origin + wave.base_offset + jitter;
    let id = ctx
        .pool
        .spawn(prototype, position, look_rotation(enemy.move_direction))?;
    log::debug!("Spawned {} '{}' at {:?}", id, wave.name, position);
    Some(id)
}

/// Uniform sample in [-half, half]
fn symmetric(rng: &mut Pcg32, half: f32) -> f32 {
    if half > 0.0 {
        rng.random_range(-half..=half)
    } else {
        0.0
    }
}
