//! Wave sequencing
//!
//! Each wave spawns `count` enemies `spawn_interval` apart, then waits
//! `post_wave_wait` before the next wave begins. The sequencer is a
//! resumable continuation: every step records the next one on a `Schedule`
//! keyed on Playing time, so it survives across ticks and can be cancelled.
//! Resume times chain from the previous step's due time, not from the tick
//! that happened to observe it, so pacing does not drift with the timestep.

use crate::config::{LevelScript, WaveSpec};

use super::schedule::Schedule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveStep {
    BeginWave(usize),
    Spawn { wave: usize, index: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerStatus {
    /// Not started, cancelled, or nothing to sequence
    Idle,
    Running,
    /// Every wave has been sequenced and the script does not loop
    Completed,
}

#[derive(Debug, Clone)]
pub struct WaveSequencer {
    schedule: Schedule<WaveStep>,
    wave_index: usize,
    status: SequencerStatus,
}

impl Default for WaveSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveSequencer {
    pub fn new() -> Self {
        Self {
            schedule: Schedule::new(),
            wave_index: 0,
            status: SequencerStatus::Idle,
        }
    }

    pub fn status(&self) -> SequencerStatus {
        self.status
    }

    /// Wave currently sequencing; equals the wave count once completed
    pub fn wave_index(&self) -> usize {
        self.wave_index
    }

    /// Begin the first wave at `now`
    pub fn start(&mut self, now: f64, script: &LevelScript) {
        self.wave_index = 0;
        if script.waves.is_empty() {
            log::warn!("Level script has no waves; nothing to sequence");
            self.schedule.cancel();
            self.status = SequencerStatus::Idle;
            return;
        }
        self.schedule.at(now, WaveStep::BeginWave(0));
        self.status = SequencerStatus::Running;
    }

    pub fn cancel(&mut self) {
        self.schedule.cancel();
        self.status = SequencerStatus::Idle;
    }

    /// Run every step due by `now`, calling `spawn(wave_index, wave)` once
    /// per enemy. Returns the number of spawn steps taken.
    pub fn pump<F>(&mut self, now: f64, script: &LevelScript, mut spawn: F) -> usize
    where
        F: FnMut(usize, &WaveSpec),
    {
        let mut spawned = 0;
        while let Some(resume) = self.schedule.poll(now) {
            match resume.step {
                WaveStep::BeginWave(index) => {
                    let index = if index < script.waves.len() {
                        index
                    } else if script.looping && script.cycle_duration() > 0.0 {
                        log::info!("All waves sequenced; looping back to wave 1");
                        0
                    } else {
                        log::info!("All waves sequenced");
                        self.wave_index = script.waves.len();
                        self.status = SequencerStatus::Completed;
                        break;
                    };

                    let wave = &script.waves[index];
                    self.wave_index = index;
                    log::info!("Starting wave {} '{}'", index + 1, wave.name);
                    if wave.count == 0 {
                        self.schedule.at(
                            resume.at + f64::from(wave.post_wave_wait),
                            WaveStep::BeginWave(index + 1),
                        );
                    } else {
                        self.schedule.at(resume.at, WaveStep::Spawn { wave: index, index: 0 });
                    }
                }
                WaveStep::Spawn { wave, index } => {
                    let Some(spec) = script.waves.get(wave) else {
                        log::warn!("Wave {} vanished from the script", wave + 1);
                        self.wave_index = script.waves.len();
                        self.status = SequencerStatus::Completed;
                        break;
                    };
                    spawn(wave, spec);
                    spawned += 1;

                    let next = if index + 1 < spec.count {
                        (
                            resume.at + f64::from(spec.spawn_interval),
                            WaveStep::Spawn {
                                wave,
                                index: index + 1,
                            },
                        )
                    } else {
                        (
                            resume.at + f64::from(spec.post_wave_wait),
                            WaveStep::BeginWave(wave + 1),
                        )
                    };
                    self.schedule.at(next.0, next.1);
                }
            }
        }
        spawned
    }
}
