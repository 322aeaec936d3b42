//! Timed visual effects
//!
//! The core only decides where and when an effect plays. The host renders
//! it; the instance returns itself to the pool once its duration runs out.

use crate::config::EffectPrototype;

use super::entity::LifeState;
use super::pool::PrototypeId;

#[derive(Debug, Clone)]
pub struct Effect {
    pub prototype: PrototypeId,
    pub life: LifeState,
    pub duration: f32,
    pub remaining: f32,
}

impl Effect {
    pub fn from_prototype(prototype: &EffectPrototype) -> Self {
        Self {
            prototype: prototype.id,
            life: LifeState::Inactive,
            duration: prototype.duration,
            remaining: prototype.duration,
        }
    }

    pub fn activate(&mut self) {
        self.remaining = self.duration;
        self.life = LifeState::Active;
    }

    /// Count down; returns true when the effect finished this step
    pub fn advance(&mut self, dt: f32) -> bool {
        if self.life != LifeState::Active {
            return false;
        }
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            self.life = LifeState::PendingReturn;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_expires_once() {
        let mut fx = Effect::from_prototype(&EffectPrototype {
            duration: 0.5,
            ..Default::default()
        });
        assert!(!fx.advance(1.0));
        fx.activate();
        assert!(!fx.advance(0.25));
        assert!(fx.advance(0.25));
        assert!(!fx.advance(0.25));
        assert_eq!(fx.life, LifeState::PendingReturn);

        fx.activate();
        assert_eq!(fx.remaining, 0.5);
    }
}
