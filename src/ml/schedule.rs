//! Learning-rate policies and the step arithmetic they depend on.
//!
//! All policies map a training step to a learning rate on a horizon of
//! `total_steps = num_epochs * steps_per_epoch`. Progress is clamped to
//! `[0, 1]`, so steps past the horizon keep the final rate.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::domain::error::NerError;

/// Floor of the square (polynomial) annealing policy
const SQUARE_MIN_LR: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LrPolicy {
    /// Linear ramp up over `warmup_ratio` of the horizon, then linear decay to zero
    Warmup { warmup_ratio: f64 },
    /// `min_lr + (lr - min_lr) * (1 - p)^2`
    Square { min_lr: f64 },
    /// `min_lr + (lr - min_lr) * (1 + cos(pi * p)) / 2`
    Cosine { min_lr: f64 },
}

impl LrPolicy {
    /// Parse the `--lr_policy` flag value
    pub fn parse(name: &str, warmup_ratio: f64) -> Result<Self, NerError> {
        match name {
            "lr_warmup" => Ok(Self::Warmup { warmup_ratio }),
            "lr_poly"   => Ok(Self::Square { min_lr: SQUARE_MIN_LR }),
            "lr_cosine" => Ok(Self::Cosine { min_lr: 0.0 }),
            other       => Err(NerError::InvalidLrPolicy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LrSchedule {
    policy:      LrPolicy,
    base_lr:     f64,
    total_steps: usize,
}

impl LrSchedule {
    pub fn new(policy: LrPolicy, base_lr: f64, total_steps: usize) -> Self {
        Self { policy, base_lr, total_steps }
    }

    /// Learning rate for the 0-based optimizer step `step`
    pub fn lr_at(&self, step: usize) -> f64 {
        let progress = (step as f64 / self.total_steps.max(1) as f64).min(1.0);

        match self.policy {
            LrPolicy::Warmup { warmup_ratio } => {
                let mult = if progress < warmup_ratio {
                    progress / warmup_ratio
                } else if warmup_ratio >= 1.0 {
                    1.0
                } else {
                    ((1.0 - progress) / (1.0 - warmup_ratio)).max(0.0)
                };
                self.base_lr * mult
            }
            LrPolicy::Square { min_lr } => {
                let min_lr = min_lr.min(self.base_lr);
                min_lr + (self.base_lr - min_lr) * (1.0 - progress).powi(2)
            }
            LrPolicy::Cosine { min_lr } => {
                let min_lr = min_lr.min(self.base_lr);
                min_lr + (self.base_lr - min_lr) * 0.5 * (1.0 + (PI * progress).cos())
            }
        }
    }
}

/// Optimizer steps per epoch as the schedule horizon sees them.
/// Integer division, so a partial last batch does not count.
pub fn steps_per_epoch(train_size: usize, batch_size: usize, num_gpus: usize) -> usize {
    train_size / (batch_size * num_gpus).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_steps_per_epoch_is_integer_division() {
        assert_eq!(steps_per_epoch(14041, 32, 1), 438);
        assert_eq!(steps_per_epoch(14041, 32, 2), 219);
        assert_eq!(steps_per_epoch(64, 32, 1), 2);
        assert_eq!(steps_per_epoch(10, 32, 1), 0);
    }

    #[test]
    fn test_parse_known_policies() {
        assert_eq!(
            LrPolicy::parse("lr_warmup", 0.1).unwrap(),
            LrPolicy::Warmup { warmup_ratio: 0.1 }
        );
        assert!(matches!(LrPolicy::parse("lr_poly", 0.1), Ok(LrPolicy::Square { .. })));
        assert!(matches!(LrPolicy::parse("lr_cosine", 0.1), Ok(LrPolicy::Cosine { .. })));
    }

    #[test]
    fn test_parse_rejects_unknown_policy() {
        let err = LrPolicy::parse("lr_linear", 0.1).unwrap_err();
        assert!(matches!(err, NerError::InvalidLrPolicy(ref p) if p == "lr_linear"));
        assert!(err.to_string().contains("lr_warmup"));
    }

    #[test]
    fn test_warmup_ramps_then_decays() {
        let s = LrSchedule::new(LrPolicy::Warmup { warmup_ratio: 0.1 }, 1.0, 100);
        assert!(close(s.lr_at(0), 0.0));
        assert!(close(s.lr_at(5), 0.5));
        assert!(close(s.lr_at(10), 1.0));
        assert!(close(s.lr_at(55), 0.5));
        assert!(close(s.lr_at(100), 0.0));
        assert!(close(s.lr_at(250), 0.0));
    }

    #[test]
    fn test_warmup_without_warmup_phase_decays_linearly() {
        let s = LrSchedule::new(LrPolicy::Warmup { warmup_ratio: 0.0 }, 2.0, 10);
        assert!(close(s.lr_at(0), 2.0));
        assert!(close(s.lr_at(5), 1.0));
    }

    #[test]
    fn test_square_annealing_endpoints() {
        let s = LrSchedule::new(LrPolicy::Square { min_lr: 1e-5 }, 5e-5, 100);
        assert!(close(s.lr_at(0), 5e-5));
        assert!(close(s.lr_at(50), 1e-5 + 4e-5 * 0.25));
        assert!(close(s.lr_at(100), 1e-5));
    }

    #[test]
    fn test_square_floor_never_exceeds_base_lr() {
        let s = LrSchedule::new(LrPolicy::Square { min_lr: 1e-5 }, 1e-6, 10);
        assert!(close(s.lr_at(0), 1e-6));
        assert!(close(s.lr_at(10), 1e-6));
    }

    #[test]
    fn test_cosine_annealing_midpoint() {
        let s = LrSchedule::new(LrPolicy::Cosine { min_lr: 0.0 }, 1.0, 100);
        assert!(close(s.lr_at(0), 1.0));
        assert!((s.lr_at(50) - 0.5).abs() < 1e-12);
        assert!(s.lr_at(100).abs() < 1e-12);
    }

    #[test]
    fn test_zero_horizon_does_not_divide_by_zero() {
        let s = LrSchedule::new(LrPolicy::Cosine { min_lr: 0.0 }, 1.0, 0);
        assert!(s.lr_at(0).is_finite());
    }
}
