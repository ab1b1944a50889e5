//! Planner configuration values read from `config.ini`.

use serde::{Deserialize, Serialize};

use crate::{PlanError, PlanResult};

/// The three tunables of the billing model.
///
/// `qos_constraint` gates reachability (a client may use a server iff the
/// measured QoS is strictly below it); `base_cost` is the billing floor per
/// used server; `center_cost`, when positive, enables the companion
/// center-cost term (per-day stream peaks) in the residual allocator and
/// the center grade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanConfig {
    pub qos_constraint: i64,
    pub base_cost: i64,
    #[serde(default)]
    pub center_cost: f64,
}

impl PlanConfig {
    pub fn new(qos_constraint: i64, base_cost: i64) -> Self {
        Self {
            qos_constraint,
            base_cost,
            center_cost: 0.0,
        }
    }

    pub fn with_center_cost(mut self, center_cost: f64) -> Self {
        self.center_cost = center_cost;
        self
    }

    /// Whether the optional center-cost term participates in planning.
    pub fn center_enabled(&self) -> bool {
        self.center_cost > 0.0
    }

    pub fn validate(&self) -> PlanResult<()> {
        if self.qos_constraint <= 0 {
            return Err(PlanError::Config(format!(
                "qos_constraint must be positive, got {}",
                self.qos_constraint
            )));
        }
        if self.base_cost < 0 {
            return Err(PlanError::Config(format!(
                "base_cost must be non-negative, got {}",
                self.base_cost
            )));
        }
        if self.center_cost < 0.0 || !self.center_cost.is_finite() {
            return Err(PlanError::Config(format!(
                "center_cost must be a non-negative finite value, got {}",
                self.center_cost
            )));
        }
        Ok(())
    }
}
