// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of OVA Water.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Interval gate that keeps a sensor from fetching more often than its
//! update interval.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Still within the interval of the last attempt
    Idle,
    /// Interval elapsed, or never attempted
    Due,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollGate {
    interval: TimeDelta,
    last_attempt: Option<DateTime<Utc>>,
}

impl PollGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: TimeDelta::from_std(interval).unwrap_or(TimeDelta::MAX),
            last_attempt: None,
        }
    }

    /// A clock that moved backwards keeps the gate idle until the interval
    /// has elapsed again.
    pub fn state(&self, now: DateTime<Utc>) -> GateState {
        match self.last_attempt {
            None => GateState::Due,
            Some(last) if now.signed_duration_since(last) >= self.interval => GateState::Due,
            Some(_) => GateState::Idle,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == GateState::Due
    }

    /// Record an attempt, successful or not
    pub fn mark_attempt(&mut self, now: DateTime<Utc>) {
        self.last_attempt = Some(now);
    }

    pub fn last_attempt(&self) -> Option<DateTime<Utc>> {
        self.last_attempt
    }

    pub fn interval(&self) -> TimeDelta {
        self.interval
    }
}
