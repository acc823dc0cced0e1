//! Resource budgets for external calls.
//!
//! Every call into a provider or resolver runs against a [`ResourceMeter`].
//! The callee charges units for its work; a charge past the limit fails and
//! leaves the meter marked exhausted. The caller checks the mark after the
//! call returns, so a callee that swallows the error is still caught.

use crate::error::{CoreError, Result};

/// A budget for a single external call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMeter {
    limit: u64,
    used: u64,
    exhausted: bool,
}

impl ResourceMeter {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: 0,
            exhausted: false,
        }
    }

    /// Charge `units` against the budget.
    ///
    /// A failing charge consumes nothing but marks the meter exhausted.
    pub fn charge(&mut self, units: u64) -> Result<()> {
        let requested = self.used.saturating_add(units);
        if requested > self.limit {
            self.exhausted = true;
            return Err(CoreError::ResourceExceeded {
                limit: self.limit,
                requested,
            });
        }
        self.used = requested;
        Ok(())
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.limit - self.used
    }

    /// Whether any charge has been refused.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

/// Context handed to every external call.
#[derive(Debug)]
pub struct CallContext<'a> {
    /// Current substrate time (Unix ms).
    pub now: i64,
    /// Budget for this call.
    pub meter: &'a mut ResourceMeter,
}

impl<'a> CallContext<'a> {
    pub fn new(now: i64, meter: &'a mut ResourceMeter) -> Self {
        Self { now, meter }
    }

    /// Shorthand for `self.meter.charge(units)`.
    pub fn charge(&mut self, units: u64) -> Result<()> {
        self.meter.charge(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_within_limit() {
        let mut meter = ResourceMeter::new(100);
        meter.charge(60).unwrap();
        meter.charge(40).unwrap();
        assert_eq!(meter.remaining(), 0);
        assert!(!meter.is_exhausted());
    }

    #[test]
    fn test_overcharge_marks_exhausted() {
        let mut meter = ResourceMeter::new(100);
        meter.charge(60).unwrap();

        let err = meter.charge(41).unwrap_err();
        assert!(matches!(
            err,
            CoreError::ResourceExceeded {
                limit: 100,
                requested: 101
            }
        ));
        assert_eq!(meter.used(), 60);
        assert!(meter.is_exhausted());
    }

    #[test]
    fn test_context_charges_meter() {
        let mut meter = ResourceMeter::new(10);
        let mut ctx = CallContext::new(5, &mut meter);
        ctx.charge(3).unwrap();
        assert!(ctx.charge(u64::MAX).is_err());
        assert_eq!(meter.used(), 3);
        assert!(meter.is_exhausted());
    }
}
