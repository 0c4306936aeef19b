//! Source Rotation Registry
//!
//! Ordered list of reward sources for one reward category, each tagged
//! with a closed-or-open validity range of periods. Several sources may be
//! "active" over a historical window after a mid-flight replacement; the
//! registry collapses their ranges so callers never need to know how many
//! rotations occurred.

use serde::{Deserialize, Serialize};

use pair_core::{Address, EngineError, Period, Result};

use crate::constants::sources::DEFAULT_MAX_WINDOW;

/// A registered reward source with its validity range of periods
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    pub address: Address,
    /// First period this source pays for
    pub first_period: Period,
    /// Last period (inclusive); `None` while the source is still current
    pub last_period: Option<Period>,
}

impl SourceRange {
    pub fn covers(&self, period: Period) -> bool {
        period >= self.first_period && self.last_period.map_or(true, |last| period <= last)
    }

    fn intersects(&self, since: Period, current: Period) -> bool {
        self.first_period <= current && self.last_period.map_or(true, |last| last >= since)
    }
}

/// Rotation registry for one reward category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRegistry {
    /// Registration order; at most the tail range is open
    sources: Vec<SourceRange>,
    /// Bound on sources intersecting any queried window
    max_window: u64,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WINDOW)
    }
}

impl SourceRegistry {
    pub fn new(max_window: u64) -> Self {
        Self {
            sources: Vec::new(),
            max_window,
        }
    }

    /// Install `address` as the current source starting at `from_period`,
    /// closing the previously-open range at `from_period - 1`.
    ///
    /// Installation after periods already elapsed under the old source is
    /// allowed; it shortens the old range and creates historical
    /// multi-source periods.
    pub fn install(&mut self, address: Address, from_period: Period) -> Result<()> {
        if let Some(tail) = self.sources.last_mut() {
            match tail.last_period {
                None => {
                    if from_period == 0 || from_period - 1 < tail.first_period {
                        return Err(EngineError::Consistency {
                            reason: format!(
                                "replacement at period {} would regress open range starting at {}",
                                from_period, tail.first_period
                            ),
                        });
                    }
                    tail.last_period = Some(from_period - 1);
                }
                Some(last) => {
                    if from_period <= last {
                        return Err(EngineError::Consistency {
                            reason: format!(
                                "new range starting at {} overlaps closed range ending at {}",
                                from_period, last
                            ),
                        });
                    }
                }
            }
        }
        self.sources.push(SourceRange {
            address,
            first_period: from_period,
            last_period: None,
        });
        Ok(())
    }

    /// Explicitly close the open range of `address` at `last_period`
    /// (governance deactivation). The next install opens at a later
    /// period boundary.
    pub fn deactivate(&mut self, address: &Address, last_period: Period) -> Result<()> {
        let tail = self
            .sources
            .last_mut()
            .filter(|s| s.address == *address && s.last_period.is_none())
            .ok_or_else(|| EngineError::Consistency {
                reason: format!("{} is not the currently open source", address),
            })?;
        if last_period < tail.first_period {
            return Err(EngineError::Consistency {
                reason: format!(
                    "cannot close range starting at {} at earlier period {}",
                    tail.first_period, last_period
                ),
            });
        }
        tail.last_period = Some(last_period);
        Ok(())
    }

    /// Every registered source whose validity range intersects
    /// `[since, current]`, each tagged with its own range (`None` upper
    /// bound for the currently-installed source).
    pub fn active_sources(&self, since: Period, current: Period) -> Result<Vec<SourceRange>> {
        self.check_chain()?;
        let hits: Vec<SourceRange> = self
            .sources
            .iter()
            .filter(|s| s.intersects(since, current))
            .cloned()
            .collect();
        if self.max_window > 0 && hits.len() as u64 > self.max_window {
            return Err(EngineError::Consistency {
                reason: format!(
                    "{} sources intersect window [{}, {}], bound is {}",
                    hits.len(),
                    since,
                    current,
                    self.max_window
                ),
            });
        }
        Ok(hits)
    }

    /// Collapse source ranges with the external period counter into a
    /// single `[start, end)` window callers iterate when distributing or
    /// computing unclaimed amounts. Empty `(0, 0)` when no source was
    /// ever installed.
    pub fn active_period_range_exclusive(
        &self,
        since: Period,
        current: Period,
    ) -> Result<(Period, Period)> {
        if self.sources.is_empty() {
            return Ok((0, 0));
        }
        let hits = self.active_sources(since, current)?;
        let Some(earliest) = hits.iter().map(|s| s.first_period).min() else {
            return Ok((since, since));
        };
        let start = since.max(earliest);
        // An open range tracks the external counter; closed ranges cap at
        // their own last period.
        let end = hits
            .iter()
            .map(|s| s.last_period.map_or(current + 1, |last| last + 1))
            .max()
            .unwrap_or(start)
            .min(current + 1);
        Ok((start, end.max(start)))
    }

    /// Currently-installed (open-range) source, if any
    pub fn current_source(&self) -> Option<&SourceRange> {
        self.sources.last().filter(|s| s.last_period.is_none())
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Verify the registered chain is internally consistent: ranges are
    /// ordered, non-overlapping, and at most the tail is open. The
    /// registry trusts its caller's period ordering, so a violation here
    /// is fatal bookkeeping corruption.
    fn check_chain(&self) -> Result<()> {
        for pair in self.sources.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            let Some(prev_last) = prev.last_period else {
                return Err(EngineError::Consistency {
                    reason: format!("open range for {} is not the registry tail", prev.address),
                });
            };
            // A replacement shortening the old range is sanctioned only
            // through install(); any other overlap double counts.
            if next.first_period <= prev_last {
                return Err(EngineError::Consistency {
                    reason: format!(
                        "range for {} (ends {}) overlaps range for {} (starts {})",
                        prev.address, prev_last, next.address, next.first_period
                    ),
                });
            }
            if prev_last < prev.first_period {
                return Err(EngineError::Consistency {
                    reason: format!("inverted range for {}", prev.address),
                });
            }
        }
        Ok(())
    }
}
