//! Availability zone selection.
//!
//! The provider decides which zones exist and in what order. The stack uses
//! the first [`MAX_ZONES`] of them as returned, without sorting.

use tracing::{debug, info};

use crate::error::{AllocationError, Result};

/// Upper bound on zones a stack spreads across.
pub const MAX_ZONES: usize = 3;

/// Source of the provider's available zones.
#[cfg_attr(test, mockall::automock)]
pub trait ZoneSource {
    /// Returns the available zones in provider order.
    ///
    /// # Errors
    ///
    /// Returns an error if the zones cannot be determined.
    fn available_zones(&self) -> Result<Vec<String>>;
}

/// Zones listed in the stack configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredZones {
    zones: Vec<String>,
}

impl ConfiguredZones {
    /// Creates a source from an explicit zone list.
    #[must_use]
    pub const fn new(zones: Vec<String>) -> Self {
        Self { zones }
    }
}

impl ZoneSource for ConfiguredZones {
    fn available_zones(&self) -> Result<Vec<String>> {
        Ok(self.zones.clone())
    }
}

/// Keeps the first `limit` zones, preserving order.
#[must_use]
pub fn truncate_zones(available: &[String], limit: usize) -> Vec<String> {
    available.iter().take(limit).cloned().collect()
}

/// Fetches zones from `source` and truncates them to `limit` (at most [`MAX_ZONES`]).
///
/// # Errors
///
/// Returns an error if the source fails or yields no zones.
pub fn select_zones(source: &dyn ZoneSource, limit: usize) -> Result<Vec<String>> {
    let available = source.available_zones()?;
    debug!("Provider reports {} available zones", available.len());

    let selected = truncate_zones(&available, limit.min(MAX_ZONES));
    if selected.is_empty() {
        return Err(AllocationError::NoZones.into());
    }

    info!("Selected zones: {}", selected.join(", "));
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_truncates_to_three_in_provider_order() {
        let mut source = MockZoneSource::new();
        source
            .expect_available_zones()
            .times(1)
            .returning(|| Ok(names(&["us-east-1c", "us-east-1a", "us-east-1f", "us-east-1b"])));

        let zones = select_zones(&source, MAX_ZONES).expect("zones");
        assert_eq!(zones, names(&["us-east-1c", "us-east-1a", "us-east-1f"]));
    }

    #[test]
    fn test_fewer_zones_than_limit() {
        let source = ConfiguredZones::new(names(&["eu-west-1a", "eu-west-1b"]));
        let zones = select_zones(&source, MAX_ZONES).expect("zones");
        assert_eq!(zones.len(), 2);
    }

    #[test]
    fn test_limit_is_capped() {
        let source = ConfiguredZones::new(names(&["a", "b", "c", "d", "e"]));
        let zones = select_zones(&source, 10).expect("zones");
        assert_eq!(zones, names(&["a", "b", "c"]));
    }

    #[test]
    fn test_no_zones_is_an_error() {
        let mut source = MockZoneSource::new();
        source.expect_available_zones().returning(|| Ok(Vec::new()));
        assert!(select_zones(&source, MAX_ZONES).is_err());
    }
}
