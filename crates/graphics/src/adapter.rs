//! Adapter and feature level selection.
//!
//! The policy here is independent of the graphics API: the backend enumerates
//! its adapters in power-preference order and reports them as [`AdapterInfo`],
//! then tries to create a device at each [`FeatureLevel`] from newest to
//! oldest.

use std::fmt;

use tracing::{debug, info};

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeatureLevel {
    Level11_0,
    Level11_1,
    Level12_0,
    Level12_1,
    Level12_2,
}

impl FeatureLevel {
    /// Feature levels in the order device creation attempts them.
    pub const DESCENDING: [Self; 5] = [
        Self::Level12_2,
        Self::Level12_1,
        Self::Level12_0,
        Self::Level11_1,
        Self::Level11_0,
    ];
}

impl fmt::Display for FeatureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Level11_0 => "11.0",
            Self::Level11_1 => "11.1",
            Self::Level12_0 => "12.0",
            Self::Level12_1 => "12.1",
            Self::Level12_2 => "12.2",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdapterInfo {
    /// Position of the adapter in the backend's enumeration order.
    pub index: u32,
    pub description: String,
    pub is_software: bool,
}

/// Picks the first hardware adapter. Adapters must already be sorted by
/// preference.
pub fn select_hardware_adapter(
    adapters: impl IntoIterator<Item = AdapterInfo>,
) -> Result<AdapterInfo> {
    for adapter in adapters {
        if adapter.is_software {
            debug!("skipping software adapter: {}", adapter.description);
            continue;
        }

        info!("Use Adapter: {}", adapter.description);
        return Ok(adapter);
    }

    Err(Error::NoHardwareAdapter)
}

/// Calls `create` with each feature level in [`FeatureLevel::DESCENDING`]
/// order and returns the first success along with the level it succeeded at.
pub fn create_with_fallback<T>(
    mut create: impl FnMut(FeatureLevel) -> Result<T>,
) -> Result<(T, FeatureLevel)> {
    for level in FeatureLevel::DESCENDING {
        match create(level) {
            Ok(device) => {
                info!("FeatureLevel : {level}");
                return Ok((device, level));
            }
            Err(err) => debug!("feature level {level} unavailable: {err}"),
        }
    }

    Err(Error::NoSupportedFeatureLevel)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(index: u32, is_software: bool) -> AdapterInfo {
        AdapterInfo {
            index,
            description: format!("adapter {index}"),
            is_software,
        }
    }

    #[test]
    fn skips_software_adapters() {
        let chosen =
            select_hardware_adapter([adapter(0, true), adapter(1, false), adapter(2, false)])
                .unwrap();
        assert_eq!(chosen.index, 1);

        assert!(matches!(
            select_hardware_adapter([adapter(0, true)]),
            Err(Error::NoHardwareAdapter)
        ));
        assert!(matches!(
            select_hardware_adapter(Vec::<AdapterInfo>::new()),
            Err(Error::NoHardwareAdapter)
        ));
    }

    #[test]
    fn feature_level_fallback() {
        let mut attempts = Vec::new();
        let (device, level) = create_with_fallback(|level| {
            attempts.push(level);
            if level <= FeatureLevel::Level12_0 {
                Ok("device")
            } else {
                Err(Error::Backend("unsupported".into()))
            }
        })
        .unwrap();

        assert_eq!(device, "device");
        assert_eq!(level, FeatureLevel::Level12_0);
        assert_eq!(
            attempts,
            [
                FeatureLevel::Level12_2,
                FeatureLevel::Level12_1,
                FeatureLevel::Level12_0
            ]
        );
    }

    #[test]
    fn no_feature_level() {
        let mut count = 0;
        let result: Result<((), FeatureLevel)> = create_with_fallback(|_| {
            count += 1;
            Err(Error::Backend("unsupported".into()))
        });

        assert!(matches!(result, Err(Error::NoSupportedFeatureLevel)));
        assert_eq!(count, FeatureLevel::DESCENDING.len());
    }
}
