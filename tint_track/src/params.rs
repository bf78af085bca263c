//! Tracking parameter table and the defaults/overrides merge.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKey {
    FieldThresh,
    IsoThresh,
    IsoSmooth,
    MinSize,
    SearchMargin,
    FlowMargin,
    MaxDisparity,
    MaxFlowMag,
    MaxShiftDisp,
    GsAlt,
}

impl ParamKey {
    pub const ALL: [ParamKey; 10] = [
        ParamKey::FieldThresh,
        ParamKey::IsoThresh,
        ParamKey::IsoSmooth,
        ParamKey::MinSize,
        ParamKey::SearchMargin,
        ParamKey::FlowMargin,
        ParamKey::MaxDisparity,
        ParamKey::MaxFlowMag,
        ParamKey::MaxShiftDisp,
        ParamKey::GsAlt,
    ];

    /// Name the tracking engine uses for this parameter.
    pub fn name(self) -> &'static str {
        match self {
            ParamKey::FieldThresh => "FIELD_THRESH",
            ParamKey::IsoThresh => "ISO_THRESH",
            ParamKey::IsoSmooth => "ISO_SMOOTH",
            ParamKey::MinSize => "MIN_SIZE",
            ParamKey::SearchMargin => "SEARCH_MARGIN",
            ParamKey::FlowMargin => "FLOW_MARGIN",
            ParamKey::MaxDisparity => "MAX_DISPARITY",
            ParamKey::MaxFlowMag => "MAX_FLOW_MAG",
            ParamKey::MaxShiftDisp => "MAX_SHIFT_DISP",
            ParamKey::GsAlt => "GS_ALT",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Effective parameter set handed to the tracker. Every key always has a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackParams {
    values: [f64; 10],
}

impl TrackParams {
    /// Built-in defaults, in [`ParamKey::ALL`] order.
    pub const DEFAULT: TrackParams = TrackParams {
        values: [32.0, 8.0, 3.0, 8.0, 4000.0, 10000.0, 999.0, 50.0, 15.0, 1500.0],
    };

    pub fn get(&self, key: ParamKey) -> f64 {
        self.values[key.index()]
    }

    pub fn entries(&self) -> impl Iterator<Item = (ParamKey, f64)> + '_ {
        ParamKey::ALL.into_iter().map(move |key| (key, self.get(key)))
    }
}

impl Default for TrackParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for TrackParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (key, value)) in self.entries().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

impl Serialize for TrackParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries().map(|(key, value)| (key.name(), value)))
    }
}

/// Optional per-key replacements for the defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParamOverrides {
    values: [Option<f64>; 10],
}

impl ParamOverrides {
    pub fn get(&self, key: ParamKey) -> Option<f64> {
        self.values[key.index()]
    }

    pub fn set(&mut self, key: ParamKey, value: Option<f64>) {
        self.values[key.index()] = value;
    }

    pub fn with(mut self, key: ParamKey, value: f64) -> Self {
        self.set(key, Some(value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Layers `other` on top of `self`; values present in `other` win.
    pub fn overlay(&self, other: &ParamOverrides) -> ParamOverrides {
        let mut merged = *self;
        for key in ParamKey::ALL {
            if let Some(value) = other.get(key) {
                merged.set(key, Some(value));
            }
        }
        merged
    }

    /// Reads overrides from a JSON object keyed by engine parameter names.
    ///
    /// `null` leaves the default in place. Unknown keys are rejected.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading parameter file {}", path.display()))?;
        let entries: BTreeMap<String, Option<f64>> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing parameter file {}", path.display()))?;

        let mut overrides = ParamOverrides::default();
        for (name, value) in entries {
            let key = ParamKey::from_name(&name).ok_or_else(|| {
                anyhow!(
                    "unknown tracking parameter `{name}` in {}",
                    path.display()
                )
            })?;
            overrides.set(key, value);
        }
        Ok(overrides)
    }
}

/// Replaces each default for which an override is present.
pub fn resolve(defaults: &TrackParams, overrides: &ParamOverrides) -> TrackParams {
    let mut resolved = *defaults;
    for key in ParamKey::ALL {
        if let Some(value) = overrides.get(key) {
            resolved.values[key.index()] = value;
        }
    }
    resolved
}
