//! Per-profile settings persisted as a flat TOML key/value file.

use std::collections::BTreeMap;
use std::path::Path;

use eyre::WrapErr;
use serde::{Deserialize, Serialize};

use crate::Config;
use crate::atomic::write_atomic;

pub mod keys {
    pub const CALIBRATION_DURATION: &str = "/scope/CalibrationDuration";
    pub const MAX_RA_DURATION: &str = "/scope/MaxRaDuration";
    pub const MAX_DEC_DURATION: &str = "/scope/MaxDecDuration";
    pub const DEC_GUIDE_MODE: &str = "/scope/DecGuideMode";
    pub const ASSUME_ORTHOGONAL: &str = "/scope/AssumeOrthogonal";

    /// Suppression key for one sanity-check warning category
    /// (`Steps`, `Angle`, `Diff`, `Rates`).
    pub fn cal_warning(profile_id: i32, category: &str) -> String {
        format!("/Confirm/{profile_id}/CalWarning_{category}")
    }

    /// Suppression key for the max-duration limit warning of one axis
    /// (`RA` or `Dec`).
    pub fn limit_warning(profile_id: i32, axis: &str) -> String {
        format!("/Confirm/{profile_id}/Max{axis}LimitWarningEnabled")
    }

    pub fn dec_backlash_warning(profile_id: i32) -> String {
        format!("/Confirm/{profile_id}/DecBacklashWarningEnabled")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    pub profile_id: i32,
    pub ints: BTreeMap<String, i64>,
    pub bools: BTreeMap<String, bool>,
}

impl ProfileSettings {
    pub fn new(profile_id: i32) -> Self {
        Self {
            profile_id,
            ..Self::default()
        }
    }

    /// Seed a profile from the file configuration.
    pub fn from_config(cfg: &Config) -> Self {
        let id = cfg.alerts.profile_id;
        let mut s = Self::new(id);
        s.ints.insert(
            keys::CALIBRATION_DURATION.to_string(),
            i64::from(cfg.calibration.step_ms),
        );
        s.ints.insert(
            keys::MAX_RA_DURATION.to_string(),
            i64::from(cfg.guide.max_ra_ms),
        );
        s.ints.insert(
            keys::MAX_DEC_DURATION.to_string(),
            i64::from(cfg.guide.max_dec_ms),
        );
        s.ints.insert(
            keys::DEC_GUIDE_MODE.to_string(),
            cfg.guide.dec_mode.code(),
        );
        s.bools.insert(
            keys::ASSUME_ORTHOGONAL.to_string(),
            cfg.calibration.assume_orthogonal,
        );
        for (category, on) in [
            ("Steps", cfg.alerts.steps),
            ("Angle", cfg.alerts.angle),
            ("Diff", cfg.alerts.difference),
            ("Rates", cfg.alerts.rates),
        ] {
            s.bools.insert(keys::cal_warning(id, category), on);
        }
        s.bools
            .insert(keys::limit_warning(id, "RA"), cfg.alerts.max_ra_limit);
        s.bools
            .insert(keys::limit_warning(id, "Dec"), cfg.alerts.max_dec_limit);
        s
    }

    /// Load a saved profile; a missing file yields an empty profile.
    pub fn load(path: &Path, profile_id: i32) -> eyre::Result<Self> {
        if !path.exists() {
            return Ok(Self::new(profile_id));
        }
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("read settings {}", path.display()))?;
        let s: Self = toml::from_str(&text)
            .wrap_err_with(|| format!("parse settings {}", path.display()))?;
        Ok(s)
    }

    pub fn save(&self, path: &Path) -> eyre::Result<()> {
        let text = toml::to_string(self).wrap_err("serialize settings")?;
        write_atomic(path, text.as_bytes())
            .wrap_err_with(|| format!("write settings {}", path.display()))
    }

    /// Overlay values from `other`, which wins on conflicts.
    pub fn merge_from(&mut self, other: &Self) {
        for (k, v) in &other.ints {
            self.ints.insert(k.clone(), *v);
        }
        for (k, v) in &other.bools {
            self.bools.insert(k.clone(), *v);
        }
    }
}

impl mountcal_traits::SettingsStore for ProfileSettings {
    fn profile_id(&self) -> i32 {
        self.profile_id
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.bools.get(key).copied().unwrap_or(default)
    }

    fn set_bool(&mut self, key: &str, value: bool) {
        self.bools.insert(key.to_string(), value);
    }

    fn get_int(&self, key: &str, default: i64) -> i64 {
        self.ints.get(key).copied().unwrap_or(default)
    }

    fn set_int(&mut self, key: &str, value: i64) {
        self.ints.insert(key.to_string(), value);
    }
}
