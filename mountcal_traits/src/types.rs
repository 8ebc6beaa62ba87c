use std::fmt;
use std::ops::Sub;

/// A star position (or displacement) in camera pixels.
///
/// A point with a non-finite coordinate is invalid; measurement code uses
/// [`Point::INVALID`] when no star was found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const INVALID: Self = Self {
        x: f64::NAN,
        y: f64::NAN,
    };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Length of the vector from the origin.
    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Polar angle of the vector, radians.
    pub fn angle(&self) -> f64 {
        self.y.atan2(self.x)
    }

    pub fn distance_to(&self, other: &Self) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Angle of the vector pointing from `self` to `other`, radians.
    pub fn angle_to(&self, other: &Self) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }
}

impl Sub for Point {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuideAxis {
    Ra,
    Dec,
}

impl GuideAxis {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ra => "RA",
            Self::Dec => "Dec",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuideDirection {
    North,
    South,
    East,
    West,
}

impl GuideDirection {
    pub const fn axis(self) -> GuideAxis {
        match self {
            Self::North | Self::South => GuideAxis::Dec,
            Self::East | Self::West => GuideAxis::Ra,
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::North => "North",
            Self::South => "South",
            Self::East => "East",
            Self::West => "West",
        }
    }
}

impl fmt::Display for GuideDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PierSide {
    East,
    West,
    #[default]
    Unknown,
}

impl PierSide {
    pub const fn name(self) -> &'static str {
        match self {
            Self::East => "East",
            Self::West => "West",
            Self::Unknown => "Unknown",
        }
    }
}

/// Whether a guide pulse moves the mount's reported coordinates the expected
/// way: West decreases RA, North increases Dec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuideParity {
    Even,
    Odd,
    #[default]
    Unknown,
}

impl GuideParity {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Even => "Even",
            Self::Odd => "Odd",
            Self::Unknown => "Unknown",
        }
    }
}

/// Equatorial position reported by the mount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyCoords {
    pub ra_hours: f64,
    pub dec_deg: f64,
}

/// Mount guide speeds per axis, in multiples of the sidereal rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuideRates {
    pub ra: f64,
    pub dec: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    CalibrationFailed,
    LimitReached,
    /// Sanity-check finding; a new one replaces any still showing.
    CalibrationAdvisory,
    /// A return trip did not retrace its measurement phase.
    MovementAdvisory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertAction {
    ShowCalibrationDetails,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
    /// Settings key that turns this alert off ("Don't show this again").
    pub suppress_key: Option<String>,
    pub action: Option<AlertAction>,
}
