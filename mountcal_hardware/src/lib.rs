//! Mount hardware backends.
//!
//! Only the simulator ships today: a star on a virtual sensor that moves when
//! the simulated mount is pulsed.
pub mod error;
pub mod sim;

pub use sim::{
    MoveQueue, SimulatedCamera, SimulatedGuider, SimulatedPointing, SimulatedSky, SkyParams,
};
