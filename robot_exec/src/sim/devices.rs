//! Simulated sensors, solenoids and operator inputs

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::SimGyro;
use comms_if::eqpt::{BooleanSensor, HumanInput, OffsetSensor, PowerMonitor, SolenoidOutput};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A switch whose state is set by the test or simulation.
#[derive(Clone, Default)]
pub struct SimSwitch {
    on: Arc<AtomicBool>,
}

/// A camera reporting a fixed, externally set, target offset.
#[derive(Clone, Default)]
pub struct SimCamera {
    offset: Arc<Mutex<Option<f64>>>,
}

/// A camera looking along the robot's heading at a target on a fixed bearing.
#[derive(Clone)]
pub struct SimBearingCamera {
    gyro: SimGyro,
    target_bearing_deg: f64,

    /// Half of the horizontal field of view, an offset of 1 is at the edge of view.
    half_fov_deg: f64,
}

/// An operator controller whose axes and buttons are set by the simulation.
#[derive(Clone, Default)]
pub struct SimJoystick {
    state: Arc<Mutex<JoystickState>>,
}

#[derive(Clone, Default)]
pub struct SimSolenoid {
    on: Arc<AtomicBool>,
}

pub struct SimPowerMonitor {
    pub voltage: f64,
}

#[derive(Default)]
struct JoystickState {
    axes: HashMap<u32, f64>,
    buttons: HashMap<u32, bool>,
    pov: Option<i32>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimSwitch {
    pub fn set(&self, on: bool) {
        self.on.store(on, Ordering::SeqCst)
    }
}

impl BooleanSensor for SimSwitch {
    fn read(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }
}

impl SimCamera {
    pub fn set_offset(&self, offset: Option<f64>) {
        if let Ok(mut o) = self.offset.lock() {
            *o = offset;
        }
    }
}

impl OffsetSensor for SimCamera {
    fn try_get_offset(&self) -> Option<f64> {
        match self.offset.lock() {
            Ok(o) => *o,
            Err(_) => None,
        }
    }
}

impl SimBearingCamera {
    pub fn new(gyro: SimGyro, target_bearing_deg: f64, half_fov_deg: f64) -> Self {
        Self {
            gyro,
            target_bearing_deg,
            half_fov_deg,
        }
    }
}

impl OffsetSensor for SimBearingCamera {
    fn try_get_offset(&self) -> Option<f64> {
        let offset_deg = self.gyro.bearing_offset_deg(self.target_bearing_deg);

        if offset_deg.abs() > self.half_fov_deg {
            None
        } else {
            Some(offset_deg / self.half_fov_deg)
        }
    }
}

impl SimJoystick {
    pub fn set_axis(&self, id: u32, value: f64) {
        if let Ok(mut s) = self.state.lock() {
            s.axes.insert(id, value);
        }
    }

    pub fn set_button(&self, id: u32, pressed: bool) {
        if let Ok(mut s) = self.state.lock() {
            s.buttons.insert(id, pressed);
        }
    }

    pub fn set_pov(&self, pov: Option<i32>) {
        if let Ok(mut s) = self.state.lock() {
            s.pov = pov;
        }
    }
}

impl HumanInput for SimJoystick {
    fn axis(&self, id: u32) -> f64 {
        match self.state.lock() {
            Ok(s) => s.axes.get(&id).copied().unwrap_or(0.0),
            Err(_) => 0.0,
        }
    }

    fn button(&self, id: u32) -> bool {
        match self.state.lock() {
            Ok(s) => s.buttons.get(&id).copied().unwrap_or(false),
            Err(_) => false,
        }
    }

    fn pov(&self) -> i32 {
        match self.state.lock() {
            Ok(s) => s.pov.unwrap_or(-1),
            Err(_) => -1,
        }
    }
}

impl SolenoidOutput for SimSolenoid {
    fn set(&mut self, on: bool) {
        self.on.store(on, Ordering::SeqCst)
    }

    fn get(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }
}

impl PowerMonitor for SimPowerMonitor {
    fn supply_voltage(&self) -> f64 {
        self.voltage
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{SimPlant, SimPlantParams};
    use comms_if::eqpt::AngleSensor;

    #[test]
    fn test_bearing_camera() {
        let plant = SimPlant::new(SimPlantParams::default());
        let gyro = plant.gyro();
        let cam = SimBearingCamera::new(plant.gyro(), 20.0, 40.0);

        assert_eq!(cam.try_get_offset(), Some(0.5));
        gyro.set_heading(30.0);
        assert_eq!(cam.try_get_offset(), Some(-0.25));
        gyro.set_heading(-30.0);
        assert_eq!(cam.try_get_offset(), None);
    }

    #[test]
    fn test_joystick_defaults() {
        let joy = SimJoystick::default();
        assert_eq!(joy.axis(1), 0.0);
        assert!(!joy.button(3));
        assert_eq!(joy.pov(), -1);

        let handle = joy.clone();
        handle.set_axis(1, -0.4);
        handle.set_button(3, true);
        assert_eq!(joy.axis(1), -0.4);
        assert!(joy.button(3));
    }
}
