#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use mountcal_config::ProfileSettings;
use mountcal_core::{
    Calibration, CalibrationDetails, CalibrationEvents, CalibrationLog, CalibrationStatus,
    CalibrationStep, Mount, MountBuilder, Set,
};
use mountcal_hardware::{MoveQueue, SimulatedSky, SkyParams};
use mountcal_traits::{Alert, AlertKind, AlertSurface, GuideAxis, GuideParity, ManualClock};

/// Alert surface that remembers everything it was asked to show.
#[derive(Debug, Default)]
pub struct AlertLog {
    pub alerts: Vec<Alert>,
}

impl AlertSurface for AlertLog {
    fn show(&mut self, alert: &Alert) {
        self.alerts.push(alert.clone());
    }
}

impl AlertLog {
    pub fn count(&self, kind: AlertKind) -> usize {
        self.alerts.iter().filter(|a| a.kind == kind).count()
    }
}

/// Shared event/log recorder; one string per record.
#[derive(Debug, Clone, Default)]
pub struct Events(pub Rc<RefCell<Vec<String>>>);

impl Events {
    pub fn count(&self, prefix: &str) -> usize {
        self.0.borrow().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

impl CalibrationEvents for Events {
    fn calibration_complete(&mut self, _calibration: &Calibration) {
        self.0.borrow_mut().push("event:complete".into());
    }
    fn calibration_failed(&mut self, message: &str) {
        self.0.borrow_mut().push(format!("event:failed:{message}"));
    }
}

impl CalibrationLog for Events {
    fn step(&mut self, step: &CalibrationStep) {
        self.0.borrow_mut().push(format!("log:step:{}", step.phase));
    }
    fn direct_complete(&mut self, axis: GuideAxis, _angle: f64, _rate: f64, parity: GuideParity) {
        self.0
            .borrow_mut()
            .push(format!("log:axis:{}:{}", axis.name(), parity.name()));
    }
    fn complete(&mut self, _calibration: &Calibration, _details: &CalibrationDetails) {
        self.0.borrow_mut().push("log:complete".into());
    }
    fn failed(&mut self, message: &str) {
        self.0.borrow_mut().push(format!("log:failed:{message}"));
    }
}

pub struct Rig {
    pub mount: Mount,
    pub sky: SimulatedSky,
    pub queue: MoveQueue,
    pub alerts: Rc<RefCell<AlertLog>>,
    pub events: Events,
    pub settings: Rc<RefCell<ProfileSettings>>,
    pub clock: ManualClock,
}

impl Rig {
    pub fn new(params: SkyParams) -> Self {
        Self::with(params, |b| b)
    }

    pub fn with(
        params: SkyParams,
        configure: impl FnOnce(MountBuilder<Set, Set>) -> MountBuilder<Set, Set>,
    ) -> Self {
        let sky = SimulatedSky::new(params);
        let queue = MoveQueue::new();
        let alerts = Rc::new(RefCell::new(AlertLog::default()));
        let events = Events::default();
        let settings = Rc::new(RefCell::new(ProfileSettings::new(0)));
        let clock = ManualClock::new();

        let builder = Mount::builder()
            .with_guider(sky.guider())
            .with_scheduler(queue.clone())
            .with_pointing(sky.pointing())
            .with_alerts(alerts.clone())
            .with_events(events.clone())
            .with_log(events.clone())
            .with_settings(settings.clone())
            .with_clock(Arc::new(clock.clone()));
        let mount = configure(builder).build().expect("build mount");

        Self {
            mount,
            sky,
            queue,
            alerts,
            events,
            settings,
            clock,
        }
    }

    /// Drive a whole calibration: measure, step, execute queued moves.
    pub fn run(&mut self, max_frames: usize) -> eyre::Result<CalibrationStatus> {
        let mut camera = self.sky.camera();
        self.mount.begin_calibration(camera.locate())?;
        for _ in 0..max_frames {
            if self.mount.step(camera.locate())? == CalibrationStatus::Complete {
                return Ok(CalibrationStatus::Complete);
            }
            while let Some((dir, ms)) = self.queue.pop() {
                self.mount.calibration_move(dir, ms)?;
            }
        }
        Ok(CalibrationStatus::Pending)
    }
}
