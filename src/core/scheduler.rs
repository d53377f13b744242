//! Measurement scheduling for one duty cycle.
//!
//! For each poll the scheduler waits out the TPH measurement plus the heater
//! phase, reads the available fields, filters stale ones and hands the rest
//! to a sink. Forced mode polls once. Parallel and sequential modes poll
//! until every profile step has produced a counted field.

use crate::core::heater::HeaterProfile;
use crate::core::settings::DeviceSettings;
use crate::core::validity::ValidityFilter;
use crate::device::{DeviceError, MeasurementField, OperatingMode, SensorInterface};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Time to wait before reading fields, in microseconds.
///
/// Forced and sequential modes wait for the first step's heater duration (ms).
/// Parallel mode waits for the shared heater phase.
pub fn measurement_delay_us(
    meas_duration_us: u32,
    mode: OperatingMode,
    profile: &HeaterProfile,
) -> std::result::Result<u32, DeviceError> {
    let heater_ms = match mode {
        OperatingMode::Forced | OperatingMode::Sequential => profile.first_duration(),
        OperatingMode::Parallel => profile.shared_duration().unwrap_or(0),
        OperatingMode::Sleep => return Err(DeviceError::InvalidMode(mode)),
    };
    Ok(meas_duration_us.saturating_add(u32::from(heater_ms) * 1000))
}

/// Counters for one acquisition run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acquisition {
    pub polls: u32,
    pub received: u32,
    pub accepted: u32,
    pub discarded: u32,
    /// Accepted fields the sink counted toward the target
    pub counted: u32,
    /// Whether the poll limit cut the run short
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scheduler {
    poll_limit: Option<u32>,
}

impl Scheduler {
    /// Poll until the target is met, however long that takes.
    pub fn unlimited() -> Self {
        Self { poll_limit: None }
    }

    /// Give up after `polls` polls and return what was collected.
    pub fn with_poll_limit(polls: u32) -> Self {
        Self {
            poll_limit: Some(polls.max(1)),
        }
    }

    pub fn poll_limit(&self) -> Option<u32> {
        self.poll_limit
    }

    /// Run one acquisition.
    ///
    /// `sink` receives every accepted field and returns whether it counts
    /// toward the target (a field the fusion engine skipped does not).
    pub fn acquire<D, F>(
        &self,
        device: &mut D,
        mode: OperatingMode,
        settings: &DeviceSettings,
        profile: &HeaterProfile,
        filter: &mut ValidityFilter,
        mut sink: F,
    ) -> Result<Acquisition>
    where
        D: SensorInterface,
        F: FnMut(&MeasurementField) -> Result<bool>,
    {
        let meas_us = device.measurement_duration_us(mode, settings);
        let delay = measurement_delay_us(meas_us, mode, profile)?;
        let target = match mode {
            OperatingMode::Forced => 1,
            _ => profile.len().max(1) as u32,
        };
        debug!(?mode, delay_us = delay, target, "starting acquisition");

        let mut run = Acquisition::default();
        while run.counted < target {
            if mode == OperatingMode::Forced && run.polls == 1 {
                break;
            }
            if self.poll_limit.is_some_and(|limit| run.polls >= limit) {
                warn!(
                    ?mode,
                    polls = run.polls,
                    counted = run.counted,
                    target,
                    "poll limit reached, returning partial batch"
                );
                run.truncated = true;
                break;
            }

            device.delay_us(delay);
            let fields = device.get_data(mode)?;
            run.polls += 1;
            run.received += fields.len() as u32;
            trace!(poll = run.polls, fields = fields.len(), "polled device");

            for field in &fields {
                if run.counted == target {
                    break;
                }
                if !filter.accept(field) {
                    run.discarded += 1;
                    trace!(
                        gas_index = field.gas_index,
                        meas_index = field.meas_index,
                        status = field.status,
                        "discarded field"
                    );
                    continue;
                }
                run.accepted += 1;
                if sink(field)? {
                    run.counted += 1;
                }
            }
        }

        debug!(
            polls = run.polls,
            accepted = run.accepted,
            discarded = run.discarded,
            "acquisition finished"
        );
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, SimulatedSensor, STATUS_NEW_DATA, STATUS_VALID_DATA};
    use crate::error::Error;

    fn field(idx: u8, status: u8) -> MeasurementField {
        MeasurementField {
            gas_index: idx,
            meas_index: idx,
            status,
            ..MeasurementField::default()
        }
    }

    #[test]
    fn test_forced_delay() {
        let profile = HeaterProfile::forced(300, 100).unwrap();
        assert_eq!(
            measurement_delay_us(50_000, OperatingMode::Forced, &profile).unwrap(),
            150_000
        );
    }

    #[test]
    fn test_parallel_delay_uses_shared_duration() {
        let profile = HeaterProfile::parallel(&[320, 100], &[5, 2], 90).unwrap();
        assert_eq!(
            measurement_delay_us(50_000, OperatingMode::Parallel, &profile).unwrap(),
            140_000
        );
    }

    #[test]
    fn test_sleep_rejected() {
        let profile = HeaterProfile::disabled();
        assert!(measurement_delay_us(50_000, OperatingMode::Sleep, &profile).is_err());
    }

    #[test]
    fn test_forced_single_poll() {
        let mut device = SimulatedSensor::default();
        let profile = HeaterProfile::forced(300, 100).unwrap();
        let mut filter = ValidityFilter::new();
        let mut seen = Vec::new();

        let run = Scheduler::unlimited()
            .acquire(
                &mut device,
                OperatingMode::Forced,
                &DeviceSettings::default(),
                &profile,
                &mut filter,
                |f| {
                    seen.push(*f);
                    Ok(true)
                },
            )
            .unwrap();

        assert_eq!(run.polls, 1);
        assert_eq!(seen.len(), 1);
        assert_eq!(device.delays(), vec![150_000]);
    }

    #[test]
    fn test_forced_invalid_field_yields_nothing() {
        let mut device = SimulatedSensor::default();
        device.push_response(Ok(vec![field(0, STATUS_NEW_DATA)]));
        let profile = HeaterProfile::forced(300, 100).unwrap();
        let mut filter = ValidityFilter::new();

        let run = Scheduler::unlimited()
            .acquire(
                &mut device,
                OperatingMode::Forced,
                &DeviceSettings::default(),
                &profile,
                &mut filter,
                |_| Ok(true),
            )
            .unwrap();
        assert_eq!(run.polls, 1);
        assert_eq!(run.counted, 0);
        assert_eq!(run.discarded, 1);
    }

    #[test]
    fn test_sequential_collects_each_step() {
        let mut device = SimulatedSensor::default();
        device.push_response(Ok(vec![field(0, STATUS_VALID_DATA)]));
        device.push_response(Ok(vec![]));
        device.push_response(Ok(vec![field(1, STATUS_VALID_DATA), field(2, STATUS_VALID_DATA)]));
        let profile = HeaterProfile::sequential(&[200, 250, 300], &[100, 100, 100]).unwrap();
        let mut filter = ValidityFilter::new();
        let mut indices = Vec::new();

        let run = Scheduler::unlimited()
            .acquire(
                &mut device,
                OperatingMode::Sequential,
                &DeviceSettings::default(),
                &profile,
                &mut filter,
                |f| {
                    indices.push(f.gas_index);
                    Ok(true)
                },
            )
            .unwrap();

        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(run.polls, 3);
        assert!(!run.truncated);
    }

    #[test]
    fn test_poll_limit_returns_partial_batch() {
        let mut device = SimulatedSensor::default();
        for _ in 0..3 {
            device.push_response(Ok(vec![]));
        }
        let profile = HeaterProfile::sequential(&[200, 300], &[100, 100]).unwrap();
        let mut filter = ValidityFilter::new();

        let run = Scheduler::with_poll_limit(3)
            .acquire(
                &mut device,
                OperatingMode::Sequential,
                &DeviceSettings::default(),
                &profile,
                &mut filter,
                |_| Ok(true),
            )
            .unwrap();
        assert!(run.truncated);
        assert_eq!(run.polls, 3);
        assert_eq!(run.counted, 0);
    }

    #[test]
    fn test_uncounted_fields_keep_polling() {
        let mut device = SimulatedSensor::default();
        device.push_response(Ok(vec![field(0, STATUS_VALID_DATA)]));
        device.push_response(Ok(vec![field(1, STATUS_VALID_DATA)]));
        device.push_response(Ok(vec![field(0, STATUS_VALID_DATA)]));
        let profile = HeaterProfile::sequential(&[200, 300], &[100, 100]).unwrap();
        let mut filter = ValidityFilter::new();
        let mut calls = 0;

        let run = Scheduler::unlimited()
            .acquire(
                &mut device,
                OperatingMode::Sequential,
                &DeviceSettings::default(),
                &profile,
                &mut filter,
                |_| {
                    calls += 1;
                    Ok(calls != 2)
                },
            )
            .unwrap();
        assert_eq!(run.accepted, 3);
        assert_eq!(run.counted, 2);
    }

    #[test]
    fn test_device_error_aborts() {
        let mut device = SimulatedSensor::default();
        device.push_response(Err(DeviceError::Communication("nack".into())));
        let profile = HeaterProfile::forced(300, 100).unwrap();
        let mut filter = ValidityFilter::new();

        let err = Scheduler::unlimited()
            .acquire(
                &mut device,
                OperatingMode::Forced,
                &DeviceSettings::default(),
                &profile,
                &mut filter,
                |_| Ok(true),
            )
            .unwrap_err();
        assert!(matches!(err, Error::DeviceIo(DeviceError::Communication(_))));
        assert!(device
            .calls()
            .iter()
            .all(|c| !matches!(c, DeviceCall::SetMode(_))));
    }
}
