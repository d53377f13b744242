//! Stale-field filtering after a duty cycle restarts.
//!
//! Writing an operating mode restarts the heater duty cycle, but the chip may
//! still hand back fields measured under the previous cycle. Those fields
//! carry a measurement index at or above the last one we accepted. The
//! filter arms on every mode write and, while armed, only lets a field
//! through if its index is 0 or lower than the last accepted index. The
//! first field that passes disarms it.

use crate::device::MeasurementField;

#[derive(Debug, Clone, Default)]
pub struct ValidityFilter {
    last_accepted: Option<u8>,
    armed: bool,
}

impl ValidityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called whenever an operating mode is written to the device.
    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Measurement index of the last accepted field.
    pub fn last_accepted(&self) -> Option<u8> {
        self.last_accepted
    }

    /// Decide whether `field` is processed. Accepted fields update the
    /// last accepted index.
    pub fn accept(&mut self, field: &MeasurementField) -> bool {
        if !field.is_gas_valid() {
            return false;
        }

        if self.armed {
            let fresh = match self.last_accepted {
                None => true,
                Some(last) => field.meas_index == 0 || field.meas_index < last,
            };
            if !fresh {
                return false;
            }
            self.armed = false;
        }

        self.last_accepted = Some(field.meas_index);
        true
    }
}
