//! Named fusion outputs.
//!
//! [`OutputId`] is the single table mapping engine output identifiers to the
//! names (and accuracy names) used in fused samples.

use crate::fusion::types::FusionOutput;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputId {
    Iaq,
    StaticIaq,
    Co2Equivalent,
    BreathVocEquivalent,
    RawTemperature,
    RawPressure,
    RawHumidity,
    RawGas,
    StabilizationStatus,
    RunInStatus,
    HeatCompensatedTemperature,
    HeatCompensatedHumidity,
    GasPercentage,
    GasEstimate1,
    GasEstimate2,
    GasEstimate3,
    GasEstimate4,
    RawGasIndex,
    TvocEquivalent,
}

impl OutputId {
    pub const ALL: [OutputId; 19] = [
        OutputId::Iaq,
        OutputId::StaticIaq,
        OutputId::Co2Equivalent,
        OutputId::BreathVocEquivalent,
        OutputId::RawTemperature,
        OutputId::RawPressure,
        OutputId::RawHumidity,
        OutputId::RawGas,
        OutputId::StabilizationStatus,
        OutputId::RunInStatus,
        OutputId::HeatCompensatedTemperature,
        OutputId::HeatCompensatedHumidity,
        OutputId::GasPercentage,
        OutputId::GasEstimate1,
        OutputId::GasEstimate2,
        OutputId::GasEstimate3,
        OutputId::GasEstimate4,
        OutputId::RawGasIndex,
        OutputId::TvocEquivalent,
    ];

    /// The four gas-class estimates, in order.
    pub const GAS_ESTIMATES: [OutputId; 4] = [
        OutputId::GasEstimate1,
        OutputId::GasEstimate2,
        OutputId::GasEstimate3,
        OutputId::GasEstimate4,
    ];

    /// Engine identifier.
    pub fn id(self) -> u8 {
        match self {
            OutputId::Iaq => 1,
            OutputId::StaticIaq => 2,
            OutputId::Co2Equivalent => 3,
            OutputId::BreathVocEquivalent => 4,
            OutputId::RawTemperature => 6,
            OutputId::RawPressure => 7,
            OutputId::RawHumidity => 8,
            OutputId::RawGas => 9,
            OutputId::StabilizationStatus => 12,
            OutputId::RunInStatus => 13,
            OutputId::HeatCompensatedTemperature => 14,
            OutputId::HeatCompensatedHumidity => 15,
            OutputId::GasPercentage => 21,
            OutputId::GasEstimate1 => 22,
            OutputId::GasEstimate2 => 23,
            OutputId::GasEstimate3 => 24,
            OutputId::GasEstimate4 => 25,
            OutputId::RawGasIndex => 26,
            OutputId::TvocEquivalent => 27,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        OutputId::ALL.into_iter().find(|o| o.id() == id)
    }

    /// Key under which the value appears in a fused sample.
    pub fn name(self) -> &'static str {
        match self {
            OutputId::Iaq => "iaq",
            OutputId::StaticIaq => "static_iaq",
            OutputId::Co2Equivalent => "co2_equivalent",
            OutputId::BreathVocEquivalent => "breath_voc_equivalent",
            OutputId::RawTemperature => "raw_temperature",
            OutputId::RawPressure => "raw_pressure",
            OutputId::RawHumidity => "raw_humidity",
            OutputId::RawGas => "raw_gas",
            OutputId::StabilizationStatus => "stabilization_status",
            OutputId::RunInStatus => "run_in_status",
            OutputId::HeatCompensatedTemperature => "temperature",
            OutputId::HeatCompensatedHumidity => "humidity",
            OutputId::GasPercentage => "gas_percentage",
            OutputId::GasEstimate1 => "gas_estimate_1",
            OutputId::GasEstimate2 => "gas_estimate_2",
            OutputId::GasEstimate3 => "gas_estimate_3",
            OutputId::GasEstimate4 => "gas_estimate_4",
            OutputId::RawGasIndex => "raw_gas_index",
            OutputId::TvocEquivalent => "tvoc_equivalent",
        }
    }

    /// Key for the accuracy, for outputs that carry one.
    pub fn accuracy_name(self) -> Option<&'static str> {
        Some(match self {
            OutputId::Iaq => "iaq_accuracy",
            OutputId::StaticIaq => "static_iaq_accuracy",
            OutputId::Co2Equivalent => "co2_accuracy",
            OutputId::BreathVocEquivalent => "breath_voc_accuracy",
            OutputId::TvocEquivalent => "tvoc_equivalent_accuracy",
            OutputId::GasPercentage => "gas_percentage_accuracy",
            OutputId::GasEstimate1 => "gas_estimate_1_accuracy",
            OutputId::GasEstimate2 => "gas_estimate_2_accuracy",
            OutputId::GasEstimate3 => "gas_estimate_3_accuracy",
            OutputId::GasEstimate4 => "gas_estimate_4_accuracy",
            _ => return None,
        })
    }
}

/// One named value of a fused sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusedValue {
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<u8>,
}

/// Engine outputs of one accepted field, keyed by output name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedSample {
    pub sample_nr: u32,
    pub timestamp_ns: i64,
    pub values: BTreeMap<String, FusedValue>,
}

impl FusedSample {
    /// Build a sample from raw engine outputs. Unknown identifiers are skipped.
    pub fn from_outputs(sample_nr: u32, timestamp_ns: i64, outputs: &[FusionOutput]) -> Self {
        let values = outputs
            .iter()
            .filter_map(|out| {
                let id = OutputId::from_id(out.output_id)?;
                let accuracy = id.accuracy_name().map(|_| out.accuracy);
                Some((
                    id.name().to_string(),
                    FusedValue {
                        value: f64::from(out.signal),
                        accuracy,
                    },
                ))
            })
            .collect();

        Self {
            sample_nr,
            timestamp_ns,
            values,
        }
    }

    pub fn get(&self, output: OutputId) -> Option<&FusedValue> {
        self.values.get(output.name())
    }

    /// Flatten into name → number, accuracies under their own keys.
    pub fn to_flat_map(&self) -> BTreeMap<String, f64> {
        let mut flat = BTreeMap::new();
        for (name, value) in &self.values {
            flat.insert(name.clone(), value.value);
            let accuracy_key = OutputId::ALL
                .into_iter()
                .find(|o| o.name() == name)
                .and_then(OutputId::accuracy_name);
            if let (Some(key), Some(acc)) = (accuracy_key, value.accuracy) {
                flat.insert(key.to_string(), f64::from(acc));
            }
        }
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_and_names_unique() {
        let ids: HashSet<u8> = OutputId::ALL.iter().map(|o| o.id()).collect();
        let names: HashSet<&str> = OutputId::ALL.iter().map(|o| o.name()).collect();
        assert_eq!(ids.len(), OutputId::ALL.len());
        assert_eq!(names.len(), OutputId::ALL.len());
        for output in OutputId::ALL {
            assert_eq!(OutputId::from_id(output.id()), Some(output));
        }
    }

    #[test]
    fn test_sample_from_outputs() {
        let outputs = [
            FusionOutput {
                output_id: OutputId::Iaq.id(),
                signal: 42.5,
                accuracy: 3,
                timestamp_ns: 7,
            },
            FusionOutput {
                output_id: OutputId::RawPressure.id(),
                signal: 101_325.0,
                accuracy: 0,
                timestamp_ns: 7,
            },
            FusionOutput {
                output_id: 200,
                signal: 1.0,
                accuracy: 0,
                timestamp_ns: 7,
            },
        ];
        let sample = FusedSample::from_outputs(1, 7, &outputs);
        assert_eq!(sample.values.len(), 2);
        assert_eq!(sample.get(OutputId::Iaq).unwrap().accuracy, Some(3));
        assert_eq!(sample.get(OutputId::RawPressure).unwrap().accuracy, None);

        let flat = sample.to_flat_map();
        assert_eq!(flat["iaq"], 42.5);
        assert_eq!(flat["iaq_accuracy"], 3.0);
        assert!(!flat.contains_key("raw_pressure_accuracy"));
    }
}
