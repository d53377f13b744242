//! Demonstration of the BME69x agent on the simulated sensor.
//!
//! This example shows how to:
//! 1. Open a sensor session
//! 2. Run a raw forced-mode measurement
//! 3. Run a few iterations of the air-quality control loop
//! 4. Save the fusion state
//!
//! Run with: cargo run --example forced_mode

use bme69x_agent::{
    BlobStore, FusionProfile, HeaterSetup, SampleRate, SensorSession, SimulatedEngine,
    SimulatedSensor,
};

fn main() -> Result<(), bme69x_agent::Error> {
    println!("BME69x Agent - Forced Mode Demo");
    println!("===============================");
    println!();

    let mut session = SensorSession::new(
        SimulatedSensor::default(),
        SimulatedEngine::new(FusionProfile::AirQuality),
        "demo",
    )?;
    let unique_id = session.sensor_unique_id()?;
    println!(
        "Sensor {} ({}), unique id 0x{:08x}",
        session.sensor_id(),
        session.variant(),
        unique_id
    );
    println!();

    // Raw cycle: 300 °C for 100 ms
    session.configure_heater(HeaterSetup::Forced {
        temperature: 300,
        duration: 100,
    })?;
    for record in session.measure()? {
        println!(
            "raw #{}: {:.2} °C, {:.2} hPa, {:.2} %rH, {:.2} kΩ",
            record.sample_nr,
            record.temperature,
            record.pressure,
            record.humidity,
            record.gas_resistance
        );
    }
    println!();

    // Control loop with a simulated clock
    session.subscribe_profile(FusionProfile::AirQuality, SampleRate::LowPower)?;
    let mut now = 0;
    for _ in 0..5 {
        for sample in session.run_fusion(now)? {
            println!("fused #{}: {:?}", sample.sample_nr, sample.to_flat_map());
        }
        now = session.next_call_ns();
    }
    println!();

    let store = BlobStore::new(std::env::temp_dir().join("bme69x-demo"));
    let path = session.save_state(&store)?;
    println!("Saved state to {path:?}");
    println!();
    println!("{}", session.log().summary());
    Ok(())
}
