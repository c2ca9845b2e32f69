// src/main.rs
//
// Sanity run: set up the reference engine on a background thread, render
// quanta until it is ready, then sweep the mixes and print block peaks.

use std::f32::consts::TAU;
use std::time::Duration;

use log::{error, info};

use wtsynth::{
    AudioBuffer, AutomationBuffers, FRAME_SIZE, LifecycleState, ParamId, QuantumOutcome,
    ReferenceEngine, ReferenceLoader, SetupPayload, WavetableDescriptor, WavetableProcessor,
    WavetableSettings, spawn_setup,
};

/// Sine / square in dimension 0, saw / triangle in dimension 1.
fn demo_waveforms(len: usize) -> Vec<Vec<Vec<f32>>> {
    let phase = |s: usize| s as f32 / len as f32;
    let sine: Vec<f32> = (0..len).map(|s| (TAU * phase(s)).sin()).collect();
    let square: Vec<f32> = (0..len)
        .map(|s| if phase(s) < 0.5 { 1.0 } else { -1.0 })
        .collect();
    let saw: Vec<f32> = (0..len).map(|s| 2.0 * phase(s) - 1.0).collect();
    let triangle: Vec<f32> = (0..len)
        .map(|s| 1.0 - 4.0 * (phase(s) - 0.5).abs())
        .collect();
    vec![vec![sine, square], vec![saw, triangle]]
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = WavetableSettings::default();

    // --------------------------------
    // Wavetable
    // --------------------------------

    let wavetable = match WavetableDescriptor::build(
        &demo_waveforms(settings.waveform_length),
        settings.waveform_length,
        settings.base_frequency,
    ) {
        Ok(wavetable) => wavetable,
        Err(e) => {
            error!("failed to build wavetable: {}", e);
            return;
        }
    };

    // --------------------------------
    // Setup (background thread)
    // --------------------------------

    let mut processor: WavetableProcessor<ReferenceEngine> = WavetableProcessor::new();
    let status = processor.status();

    let receiver = match spawn_setup(ReferenceLoader, SetupPayload::new(Vec::new(), wavetable)) {
        Ok(receiver) => receiver,
        Err(e) => {
            error!("failed to spawn setup thread: {}", e);
            return;
        }
    };
    if let Err(e) = processor.begin_setup(receiver) {
        error!("{}", e);
        return;
    }

    // --------------------------------
    // Render quanta
    // --------------------------------

    println!("Starting wavetable sanity test…");

    let mut automation = AutomationBuffers::new();
    automation.set_constant(ParamId::Frequency, 220.0);

    let mut left_right = vec![0.0; FRAME_SIZE * 2];
    let mut rendered = 0;
    let mut quantum = 0;

    while rendered < 8 && quantum < 1000 {
        let sweep = rendered as f32 / 7.0;
        automation.set_constant(ParamId::IntraMix(0), sweep);
        automation.set_constant(ParamId::InterMix(0), 1.0 - sweep);

        let outcome = {
            let mut outputs = [AudioBuffer::new(&mut left_right, 2)];
            processor.process(&automation.frame(), &mut outputs)
        };

        match outcome {
            Ok(QuantumOutcome::Rendered) => {
                let peak = left_right.iter().fold(0.0f32, |m, v| m.max(v.abs()));
                println!("--- Quantum {} --- mix {:.2}, peak {:.3}", quantum, sweep, peak);
                rendered += 1;
            }
            Ok(QuantumOutcome::Silent) => {
                if status.state() == LifecycleState::Failed {
                    break;
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(e) => println!("--- Quantum {} --- silenced: {}", quantum, e),
        }
        quantum += 1;
    }

    let readback = status.readback();
    info!(
        "state {}, {} rendered, {} silent, {} errors",
        readback.state, readback.rendered_quanta, readback.silent_quanta, readback.quantum_errors
    );
    println!("Sanity test completed.");
}
