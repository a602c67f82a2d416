//! Loopback tests through a real virtual cable
//!
//! Note: These tests require VB-Audio Virtual Cable (or an equivalent loopback
//! pair named "CABLE Input" / "CABLE Output") and are ignored by default.

use relay_audio::buffer::rms;
use relay_audio::{
    list_devices, play_buffer, prepare_for_device, record, resolve, AudioBuffer, Direction,
    PlaybackOptions, RecordOptions,
};
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn stereo_tone(seconds: f32) -> AudioBuffer {
    let rate = 44_100;
    let frames = (seconds * rate as f32) as usize;
    let mut samples = Vec::with_capacity(frames * 2);
    for n in 0..frames {
        let s = 0.2 * (TAU * 440.0 * n as f32 / rate as f32).sin();
        samples.push(s);
        samples.push(s);
    }
    AudioBuffer::new(samples, 2, rate)
}

/// RMS over the 100 ms windows that carry signal, skipping the silent lead-in and tail.
fn tone_window_rms(buffer: &AudioBuffer) -> f32 {
    let window = (buffer.sample_rate as usize / 10) * buffer.channels as usize;
    let loud: Vec<f32> = buffer
        .samples
        .chunks(window.max(1))
        .filter(|w| rms(w) > 0.05)
        .flatten()
        .copied()
        .collect();
    rms(&loud)
}

#[test]
#[ignore] // Requires a virtual audio cable
fn gain_staged_tone_arrives_on_capture_side() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let devices = list_devices().expect("Failed to enumerate devices");
    let cable_in = resolve(&devices, "CABLE Input", Direction::Output)
        .expect("No CABLE Input device")
        .clone();
    let cable_out = resolve(&devices, "CABLE Output", Direction::Input)
        .expect("No CABLE Output device")
        .clone();

    let prepared = prepare_for_device(
        stereo_tone(2.0),
        &cable_in,
        &PlaybackOptions {
            gain: 3.0,
            resample: true,
            monitor: false,
        },
    );
    assert!(prepared.samples.iter().all(|s| (-1.0..=1.0).contains(s)));

    let stop = Arc::new(AtomicBool::new(false));
    let options = RecordOptions {
        duration: Duration::from_secs(5),
        monitor: false,
        stop: Some(stop.clone()),
    };

    let captured = std::thread::scope(|scope| {
        let recorder = scope.spawn(|| record(&cable_out, &options));
        std::thread::sleep(Duration::from_millis(500));
        play_buffer(&prepared, &cable_in, false).expect("Playback failed");
        std::thread::sleep(Duration::from_millis(500));
        stop.store(true, Ordering::Relaxed);
        recorder.join().unwrap()
    })
    .expect("Capture failed");

    // 0.2 * 3.0 = 0.6 peak, no clipping: sine RMS 0.6 / sqrt(2) ~ 0.42 while the tone is present.
    let level = tone_window_rms(&captured);
    println!("Captured RMS: {:.3} (tone windows: {:.3})", captured.rms(), level);
    assert!(
        (0.3..0.5).contains(&level),
        "tone RMS {:.3} outside 0.3..0.5",
        level
    );
}
