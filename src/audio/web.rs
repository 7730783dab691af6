//! Web Audio backend
//!
//! Two gain buses (music, sfx) feed the destination; each voice gets its own
//! oscillator or noise buffer plus an envelope gain node.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use web_sys::{
    AudioBuffer, AudioContext, AudioContextState, GainNode, OscillatorNode, OscillatorType,
};

use super::{AudioBackend, Bus, Voice, Waveform};

/// Envelope floor; exponential ramps cannot reach zero
const SILENCE: f32 = 0.001;
/// Length of the shared white-noise buffer
const NOISE_SECONDS: f32 = 0.5;

pub struct WebAudioBackend {
    ctx: AudioContext,
    music: GainNode,
    sfx: GainNode,
    noise: Option<AudioBuffer>,
}

impl WebAudioBackend {
    /// Fails (returns `None`) when the browser refuses an AudioContext, e.g.
    /// outside a secure context
    pub fn new() -> Option<Self> {
        let ctx = match AudioContext::new() {
            Ok(ctx) => ctx,
            Err(_) => {
                log::warn!("Failed to create AudioContext - audio disabled");
                return None;
            }
        };
        let music = ctx.create_gain().ok()?;
        let sfx = ctx.create_gain().ok()?;
        music.connect_with_audio_node(&ctx.destination()).ok()?;
        sfx.connect_with_audio_node(&ctx.destination()).ok()?;

        let noise = Self::noise_buffer(&ctx);
        if noise.is_none() {
            log::warn!("Noise buffer unavailable, noise voices muted");
        }

        Some(Self {
            ctx,
            music,
            sfx,
            noise,
        })
    }

    fn noise_buffer(ctx: &AudioContext) -> Option<AudioBuffer> {
        let rate = ctx.sample_rate();
        let len = (rate * NOISE_SECONDS) as u32;
        let buffer = ctx.create_buffer(1, len, rate).ok()?;
        let mut rng = Pcg32::seed_from_u64(0x5eed);
        let samples: Vec<f32> = (0..len).map(|_| rng.random_range(-1.0..1.0)).collect();
        buffer.copy_to_channel(&samples, 0).ok()?;
        Some(buffer)
    }

    fn bus(&self, bus: Bus) -> &GainNode {
        match bus {
            Bus::Music => &self.music,
            Bus::Sfx => &self.sfx,
        }
    }

    /// Envelope gain node wired into `bus`
    fn envelope(&self, bus: Bus, volume: f32, start: f64, end: f64) -> Option<GainNode> {
        let gain = self.ctx.create_gain().ok()?;
        gain.gain().set_value_at_time(volume.max(SILENCE), start).ok();
        gain.gain()
            .exponential_ramp_to_value_at_time(SILENCE, end)
            .ok();
        gain.connect_with_audio_node(self.bus(bus)).ok()?;
        Some(gain)
    }

    /// Create an oscillator feeding `gain`
    fn create_osc(&self, freq: f32, waveform: Waveform, gain: &GainNode) -> Option<OscillatorNode> {
        let osc = self.ctx.create_oscillator().ok()?;
        osc.set_type(match waveform {
            Waveform::Sine => OscillatorType::Sine,
            Waveform::Square => OscillatorType::Square,
            Waveform::Sawtooth => OscillatorType::Sawtooth,
            Waveform::Triangle => OscillatorType::Triangle,
        });
        osc.frequency().set_value(freq);
        osc.connect_with_audio_node(gain).ok()?;
        Some(osc)
    }

    fn schedule(&self, voice: &Voice, bus: Bus) -> Option<()> {
        let start = self.ctx.current_time() + f64::from(voice.offset_ms()) / 1000.0;
        let end = start + f64::from(voice.duration_ms()) / 1000.0;

        match *voice {
            Voice::Tone {
                freq,
                end_freq,
                waveform,
                volume,
                ..
            } => {
                let gain = self.envelope(bus, volume, start, end)?;
                let osc = self.create_osc(freq, waveform, &gain)?;
                if let Some(target) = end_freq {
                    osc.frequency().set_value_at_time(freq, start).ok();
                    osc.frequency()
                        .exponential_ramp_to_value_at_time(target.max(1.0), end)
                        .ok();
                }
                osc.start_with_when(start).ok();
                osc.stop_with_when(end + 0.05).ok();
            }
            Voice::Noise { volume, .. } => {
                let buffer = self.noise.as_ref()?;
                let gain = self.envelope(bus, volume, start, end)?;
                let source = self.ctx.create_buffer_source().ok()?;
                source.set_buffer(Some(buffer));
                source.connect_with_audio_node(&gain).ok()?;
                source.start_with_when(start).ok();
                source.stop_with_when(end + 0.05).ok();
            }
        }
        Some(())
    }
}

impl AudioBackend for WebAudioBackend {
    fn play(&mut self, voice: &Voice, bus: Bus) {
        // Resume context if suspended (browsers require user gesture)
        if self.ctx.state() == AudioContextState::Suspended {
            let _ = self.ctx.resume();
        }
        if self.schedule(voice, bus).is_none() {
            log::debug!("Dropped voice {voice:?}");
        }
    }

    fn set_bus_level(&mut self, bus: Bus, level: f32) {
        self.bus(bus).gain().set_value(level);
    }

    fn resume(&mut self) {
        if self.ctx.state() == AudioContextState::Suspended {
            let _ = self.ctx.resume();
        }
    }

    fn close(&mut self) {
        if self.ctx.state() != AudioContextState::Closed {
            let _ = self.ctx.close();
        }
    }
}
