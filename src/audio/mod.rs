//! Procedural audio
//!
//! Every sound is built from oscillator tones and noise bursts; no asset
//! files. Effects and the background melody are described as [`Voice`]s and
//! handed to an [`AudioBackend`], so the mixing rules are the same whether
//! the sink is Web Audio or a silent stand-in.

#[cfg(target_arch = "wasm32")]
pub mod web;

use crate::settings::Settings;

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundEffect {
    /// Player cannon
    PlayerShoot,
    /// Enemy cannon
    EnemyShoot,
    /// Brick wall knocked out
    BrickDestroyed,
    /// Bullet pinged off steel
    SteelHit,
    /// Enemy tank destroyed
    Explosion,
    /// Player lost a life
    PlayerHit,
    /// Trigger pulled with no ammo
    EmptyAmmo,
    /// Question box opened
    BoxOpen,
    /// Knowledge box opened
    KnowledgeOpen,
    CorrectAnswer,
    WrongAnswer,
    Victory,
    Defeat,
}

/// Oscillator shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// Mixer channel a voice is routed through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bus {
    Music,
    Sfx,
}

/// One scheduled sound component
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Voice {
    Tone {
        freq: f32,
        /// Exponential sweep target, if the pitch bends
        end_freq: Option<f32>,
        waveform: Waveform,
        duration_ms: f32,
        /// Peak gain before bus level
        volume: f32,
        /// Delay from the trigger
        offset_ms: f32,
    },
    Noise {
        duration_ms: f32,
        volume: f32,
        offset_ms: f32,
    },
}

impl Voice {
    pub fn tone(freq: f32, waveform: Waveform, duration_ms: f32, volume: f32) -> Self {
        Voice::Tone {
            freq,
            end_freq: None,
            waveform,
            duration_ms,
            volume,
            offset_ms: 0.0,
        }
    }

    pub fn noise(duration_ms: f32, volume: f32) -> Self {
        Voice::Noise {
            duration_ms,
            volume,
            offset_ms: 0.0,
        }
    }

    /// Bend pitch toward `end` over the voice's duration
    pub fn sweep(mut self, end: f32) -> Self {
        if let Voice::Tone { end_freq, .. } = &mut self {
            *end_freq = Some(end);
        }
        self
    }

    pub fn at(mut self, offset: f32) -> Self {
        match &mut self {
            Voice::Tone { offset_ms, .. } | Voice::Noise { offset_ms, .. } => *offset_ms = offset,
        }
        self
    }

    pub fn duration_ms(&self) -> f32 {
        match self {
            Voice::Tone { duration_ms, .. } | Voice::Noise { duration_ms, .. } => *duration_ms,
        }
    }

    pub fn offset_ms(&self) -> f32 {
        match self {
            Voice::Tone { offset_ms, .. } | Voice::Noise { offset_ms, .. } => *offset_ms,
        }
    }
}

/// Rising arpeggio helper
fn arpeggio(
    notes: &[f32],
    waveform: Waveform,
    step_ms: f32,
    note_ms: f32,
    volume: f32,
) -> Vec<Voice> {
    notes
        .iter()
        .enumerate()
        .map(|(i, &freq)| Voice::tone(freq, waveform, note_ms, volume).at(i as f32 * step_ms))
        .collect()
}

impl SoundEffect {
    /// The voices making up this effect
    pub fn voices(self) -> Vec<Voice> {
        use Waveform::*;
        match self {
            SoundEffect::PlayerShoot => vec![
                Voice::tone(880.0, Square, 80.0, 0.25).sweep(220.0),
                Voice::noise(40.0, 0.15),
            ],
            SoundEffect::EnemyShoot => vec![Voice::tone(440.0, Sawtooth, 80.0, 0.15).sweep(160.0)],
            SoundEffect::BrickDestroyed => vec![
                Voice::noise(150.0, 0.4),
                Voice::tone(120.0, Sine, 100.0, 0.3).sweep(60.0),
                Voice::noise(60.0, 0.2).at(40.0),
            ],
            SoundEffect::SteelHit => vec![
                Voice::tone(1200.0, Square, 60.0, 0.15),
                Voice::tone(800.0, Triangle, 80.0, 0.15).at(10.0),
            ],
            // Boom with a high crack on top
            SoundEffect::Explosion => vec![
                Voice::noise(400.0, 0.5),
                Voice::tone(100.0, Sawtooth, 400.0, 0.4).sweep(30.0),
                Voice::tone(1500.0, Square, 100.0, 0.15),
            ],
            SoundEffect::PlayerHit => vec![
                Voice::tone(300.0, Sawtooth, 300.0, 0.35).sweep(80.0),
                Voice::noise(200.0, 0.3),
            ],
            SoundEffect::EmptyAmmo => vec![
                Voice::tone(200.0, Square, 60.0, 0.2),
                Voice::tone(150.0, Square, 80.0, 0.2).at(90.0),
            ],
            SoundEffect::BoxOpen => arpeggio(&[600.0, 800.0, 1000.0], Sine, 60.0, 100.0, 0.2),
            SoundEffect::KnowledgeOpen => arpeggio(&[520.0, 780.0], Triangle, 90.0, 150.0, 0.2),
            SoundEffect::CorrectAnswer => {
                arpeggio(&[523.25, 659.25, 783.99, 1046.5], Triangle, 80.0, 200.0, 0.25)
            }
            SoundEffect::WrongAnswer => arpeggio(&[300.0, 200.0], Sawtooth, 150.0, 200.0, 0.25),
            SoundEffect::Victory => {
                arpeggio(&[400.0, 500.0, 600.0, 800.0, 1000.0], Triangle, 100.0, 400.0, 0.3)
            }
            SoundEffect::Defeat => arpeggio(&[400.0, 350.0, 300.0, 200.0], Sine, 200.0, 300.0, 0.3),
        }
    }
}

/// Bus levels derived from [`Settings`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mixer {
    pub enabled: bool,
    pub music: f32,
    pub sfx: f32,
}

impl Mixer {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            enabled: settings.sound_enabled,
            music: settings.music_volume,
            sfx: settings.sfx_volume,
        }
    }

    /// Effective level of a bus; zero when the master switch is off
    pub fn level(&self, bus: Bus) -> f32 {
        if !self.enabled {
            return 0.0;
        }
        match bus {
            Bus::Music => self.music,
            Bus::Sfx => self.sfx,
        }
    }

    /// Whether anything routed to `bus` would be audible
    pub fn audible(&self, bus: Bus) -> bool {
        self.level(bus) > 0.0
    }
}

/// Background loop, in Hz; zero is a rest
pub const MELODY: [f32; 16] = [
    329.63, 392.00, 440.00, 392.00, 329.63, 293.66, 261.63, 0.0, //
    293.66, 329.63, 392.00, 329.63, 293.66, 261.63, 246.94, 0.0,
];
pub const MELODY_STEP_MS: f64 = 220.0;
/// Level of the octave-lower doubling relative to the lead
const MELODY_BASS_LEVEL: f32 = 0.5;

/// Step sequencer for [`MELODY`]
#[derive(Debug, Clone, Default)]
pub struct Melody {
    step: usize,
    elapsed_ms: f64,
}

impl Melody {
    /// Restart so the first note sounds on the next advance
    pub fn restart(&mut self) {
        self.step = 0;
        self.elapsed_ms = MELODY_STEP_MS;
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// Move the sequencer forward and return the notes that fall due.
    ///
    /// A long stall (hidden tab) plays at most one catch-up note.
    pub fn advance(&mut self, elapsed_ms: f64) -> Vec<Voice> {
        self.elapsed_ms = (self.elapsed_ms + elapsed_ms.max(0.0)).min(MELODY_STEP_MS * 2.0);
        let mut voices = Vec::new();
        while self.elapsed_ms >= MELODY_STEP_MS {
            self.elapsed_ms -= MELODY_STEP_MS;
            let freq = MELODY[self.step];
            if freq > 0.0 {
                let note_ms = MELODY_STEP_MS as f32 * 0.9;
                voices.push(Voice::tone(freq, Waveform::Triangle, note_ms, 0.2));
                voices.push(Voice::tone(
                    freq / 2.0,
                    Waveform::Sine,
                    note_ms,
                    0.2 * MELODY_BASS_LEVEL,
                ));
            }
            self.step = (self.step + 1) % MELODY.len();
        }
        voices
    }
}

/// Sink for synthesized voices
pub trait AudioBackend {
    /// Schedule a voice on a bus; the bus gain applies on top of the voice's
    /// own volume
    fn play(&mut self, voice: &Voice, bus: Bus);
    /// Live level change, no context rebuild
    fn set_bus_level(&mut self, bus: Bus, level: f32);
    /// Unblock output after a user gesture
    fn resume(&mut self) {}
    /// Release the underlying context
    fn close(&mut self) {}
}

/// Backend that discards everything
#[derive(Debug, Default)]
pub struct SilentBackend;

impl AudioBackend for SilentBackend {
    fn play(&mut self, _voice: &Voice, _bus: Bus) {}
    fn set_bus_level(&mut self, _bus: Bus, _level: f32) {}
}

/// Mixer, melody and backend together
pub struct AudioEngine {
    backend: Box<dyn AudioBackend>,
    mixer: Mixer,
    melody: Melody,
    music_playing: bool,
    closed: bool,
}

impl AudioEngine {
    pub fn new(backend: Box<dyn AudioBackend>, settings: &Settings) -> Self {
        let mut engine = Self {
            backend,
            mixer: Mixer::from_settings(settings),
            melody: Melody::default(),
            music_playing: false,
            closed: false,
        };
        engine.push_levels();
        engine
    }

    pub fn silent(settings: &Settings) -> Self {
        Self::new(Box::new(SilentBackend), settings)
    }

    pub fn mixer(&self) -> Mixer {
        self.mixer
    }

    pub fn music_playing(&self) -> bool {
        self.music_playing
    }

    fn push_levels(&mut self) {
        for bus in [Bus::Music, Bus::Sfx] {
            self.backend.set_bus_level(bus, self.mixer.level(bus));
        }
    }

    /// Pick up changed levels or the master switch
    pub fn apply_settings(&mut self, settings: &Settings) {
        if self.closed {
            return;
        }
        self.mixer = Mixer::from_settings(settings);
        self.push_levels();
    }

    pub fn resume(&mut self) {
        if !self.closed {
            self.backend.resume();
        }
    }

    pub fn play(&mut self, effect: SoundEffect) {
        if self.closed || !self.mixer.audible(Bus::Sfx) {
            return;
        }
        for voice in effect.voices() {
            self.backend.play(&voice, Bus::Sfx);
        }
    }

    pub fn start_music(&mut self) {
        if self.closed {
            return;
        }
        self.melody.restart();
        self.music_playing = true;
    }

    pub fn stop_music(&mut self) {
        self.music_playing = false;
    }

    /// Advance the melody by wall-clock milliseconds
    pub fn update(&mut self, elapsed_ms: f64) {
        if self.closed || !self.music_playing {
            return;
        }
        let notes = self.melody.advance(elapsed_ms);
        if !self.mixer.audible(Bus::Music) {
            return;
        }
        for voice in &notes {
            self.backend.play(voice, Bus::Music);
        }
    }

    /// Stop everything and release the backend. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.music_playing = false;
        self.closed = true;
        self.backend.close();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// What a [`RecordingBackend`] saw
    #[derive(Debug, Default)]
    pub struct Recording {
        pub played: Vec<(Voice, Bus)>,
        pub levels: Vec<(Bus, f32)>,
        pub closed: u32,
    }

    /// Backend that logs every call into shared storage
    #[derive(Debug, Default, Clone)]
    pub struct RecordingBackend(pub Rc<RefCell<Recording>>);

    impl AudioBackend for RecordingBackend {
        fn play(&mut self, voice: &Voice, bus: Bus) {
            self.0.borrow_mut().played.push((*voice, bus));
        }
        fn set_bus_level(&mut self, bus: Bus, level: f32) {
            self.0.borrow_mut().levels.push((bus, level));
        }
        fn close(&mut self) {
            self.0.borrow_mut().closed += 1;
        }
    }

    fn engine(settings: &Settings) -> (AudioEngine, Rc<RefCell<Recording>>) {
        let backend = RecordingBackend::default();
        let log = backend.0.clone();
        (AudioEngine::new(Box::new(backend), settings), log)
    }

    #[test]
    fn test_every_effect_has_voices() {
        use SoundEffect::*;
        for effect in [
            PlayerShoot, EnemyShoot, BrickDestroyed, SteelHit, Explosion, PlayerHit, EmptyAmmo,
            BoxOpen, KnowledgeOpen, CorrectAnswer, WrongAnswer, Victory, Defeat,
        ] {
            let voices = effect.voices();
            assert!(!voices.is_empty(), "{effect:?}");
            assert!(voices.iter().all(|v| v.duration_ms() > 0.0 && v.offset_ms() >= 0.0));
        }
    }

    #[test]
    fn test_master_switch_silences_everything() {
        let settings = Settings {
            sound_enabled: false,
            ..Settings::default()
        };
        let (mut audio, log) = engine(&settings);
        audio.play(SoundEffect::Explosion);
        audio.start_music();
        audio.update(1000.0);
        assert!(log.borrow().played.is_empty());
        assert!(log.borrow().levels.iter().all(|(_, level)| *level == 0.0));
    }

    #[test]
    fn test_zero_sfx_keeps_music() {
        let mut settings = Settings::default();
        settings.set_sfx_volume(0.0);
        let (mut audio, log) = engine(&settings);
        audio.play(SoundEffect::PlayerShoot);
        audio.start_music();
        audio.update(1.0);
        let played = &log.borrow().played;
        assert!(!played.is_empty());
        assert!(played.iter().all(|(_, bus)| *bus == Bus::Music));
    }

    #[test]
    fn test_live_level_update() {
        let (mut audio, log) = engine(&Settings::default());
        let mut settings = Settings::default();
        settings.set_music_volume(0.1);
        audio.apply_settings(&settings);
        assert_eq!(log.borrow().levels.last(), Some(&(Bus::Sfx, settings.sfx_volume)));
        assert!(log.borrow().levels.contains(&(Bus::Music, 0.1)));
    }

    #[test]
    fn test_melody_doubles_octave_and_loops() {
        let mut melody = Melody::default();
        melody.restart();
        let first = melody.advance(0.0);
        assert_eq!(first.len(), 2);
        match (first[0], first[1]) {
            (Voice::Tone { freq: lead, .. }, Voice::Tone { freq: bass, .. }) => {
                assert_eq!(bass * 2.0, lead)
            }
            other => panic!("unexpected {other:?}"),
        }
        for _ in 0..MELODY.len() - 1 {
            melody.advance(MELODY_STEP_MS);
        }
        assert_eq!(melody.step(), 0);
    }

    #[test]
    fn test_melody_stall_catches_up_once() {
        let mut melody = Melody::default();
        melody.restart();
        melody.advance(0.0);
        let notes = melody.advance(60_000.0);
        assert!(notes.len() <= 4);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut audio, log) = engine(&Settings::default());
        audio.start_music();
        audio.close();
        audio.close();
        audio.play(SoundEffect::Victory);
        audio.update(500.0);
        assert_eq!(log.borrow().closed, 1);
        assert!(log.borrow().played.is_empty());
        assert!(!audio.music_playing());
    }
}
