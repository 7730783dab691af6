//! Per-frame orchestrator
//!
//! One [`Engine`] owns a round: simulation state, the interaction state
//! machine, audio and the host bridge. The platform layer calls
//! [`Engine::frame`] once per display refresh with a millisecond timestamp.
//!
//! Two clocks matter here. The scheduler turns frame deltas into fixed
//! simulation steps and is suspended whenever an overlay is up; resuming
//! never replays the paused time. The engine clock drives display delays
//! (answer feedback, end of round) and stops only while Settings is open.

use crate::audio::{AudioEngine, SoundEffect};
use crate::config::{Answer, GameConfig};
use crate::consts::*;
use crate::host::{GameResult, HostBridge, HudSnapshot, PromptView};
use crate::settings::{QualityPreset, Settings};
use crate::sim::interaction::{Interaction, InteractionState, Verdict};
use crate::sim::state::{Direction, GameEvent, GameState};
use crate::sim::tick::{TickInput, tick};
use crate::sim::tile::Tile;

/// Whether frame deltas feed the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerMode {
    Running,
    Suspended,
}

/// Fixed-step accumulator with an explicit suspended mode
#[derive(Debug, Clone)]
pub struct Scheduler {
    mode: SchedulerMode,
    last_time: Option<f64>,
    accumulator: f32,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            mode: SchedulerMode::Suspended,
            last_time: None,
            accumulator: 0.0,
        }
    }

    pub fn mode(&self) -> SchedulerMode {
        self.mode
    }

    /// Stop feeding the simulation and forget the last timestamp
    pub fn suspend(&mut self) {
        self.mode = SchedulerMode::Suspended;
        self.last_time = None;
        self.accumulator = 0.0;
    }

    /// Number of fixed steps due at `now_ms`.
    ///
    /// The first frame after a suspension counts as exactly one step.
    pub fn advance(&mut self, now_ms: f64) -> u32 {
        if self.mode == SchedulerMode::Suspended {
            self.mode = SchedulerMode::Running;
            self.last_time = None;
            self.accumulator = 0.0;
        }

        let dt = match self.last_time {
            Some(last) => ((now_ms - last) / 1000.0) as f32,
            None => SIM_DT,
        };
        self.last_time = Some(now_ms);
        self.accumulator += dt.clamp(0.0, MAX_FRAME_DT);

        let mut steps = 0;
        while self.accumulator >= SIM_DT && steps < MAX_SUBSTEPS {
            self.accumulator -= SIM_DT;
            steps += 1;
        }
        steps
    }
}

/// Held keys; the most recent movement key wins
#[derive(Debug, Clone, Default)]
pub struct Controls {
    held: Vec<Direction>,
    fire: bool,
}

impl Controls {
    pub fn press(&mut self, dir: Direction) {
        self.held.retain(|d| *d != dir);
        self.held.push(dir);
    }

    pub fn release(&mut self, dir: Direction) {
        self.held.retain(|d| *d != dir);
    }

    pub fn set_fire(&mut self, held: bool) {
        self.fire = held;
    }

    pub fn clear(&mut self) {
        self.held.clear();
        self.fire = false;
    }

    pub fn input(&self) -> TickInput {
        TickInput {
            movement: self.held.last().copied(),
            fire: self.fire,
        }
    }
}

/// A running round bound to one host
pub struct Engine<H: HostBridge> {
    config: GameConfig,
    state: GameState,
    interaction: Interaction,
    scheduler: Scheduler,
    audio: AudioEngine,
    settings: Settings,
    host: H,
    controls: Controls,
    /// Display clock (ms), frozen while Settings is open
    clock_ms: f64,
    last_wall_ms: Option<f64>,
    feedback_due: Option<f64>,
    result_due: Option<(f64, GameResult)>,
    result_delivered: bool,
    ammo_warning_until: Option<f64>,
    timer_label: String,
    timer_running: bool,
    last_hud: Option<HudSnapshot>,
    torn_down: bool,
}

impl<H: HostBridge> Engine<H> {
    /// Build the arena and show the ready screen. `seed` is used unless the
    /// config pins one.
    pub fn new(
        config: GameConfig,
        seed: u64,
        settings: Settings,
        audio: AudioEngine,
        host: H,
    ) -> Self {
        let seed = config.seed.unwrap_or(seed);
        let mut state = GameState::new(&config, seed);
        state.max_particles = settings.max_particles();
        let interaction = Interaction::new(config.questions.len(), config.knowledge.len());

        log::info!(
            "Engine ready: seed {seed}, {} enemies, {} questions, {} knowledge items{}",
            config.enemies,
            config.questions.len(),
            config.knowledge.len(),
            if state.map.fell_back { " (default arena)" } else { "" }
        );

        let mut engine = Self {
            config,
            state,
            interaction,
            scheduler: Scheduler::new(),
            audio,
            settings,
            host,
            controls: Controls::default(),
            clock_ms: 0.0,
            last_wall_ms: None,
            feedback_due: None,
            result_due: None,
            result_delivered: false,
            ammo_warning_until: None,
            timer_label: String::new(),
            timer_running: false,
            last_hud: None,
            torn_down: false,
        };
        engine.publish_prompt();
        engine.publish_hud();
        engine
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn interaction(&self) -> &InteractionState {
        self.interaction.state()
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn scheduler_mode(&self) -> SchedulerMode {
        self.scheduler.mode()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    // === Input ===

    pub fn press(&mut self, dir: Direction) {
        self.controls.press(dir);
    }

    pub fn release(&mut self, dir: Direction) {
        self.controls.release(dir);
    }

    pub fn set_fire(&mut self, held: bool) {
        self.controls.set_fire(held);
    }

    // === Lifecycle ===

    /// Dismiss the ready screen
    pub fn start(&mut self) -> bool {
        if self.torn_down || !self.interaction.dismiss_start() {
            return false;
        }
        log::info!("Round started");
        self.audio.resume();
        self.audio.start_music();
        self.host.game_started();
        self.publish_prompt();
        true
    }

    /// Advance one display frame at wall time `now_ms`
    pub fn frame(&mut self, now_ms: f64) {
        if self.torn_down {
            return;
        }

        let elapsed = self
            .last_wall_ms
            .map_or(0.0, |last| (now_ms - last).max(0.0));
        self.last_wall_ms = Some(now_ms);
        if !self.interaction.in_settings() {
            self.clock_ms += elapsed;
        }

        if self.interaction.simulating() {
            let steps = self.scheduler.advance(now_ms);
            for _ in 0..steps {
                let input = self.controls.input();
                tick(&mut self.state, &input, SIM_DT);
                self.process_events();
                if !self.interaction.simulating() {
                    break;
                }
            }
        } else if self.scheduler.mode() == SchedulerMode::Running {
            self.scheduler.suspend();
            log::debug!("Simulation suspended");
        }

        self.run_timers();
        if !self.interaction.in_settings() {
            self.audio.update(elapsed);
        }
        self.publish_hud();
    }

    /// Stop everything: audio closed, timers dropped, overlay hidden.
    /// Later calls on the engine are ignored.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.audio.close();
        self.feedback_due = None;
        self.result_due = None;
        self.controls.clear();
        self.scheduler.suspend();
        self.host.prompt_changed(None);
        log::info!("Engine torn down");
    }

    // === Prompts ===

    /// Submit an answer to the open question
    pub fn answer(&mut self, answer: Answer) -> Option<Verdict> {
        if self.torn_down {
            return None;
        }
        let verdict = self
            .interaction
            .submit_answer(answer, &self.config.questions, &mut self.state)?;

        match verdict {
            Verdict::Correct => self.audio.play(SoundEffect::CorrectAnswer),
            Verdict::Wrong => self.audio.play(SoundEffect::WrongAnswer),
        }
        if !self.interaction.ended() {
            self.feedback_due = Some(self.clock_ms + ANSWER_FEEDBACK_MS);
        }
        self.publish_prompt();
        // Brain limit ends the round from here
        self.process_events();
        self.publish_hud();
        Some(verdict)
    }

    /// Close a knowledge prompt or leave an unanswered question
    pub fn dismiss_prompt(&mut self) -> bool {
        if self.torn_down || !self.interaction.dismiss() {
            return false;
        }
        self.publish_prompt();
        true
    }

    pub fn open_settings(&mut self) -> bool {
        if self.torn_down || !self.interaction.open_settings() {
            return false;
        }
        // The host timer only runs between start and result
        if self.interaction.round_live() {
            self.host.pause_requested(true);
        }
        self.publish_prompt();
        true
    }

    pub fn close_settings(&mut self) -> bool {
        if self.torn_down || !self.interaction.close_settings() {
            return false;
        }
        self.settings.save();
        if self.interaction.round_live() {
            self.host.pause_requested(false);
        }
        self.publish_prompt();
        true
    }

    pub fn toggle_settings(&mut self) -> bool {
        if self.interaction.in_settings() {
            self.close_settings()
        } else {
            self.open_settings()
        }
    }

    // === Settings ===

    pub fn set_sound_enabled(&mut self, enabled: bool) {
        self.settings.sound_enabled = enabled;
        self.apply_settings();
    }

    pub fn set_music_volume(&mut self, volume: f32) {
        self.settings.set_music_volume(volume);
        self.apply_settings();
    }

    pub fn set_sfx_volume(&mut self, volume: f32) {
        self.settings.set_sfx_volume(volume);
        self.apply_settings();
    }

    /// Particle cap follows the preset from the next frame on
    pub fn set_quality(&mut self, preset: QualityPreset) {
        self.settings.quality = preset;
        self.apply_settings();
    }

    pub fn set_particles(&mut self, enabled: bool) {
        self.settings.particles = enabled;
        self.apply_settings();
    }

    fn apply_settings(&mut self) {
        self.audio.apply_settings(&self.settings);
        self.state.max_particles = self.settings.max_particles();
        self.settings.save();
    }

    /// Pass-through for the host-owned countdown shown in the HUD
    pub fn set_timer(&mut self, label: impl Into<String>, running: bool) {
        self.timer_label = label.into();
        self.timer_running = running;
    }

    // === Internals ===

    fn process_events(&mut self) {
        for event in self.state.drain_events() {
            match event {
                GameEvent::PlayerFired => self.audio.play(SoundEffect::PlayerShoot),
                GameEvent::EnemyFired => self.audio.play(SoundEffect::EnemyShoot),
                GameEvent::AmmoEmpty => {
                    self.audio.play(SoundEffect::EmptyAmmo);
                    self.ammo_warning_until = Some(self.clock_ms + AMMO_WARNING_MS);
                }
                GameEvent::BrickDestroyed(_) => self.audio.play(SoundEffect::BrickDestroyed),
                GameEvent::SteelHit(_) => self.audio.play(SoundEffect::SteelHit),
                GameEvent::BulletSplash(_) | GameEvent::EnemySpawned { .. } => {}
                GameEvent::EnemyDestroyed { .. } => self.audio.play(SoundEffect::Explosion),
                GameEvent::PlayerHit { lives_left } => {
                    log::debug!("Player hit, {lives_left} lives left");
                    self.audio.play(SoundEffect::PlayerHit);
                }
                GameEvent::BoxContact { coord, tile } => {
                    if self.interaction.trigger_box(coord, tile, &mut self.state.rng) {
                        self.controls.clear();
                        self.audio.play(match tile {
                            Tile::KnowledgeBox => SoundEffect::KnowledgeOpen,
                            _ => SoundEffect::BoxOpen,
                        });
                        self.publish_prompt();
                    }
                }
                GameEvent::Ended(result) => self.enter_ended(result),
            }
        }
    }

    fn enter_ended(&mut self, result: GameResult) {
        self.interaction.end(result);
        if self.result_due.is_some() || self.result_delivered {
            return;
        }
        log::info!("Round over: {result:?}, reporting in {END_OF_ROUND_DELAY_MS}ms");
        self.feedback_due = None;
        self.controls.clear();
        self.audio.stop_music();
        self.audio.play(if result.is_win() {
            SoundEffect::Victory
        } else {
            SoundEffect::Defeat
        });
        self.result_due = Some((self.clock_ms + END_OF_ROUND_DELAY_MS, result));
        self.host.pause_requested(true);
        self.publish_prompt();
    }

    fn run_timers(&mut self) {
        if self.feedback_due.is_some_and(|due| self.clock_ms >= due) {
            self.feedback_due = None;
            if self.interaction.finish_feedback() {
                self.publish_prompt();
            }
        }

        if let Some((due, result)) = self.result_due {
            if self.clock_ms >= due {
                self.result_due = None;
                self.result_delivered = true;
                self.host.game_over(result);
            }
        }
    }

    /// Overlay content for the current interaction state
    pub fn prompt(&self) -> Option<PromptView> {
        match self.interaction.state() {
            InteractionState::Playing => None,
            InteractionState::Start => Some(PromptView::Start),
            InteractionState::Question(prompt) => {
                let question = self.config.questions.get(prompt.index)?;
                Some(PromptView::Question {
                    tile: prompt.tile.to_string(),
                    index: prompt.index,
                    question: question.clone(),
                    excluded: prompt.excluded.clone(),
                    verdict: prompt.verdict,
                })
            }
            InteractionState::Knowledge(prompt) => {
                let entry = self.config.knowledge.get(prompt.index)?;
                Some(PromptView::Knowledge {
                    tile: prompt.tile.to_string(),
                    index: prompt.index,
                    entry: entry.clone(),
                })
            }
            InteractionState::Settings { .. } => Some(PromptView::Settings),
            InteractionState::Ended(result) => Some(PromptView::Ended { result: *result }),
        }
    }

    fn publish_prompt(&mut self) {
        let prompt = self.prompt();
        self.host.prompt_changed(prompt.as_ref());
    }

    /// Values shown by the HUD right now
    pub fn hud(&self) -> HudSnapshot {
        let session = &self.state.session;
        HudSnapshot {
            lives: session.lives,
            max_lives: session.max_lives,
            ammo: session.ammo,
            enemies_remaining: session.enemies_left(),
            brains_remaining: session.brains_left(),
            score: session.score,
            kills: session.kills,
            question_boxes: self.state.map.question_boxes(),
            timer_label: self.timer_label.clone(),
            timer_running: self.timer_running,
            ammo_warning: self
                .ammo_warning_until
                .is_some_and(|until| self.clock_ms < until),
        }
    }

    /// Push the HUD to the host when it changed
    fn publish_hud(&mut self) {
        let hud = self.hud();
        if self.last_hud.as_ref() != Some(&hud) {
            self.host.hud_updated(&hud);
            self.last_hud = Some(hud);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::audio::tests::{Recording, RecordingBackend};
    use crate::config::Question;
    use crate::host::LossReason;
    use crate::sim::enemy::EnemyAi;
    use crate::sim::state::{Tank, centered_in_tile};
    use crate::sim::tile::TileCoord;

    #[derive(Debug, Default)]
    struct RecordingHost {
        started: u32,
        pauses: Vec<bool>,
        huds: Vec<HudSnapshot>,
        prompts: Vec<Option<PromptView>>,
        results: Vec<GameResult>,
    }

    impl HostBridge for RecordingHost {
        fn game_started(&mut self) {
            self.started += 1;
        }
        fn pause_requested(&mut self, paused: bool) {
            self.pauses.push(paused);
        }
        fn hud_updated(&mut self, hud: &HudSnapshot) {
            self.huds.push(hud.clone());
        }
        fn prompt_changed(&mut self, prompt: Option<&PromptView>) {
            self.prompts.push(prompt.cloned());
        }
        fn game_over(&mut self, result: GameResult) {
            self.results.push(result);
        }
    }

    const FRAME_MS: f64 = 1000.0 / 60.0;
    const SPAWN: TileCoord = TileCoord { x: 11, y: 21 };
    const QUESTION_TILE: TileCoord = TileCoord { x: 13, y: 21 };

    fn question(answer: usize) -> Question {
        Question::SingleChoice {
            prompt: "Pick one".into(),
            options: vec!["a".into(), "b".into(), "c".into()],
            answer,
            media: Vec::new(),
        }
    }

    /// Open arena with one question box two tiles right of the spawn
    fn config(tweak: impl FnOnce(&mut GameConfig)) -> GameConfig {
        let mut codes = vec![0u8; GRID_CELLS];
        let at = |c: TileCoord| c.y as usize * GRID_SIZE + c.x as usize;
        codes[at(SPAWN)] = 9;
        codes[at(QUESTION_TILE)] = 5;
        let mut config = GameConfig {
            map: Some(codes),
            questions: vec![question(1)],
            initial_ammo: 3,
            ammo_per_correct: 5,
            seed: Some(4),
            ..GameConfig::default()
        };
        tweak(&mut config);
        config
    }

    struct Harness {
        engine: Engine<RecordingHost>,
        audio: Rc<RefCell<Recording>>,
        now: f64,
    }

    impl Harness {
        fn new(config: GameConfig) -> Self {
            let settings = Settings::default();
            let backend = RecordingBackend::default();
            let audio_log = backend.0.clone();
            let audio = AudioEngine::new(Box::new(backend), &settings);
            let mut engine = Engine::new(config, 0, settings, audio, RecordingHost::default());
            // Hold the director back so scenarios stay scripted
            engine.state.director.spawn_timer = f32::MAX;
            Self {
                engine,
                audio: audio_log,
                now: 0.0,
            }
        }

        fn started(config: GameConfig) -> Self {
            let mut harness = Self::new(config);
            harness.engine.start();
            harness
        }

        fn frames(&mut self, count: usize) {
            for _ in 0..count {
                self.now += FRAME_MS;
                self.engine.frame(self.now);
            }
        }

        /// Run frames until `done` holds, with a cap
        fn until(&mut self, max: usize, done: impl Fn(&Engine<RecordingHost>) -> bool) -> bool {
            for _ in 0..max {
                if done(&self.engine) {
                    return true;
                }
                self.frames(1);
            }
            done(&self.engine)
        }

        fn open_question_box(&mut self) {
            self.engine.press(Direction::Right);
            let opened =
                self.until(400, |e| matches!(e.interaction(), InteractionState::Question(_)));
            assert!(opened, "never reached the question box");
        }

        fn add_idle_enemy(&mut self, tile: TileCoord) {
            let state = &mut self.engine.state;
            let id = state.next_entity_id();
            let mut tank = Tank::enemy(id, tile, Direction::Down);
            tank.speed = 0.0;
            tank.ai = Some(EnemyAi {
                turn_chance: 0.0,
                fire_chance: 0.0,
                stalled: false,
            });
            state.enemies.push(tank);
        }
    }

    #[test]
    fn test_scheduler_resume_does_not_replay_pause() {
        let mut scheduler = Scheduler::new();
        assert_eq!(scheduler.advance(0.0), 1);
        assert_eq!(scheduler.mode(), SchedulerMode::Running);
        scheduler.suspend();
        // Ten seconds later: a single step, not a burst
        assert_eq!(scheduler.advance(10_000.0), 1);
        // Long frames are clamped
        let steps = scheduler.advance(10_500.0);
        assert!(steps as f32 <= MAX_FRAME_DT / SIM_DT + 1.0);
    }

    #[test]
    fn test_controls_last_key_wins() {
        let mut controls = Controls::default();
        controls.press(Direction::Up);
        controls.press(Direction::Left);
        assert_eq!(controls.input().movement, Some(Direction::Left));
        controls.release(Direction::Left);
        assert_eq!(controls.input().movement, Some(Direction::Up));
        controls.set_fire(true);
        controls.clear();
        assert_eq!(controls.input(), TickInput::default());
    }

    #[test]
    fn test_start_screen_blocks_simulation() {
        let mut h = Harness::new(config(|_| {}));
        assert_eq!(h.engine.host().prompts.first(), Some(&Some(PromptView::Start)));
        h.frames(30);
        assert_eq!(h.engine.state().time_ticks, 0);
        assert!(h.engine.start());
        assert!(!h.engine.start());
        assert_eq!(h.engine.host().started, 1);
        h.frames(30);
        assert!(h.engine.state().time_ticks > 0);
    }

    #[test]
    fn test_correct_answer_flow() {
        let mut h = Harness::started(config(|_| {}));
        h.open_question_box();
        assert_eq!(h.engine.scheduler_mode(), SchedulerMode::Running);
        h.frames(1);
        assert_eq!(h.engine.scheduler_mode(), SchedulerMode::Suspended);

        let ticks = h.engine.state().time_ticks;
        h.frames(30);
        assert_eq!(h.engine.state().time_ticks, ticks, "simulation ran under a prompt");

        assert_eq!(h.engine.answer(Answer::Choice(1)), Some(Verdict::Correct));
        assert_eq!(h.engine.state().session.ammo, 8);
        assert_eq!(h.engine.state().map.grid.get(QUESTION_TILE), Some(Tile::Empty));
        assert!(matches!(
            h.engine.prompt(),
            Some(PromptView::Question { verdict: Some(Verdict::Correct), .. })
        ));

        // Closes only after the feedback delay
        h.frames(60);
        assert!(matches!(h.engine.interaction(), InteractionState::Question(_)));
        h.frames(20);
        assert_eq!(h.engine.interaction(), &InteractionState::Playing);
        assert_eq!(h.engine.host().prompts.last(), Some(&None));
        assert_eq!(h.engine.host().huds.last().map(|hud| hud.ammo), Some(8));

        // Simulation picks up again
        let ticks = h.engine.state().time_ticks;
        h.frames(5);
        assert!(h.engine.state().time_ticks > ticks);
    }

    #[test]
    fn test_wrong_answers_exhaust_brains() {
        let mut h = Harness::started(config(|c| c.brains = 2));
        h.open_question_box();

        assert_eq!(h.engine.answer(Answer::Choice(0)), Some(Verdict::Wrong));
        assert_eq!(h.engine.state().session.ammo, 3);
        h.frames(80);
        assert_eq!(h.engine.interaction(), &InteractionState::Playing);

        // Step off and back onto the box once its cooldown has passed
        h.engine.release(Direction::Right);
        h.engine.press(Direction::Left);
        h.frames(200);
        h.engine.release(Direction::Left);
        h.open_question_box();
        match h.engine.prompt() {
            Some(PromptView::Question { excluded, .. }) => {
                assert_eq!(excluded, vec![Answer::Choice(0)])
            }
            other => panic!("unexpected prompt {other:?}"),
        }

        assert_eq!(h.engine.answer(Answer::Choice(2)), Some(Verdict::Wrong));
        let lost = GameResult::Lost(LossReason::NoBrain);
        assert_eq!(h.engine.interaction(), &InteractionState::Ended(lost));
        assert_eq!(h.engine.host().pauses.last(), Some(&true));

        // Reported once, after the display delay
        h.frames(100);
        assert!(h.engine.host().results.is_empty());
        h.frames(40);
        assert_eq!(h.engine.host().results, vec![lost]);
        h.frames(300);
        assert_eq!(h.engine.host().results.len(), 1);
    }

    #[test]
    fn test_win_reported_once() {
        let mut h = Harness::started(config(|c| c.enemies = 1));
        h.add_idle_enemy(TileCoord::new(11, 15));
        h.engine.set_fire(true);
        let won = h.until(120, |e| e.state().session.ended());
        assert!(won);
        h.engine.set_fire(false);
        assert_eq!(h.engine.state().session.outcome, Some(GameResult::Won));
        assert_eq!(h.engine.state().session.kills, 1);

        h.frames(200);
        assert_eq!(h.engine.host().results, vec![GameResult::Won]);
        // Ended is terminal; nothing reopens it
        assert!(!h.engine.start());
        assert!(!h.engine.dismiss_prompt());
        assert_eq!(h.engine.answer(Answer::Choice(1)), None);
    }

    #[test]
    fn test_settings_freezes_clock_and_feedback() {
        let mut h = Harness::started(config(|_| {}));
        h.open_question_box();
        h.engine.answer(Answer::Choice(1));

        assert!(h.engine.open_settings());
        assert_eq!(h.engine.host().pauses.last(), Some(&true));
        assert_eq!(h.engine.prompt(), Some(PromptView::Settings));
        h.frames(600);
        assert!(h.engine.interaction.in_settings());

        assert!(h.engine.close_settings());
        assert_eq!(h.engine.host().pauses.last(), Some(&false));
        // Back to the answered question, delay still pending
        assert!(matches!(
            h.engine.prompt(),
            Some(PromptView::Question { verdict: Some(Verdict::Correct), .. })
        ));
        h.frames(80);
        assert_eq!(h.engine.interaction(), &InteractionState::Playing);
    }

    #[test]
    fn test_settings_before_start_leaves_host_timer_alone() {
        let mut h = Harness::new(config(|_| {}));
        assert!(h.engine.open_settings());
        assert_eq!(h.engine.prompt(), Some(PromptView::Settings));
        h.frames(30);
        assert!(h.engine.close_settings());
        assert!(h.engine.host().pauses.is_empty());
        assert_eq!(h.engine.prompt(), Some(PromptView::Start));
        assert_eq!(h.engine.state().time_ticks, 0);

        assert!(h.engine.start());
        h.engine.toggle_settings();
        h.engine.toggle_settings();
        assert_eq!(h.engine.host().pauses, vec![true, false]);
    }

    #[test]
    fn test_quality_sets_particle_cap() {
        let mut h = Harness::new(config(|_| {}));
        h.engine.set_quality(QualityPreset::Low);
        assert_eq!(h.engine.state().max_particles, QualityPreset::Low.max_particles());
        h.engine.set_particles(false);
        h.engine.set_quality(QualityPreset::High);
        assert_eq!(h.engine.state().max_particles, 0);
        h.engine.set_particles(true);
        assert_eq!(h.engine.state().max_particles, QualityPreset::High.max_particles());
        assert_eq!(h.engine.settings().quality, QualityPreset::High);
    }

    #[test]
    fn test_settings_does_not_touch_the_round() {
        let mut h = Harness::started(config(|_| {}));
        h.frames(10);
        let session = h.engine.state().session.clone();
        let grid = h.engine.state().map.grid.clone();
        let ticks = h.engine.state().time_ticks;

        h.engine.toggle_settings();
        h.engine.set_music_volume(0.2);
        h.engine.set_sound_enabled(false);
        h.frames(120);
        h.engine.toggle_settings();

        assert_eq!(h.engine.state().session, session);
        assert_eq!(h.engine.state().map.grid, grid);
        assert_eq!(h.engine.state().time_ticks, ticks);
        assert!(!h.engine.settings().sound_enabled);
        assert_eq!(h.engine.settings().music_volume, 0.2);
    }

    #[test]
    fn test_teardown_cancels_pending_result() {
        let mut h = Harness::started(config(|c| c.brains = 1));
        h.open_question_box();
        h.engine.answer(Answer::Choice(0));
        assert!(matches!(h.engine.interaction(), InteractionState::Ended(_)));

        h.engine.teardown();
        h.engine.teardown();
        assert!(h.engine.is_torn_down());
        assert_eq!(h.audio.borrow().closed, 1);
        assert_eq!(h.engine.host().prompts.last(), Some(&None));
        h.frames(300);
        assert!(h.engine.host().results.is_empty());
        assert!(!h.engine.open_settings());
    }

    #[test]
    fn test_ammo_warning_is_transient() {
        let mut h = Harness::started(config(|c| c.initial_ammo = 0));
        h.engine.set_fire(true);
        h.frames(1);
        h.engine.set_fire(false);
        // The box on the board keeps the round alive
        assert!(!h.engine.state().session.ended());
        assert!(h.engine.hud().ammo_warning);
        h.frames(90);
        assert!(!h.engine.hud().ammo_warning);
    }

    #[test]
    fn test_timer_passthrough() {
        let mut h = Harness::started(config(|_| {}));
        h.engine.set_timer("04:59", true);
        h.frames(1);
        let hud = h.engine.host().huds.last().cloned().unwrap();
        assert_eq!(hud.timer_label, "04:59");
        assert!(hud.timer_running);
        assert_eq!(hud.lives, GameConfig::default().hearts);
    }

    #[test]
    fn test_player_starts_centered_on_spawn() {
        let h = Harness::new(config(|_| {}));
        assert_eq!(h.engine.state().player.pos, centered_in_tile(SPAWN));
    }
}
