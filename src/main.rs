//! Quiz Tanks entry point
//!
//! The browser build is driven from JavaScript through `platform::web::Arena`.
//! Natively this runs a headless autopilot round for smoke checks:
//!
//! ```text
//! quiz-tanks [config.json] [seed]
//! ```

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::collections::BTreeSet;

    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    use quiz_tanks::audio::AudioEngine;
    use quiz_tanks::host::{LogHost, PromptView};
    use quiz_tanks::sim::Direction;
    use quiz_tanks::{Answer, Engine, GameConfig, KnowledgeEntry, Question, Settings};

    const FRAME_MS: f64 = 1000.0 / 60.0;
    /// Ten minutes of frames
    const MAX_FRAMES: u32 = 36_000;
    const WANDER_FRAMES: u32 = 90;
    const CORRECT_RATE: f64 = 0.75;

    fn demo_config() -> GameConfig {
        let questions = (1..=12)
            .map(|n| Question::SingleChoice {
                prompt: format!("What is {n} + {n}?"),
                options: (0..4).map(|k| (2 * n + k).to_string()).collect(),
                answer: 0,
                media: Vec::new(),
            })
            .chain([
                Question::MultipleChoice {
                    prompt: "Which are primes?".into(),
                    options: vec!["2".into(), "4".into(), "5".into(), "9".into()],
                    answers: BTreeSet::from([0, 2]),
                    media: Vec::new(),
                },
                Question::FillIn {
                    prompt: "Capital of France?".into(),
                    accepted: vec!["Paris".into()],
                    media: Vec::new(),
                },
            ])
            .collect();

        GameConfig {
            questions,
            knowledge: vec![KnowledgeEntry {
                title: Some("Tip".into()),
                text: "Steel walls stop every bullet.".into(),
                media: Vec::new(),
            }],
            ..GameConfig::default()
        }
    }

    fn correct_answer(question: &Question) -> Answer {
        match question {
            Question::SingleChoice { answer, .. } => Answer::Choice(*answer),
            Question::MultipleChoice { answers, .. } => Answer::Choices(answers.clone()),
            Question::FillIn { accepted, .. } => {
                Answer::Text(accepted.first().cloned().unwrap_or_default())
            }
        }
    }

    fn wrong_answer(question: &Question, rng: &mut Pcg32) -> Answer {
        match question {
            Question::SingleChoice {
                answer, options, ..
            } => {
                let len = options.len().max(2);
                Answer::Choice((answer + rng.random_range(1..len)) % len)
            }
            Question::MultipleChoice { .. } => Answer::Choices(BTreeSet::new()),
            Question::FillIn { .. } => Answer::Text("no idea".into()),
        }
    }

    fn load_config(path: Option<&str>) -> Result<GameConfig, String> {
        let Some(path) = path else {
            return Ok(demo_config());
        };
        let json = std::fs::read_to_string(path).map_err(|e| format!("{path}: {e}"))?;
        GameConfig::from_json(&json).map_err(|e| format!("{path}: {e}"))
    }

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let config = load_config(args.first().map(String::as_str))?;
        let seed = match args.get(1) {
            Some(s) => s.parse().map_err(|e| format!("bad seed {s:?}: {e}"))?,
            None => 1,
        };

        let settings = Settings::default();
        let audio = AudioEngine::silent(&settings);
        let mut engine = Engine::new(config, seed, settings, audio, LogHost::default());
        let mut pilot = Pcg32::seed_from_u64(seed ^ 0x5eed);
        const DIRECTIONS: [Direction; 4] =
            [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

        engine.start();
        engine.set_fire(true);
        let mut heading = Direction::Up;
        let mut now = 0.0;

        for frame in 0..MAX_FRAMES {
            if frame % WANDER_FRAMES == 0 {
                engine.release(heading);
                heading = DIRECTIONS[pilot.random_range(0..DIRECTIONS.len())];
                engine.press(heading);
            }

            match engine.prompt() {
                Some(PromptView::Question {
                    question,
                    verdict: None,
                    ..
                }) => {
                    let answer = if pilot.random_bool(CORRECT_RATE) {
                        correct_answer(&question)
                    } else {
                        wrong_answer(&question, &mut pilot)
                    };
                    log::debug!("Autopilot answers {answer:?}");
                    engine.answer(answer);
                }
                Some(PromptView::Knowledge { .. }) => {
                    engine.dismiss_prompt();
                }
                _ => {}
            }
            // Box prompts drop held keys
            engine.set_fire(true);
            engine.press(heading);

            now += FRAME_MS;
            engine.frame(now);

            if let Some(result) = engine.host().result {
                let hud = engine.hud();
                println!(
                    "result: {} (code {}), score {}, kills {}, ammo {}, lives {}",
                    serde_json::to_string(&result).map_err(|e| e.to_string())?,
                    result.code(),
                    hud.score,
                    hud.kills,
                    hud.ammo,
                    hud.lives
                );
                engine.teardown();
                return Ok(());
            }
        }

        log::warn!("No result after {MAX_FRAMES} frames");
        engine.teardown();
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Quiz Tanks (headless) starting...");
    if let Err(e) = headless::run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is the exported Arena class, this is just to satisfy the compiler
}
