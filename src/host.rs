//! Interface between the engine and the application embedding it
//!
//! The host supplies configuration up front (see [`crate::config`]) and
//! receives everything else through [`HostBridge`]: HUD snapshots, overlay
//! prompts, pause requests and exactly one terminal result.

use serde::{Deserialize, Serialize};

use crate::config::{Answer, KnowledgeEntry, Question};
use crate::sim::interaction::Verdict;

/// Why a round was lost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossReason {
    /// Lives ran out
    NoHeart,
    /// Too many wrong answers
    NoBrain,
    /// No ammo, no question boxes, nothing in flight
    OutOfAmmo,
}

impl LossReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LossReason::NoHeart => "no_heart",
            LossReason::NoBrain => "no_brain",
            LossReason::OutOfAmmo => "out_of_ammo",
        }
    }
}

/// Terminal outcome of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "code", content = "reason", rename_all = "snake_case")]
pub enum GameResult {
    Won,
    Lost(LossReason),
}

impl GameResult {
    pub fn is_win(&self) -> bool {
        matches!(self, GameResult::Won)
    }

    /// Numeric code handed to the host: 1 win, 0 loss
    pub fn code(&self) -> u8 {
        match self {
            GameResult::Won => 1,
            GameResult::Lost(_) => 0,
        }
    }

    pub fn reason(&self) -> Option<LossReason> {
        match self {
            GameResult::Won => None,
            GameResult::Lost(reason) => Some(*reason),
        }
    }

    /// Arguments of the host's game-over callback: code, then reason tag
    /// (`None` on a win)
    pub fn callback_args(&self) -> (u8, Option<&'static str>) {
        (self.code(), self.reason().map(|r| r.as_str()))
    }
}

/// Values copied out for the HUD after each frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HudSnapshot {
    pub lives: u32,
    pub max_lives: u32,
    pub ammo: u32,
    pub enemies_remaining: u32,
    pub brains_remaining: u32,
    pub score: u64,
    pub kills: u32,
    pub question_boxes: usize,
    /// Externally owned countdown, passed through untouched
    pub timer_label: String,
    pub timer_running: bool,
    /// Lit briefly after pulling the trigger on an empty magazine
    pub ammo_warning: bool,
}

/// What the overlay should currently show
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromptView {
    /// Ready screen before the first frame of play
    Start,
    Question {
        tile: String,
        index: usize,
        question: Question,
        /// Earlier wrong submissions for this tile
        excluded: Vec<Answer>,
        verdict: Option<Verdict>,
    },
    Knowledge {
        tile: String,
        index: usize,
        entry: KnowledgeEntry,
    },
    Settings,
    Ended {
        result: GameResult,
    },
}

/// Callbacks into the embedding application.
///
/// Implementations are injected into [`crate::Engine`]; nothing is looked up
/// globally.
pub trait HostBridge {
    /// Ready screen dismissed, simulation running
    fn game_started(&mut self);
    /// Freeze (`true`) or release the host's external timer
    fn pause_requested(&mut self, paused: bool);
    fn hud_updated(&mut self, hud: &HudSnapshot);
    /// Overlay content changed; `None` hides the overlay
    fn prompt_changed(&mut self, prompt: Option<&PromptView>);
    /// Called once per engine, after the end-of-round delay
    fn game_over(&mut self, result: GameResult);
}

/// Host that only logs; used by the headless runner
#[derive(Debug, Default)]
pub struct LogHost {
    pub result: Option<GameResult>,
}

impl HostBridge for LogHost {
    fn game_started(&mut self) {
        log::info!("Game started");
    }

    fn pause_requested(&mut self, paused: bool) {
        log::debug!("Host timer paused: {paused}");
    }

    fn hud_updated(&mut self, _hud: &HudSnapshot) {}

    fn prompt_changed(&mut self, prompt: Option<&PromptView>) {
        if let Some(prompt) = prompt {
            log::debug!("Prompt: {prompt:?}");
        }
    }

    fn game_over(&mut self, result: GameResult) {
        log::info!("Game over: {result:?}");
        self.result = Some(result);
    }
}
