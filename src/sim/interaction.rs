//! Box interaction state machine
//!
//! `Start -> Playing`, `Playing -> Question/Knowledge -> Playing`, an
//! orthogonal `Settings` layer that returns to whatever it interrupted, and
//! a terminal `Ended`. Content is bound to a tile the first time it opens and
//! stays bound; wrong submissions are logged per tile until the box is
//! answered correctly.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::state::GameState;
use super::tile::{Tile, TileCoord};
use crate::config::{Answer, Question};
use crate::consts::CORRECT_ANSWER_SCORE;
use crate::host::{GameResult, LossReason};

/// Outcome of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Wrong,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionPrompt {
    pub tile: TileCoord,
    /// Index into the question pool
    pub index: usize,
    /// Wrong submissions so far for this tile, oldest first
    pub excluded: Vec<Answer>,
    /// Set once answered; the prompt closes after the feedback delay
    pub verdict: Option<Verdict>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgePrompt {
    pub tile: TileCoord,
    /// Index into the knowledge pool
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InteractionState {
    /// Ready screen, nothing simulates
    Start,
    Playing,
    Question(QuestionPrompt),
    Knowledge(KnowledgePrompt),
    /// Settings overlay on top of `resume`
    Settings { resume: Box<InteractionState> },
    Ended(GameResult),
}

/// Shuffled order over a content pool; reshuffles only after every entry
/// has been handed out once
#[derive(Debug, Clone, Default)]
pub struct ContentCycle {
    len: usize,
    order: Vec<usize>,
    cursor: usize,
}

impl ContentCycle {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            order: Vec::new(),
            cursor: 0,
        }
    }

    pub fn next(&mut self, rng: &mut Pcg32) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        if self.cursor >= self.order.len() {
            self.order = (0..self.len).collect();
            self.order.shuffle(rng);
            self.cursor = 0;
        }
        let index = self.order[self.cursor];
        self.cursor += 1;
        Some(index)
    }
}

/// Interaction state plus per-tile content bookkeeping
#[derive(Debug, Clone)]
pub struct Interaction {
    state: InteractionState,
    question_slots: HashMap<TileCoord, usize>,
    knowledge_slots: HashMap<TileCoord, usize>,
    attempts: HashMap<TileCoord, Vec<Answer>>,
    questions: ContentCycle,
    knowledge: ContentCycle,
}

impl Interaction {
    pub fn new(question_pool: usize, knowledge_pool: usize) -> Self {
        Self {
            state: InteractionState::Start,
            question_slots: HashMap::new(),
            knowledge_slots: HashMap::new(),
            attempts: HashMap::new(),
            questions: ContentCycle::new(question_pool),
            knowledge: ContentCycle::new(knowledge_pool),
        }
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    /// Only `Playing` advances the simulation
    pub fn simulating(&self) -> bool {
        matches!(self.state, InteractionState::Playing)
    }

    pub fn in_settings(&self) -> bool {
        matches!(self.state, InteractionState::Settings { .. })
    }

    pub fn ended(&self) -> bool {
        matches!(self.state, InteractionState::Ended(_))
    }

    /// Between dismissing the ready screen and the result, looking through
    /// an open Settings overlay
    pub fn round_live(&self) -> bool {
        let state = match &self.state {
            InteractionState::Settings { resume } => resume.as_ref(),
            other => other,
        };
        !matches!(state, InteractionState::Start | InteractionState::Ended(_))
    }

    /// Question index bound to a tile, if it has been opened
    pub fn assigned_question(&self, tile: TileCoord) -> Option<usize> {
        self.question_slots.get(&tile).copied()
    }

    pub fn assigned_knowledge(&self, tile: TileCoord) -> Option<usize> {
        self.knowledge_slots.get(&tile).copied()
    }

    pub fn attempts(&self, tile: TileCoord) -> &[Answer] {
        self.attempts.get(&tile).map_or(&[], Vec::as_slice)
    }

    pub fn dismiss_start(&mut self) -> bool {
        if self.state != InteractionState::Start {
            return false;
        }
        self.state = InteractionState::Playing;
        true
    }

    /// Open the prompt for a box the player touched. No-op unless playing or
    /// when the pool behind the box is empty.
    pub fn trigger_box(&mut self, tile: TileCoord, kind: Tile, rng: &mut Pcg32) -> bool {
        if !self.simulating() {
            return false;
        }
        match kind {
            Tile::QuestionBox => {
                let index = match self.question_slots.get(&tile) {
                    Some(&index) => index,
                    None => {
                        let Some(index) = self.questions.next(rng) else {
                            return false;
                        };
                        self.question_slots.insert(tile, index);
                        index
                    }
                };
                log::debug!("Question {index} opened at {tile}");
                self.state = InteractionState::Question(QuestionPrompt {
                    tile,
                    index,
                    excluded: self.attempts(tile).to_vec(),
                    verdict: None,
                });
                true
            }
            Tile::KnowledgeBox => {
                let index = match self.knowledge_slots.get(&tile) {
                    Some(&index) => index,
                    None => {
                        let Some(index) = self.knowledge.next(rng) else {
                            return false;
                        };
                        self.knowledge_slots.insert(tile, index);
                        index
                    }
                };
                log::debug!("Knowledge {index} opened at {tile}");
                self.state = InteractionState::Knowledge(KnowledgePrompt { tile, index });
                true
            }
            _ => false,
        }
    }

    /// Resolve the open question.
    ///
    /// Correct: the box is consumed, ammo credited and one replacement box
    /// placed. Wrong: the choice is logged for the tile and the wrong-answer
    /// counter moves; reaching the limit ends the round on the spot.
    pub fn submit_answer(
        &mut self,
        answer: Answer,
        questions: &[Question],
        game: &mut GameState,
    ) -> Option<Verdict> {
        let InteractionState::Question(prompt) = &mut self.state else {
            return None;
        };
        if prompt.verdict.is_some() || game.session.ended() {
            return None;
        }
        let question = questions.get(prompt.index)?;
        let tile = prompt.tile;

        if question.check(&answer) {
            prompt.verdict = Some(Verdict::Correct);
            game.map.consume_box(tile);
            game.session.ammo = game.session.ammo.saturating_add(game.session.ammo_per_correct);
            game.session.score += CORRECT_ANSWER_SCORE;
            self.question_slots.remove(&tile);
            self.attempts.remove(&tile);

            let player_tile = game.player.tile();
            game.map
                .top_up_question_boxes(game.question_pool, player_tile, &mut game.rng);
            log::info!("Correct answer at {tile}, ammo now {}", game.session.ammo);
            return Some(Verdict::Correct);
        }

        let log = self.attempts.entry(tile).or_default();
        if !log.contains(&answer) {
            log.push(answer);
        }
        prompt.excluded = log.clone();
        prompt.verdict = Some(Verdict::Wrong);
        game.session.wrong_answers += 1;
        log::info!(
            "Wrong answer at {tile} ({}/{})",
            game.session.wrong_answers,
            game.session.max_wrong_answers
        );

        if game.session.wrong_answers >= game.session.max_wrong_answers {
            let result = GameResult::Lost(LossReason::NoBrain);
            game.finish(result);
            self.state = InteractionState::Ended(result);
        }
        Some(Verdict::Wrong)
    }

    /// Close an answered question once its verdict has been shown
    pub fn finish_feedback(&mut self) -> bool {
        match &self.state {
            InteractionState::Question(prompt) if prompt.verdict.is_some() => {
                self.state = InteractionState::Playing;
                true
            }
            _ => false,
        }
    }

    /// Close a knowledge prompt, or walk away from an unanswered question
    pub fn dismiss(&mut self) -> bool {
        match &self.state {
            InteractionState::Knowledge(_) => {
                self.state = InteractionState::Playing;
                true
            }
            InteractionState::Question(prompt) if prompt.verdict.is_none() => {
                self.state = InteractionState::Playing;
                true
            }
            _ => false,
        }
    }

    pub fn open_settings(&mut self) -> bool {
        if self.in_settings() {
            return false;
        }
        let resume = std::mem::replace(&mut self.state, InteractionState::Playing);
        self.state = InteractionState::Settings {
            resume: Box::new(resume),
        };
        true
    }

    /// Return to exactly what Settings interrupted
    pub fn close_settings(&mut self) -> bool {
        if !self.in_settings() {
            return false;
        }
        if let InteractionState::Settings { resume } =
            std::mem::replace(&mut self.state, InteractionState::Playing)
        {
            self.state = *resume;
        }
        true
    }

    /// Enter the terminal state. Later calls change nothing.
    pub fn end(&mut self, result: GameResult) -> bool {
        if self.ended() {
            return false;
        }
        self.state = InteractionState::Ended(result);
        true
    }
}
