//! Episode engine
//!
//! One loop drives training, greedy evaluation and the random baseline.
//! Every tick advances the state window; once the window has filled, each
//! further tick carries exactly one decision. The modes differ only in who
//! decides (exploring, greedy or uniform random), whether experiences are
//! stored and replayed, and which log a tick feeds.
//!
//! Decisions are made on the state as it stood before the current tick and
//! executed at the current tick's close, so the agent never trades on a
//! price it has already seen in its input.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::core::{RewardMode, StateWindow, NUM_ACTIONS};
use crate::data::{StandardScaler, TickSource};
use crate::error::{QtraderError, Result};
use crate::memory::{Experience, ReplayBuffer};
use crate::model::ValueModel;
use crate::portfolio::Ledger;
use crate::training::policy::{DecisionStrategy, EpsilonGreedy, Greedy, UniformRandom};
use crate::training::report::{EvaluationReport, FitRecord, TickRecord, TrainingReport};

/// How an episode ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeStatus {
    /// Ran out of ticks with the portfolio still able to trade
    Survived,
    /// Could no longer buy and had nothing left to sell
    Died,
}

/// Outcome of a single episode
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRun {
    pub status: EpisodeStatus,
    /// Ticks consumed, warm-up included
    pub ticks: usize,
    pub decisions: usize,
    pub final_cash: f64,
    pub final_shares: usize,
    pub realized_profit: f64,
}

/// Knobs shared by every mode
#[derive(Debug, Clone)]
pub struct EpisodeConfig {
    pub window_length: usize,
    pub reward_mode: RewardMode,
    pub starting_cash: f64,
    pub starting_shares: u32,
    /// Optional cap on ticks consumed per episode
    pub max_ticks: Option<usize>,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            window_length: 14,
            reward_mode: RewardMode::Enabled,
            starting_cash: 20_000.0,
            starting_shares: 0,
            max_ticks: None,
        }
    }
}

impl EpisodeConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            window_length: config.agent.window_length,
            reward_mode: config.agent.reward_mode,
            starting_cash: config.portfolio.starting_cash,
            starting_shares: config.portfolio.starting_shares,
            max_ticks: config.agent.max_ticks,
        }
    }
}

/// Training-only state threaded through the loop
struct LearningCtx<'a> {
    memory: &'a mut ReplayBuffer,
    report: &'a mut TrainingReport,
    discount: f64,
    replay_interval: usize,
}

/// Cross-episode training state
///
/// The exploration policy, replay memory and report all persist across the
/// episodes of one session: epsilon keeps decaying from where the previous
/// episode left it, and old experiences stay replayable until capacity
/// pushes them out.
#[derive(Debug)]
pub struct TrainingSession {
    cfg: EpisodeConfig,
    episode_count: usize,
    replay_interval: usize,
    discount: f64,
    policy: EpsilonGreedy,
    memory: ReplayBuffer,
    rng: StdRng,
    pub report: TrainingReport,
}

impl TrainingSession {
    /// Build a session from configuration
    ///
    /// Fails up front when the window cannot fill within one replay
    /// interval, since the first replay would then be asked for more
    /// experiences than the episode has produced.
    pub fn new(config: &AppConfig, seed: Option<u64>) -> Result<Self> {
        if config.agent.window_length > config.agent.replay_interval {
            return Err(QtraderError::Configuration(format!(
                "window length {} exceeds replay interval {}",
                config.agent.window_length, config.agent.replay_interval
            )));
        }
        Ok(Self {
            cfg: EpisodeConfig::from_config(config),
            episode_count: config.agent.episode_count,
            replay_interval: config.agent.replay_interval,
            discount: config.agent.discount_factor,
            policy: EpsilonGreedy::new(
                config.agent.epsilon_floor,
                config.agent.epsilon_decay_step,
            ),
            memory: ReplayBuffer::new(config.agent.memory_capacity),
            rng: seed_rng(seed),
            report: TrainingReport::default(),
        })
    }

    /// Run the configured number of episodes over `source`
    pub fn train(
        &mut self,
        model: &mut dyn ValueModel,
        scaler: &StandardScaler,
        source: &dyn TickSource,
    ) -> Result<()> {
        scaler.check_columns(source.feature_fields())?;
        info!(
            "Training on {}: {} ticks, {} episodes",
            source.symbol(),
            source.len(),
            self.episode_count
        );
        for episode in 1..=self.episode_count {
            let mut ctx = LearningCtx {
                memory: &mut self.memory,
                report: &mut self.report,
                discount: self.discount,
                replay_interval: self.replay_interval,
            };
            let run = run_episode(
                &self.cfg,
                scaler,
                source,
                &mut self.policy,
                Some(&mut *model),
                Some(&mut ctx),
                None,
                &mut self.rng,
            )?;
            info!(
                "Episode {}/{}: {:?} after {} ticks, {} decisions, cash={:.2}, eps={:.3}",
                episode,
                self.episode_count,
                run.status,
                run.ticks,
                run.decisions,
                run.final_cash,
                self.policy.epsilon()
            );
            self.report.episodes.push(run);
        }
        Ok(())
    }

    /// Exploration rate as the last decision left it
    pub fn epsilon(&self) -> f64 {
        self.policy.epsilon()
    }

    /// Experiences currently held in replay memory
    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }
}

/// Greedy evaluation over `source`, logging one portfolio row per decision
pub fn run_policy_test(
    config: &AppConfig,
    model: &mut dyn ValueModel,
    scaler: &StandardScaler,
    source: &dyn TickSource,
) -> Result<EvaluationReport> {
    scaler.check_columns(source.feature_fields())?;
    info!(
        "Evaluating greedy policy on {}: {} ticks",
        source.symbol(),
        source.len()
    );
    let cfg = EpisodeConfig::from_config(config);
    let mut rows = Vec::new();
    let mut rng = seed_rng(None);
    let run = run_episode(
        &cfg,
        scaler,
        source,
        &mut Greedy,
        Some(model),
        None,
        Some(&mut rows),
        &mut rng,
    )?;
    info!(
        "Evaluation: {:?} after {} ticks, cash={:.2}, realized profit={:.2}",
        run.status, run.ticks, run.final_cash, run.realized_profit
    );
    Ok(EvaluationReport { rows, run })
}

/// Uniform-random baseline over `source`; the model is never consulted
pub fn run_random_test(
    config: &AppConfig,
    scaler: &StandardScaler,
    source: &dyn TickSource,
    seed: Option<u64>,
) -> Result<EvaluationReport> {
    scaler.check_columns(source.feature_fields())?;
    info!(
        "Running random baseline on {}: {} ticks",
        source.symbol(),
        source.len()
    );
    let cfg = EpisodeConfig::from_config(config);
    let mut rows = Vec::new();
    let mut rng = seed_rng(seed);
    let run = run_episode(
        &cfg,
        scaler,
        source,
        &mut UniformRandom,
        None,
        None,
        Some(&mut rows),
        &mut rng,
    )?;
    info!(
        "Baseline: {:?} after {} ticks, cash={:.2}, realized profit={:.2}",
        run.status, run.ticks, run.final_cash, run.realized_profit
    );
    Ok(EvaluationReport { rows, run })
}

fn seed_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// The unified loop behind every mode
///
/// `learning` turns on experience storage and periodic replay fits;
/// `tick_log` collects per-decision portfolio rows for evaluation runs. A
/// depleted portfolio ends the episode: training still makes, stores and
/// possibly replays the terminal decision first, evaluation stops without
/// acting.
fn run_episode(
    cfg: &EpisodeConfig,
    scaler: &StandardScaler,
    source: &dyn TickSource,
    strategy: &mut dyn DecisionStrategy,
    mut model: Option<&mut dyn ValueModel>,
    mut learning: Option<&mut LearningCtx<'_>>,
    mut tick_log: Option<&mut Vec<TickRecord>>,
    rng: &mut StdRng,
) -> Result<EpisodeRun> {
    let mut window = StateWindow::new(cfg.window_length, scaler.feature_count());
    let mut ledger = Ledger::new(cfg.starting_cash, cfg.starting_shares);
    let mut ticks = 0usize;
    let mut decisions = 0usize;
    let mut status = EpisodeStatus::Survived;

    for tick in source.ticks() {
        if let Some(limit) = cfg.max_ticks {
            if ticks >= limit {
                break;
            }
        }

        let price = tick.close;
        // Judged before this tick's action
        let depleted = ledger.is_depleted(price);
        let (previous, current) = window.observe(tick, scaler, &ledger)?;
        ticks += 1;

        if ticks <= cfg.window_length {
            // Warm-up: the window is still filling
            if depleted {
                status = EpisodeStatus::Died;
                break;
            }
            continue;
        }

        if depleted && learning.is_none() {
            // Evaluation stops before acting on a dead portfolio
            status = EpisodeStatus::Died;
            break;
        }

        let values = match model.as_deref() {
            Some(m) if strategy.needs_values() => m.predict(&previous)?,
            _ => [0.0; NUM_ACTIONS],
        };
        let action = strategy.decide(&values, rng);
        decisions += 1;

        let value_before = ledger.value(price);
        let outcome = ledger.apply(action, price);
        let reward = cfg.reward_mode.reward(&outcome);

        if let Some(ctx) = learning.as_deref_mut() {
            ctx.report.action_values.push(values);
            ctx.memory.push(Experience {
                state_before: previous,
                action,
                reward,
                state_after: current,
                terminal: depleted,
            });
            if decisions % ctx.replay_interval == 0 {
                let m = model.as_deref_mut().ok_or_else(|| {
                    QtraderError::Configuration("training requires a model".into())
                })?;
                replay(m, ctx, strategy.epsilon(), &ledger, rng)?;
            }
        } else if let Some(log) = tick_log.as_deref_mut() {
            log.push(TickRecord {
                value: value_before,
                action,
                shares: ledger.shares(),
                cash: ledger.cash(),
                profits: ledger.realized_profit(),
                close: price,
            });
        }

        if depleted {
            // The terminal decision was recorded; now the episode is over
            status = EpisodeStatus::Died;
            break;
        }
    }

    Ok(EpisodeRun {
        status,
        ticks,
        decisions,
        final_cash: ledger.cash(),
        final_shares: ledger.shares(),
        realized_profit: ledger.realized_profit(),
    })
}

/// One replay pass: sample a batch, fit each experience toward its
/// one-step bootstrapped target
fn replay(
    model: &mut dyn ValueModel,
    ctx: &mut LearningCtx<'_>,
    epsilon: f64,
    ledger: &Ledger,
    rng: &mut StdRng,
) -> Result<()> {
    let batch = ctx.memory.sample(ctx.replay_interval, rng)?;
    debug!("Replaying {} experiences", batch.len());
    for experience in batch {
        let mut target = model.predict(&experience.state_before)?;
        let index = experience.action.to_index();
        if experience.terminal {
            target[index] += experience.reward;
        } else {
            let next = model.predict(&experience.state_after)?;
            let best = next.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            target[index] += experience.reward + ctx.discount as f32 * best;
        }
        let loss = model.fit(&experience.state_before, &target)?;
        ctx.report.fits.push(FitRecord {
            loss,
            reward: experience.reward,
            epsilon,
            cash: ledger.cash(),
            shares: ledger.shares(),
        });
    }
    Ok(())
}
