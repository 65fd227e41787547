use clap::{Parser, Subcommand};
use qtrader::config::{AppConfig, LoggingConfig};
use qtrader::core::{RewardMode, CONTEXT_FEATURES};
use qtrader::data::{CsvTickSource, StandardScaler, TickSource};
use qtrader::error::{QtraderError, Result};
use qtrader::model::DenseModel;
use qtrader::training::{
    run_policy_test, run_random_test, EpisodeRun, EpisodeStatus, EvaluationReport, TrainingSession,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qtrader")]
#[command(author = "Qtrader Team")]
#[command(version = "0.1.0")]
#[command(about = "Episodic Q-learning trading simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config directory
    #[arg(short, long, default_value = "config")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the agent on the older part of the tick history
    Train {
        /// CSV file with the tick history
        #[arg(short, long)]
        data: Option<String>,
        /// Episodes to run (overrides the configured count)
        #[arg(short, long)]
        episodes: Option<usize>,
        /// Seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
        /// Continue training from a saved model
        #[arg(short, long)]
        model: Option<String>,
        /// Zero out rewards while still trading
        #[arg(long)]
        no_reward: bool,
    },
    /// Evaluate a saved model greedily on the held-out suffix
    Test {
        /// CSV file with the tick history
        #[arg(short, long)]
        data: Option<String>,
        /// Saved model to evaluate
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Run the uniform-random baseline on the held-out suffix
    Random {
        /// CSV file with the tick history
        #[arg(short, long)]
        data: Option<String>,
        /// Seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Fit the feature scaler on the training prefix and save it
    FitScaler {
        /// CSV file with the tick history
        #[arg(short, long)]
        data: Option<String>,
        /// Where to write the fitted scaler
        #[arg(short, long)]
        out: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, load_error) = match AppConfig::load_from(&cli.config) {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    init_logging(&config.logging);
    if let Some(e) = load_error {
        error!("Failed to load configuration: {}", e);
        info!("Using default configuration");
    }

    match cli.command {
        Commands::Train {
            data,
            episodes,
            seed,
            model,
            no_reward,
        } => {
            if let Some(path) = data {
                config.data.path = path;
            }
            if let Some(count) = episodes {
                config.agent.episode_count = count;
            }
            if let Some(path) = model {
                config.model.path = Some(path);
            }
            if no_reward {
                config.agent.reward_mode = RewardMode::Disabled;
            }
            validate_config(&config)?;
            run_train(&config, seed)
        }
        Commands::Test { data, model } => {
            if let Some(path) = data {
                config.data.path = path;
            }
            if let Some(path) = model {
                config.model.path = Some(path);
            }
            validate_config(&config)?;
            run_test(&config)
        }
        Commands::Random { data, seed } => {
            if let Some(path) = data {
                config.data.path = path;
            }
            validate_config(&config)?;
            run_random(&config, seed)
        }
        Commands::FitScaler { data, out } => {
            if let Some(path) = data {
                config.data.path = path;
            }
            let out = out.unwrap_or_else(|| config.data.scaler_path.clone());
            validate_config(&config)?;
            run_fit_scaler(&config, &out)
        }
    }
}

fn validate_config(config: &AppConfig) -> Result<()> {
    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("Invalid configuration: {}", e);
        }
        return Err(QtraderError::Configuration(errors.join("; ")));
    }
    if config.data.path.is_empty() {
        return Err(QtraderError::Configuration(
            "no data file given; set data.path or pass --data".to_string(),
        ));
    }
    Ok(())
}

fn run_train(config: &AppConfig, seed: Option<u64>) -> Result<()> {
    let source = CsvTickSource::load(Path::new(&config.data.path), &config.data.feature_fields)?;
    let (train, _test) = source.split(config.data.test_fraction);

    let scaler = load_or_fit_scaler(config, &train)?;
    let mut model = load_or_create_model(config, &scaler, seed)?;

    let mut session = TrainingSession::new(config, seed)?;
    session.train(&mut model, &scaler, &train)?;

    let save_dir = Path::new(&config.model.save_dir);
    std::fs::create_dir_all(save_dir).ok();
    session.report.save_csv(save_dir)?;
    model.save_into(save_dir)?;

    print_training_summary(&session);
    Ok(())
}

fn run_test(config: &AppConfig) -> Result<()> {
    let source = CsvTickSource::load(Path::new(&config.data.path), &config.data.feature_fields)?;
    let (_train, test) = source.split(config.data.test_fraction);

    let scaler = StandardScaler::from_file(Path::new(&config.data.scaler_path))?;
    let model_path = config.model.path.as_deref().ok_or_else(|| {
        QtraderError::Configuration("no model given; set model.path or pass --model".to_string())
    })?;
    let mut model = DenseModel::from_file(model_path)?;
    info!("Loaded model from {}", model_path);

    let report = run_policy_test(config, &mut model, &scaler, &test)?;

    let save_dir = Path::new(&config.model.save_dir);
    std::fs::create_dir_all(save_dir).ok();
    report.save_csv(save_dir, "test_log")?;

    print_run_summary("Policy Test Summary", &report);
    Ok(())
}

fn run_random(config: &AppConfig, seed: Option<u64>) -> Result<()> {
    let source = CsvTickSource::load(Path::new(&config.data.path), &config.data.feature_fields)?;
    let (_train, test) = source.split(config.data.test_fraction);

    // The baseline ignores state, so a missing scaler is not fatal
    let scaler_path = Path::new(&config.data.scaler_path);
    let scaler = if scaler_path.is_file() {
        StandardScaler::from_file(scaler_path)?
    } else {
        StandardScaler::identity(config.data.feature_fields.clone())
    };

    let report = run_random_test(config, &scaler, &test, seed)?;

    let save_dir = Path::new(&config.model.save_dir);
    std::fs::create_dir_all(save_dir).ok();
    report.save_csv(save_dir, "random_log")?;

    print_run_summary("Random Baseline Summary", &report);
    Ok(())
}

fn run_fit_scaler(config: &AppConfig, out: &str) -> Result<()> {
    let source = CsvTickSource::load(Path::new(&config.data.path), &config.data.feature_fields)?;
    let (train, _test) = source.split(config.data.test_fraction);

    let rows: Vec<Vec<f64>> = train.ticks().map(|t| t.features.clone()).collect();
    let scaler = StandardScaler::fit(train.feature_fields(), &rows)?;
    scaler.to_file(Path::new(out))?;
    Ok(())
}

/// Load the scaler named in the config, or fit one on the training prefix
/// and save it for later runs.
fn load_or_fit_scaler(config: &AppConfig, train: &dyn TickSource) -> Result<StandardScaler> {
    let path = Path::new(&config.data.scaler_path);
    if path.is_file() {
        let scaler = StandardScaler::from_file(path)?;
        scaler.check_columns(train.feature_fields())?;
        info!("Loaded scaler from {}", path.display());
        return Ok(scaler);
    }
    let rows: Vec<Vec<f64>> = train.ticks().map(|t| t.features.clone()).collect();
    let scaler = StandardScaler::fit(train.feature_fields(), &rows)?;
    scaler.to_file(path)?;
    Ok(scaler)
}

fn load_or_create_model(
    config: &AppConfig,
    scaler: &StandardScaler,
    seed: Option<u64>,
) -> Result<DenseModel> {
    let input_dim = config.agent.window_length * (scaler.feature_count() + CONTEXT_FEATURES);
    match &config.model.path {
        Some(path) => {
            let model = DenseModel::from_file(path)?;
            if model.input_dim != input_dim {
                return Err(QtraderError::Model(format!(
                    "model expects input dim {}, data provides {}",
                    model.input_dim, input_dim
                )));
            }
            info!("Loaded model from {}", path);
            Ok(model)
        }
        None => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            Ok(DenseModel::new(
                input_dim,
                &config.model.hidden_layers,
                config.model.learning_rate,
                &mut rng,
            ))
        }
    }
}

fn print_training_summary(session: &TrainingSession) {
    let episodes = &session.report.episodes;
    let survived = episodes
        .iter()
        .filter(|e| e.status == EpisodeStatus::Survived)
        .count();
    let last_cash = episodes.last().map(|e| e.final_cash).unwrap_or(0.0);
    let total_profit: f64 = episodes.iter().map(|e| e.realized_profit).sum();

    println!("\n╔══════════════════════════════════════════════╗");
    println!("║               Training Summary               ║");
    println!("╠══════════════════════════════════════════════╣");
    println!("║  Episodes:        {:>10}                 ║", episodes.len());
    println!("║  Survived:        {:>10}                 ║", survived);
    println!("║  Final Cash:      {:>10.2}                 ║", last_cash);
    println!("║  Realized Profit: {:>10.2}                 ║", total_profit);
    println!("║  Final Epsilon:   {:>10.4}                 ║", session.epsilon());
    println!("║  Replay Memory:   {:>10}                 ║", session.memory_len());
    println!("╚══════════════════════════════════════════════╝");
}

fn print_run_summary(title: &str, report: &EvaluationReport) {
    let run: &EpisodeRun = &report.run;

    println!("\n╔══════════════════════════════════════════════╗");
    println!("║{:^46}║", title);
    println!("╠══════════════════════════════════════════════╣");
    println!("║  Ticks:           {:>10}                 ║", run.ticks);
    println!("║  Decisions:       {:>10}                 ║", run.decisions);
    println!("║  Final Cash:      {:>10.2}                 ║", run.final_cash);
    println!("║  Final Shares:    {:>10}                 ║", run.final_shares);
    println!("║  Realized Profit: {:>10.2}                 ║", run.realized_profit);
    println!("║  Outcome:         {:>10?}                 ║", run.status);
    println!("╚══════════════════════════════════════════════╝");
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},qtrader=debug", config.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
