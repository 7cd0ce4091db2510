//! CLI binary for nephroquiz.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `QuizConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use nephroquiz::pipeline::clean::clean_all;
use nephroquiz::{
    generate_from_sources, generate_quiz, load_sources, BatchOutput, Difficulty, DifficultyState,
    GenerationProgressCallback, ProgressCallback, PromptLanguage, Quiz, QuizConfig, QuizResult,
    SessionState,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress bar for `batch`. Sources may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} sources  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Generating");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Generating quizzes for {total} sources…"))
        ));
    }

    fn on_source_start(&self, index: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
    }

    fn on_source_complete(&self, index: usize, total: usize, questions: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} Source {:>3}/{:<3}  {:<14}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("{questions:>2} questions")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_source_error(&self, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}…", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Source {:>3}/{:<3}  {}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total.saturating_sub(success_count);
        if failed == 0 {
            eprintln!(
                "{} {} sources turned into quizzes",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} sources  ({} failed)",
                cyan("⚠"),
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Five medium questions on a topic, printed as text
  nephroquiz generate "Chronic kidney disease staging"

  # Ten hard questions in French, saved as JSON
  nephroquiz --language fr generate "Dialyse péritonéale" -n 10 -d hard -o quiz.json

  # One quiz per abstract (JSON array or blank-line separated text)
  nephroquiz batch abstracts.txt -o quizzes.json

  # Show what the cleaner does to a set of abstracts
  nephroquiz clean abstracts.json

  # Interactive session, difficulty adapts after three quizzes
  nephroquiz play "Acute kidney injury" --rounds 5

  # Local Ollama instead of Groq
  nephroquiz --ollama generate "Nephrotic syndrome"

ENVIRONMENT VARIABLES:
  NEPHROQUIZ_API_KEY     API key (Bearer token)
  GROQ_API_KEY           Fallback API key
  NEPHROQUIZ_ENDPOINT    Completion endpoint URL
  NEPHROQUIZ_MODEL       Model ID
  RUST_LOG               Log filter, overrides --verbose / --quiet
"#;

/// Generate adaptive nephrology quizzes with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "nephroquiz",
    version,
    about = "Generate adaptive kidney-disease quizzes with an LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Completion endpoint URL.
    #[arg(long, global = true, env = "NEPHROQUIZ_ENDPOINT")]
    endpoint: Option<String>,

    /// Use a local Ollama server (generate dialect).
    #[arg(long, global = true)]
    ollama: bool,

    /// API key. Falls back to NEPHROQUIZ_API_KEY, then GROQ_API_KEY.
    #[arg(long, global = true, env = "NEPHROQUIZ_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model ID.
    #[arg(long, global = true, env = "NEPHROQUIZ_MODEL")]
    model: Option<String>,

    /// Prompt language.
    #[arg(long, global = true, value_enum, default_value = "en")]
    language: LanguageArg,

    /// Path to a custom prompt template ({topic}, {number}, {difficulty}).
    #[arg(long, global = true)]
    template: Option<PathBuf>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, global = true)]
    temperature: Option<f32>,

    /// Max LLM output tokens.
    #[arg(long, global = true)]
    max_tokens: Option<usize>,

    /// Total attempts per LLM call.
    #[arg(long, global = true, default_value_t = 3)]
    max_retries: u32,

    /// Wait between attempts in milliseconds.
    #[arg(long, global = true, default_value_t = 5000)]
    retry_wait_ms: u64,

    /// Per-request timeout in seconds.
    #[arg(long, global = true, default_value_t = 30)]
    timeout: u64,

    /// Concurrent LLM calls in batch mode.
    #[arg(short, long, global = true, default_value_t = 5)]
    concurrency: usize,

    /// HTTP download timeout for URL sources in seconds.
    #[arg(long, global = true, default_value_t = 120)]
    download_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one quiz on a topic.
    Generate {
        topic: String,
        /// Number of questions (1–20). Default: 5.
        #[arg(short = 'n', long)]
        count: Option<usize>,
        /// Difficulty level.
        #[arg(short, long, value_enum, default_value = "medium")]
        difficulty: DifficultyArg,
        /// Write the quiz as JSON to this file.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Generate one quiz per abstract from a file or URL.
    Batch {
        input: String,
        #[arg(short = 'n', long)]
        count: Option<usize>,
        #[arg(short, long, value_enum, default_value = "medium")]
        difficulty: DifficultyArg,
        /// Write the batch output as JSON to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Disable progress bar.
        #[arg(long)]
        no_progress: bool,
    },
    /// Print abstracts from a file or URL after cleaning.
    Clean {
        input: String,
        /// Print a JSON array instead of blank-line separated text.
        #[arg(long)]
        json: bool,
    },
    /// Answer quizzes interactively; difficulty follows your results.
    Play {
        topic: String,
        #[arg(short = 'n', long)]
        count: Option<usize>,
        /// Number of quizzes to play.
        #[arg(long, default_value_t = 3)]
        rounds: u32,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LanguageArg {
    En,
    Fr,
}

impl From<LanguageArg> for PromptLanguage {
    fn from(v: LanguageArg) -> Self {
        match v {
            LanguageArg::En => PromptLanguage::English,
            LanguageArg::Fr => PromptLanguage::French,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DifficultyArg {
    Easy,
    Medium,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(v: DifficultyArg) -> Self {
        match v {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Medium => Difficulty::Medium,
            DifficultyArg::Hard => Difficulty::Hard,
        }
    }
}

fn state_at(level: DifficultyArg) -> DifficultyState {
    DifficultyState {
        current_level: level.into(),
        ..DifficultyState::default()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let common = &cli.common;

    // ── Logging setup ────────────────────────────────────────────────────
    // The batch progress bar replaces INFO logs unless --verbose is set.
    let batch_bar = matches!(cli.command, Command::Batch { no_progress: false, .. }) && !common.quiet;
    let filter = if common.verbose {
        "debug"
    } else if common.quiet || batch_bar {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Generate {
            ref topic,
            count,
            difficulty,
            ref output,
            json,
        } => {
            let config = build_config(common, count, None).await?;
            let quiz = generate_quiz(topic, config.question_count, &state_at(difficulty), &config)
                .await
                .context("Quiz generation failed")?;

            if let Some(path) = output {
                nephroquiz::generate::write_json(path, &quiz)
                    .await
                    .context("Failed to write quiz")?;
                if !common.quiet {
                    eprintln!(
                        "{}  {} questions  →  {}",
                        green("✔"),
                        quiz.len(),
                        bold(&path.display().to_string())
                    );
                }
            } else if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&quiz).context("Failed to serialise quiz")?
                );
            } else {
                print_quiz(&quiz, true);
            }
        }

        Command::Batch {
            ref input,
            count,
            difficulty,
            ref output,
            ..
        } => {
            let progress: Option<ProgressCallback> = if batch_bar {
                Some(CliProgressCallback::new() as Arc<dyn GenerationProgressCallback>)
            } else {
                None
            };
            let config = build_config(common, count, progress).await?;
            let sources = load_sources(input, &config)
                .await
                .with_context(|| format!("Failed to load sources from {input}"))?;
            let state = state_at(difficulty);
            let batch = generate_from_sources(&sources, config.question_count, &state, &config)
                .await
                .context("Batch generation failed")?;

            if let Some(path) = output {
                nephroquiz::generate::write_json(path, &batch)
                    .await
                    .context("Failed to write batch output")?;
            } else {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&batch).context("Failed to serialise output")?
                );
            }
            if !common.quiet {
                print_batch_summary(&batch, output.as_ref());
            }
        }

        Command::Clean { ref input, json } => {
            let config = build_config(common, None, None).await?;
            let sources = load_sources(input, &config)
                .await
                .with_context(|| format!("Failed to load sources from {input}"))?;
            let cleaned = clean_all(&sources);
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&cleaned).context("Failed to serialise output")?
                );
            } else {
                println!("{}", cleaned.join("\n\n"));
            }
            if !common.quiet {
                eprintln!(
                    "{}",
                    dim(&format!(
                        "{} of {} sources kept",
                        cleaned.len(),
                        sources.len()
                    ))
                );
            }
        }

        Command::Play {
            ref topic,
            count,
            rounds,
        } => {
            let config = build_config(common, count, None).await?;
            play(topic, rounds, &config).await?;
        }
    }

    Ok(())
}

/// Map CLI args to `QuizConfig`. `count` overrides the default question count.
async fn build_config(
    args: &CommonArgs,
    count: Option<usize>,
    progress: Option<ProgressCallback>,
) -> Result<QuizConfig> {
    let template = if let Some(ref path) = args.template {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read prompt template from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = QuizConfig::builder();
    if args.ollama {
        builder = builder.ollama();
    }
    if let Some(ref endpoint) = args.endpoint {
        builder = builder.endpoint(endpoint.clone());
    }
    if let Some(ref key) = args.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(t) = args.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = args.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(t) = template {
        builder = builder.prompt_template(t);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    if let Some(n) = count {
        builder = builder.question_count(n);
    }

    builder
        .language(args.language.into())
        .max_retries(args.max_retries)
        .retry_wait_ms(args.retry_wait_ms)
        .request_timeout_secs(args.timeout)
        .concurrency(args.concurrency)
        .download_timeout_secs(args.download_timeout)
        .build()
        .context("Invalid configuration")
}

fn print_quiz(quiz: &Quiz, with_answers: bool) {
    println!(
        "{}  {}",
        bold(&quiz.topic),
        dim(&format!("({}, {} questions)", quiz.difficulty, quiz.len()))
    );
    for q in &quiz.questions {
        println!("\n{} {}", cyan(&format!("{}.", q.id)), bold(&q.prompt));
        for (key, text) in q.options.iter() {
            println!("   {key}) {text}");
        }
        if with_answers {
            match q.correct_key {
                Some(ref key) => println!("   {} {}", green("answer:"), key),
                None => println!("   {}", red("answer: unknown")),
            }
            if !q.explanation.is_empty() {
                println!("   {}", dim(&q.explanation));
            }
        }
    }
}

fn print_batch_summary(batch: &BatchOutput, output: Option<&PathBuf>) {
    let s = &batch.stats;
    eprintln!(
        "{}  {}/{} sources  {} questions  {}ms{}",
        if s.failed == 0 { green("✔") } else { cyan("⚠") },
        s.succeeded,
        s.succeeded + s.failed,
        s.total_questions,
        s.total_duration_ms,
        output
            .map(|p| format!("  →  {}", bold(&p.display().to_string())))
            .unwrap_or_default(),
    );
    if s.dropped_sources > 0 {
        eprintln!("   {}", dim(&format!("{} empty sources skipped", s.dropped_sources)));
    }
    for e in batch.errors() {
        eprintln!("   {} {}", red("✗"), e);
    }
}

// ── Interactive play ─────────────────────────────────────────────────────────

/// Generation attempts per round before giving up on a quiz that cannot be scored.
const PLAYABLE_ATTEMPTS: usize = 3;

async fn play(topic: &str, rounds: u32, config: &QuizConfig) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut session = SessionState::new();

    for round in 1..=rounds {
        eprintln!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Quiz {round}/{rounds}: generating {} questions…",
                session.difficulty.current_level
            ))
        );
        let quiz = generate_playable(topic, &session.difficulty, config).await?;
        session.begin(quiz.clone());

        for q in &quiz.questions {
            println!("\n{} {}", cyan(&format!("{}.", q.id)), bold(&q.prompt));
            for (key, text) in q.options.iter() {
                println!("   {key}) {text}");
            }
            loop {
                let Some(choice) = prompt_line(&mut lines, "Your answer: ").await? else {
                    eprintln!("{}", dim("Input closed, stopping."));
                    return Ok(());
                };
                if session.answer(&q.id, &choice.to_lowercase()) {
                    break;
                }
                let keys: Vec<&str> = q.options.keys().collect();
                eprintln!("   {}", red(&format!("Pick one of: {}", keys.join(", "))));
            }
        }

        if !session.can_submit() {
            anyhow::bail!("Unanswered questions: {}", session.unanswered().join(", "));
        }
        let result = session.submit().context("Could not score the quiz")?;
        print_result(&quiz, &result);
    }

    let d = &session.difficulty;
    eprintln!(
        "\n{} {}",
        green("✔"),
        bold(&format!(
            "{}/{} correct over {} quizzes, next level {}",
            d.consecutive_score, d.consecutive_count, d.quizzes_completed, d.current_level
        ))
    );
    Ok(())
}

/// Generate a quiz whose every question has a resolved answer, so the
/// learner is never asked questions that cannot be scored.
async fn generate_playable(
    topic: &str,
    state: &DifficultyState,
    config: &QuizConfig,
) -> Result<Quiz> {
    for attempt in 1..=PLAYABLE_ATTEMPTS {
        let quiz = generate_quiz(topic, config.question_count, state, config)
            .await
            .context("Quiz generation failed")?;
        let unscoreable = quiz.unscoreable_ids();
        if unscoreable.is_empty() {
            return Ok(quiz);
        }
        tracing::warn!(
            "Quiz attempt {}/{} has questions without a usable answer ({}), regenerating",
            attempt,
            PLAYABLE_ATTEMPTS,
            unscoreable.join(", ")
        );
    }
    anyhow::bail!("No scoreable quiz after {PLAYABLE_ATTEMPTS} attempts; try another topic or model")
}

async fn prompt_line(lines: &mut Lines<BufReader<Stdin>>, prompt: &str) -> Result<Option<String>> {
    eprint!("   {}", dim(prompt));
    let line = lines.next_line().await.context("Failed to read stdin")?;
    Ok(line.map(|l| l.trim().to_string()))
}

fn print_result(quiz: &Quiz, result: &QuizResult) {
    println!(
        "\n{}  {}",
        bold(&format!(
            "Score: {}/{} ({:.0}%)",
            result.score, result.total, result.percentage
        )),
        result.band
    );
    for grade in &result.grades {
        let prompt = quiz
            .question(&grade.id)
            .map(|q| q.prompt.as_str())
            .unwrap_or_default();
        let mark = if grade.is_correct { green("✓") } else { red("✗") };
        println!("{mark} {}. {}", grade.id, prompt);
        if !grade.is_correct {
            println!(
                "   {} {}   {} {}",
                dim("yours:"),
                grade.chosen.as_deref().unwrap_or("-"),
                dim("correct:"),
                grade.correct_key
            );
        }
        if !grade.explanation.is_empty() {
            println!("   {}", dim(&grade.explanation));
        }
    }
}
