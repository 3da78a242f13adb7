use std::fmt;
use std::path::PathBuf;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;
use tracing_subscriber::EnvFilter;

use quiz_core::exam::{ExamError, ScoreBar};
use quiz_core::lesson::LessonPhase;
use quiz_core::model::Question;
use quiz_core::progression::StagePolicy;
use services::{
    AppOptions, AppServices, ExamServiceError, LessonService, LessonServiceError, LessonStart,
    TurnError, TurnResult,
};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidMode { raw: String },
    InvalidPolicy { raw: String },
    InvalidSeed { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidMode { raw } => write!(f, "invalid --mode value: {raw}"),
            ArgsError::InvalidPolicy { raw } => write!(f, "invalid --policy value: {raw}"),
            ArgsError::InvalidSeed { raw } => write!(f, "invalid --seed value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Game,
    Exam,
    Lesson,
}

impl Mode {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "game" => Some(Self::Game),
            "exam" => Some(Self::Exam),
            "lesson" => Some(Self::Lesson),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    mode: Mode,
    options: AppOptions,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  cargo run -p app -- [--mode game|exam|lesson] [--db <sqlite_url>] [--slot <name>]"
    );
    eprintln!("                     [--assets <dir>] [--seed <u64>] [--policy banded|demote]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --mode game");
    eprintln!("  --db sqlite:quiz.sqlite3   (or json:<dir> for one JSON file per slot)");
    eprintln!("  --slot default");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_AI_API_KEY, QUIZ_AI_BASE_URL, QUIZ_AI_MODEL, RUST_LOG");
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUIZ_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url("quiz.sqlite3".into()), normalize_db_url);
        let mut mode = Mode::Game;
        let mut options = AppOptions::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_db_url(value);
                }
                "--mode" => {
                    let value = require_value(args, "--mode")?;
                    mode = Mode::from_arg(&value).ok_or(ArgsError::InvalidMode { raw: value })?;
                }
                "--slot" => options.slot = require_value(args, "--slot")?,
                "--assets" => {
                    options.assets = Some(PathBuf::from(require_value(args, "--assets")?));
                }
                "--seed" => {
                    let value = require_value(args, "--seed")?;
                    let seed = value
                        .parse::<u64>()
                        .map_err(|_| ArgsError::InvalidSeed { raw: value.clone() })?;
                    options.seed = Some(seed);
                }
                "--policy" => {
                    let value = require_value(args, "--policy")?;
                    options.stage_policy = match value.as_str() {
                        "banded" => StagePolicy::Banded,
                        "demote" => StagePolicy::Demote,
                        _ => return Err(ArgsError::InvalidPolicy { raw: value }),
                    };
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            mode,
            options,
        })
    }
}

/// `json:<dir>` selects the JSON file store; anything else is `SQLite`.
fn normalize_db_url(raw: String) -> String {
    if raw.starts_with("json:") {
        return raw;
    }
    normalize_sqlite_url(raw)
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

//
// ─── TERMINAL ──────────────────────────────────────────────────────────────────
//

enum Input {
    Choice(Option<String>),
    Quit,
}

struct Terminal<R = BufReader<Stdin>> {
    lines: Lines<R>,
}

impl Terminal {
    fn new() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> Terminal<R> {
    fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Enter means omitted; Q (or end of input) quits.
    async fn read_choice(&mut self) -> std::io::Result<Input> {
        let Some(line) = self.lines.next_line().await? else {
            return Ok(Input::Quit);
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case("q") {
            return Ok(Input::Quit);
        }
        Ok(Input::Choice(
            (!line.is_empty()).then(|| line.to_uppercase()),
        ))
    }

    async fn wait_enter(&mut self) -> std::io::Result<()> {
        self.lines.next_line().await?;
        Ok(())
    }
}

fn print_question(question: &Question) {
    println!();
    println!("{}", question.prompt());
    for (letter, text) in question.options() {
        println!("  {letter}) {text}");
    }
    println!("Answer A-D, Enter to skip, Q to quit:");
}

fn print_turn(result: &TurnResult) {
    println!(
        "{}: {} ({:+.3}) | score {:.3} | {} points {} stage {}",
        result.subject,
        result.outcome,
        result.delta,
        result.new_score,
        result.tutor,
        result.new_points,
        result.new_stage
    );
    if let Some(answer) = result.answer {
        println!("Expected: {answer}");
    }
    if !result.explanation.is_empty() {
        println!("{}", result.explanation);
    }
    if let Some(asset) = &result.asset {
        println!("[{}]", asset.path().display());
    }
}

fn render_bar(bar: ScoreBar) -> String {
    const WIDTH: usize = 30;
    let width = WIDTH as f64;
    // truncation to a cell index is intended
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (filled, pass) = (
        (bar.progress * width).round() as usize,
        (bar.pass_line * width).round() as usize,
    );
    (0..=WIDTH)
        .map(|i| match (i == pass, i < filled) {
            (true, _) => '|',
            (false, true) => '#',
            (false, false) => '.',
        })
        .collect()
}

//
// ─── MODES ─────────────────────────────────────────────────────────────────────
//

type RunResult = Result<(), Box<dyn std::error::Error>>;

async fn run_game<R: AsyncBufRead + Unpin>(app: &AppServices, term: &mut Terminal<R>) -> RunResult {
    let orchestrator = app.orchestrator();
    loop {
        let turn = match orchestrator.begin_turn().await {
            Ok(turn) => turn,
            Err(TurnError::CourseComplete) => {
                println!("Every subject is mastered. Course complete!");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        println!();
        println!(
            "[{}] {} (stage {})",
            turn.tutor(),
            turn.subject(),
            turn.stage()
        );
        print_question(turn.question());

        let Input::Choice(choice) = term.read_choice().await? else {
            return Ok(());
        };
        let result = orchestrator.submit_answer(turn, choice.as_deref()).await;
        print_turn(&result);
        app.save().await?;
    }
}

async fn run_exam<R: AsyncBufRead + Unpin>(app: &AppServices, term: &mut Terminal<R>) -> RunResult {
    let exams = app.exams();
    let clock = exams.clock();
    let mut session = exams.start().await;
    println!(
        "Mock exam: {} questions, {} minutes.",
        session.len(),
        exams.rules().duration().num_minutes()
    );

    loop {
        let number = session.current_index() + 1;
        let total = session.len();
        let remaining = session.remaining(&clock);
        let question = match exams.current_question(&mut session).await {
            Ok(Some(question)) => question.clone(),
            Ok(None) | Err(ExamServiceError::Exam(ExamError::Expired)) => break,
            Err(err) => return Err(err.into()),
        };
        println!();
        println!(
            "Question {number}/{total} | {}:{:02} left | {}",
            remaining.num_minutes(),
            remaining.num_seconds() % 60,
            question.subject()
        );
        print_question(&question);

        let Input::Choice(choice) = term.read_choice().await? else {
            break;
        };
        match exams.submit(&mut session, choice.as_deref()) {
            Ok(()) => {}
            Err(ExamServiceError::Exam(ExamError::Expired)) => {
                println!("Time is up.");
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }

    let report = exams.finish(&session);
    println!();
    println!("{report}");
    println!("{}", render_bar(report.score_bar()));
    Ok(())
}

enum Flow {
    Next,
    Quit,
}

/// Lesson blocks back to back until the learner quits or the course is done.
async fn run_lesson<R: AsyncBufRead + Unpin>(
    app: &AppServices,
    term: &mut Terminal<R>,
) -> RunResult {
    let lessons = app.lessons();
    loop {
        let start = match lessons.start().await {
            Ok(start) => start,
            Err(LessonServiceError::CourseComplete) => {
                println!("Every subject is mastered. Course complete!");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        if let Flow::Quit = run_lesson_block(app, &lessons, term, start).await? {
            return Ok(());
        }
        println!();
        println!("Press Enter for the next lesson, Q to quit.");
        if let Input::Quit = term.read_choice().await? {
            return Ok(());
        }
    }
}

async fn run_lesson_block<R: AsyncBufRead + Unpin>(
    app: &AppServices,
    lessons: &LessonService,
    term: &mut Terminal<R>,
    start: LessonStart,
) -> Result<Flow, Box<dyn std::error::Error>> {
    let mut block = start.block;
    println!("Lesson with {}: {}", block.tutor(), block.subject());
    println!();
    println!("{}", start.teaching);
    println!();
    println!("Press Enter to start the quiz.");
    term.wait_enter().await?;

    while block.phase() != LessonPhase::Reporting {
        let turn = lessons.next_question(&mut block).await?;
        println!();
        println!(
            "Question {}/{} (stage {})",
            block.question_number().unwrap_or(1),
            lessons.rules().quiz_len(),
            block.bonus_stage()
        );
        print_question(turn.question());
        let Input::Choice(choice) = term.read_choice().await? else {
            return Ok(Flow::Quit);
        };
        let answer = lessons.answer(&mut block, &turn, choice.as_deref())?;
        println!("{} | quiz score {}", answer.outcome, answer.quiz_score);
    }

    let summary = lessons.finish(&block).await?;
    let lesson = &summary.report.lesson;
    println!();
    println!("Lesson score: {}/{}", lesson.score, lesson.out_of);
    if let Some(update) = summary.promotion {
        println!("Mastered! {} is now at stage {}.", update.tutor, update.new_stage());
    } else {
        println!("Not mastered yet. {} will be back.", lesson.subject);
    }
    app.save().await?;
    Ok(Flow::Next)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    info!(mode = ?parsed.mode, db = %parsed.db_url, slot = %parsed.options.slot, "starting");
    let app = if let Some(dir) = parsed.db_url.strip_prefix("json:") {
        AppServices::new_json(dir, parsed.options).await?
    } else {
        prepare_sqlite_file(&parsed.db_url)?;
        AppServices::new_sqlite(&parsed.db_url, parsed.options).await?
    };
    let mut term = Terminal::new();

    match parsed.mode {
        Mode::Game => run_game(&app, &mut term).await,
        Mode::Exam => run_exam(&app, &mut term).await,
        Mode::Lesson => run_lesson(&app, &mut term).await,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("services=info,app=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
