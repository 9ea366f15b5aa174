use std::fmt;

use services::{
    AppServices, Clock, CompletionState, EngineError, SessionEngine, SessionUpdate,
    SynthesisOutcome,
};
use tracing_subscriber::EnvFilter;
use workout_core::model::{DayNumber, ExerciseId, TemplateId, UserId};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDay { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { name } => write!(f, "missing <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDay { raw } => write!(f, "invalid day (expected 1-7): {raw}"),
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

fn parse_number<T: std::str::FromStr>(raw: String, flag: &'static str) -> Result<T, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn parse_day(raw: String) -> Result<DayNumber, ArgsError> {
    raw.trim()
        .parse::<u8>()
        .ok()
        .and_then(|value| DayNumber::new(value).ok())
        .ok_or(ArgsError::InvalidDay { raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- <command> [--db <sqlite_url>] [--template <id>] [--day <1-7>] [--user <id>]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  status                          show the day and its progress");
    eprintln!("  mark <exercise>                 count one more set");
    eprintln!("  undo <exercise>                 take back one set");
    eprintln!("  mark-all <exercise>             mark every set of an exercise");
    eprintln!("  log-reps <exercise> <set> <n|-> record reps for a set (- clears)");
    eprintln!("  finish [partial|full]           finish the day");
    eprintln!("  reset                           clear the day and release its lock");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://workout.sqlite3");
    eprintln!("  --template 1");
    eprintln!("  --day 1");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  WORKOUT_DB_URL, WORKOUT_TEMPLATE_ID, WORKOUT_DAY, WORKOUT_USER_ID,");
    eprintln!("  WORKOUT_API_URL, WORKOUT_API_KEY, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinishChoice {
    Ask,
    Partial,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Status,
    Mark(ExerciseId),
    Undo(ExerciseId),
    MarkAll(ExerciseId),
    LogReps {
        exercise: ExerciseId,
        set_index: u32,
        reps: Option<u32>,
    },
    Finish(FinishChoice),
    Reset,
}

impl Command {
    fn parse(args: &mut Vec<String>) -> Result<Self, ArgsError> {
        let Some(name) = take_positional(args) else {
            return Ok(Self::Status);
        };
        match name.as_str() {
            "status" => Ok(Self::Status),
            "mark" => Ok(Self::Mark(exercise_arg(args)?)),
            "undo" => Ok(Self::Undo(exercise_arg(args)?)),
            "mark-all" => Ok(Self::MarkAll(exercise_arg(args)?)),
            "log-reps" => {
                let exercise = exercise_arg(args)?;
                let set_index = take_positional(args)
                    .ok_or(ArgsError::MissingArgument { name: "set" })
                    .and_then(|raw| parse_number(raw, "<set>"))?;
                let reps = match take_positional(args) {
                    None => return Err(ArgsError::MissingArgument { name: "reps" }),
                    Some(raw) if raw == "-" => None,
                    Some(raw) => Some(parse_number(raw, "<reps>")?),
                };
                Ok(Self::LogReps {
                    exercise,
                    set_index,
                    reps,
                })
            }
            "finish" => {
                let choice = match take_positional(args).as_deref() {
                    None => FinishChoice::Ask,
                    Some("partial") => FinishChoice::Partial,
                    Some("full") => FinishChoice::Full,
                    Some(other) => return Err(ArgsError::UnknownArg(other.to_string())),
                };
                Ok(Self::Finish(choice))
            }
            "reset" => Ok(Self::Reset),
            _ => Err(ArgsError::UnknownCommand(name)),
        }
    }
}

/// Pop the next argument if it is not a flag.
fn take_positional(args: &mut Vec<String>) -> Option<String> {
    if args.first().is_some_and(|arg| !arg.starts_with("--")) {
        Some(args.remove(0))
    } else {
        None
    }
}

fn exercise_arg(args: &mut Vec<String>) -> Result<ExerciseId, ArgsError> {
    let raw = take_positional(args).ok_or(ArgsError::MissingArgument { name: "exercise" })?;
    raw.parse()
        .map_err(|_| ArgsError::InvalidNumber { flag: "<exercise>", raw })
}

struct Args {
    db_url: String,
    template_id: TemplateId,
    day_number: DayNumber,
    user_id: Option<UserId>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("WORKOUT_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://workout.sqlite3".into(), normalize_sqlite_url);
        let mut template_id = std::env::var("WORKOUT_TEMPLATE_ID")
            .ok()
            .and_then(|value| value.parse::<TemplateId>().ok())
            .unwrap_or_else(|| TemplateId::new(1));
        let mut day_number = std::env::var("WORKOUT_DAY")
            .ok()
            .and_then(|value| value.trim().parse::<u8>().ok())
            .and_then(|value| DayNumber::new(value).ok())
            .unwrap_or(DayNumber::FIRST);
        let mut user_id = std::env::var("WORKOUT_USER_ID")
            .ok()
            .and_then(|value| value.parse::<UserId>().ok());

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--template" => {
                    let value = require_value(args, "--template")?;
                    template_id = parse_number(value, "--template")?;
                }
                "--day" => {
                    day_number = parse_day(require_value(args, "--day")?)?;
                }
                "--user" => {
                    let value = require_value(args, "--user")?;
                    user_id = Some(parse_number(value, "--user")?);
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
            template_id,
            day_number,
            user_id,
        })
    }
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
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn print_status(engine: &SessionEngine) {
    println!(
        "template {} day {}: {:?}, {}%",
        engine.template_id(),
        engine.day_number(),
        engine.state(),
        engine.overall_progress()
    );
    if let Some(started_at) = engine.started_at() {
        println!("  started {started_at}");
    }
    for exercise in &engine.plan().exercises {
        println!(
            "  exercise {:>6}  {}/{} sets  {:>3}%  planned {}",
            exercise.id,
            engine.completed_sets(exercise.id),
            exercise.planned_sets,
            engine.exercise_percentage(exercise.id).unwrap_or(0),
            exercise.planned_value.raw()
        );
    }
}

fn print_update(update: &SessionUpdate) {
    println!("{:?}, {}%", update.state, update.overall_progress);
    if let Some(celebration) = update.celebration {
        println!("{}", celebration.phrase);
    }
    match &update.synthesis {
        Some(SynthesisOutcome::Submitted {
            record_id,
            set_records,
            sets_acknowledged,
        }) => {
            println!("session record {record_id} filed with {set_records} sets");
            if !sets_acknowledged {
                println!("set detail was not accepted");
            }
        }
        Some(SynthesisOutcome::Skipped) => {
            println!("session record not filed: no user or day reference");
        }
        Some(SynthesisOutcome::Failed { reason }) => {
            println!("session record failed: {reason}; run finish again to retry");
        }
        None => {}
    }
}

async fn execute(engine: &mut SessionEngine, command: Command) -> Result<(), EngineError> {
    match command {
        Command::Status => print_status(engine),
        Command::Mark(id) => print_update(&engine.mark_set(id).await?),
        Command::Undo(id) => print_update(&engine.undo_set(id).await?),
        Command::MarkAll(id) => print_update(&engine.mark_all_sets(id).await?),
        Command::LogReps {
            exercise,
            set_index,
            reps,
        } => {
            engine.log_reps(exercise, set_index, reps)?;
            println!("exercise {exercise} set {set_index}: {reps:?}");
        }
        Command::Finish(FinishChoice::Ask) => {
            let update = engine.request_finish().await?;
            if update.state == CompletionState::AwaitingFinishChoice {
                engine.cancel_finish()?;
                println!(
                    "day is at {}%: run `finish partial` (needs {}%) or `finish full`",
                    update.overall_progress,
                    services::PARTIAL_FINISH_FLOOR
                );
            } else {
                print_update(&update);
            }
        }
        Command::Finish(FinishChoice::Partial) => print_update(&engine.finish_partial().await?),
        Command::Finish(FinishChoice::Full) => print_update(&engine.finish_full().await?),
        Command::Reset => print_update(&engine.reset_all()),
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();
    if matches!(argv.first().map(String::as_str), Some("--help" | "-h" | "help")) {
        print_usage();
        return Ok(());
    }

    let command = Command::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&parsed.db_url)?;
    let app = AppServices::new_sqlite(&parsed.db_url, Clock::system(), parsed.user_id).await?;
    tracing::debug!(
        db = %parsed.db_url,
        remote = app.remote_submission(),
        "services ready"
    );

    let sessions = app.sessions();
    let mut engine = sessions
        .load_day(parsed.template_id, parsed.day_number)
        .await?;
    let result = execute(&mut engine, command).await;
    engine.close().await;
    result.map_err(Into::into)
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

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
