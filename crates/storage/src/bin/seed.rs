use std::fmt;

use storage::repository::Storage;
use workout_core::model::{
    CategoryId, DayNumber, DayPlan, DayReference, ExerciseAssignment, ExerciseId, TemplateId,
};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    template_id: TemplateId,
    days: u8,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidTemplateId { raw: String },
    InvalidDays { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidTemplateId { raw } => write!(f, "invalid --template value: {raw}"),
            ArgsError::InvalidDays { raw } => write!(f, "invalid --days value (1-7): {raw}"),
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("WORKOUT_DB_URL")
            .unwrap_or_else(|_| "sqlite://workout.sqlite3?mode=rwc".into());
        let mut template_id = std::env::var("WORKOUT_TEMPLATE_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| TemplateId::new(1), TemplateId::new);
        let mut days = 3_u8;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--template" => {
                    let value = require_value(&mut args, "--template")?;
                    let parsed: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidTemplateId { raw: value.clone() })?;
                    template_id = TemplateId::new(parsed);
                }
                "--days" => {
                    let value = require_value(&mut args, "--days")?;
                    days = value
                        .parse::<u8>()
                        .ok()
                        .filter(|d| DayNumber::new(*d).is_ok())
                        .ok_or_else(|| ArgsError::InvalidDays { raw: value.clone() })?;
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
            days,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://workout.sqlite3?mode=rwc)");
    eprintln!("  --template <id>           Routine template id to upsert (default: 1)");
    eprintln!("  --days <n>                Number of days to seed, 1-7 (default: 3)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  WORKOUT_DB_URL, WORKOUT_TEMPLATE_ID");
}

/// Exercises cycled through when building demo days: (planned sets, planned value, category).
const SAMPLES: [(u32, &str, u64); 5] = [
    (4, "12-10-8", 1),
    (3, "10", 1),
    (3, "30s/lado", 2),
    (4, "15", 3),
    (2, "45s", 2),
];

fn demo_day(template_id: TemplateId, day_number: DayNumber) -> DayPlan {
    let day = u64::from(day_number.value());
    let exercises = (0..3_u64)
        .map(|slot| {
            let idx = usize::try_from((day + slot) % 5).unwrap_or(0);
            let (sets, planned, category) = SAMPLES[idx];
            ExerciseAssignment::new(
                ExerciseId::new(template_id.value() * 1000 + day * 10 + slot + 1),
                day_number,
                sets,
                planned,
            )
            .with_category(CategoryId::new(category))
        })
        .collect();

    DayPlan {
        template_id,
        day_number,
        day_reference: Some(DayReference::new(template_id.value() * 100 + day)),
        exercises,
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;

    for day_number in DayNumber::all().take(usize::from(args.days)) {
        let plan = demo_day(args.template_id, day_number);
        storage.catalog.upsert_day_plan(&plan).await?;
    }

    println!(
        "Seeded template {} with {} days into {}",
        args.template_id, args.days, args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
