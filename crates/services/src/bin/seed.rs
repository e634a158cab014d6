use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use ead_core::model::{
    Feature, GroupDraft, LessonId, LessonProgress, NotificationDraft, NotificationKind,
    UserId,
};
use services::{Clock, PortalConfig, PortalServices};
use tracing::info;
use tracing_subscriber::EnvFilter;

const SEED_GROUP_NAME: &str = "Equipe de Campo";

#[derive(Debug, Clone)]
struct Args {
    config: PortalConfig,
    user: UserId,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidUser { raw: String },
    InvalidNow { raw: String },
    Config(services::ConfigError),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value: {raw:?}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
            ArgsError::Config(err) => write!(f, "invalid environment: {err}"),
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
        let mut config = PortalConfig::from_env().map_err(ArgsError::Config)?;
        let mut user = std::env::var("EAD_SEED_USER")
            .ok()
            .and_then(|value| value.parse::<UserId>().ok())
            .unwrap_or_else(|| UserId::new("demo"));
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    config.db_url = value;
                }
                "--catalog" => {
                    let value = require_value(&mut args, "--catalog")?;
                    config.catalog_path = Some(PathBuf::from(value));
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    user = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidUser { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { config, user, now })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p services --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:ead.sqlite3)");
    eprintln!("  --catalog <path>          Catalog JSON (default: bundled demo catalog)");
    eprintln!("  --user <id>               Learner to seed progress for (default: demo)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  EAD_DB_URL, EAD_CATALOG_PATH, EAD_SEED_USER");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let clock = args.now.map_or_else(Clock::system, Clock::fixed);
    let portal = PortalServices::new_sqlite(&args.config, clock).await?;
    let catalog = portal.catalog();
    let Some(course) = catalog.courses().first() else {
        info!("catalog is empty, nothing to seed");
        return Ok(());
    };

    let groups = portal.groups();
    if !groups
        .list()
        .await?
        .iter()
        .any(|g| g.name() == SEED_GROUP_NAME)
    {
        let mut draft = GroupDraft::new(SEED_GROUP_NAME);
        draft.description = "Técnicos que atuam diretamente no campo.".into();
        draft.features.insert(Feature::Certificates);
        draft.features.insert(Feature::News);
        draft.access.set_course(course, true);
        groups.create(draft).await?;
    }

    // first lesson watched, second one halfway
    let progress = portal.progress();
    let lessons: Vec<LessonId> = course.lessons().map(|(_, l)| l.id.clone()).take(2).collect();
    for (index, lesson_id) in lessons.iter().enumerate() {
        let lesson = progress.lesson_progress(&args.user, &course.id, lesson_id).await?;
        let duration = catalog
            .lesson(&course.id, lesson_id)
            .map_or(600.0, |l| f64::from(l.duration_seconds));
        let (watched, completed) = if index == 0 {
            (duration, true)
        } else {
            (duration / 2.0, false)
        };
        let seeded = LessonProgress::from_persisted(
            lesson.location().clone(),
            watched,
            Some(duration),
            completed,
            clock.now(),
        )?;
        progress.record_progress(&args.user, &seeded).await?;
    }

    let mut inbox = portal.notifications(args.user.clone()).await?;
    if inbox.inbox().is_empty() {
        inbox
            .push(
                NotificationDraft::new(
                    NotificationKind::NewCourse,
                    "Novo curso disponível",
                    format!("O curso \"{}\" já está disponível.", course.title),
                )
                .with_link(format!("/courses/{}", course.id)),
            )
            .await?;
    }

    let completion = progress.course_completion(&args.user, &course.id).await?;
    println!(
        "Seeded group \"{SEED_GROUP_NAME}\" and progress for {} ({}% of \"{}\") into {}",
        args.user,
        completion.percent(),
        course.title,
        args.config.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
