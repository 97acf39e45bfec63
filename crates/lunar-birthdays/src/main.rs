use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use lunar_birthdays::auth::DeviceCodeInfo;
use lunar_birthdays::graph::{calendar_handle, EVENT_TIME_ZONE};
use lunar_birthdays::projector::current_year;
use lunar_birthdays::{
    BatchedDispatcher, BirthdayProjector, BirthdayRecordSource, CalendarApi, ChineseLunarCalendar,
    Config, EventTemplate, FailurePolicy, GraphSession, NewEvent,
};
use shared_types::graph::{CalendarColor, CalendarHandle, FreeBusyStatus, Importance, ItemBody};
use shared_types::BirthdayOccurrence;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lunar-birthdays")]
#[command(about = "Create Microsoft 365 calendar reminders for lunar birthdays")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(
        short,
        long,
        default_value = "lunar-birthdays.toml",
        env = "LUNAR_BIRTHDAYS_CONFIG"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the birthday calendar and one event per projected birthday
    Sync {
        /// Birthday records file (overrides birthdays.records_path)
        #[arg(short, long, value_name = "FILE")]
        records: Option<PathBuf>,

        /// Stop submitting after the first failed event
        #[arg(long)]
        abort_on_failure: bool,
    },

    /// Print the projected birthdays without contacting Graph
    Preview {
        /// Birthday records file (overrides birthdays.records_path)
        #[arg(short, long, value_name = "FILE")]
        records: Option<PathBuf>,

        /// Project from this year instead of the current one
        #[arg(short, long)]
        year: Option<i32>,
    },

    /// List the signed-in user's calendars
    Calendars,

    /// List the events of a calendar
    Events {
        /// Calendar id, as shown by `calendars`
        calendar_id: String,
    },

    /// Create an empty calendar
    CreateCalendar {
        name: String,

        /// Graph calendar color, e.g. lightRed or lightBlue
        #[arg(long, default_value = "auto")]
        color: CalendarColor,
    },

    /// Add a single event to a calendar
    AddEvent {
        calendar_id: String,

        #[arg(short, long)]
        subject: String,

        /// Start time in format: "YYYY-MM-DD HH:MM" (Asia/Shanghai wall clock)
        #[arg(long)]
        start: String,

        /// End time in format: "YYYY-MM-DD HH:MM"
        #[arg(long)]
        end: String,

        #[arg(long)]
        all_day: bool,

        /// Reminder this many minutes before the start
        #[arg(long, value_name = "MINUTES")]
        reminder: Option<u32>,

        #[arg(long, default_value = "busy")]
        show_as: FreeBusyStatus,

        #[arg(long, default_value = "normal")]
        importance: Importance,

        /// Plain text body
        #[arg(short, long)]
        body: Option<String>,
    },

    /// Write an example configuration file
    InitConfig {
        #[arg(default_value = "lunar-birthdays.toml")]
        path: PathBuf,
    },
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .with_context(|| format!("Invalid date/time {:?}, expected YYYY-MM-DD HH:MM", s))
}

async fn connect(config: &Config) -> Result<GraphSession> {
    GraphSession::initialize(&config.graph, |info: &DeviceCodeInfo| {
        // Tells the user where to sign in and which code to enter
        println!("{}", info.message);
    })
    .await
    .context("Failed to initialize Graph for user auth")
}

fn records_path(config: &Config, records: Option<PathBuf>) -> PathBuf {
    records.unwrap_or_else(|| config.birthdays.records_path.clone())
}

async fn project_records(path: &Path, year: i32) -> Result<Vec<BirthdayOccurrence>> {
    let records = BirthdayRecordSource::new(path).load().await?;
    let lunar = ChineseLunarCalendar::new();
    let occurrences = BirthdayProjector::new(&lunar)
        .project_all(&records, year)
        .context("Failed to project lunar birthdays")?;
    tracing::info!(
        "Projected {} birthdays from {} records starting {}",
        occurrences.len(),
        records.len(),
        year
    );
    Ok(occurrences)
}

async fn sync(config: &Config, records: Option<PathBuf>, abort_on_failure: bool) -> Result<()> {
    // Bad records fail here, before anything is created remotely
    let occurrences = project_records(&records_path(config, records), current_year()).await?;

    let session = connect(config).await?;
    let calendar = session
        .create_calendar(
            &config.birthdays.calendar_name,
            config.birthdays.calendar_color,
        )
        .await
        .context("Error creating calendar")?;
    let handle = calendar_handle(&calendar)?;
    tracing::info!(
        "Calendar {} created with id {}",
        config.birthdays.calendar_name,
        handle
    );

    let policy = if abort_on_failure {
        FailurePolicy::AbortOnFailure
    } else {
        FailurePolicy::Continue
    };
    let report = BatchedDispatcher::new(&session, EventTemplate::from(&config.event))
        .with_policy(policy)
        .dispatch(&handle, &occurrences)
        .await;

    println!(
        "Created {} of {} events in {} windows",
        report.created.len(),
        occurrences.len(),
        report.windows
    );
    for failure in &report.failures {
        println!("  failed: {} ({})", failure.title, failure.error);
    }

    if !report.is_success() {
        anyhow::bail!(
            "{} events failed, {} not submitted",
            report.failures.len(),
            report.skipped
        );
    }
    Ok(())
}

async fn preview(config: &Config, records: Option<PathBuf>, year: Option<i32>) -> Result<()> {
    let year = year.unwrap_or_else(current_year);
    let occurrences = project_records(&records_path(config, records), year).await?;

    for occurrence in &occurrences {
        println!(
            "{}  {}  ({})",
            occurrence.solar_date, occurrence.title, occurrence.lunar_label
        );
    }
    println!("{} birthdays", occurrences.len());
    Ok(())
}

async fn list_calendars(config: &Config) -> Result<()> {
    let session = connect(config).await?;
    let calendars = session
        .list_calendars()
        .await
        .context("Error getting calendars")?;

    for calendar in &calendars {
        println!(
            "[{}] {} ({:?})",
            calendar.id.as_deref().unwrap_or("-"),
            calendar.name.as_deref().unwrap_or("(unnamed)"),
            calendar.color.unwrap_or_default()
        );
    }
    println!("{} calendars", calendars.len());
    Ok(())
}

async fn list_events(config: &Config, calendar_id: String) -> Result<()> {
    let session = connect(config).await?;
    let events = session
        .list_events(&CalendarHandle::new(calendar_id))
        .await
        .context("Error getting events")?;

    for event in &events {
        let start = event
            .start
            .as_ref()
            .map(|start| start.date_time.as_str())
            .unwrap_or("-");
        println!("{}  {}", start, event.subject.as_deref().unwrap_or("(no subject)"));
    }
    println!("{} events", events.len());
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install crypto provider");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync {
            records,
            abort_on_failure,
        } => {
            let config = Config::load(&cli.config)?;
            sync(&config, records, abort_on_failure).await
        }
        Commands::Preview { records, year } => {
            let config = Config::read(&cli.config)?;
            preview(&config, records, year).await
        }
        Commands::Calendars => list_calendars(&Config::load(&cli.config)?).await,
        Commands::Events { calendar_id } => {
            list_events(&Config::load(&cli.config)?, calendar_id).await
        }
        Commands::CreateCalendar { name, color } => {
            let config = Config::load(&cli.config)?;
            let session = connect(&config).await?;
            let calendar = session
                .create_calendar(&name, color)
                .await
                .context("Error creating calendar")?;
            println!("Calendar created with id {}", calendar_handle(&calendar)?);
            Ok(())
        }
        Commands::AddEvent {
            calendar_id,
            subject,
            start,
            end,
            all_day,
            reminder,
            show_as,
            importance,
            body,
        } => {
            let config = Config::load(&cli.config)?;
            let event = NewEvent {
                all_day,
                reminder_on: reminder.is_some(),
                reminder_minutes: reminder.unwrap_or(0),
                show_as,
                importance,
                body: ItemBody::text(body.unwrap_or_default()),
                ..NewEvent::new(subject, parse_datetime(&start)?, parse_datetime(&end)?)
            };

            println!("Adding event: {}", event.subject);
            println!("  Start: {} {}", start, EVENT_TIME_ZONE);
            println!("  End:   {} {}", end, EVENT_TIME_ZONE);

            let session = connect(&config).await?;
            let created = session
                .create_event(&CalendarHandle::new(calendar_id), &event)
                .await
                .context("Error creating event")?;
            println!("Event created with id {}", created.id.unwrap_or_default());
            Ok(())
        }
        Commands::InitConfig { path } => {
            if path.exists() {
                anyhow::bail!("{} already exists", path.display());
            }
            let example = toml::to_string_pretty(&Config::example())?;
            std::fs::write(&path, example)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote example config to {}", path.display());
            Ok(())
        }
    }
}
