use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use famcal_assistant::Assistant;
use famcal_calendar::{
    calculate_event_layouts, day_bounds, EventService, NewEvent, Priority, SqliteEventStore,
};
use famcal_core::{keys, Config, KeyValueStore, KeyValueStoreExt, SqliteKvStore};
use famcal_google::{GoogleCalendarClient, GoogleSync};
use famcal_tasks::{NewTask, QuickEntry, SqliteTaskStore, TaskService, Timeframe};

const USAGE: &str = "usage: famcal [today | add <text> | ask <message> | sync]";

struct App {
    config: Config,
    kv: Arc<dyn KeyValueStore>,
    events: EventService,
    tasks: TaskService,
}

impl App {
    fn open() -> Result<Self> {
        let (config, _) = Config::load_validated()?;
        std::fs::create_dir_all(&config.data_dir).context("Failed to create data directory")?;
        let db = config.database_path();

        let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteKvStore::new(&db)?);
        let events = EventService::new(SqliteEventStore::new(&db)?, &config.calendar);
        let tasks = TaskService::new(SqliteTaskStore::new(&db)?);
        tracing::info!(db = %db.display(), "Stores opened");

        Ok(Self {
            config,
            kv,
            events,
            tasks,
        })
    }

    fn tz(&self) -> Tz {
        self.config.calendar.tz()
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz()).date_naive()
    }

    fn member_id(&self) -> String {
        self.kv
            .get(keys::FAMILY)
            .ok()
            .flatten()
            .and_then(|f| f.current_member().map(|m| m.id.clone()))
            .unwrap_or_else(|| "1".to_string())
    }

    async fn agenda(&self) -> Result<()> {
        let tz = self.tz();
        let today = self.today();
        let (start, end) = day_bounds(today, &tz).context("No local day bounds for today")?;
        let events = self.events.load_events(start, end).await?;
        let layouts = calculate_event_layouts(&events, today, tz);

        println!("{}", today.format("%A %d %B %Y"));
        if events.is_empty() {
            println!("  Nothing scheduled.");
        }
        for event in &events {
            let when = if event.is_all_day {
                "all day".to_string()
            } else {
                format!(
                    "{}-{}",
                    event.start.with_timezone(&tz).format("%H:%M"),
                    event.end.with_timezone(&tz).format("%H:%M")
                )
            };
            let column = layouts
                .get(&event.id)
                .map(|l| format!(" [{}/{}]", l.column + 1, l.columns))
                .unwrap_or_default();
            println!("  {when:>11}  {} {}{column}", event.emoji, event.title);
        }

        let open = self.tasks.list_open().await?;
        if !open.is_empty() {
            println!("\nOpen tasks:");
            for task in famcal_tasks::rank_tasks(&open) {
                println!("  {:>3}  {} ({})", task.score, task.title, task.quadrant.label());
            }
        }
        Ok(())
    }

    /// Timed entries become events, everything else a task.
    async fn add(&self, text: &str) -> Result<()> {
        let entry = QuickEntry::from_text(text, self.config.calendar.language, self.today());
        if entry.title.is_empty() {
            anyhow::bail!("Nothing to add");
        }

        if let Some(time) = entry.time {
            let date = entry.date.unwrap_or_else(|| self.today());
            let start = self
                .tz()
                .from_local_datetime(&date.and_time(time))
                .earliest()
                .context("Time does not exist in the local timezone")?
                .with_timezone(&Utc);
            let end = start + Duration::hours(1);
            let mut new_event = NewEvent::new(entry.title, start, end, self.member_id());
            new_event.location = entry.location;
            new_event.priority = entry.priority.unwrap_or_default();
            let event = self.events.create_event(new_event).await?;
            println!(
                "Added event \"{}\" at {}",
                event.title,
                start.with_timezone(&self.tz()).format("%a %d %b %H:%M")
            );
            return Ok(());
        }

        let mut new_task = NewTask::new(entry.title);
        match entry.priority {
            Some(Priority::High) => new_task.urgency = 5,
            Some(Priority::Low) => new_task.urgency = 2,
            Some(Priority::Medium) | None => {}
        }
        new_task.timeframe = match entry.date {
            Some(d) if d == self.today() => Timeframe::Today,
            Some(d) if d < self.today() + Duration::days(7) => Timeframe::ThisWeek,
            Some(_) => Timeframe::ThisMonth,
            None => Timeframe::Someday,
        };
        new_task.description = entry.location.map(|l| format!("At {l}"));
        let task = self.tasks.create_task(new_task).await?;
        println!("Added task \"{}\" ({})", task.title, task.timeframe.as_str());
        Ok(())
    }

    async fn ask(&self, message: &str) -> Result<()> {
        let assistant = Assistant::from_config(
            &self.config,
            self.events.clone(),
            self.tasks.clone(),
            self.kv.clone(),
        )
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

        let reply = match assistant.send(message).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Assistant failed: {}", e);
                anyhow::bail!(e.user_message());
            }
        };
        if !reply.content.is_empty() {
            println!("{}", reply.content);
        }
        for line in &reply.results {
            println!("{line}");
        }
        for button in &reply.followup_buttons {
            println!("  > {button}");
        }
        Ok(())
    }

    async fn sync(&self) -> Result<()> {
        let retry = self.config.retry.to_retry_config();
        let client = GoogleCalendarClient::from_config(&self.config.google, retry)?;
        let sync = GoogleSync::new(
            client,
            self.kv.clone(),
            self.events.clone(),
            &self.config.google,
        );
        let report = sync.pull().await?;
        println!(
            "Synced {} event(s) from {} calendar(s)",
            report.events, report.calendars
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    famcal_core::init()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let app = App::open()?;
    tracing::info!("famcal started");

    match args.first().map(String::as_str) {
        None | Some("today") => app.agenda().await,
        Some("add") if args.len() > 1 => app.add(&args[1..].join(" ")).await,
        Some("ask") if args.len() > 1 => app.ask(&args[1..].join(" ")).await,
        Some("sync") => app.sync().await,
        _ => {
            eprintln!("{USAGE}");
            Ok(())
        }
    }
}
