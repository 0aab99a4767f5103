//! schoolcache - command-line front end for the school-management backend.
//!
//! Every read goes through the cached client, so the commands keep working
//! from cached responses for a few minutes after the backend goes away.

use std::io;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use schoolcache_core::chat::ChatSession;
use schoolcache_core::models::{
    AttendanceStatus, AttendanceSummary, EventsResponse, FormattedScore, NewEvent, NewStudent,
    ScoreEntry,
};
use schoolcache_core::prefetch::prefetch_all;
use schoolcache_core::{ApiClient, Config};

// ============================================================================
// Constants
// ============================================================================

/// Log file name prefix inside `log_dir`
const LOG_FILE_PREFIX: &str = "schoolcache.log";

const USAGE: &str = "\
Usage: schoolcache <command> [args]

Reads:
  students                            List every student
  profile <guardian_mob> <dob>        Look up a student by guardian mobile and date of birth
  scores <student_id>                 Marks per sitting with averages
  attendance <student_id>             Attendance records and summary
  events                              Upcoming events
  report <student_id>                 Scores, attendance and events together
  warm                                Fetch everything into the cache

Writes:
  add-student <json>                  Create a student from a JSON body
  modify-student <student_id> <json>  Replace a student's editable fields
  remark <student_id> <text>          Set a student's remark
  delete-student <student_id>         Delete a student
  add-score <json>                    Record a mark
  mark-attendance <student_id> <date> <P|A>
  add-event <json>                    Create an event

Other:
  cache status                        List cached responses and their age
  cache clear                         Remove every cached response
  chat                                Talk to the demo assistant
";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; when `log_dir` is set they are also written to a daily
/// file there. The returned guard must be held until exit to flush it.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load()?;
    let _guard = init_tracing(config.log_dir.as_deref());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprint!("{}", USAGE);
        return Ok(());
    };
    if matches!(command.as_str(), "-h" | "--help" | "help") {
        print!("{}", USAGE);
        return Ok(());
    }

    if command == "chat" {
        return run_chat(&config).await;
    }

    let client = config.build_client()?;
    info!(base_url = %client.base_url(), command = %command, "schoolcache starting");

    let result = run_command(&client, command, &args[1..]).await;

    if !client.is_online() {
        eprintln!("Offline: the backend could not be reached; cached data was used where available.");
    }
    result
}

async fn run_command(client: &ApiClient, command: &str, args: &[String]) -> Result<()> {
    match command {
        "students" => print_json(&client.fetch_students().await?),
        "profile" => {
            let [mob, dob] = expect_args::<2>(command, args)?;
            print_json(&client.fetch_student_profile(mob, dob).await?)
        }
        "scores" => {
            let [id] = expect_args::<1>(command, args)?;
            let entries = client.fetch_student_scores(id).await?;
            print_scores(&FormattedScore::from_entries(&entries));
            Ok(())
        }
        "attendance" => {
            let [id] = expect_args::<1>(command, args)?;
            let entries = client.fetch_student_attendance(id).await?;
            print_json(&entries)?;
            print_summary(&AttendanceSummary::from_entries(&entries));
            Ok(())
        }
        "events" => {
            let events = EventsResponse { events: client.fetch_events().await? };
            print_json(&events.upcoming(&today()))
        }
        "report" => {
            let [id] = expect_args::<1>(command, args)?;
            run_report(client, id).await
        }
        "warm" => {
            let report = prefetch_all(client).await?;
            println!(
                "Cached {} responses for {} students ({} failed)",
                report.fetched,
                report.students,
                report.failed.len()
            );
            for (what, error) in &report.failed {
                eprintln!("  {}: {}", what, error);
            }
            Ok(())
        }
        "add-student" => {
            let [body] = expect_args::<1>(command, args)?;
            let student: NewStudent = parse_body(body)?;
            let response = client.add_student(&student).await?;
            match response.student_id {
                Some(id) => println!("Added student {}", id),
                None => println!("{}", response.message.unwrap_or_else(|| "Student added".to_string())),
            }
            Ok(())
        }
        "modify-student" => {
            let [id, body] = expect_args::<2>(command, args)?;
            let student: NewStudent = parse_body(body)?;
            println!("{}", client.modify_student(id, &student).await?.message);
            Ok(())
        }
        "remark" => {
            let [id, remark] = expect_args::<2>(command, args)?;
            println!("{}", client.modify_remark(id, remark).await?.message);
            Ok(())
        }
        "delete-student" => {
            let [id] = expect_args::<1>(command, args)?;
            println!("{}", client.delete_student(id).await?.message);
            Ok(())
        }
        "add-score" => {
            let [body] = expect_args::<1>(command, args)?;
            let score: ScoreEntry = parse_body(body)?;
            println!("{}", client.add_score(&score).await?.message);
            Ok(())
        }
        "mark-attendance" => {
            let [id, date, status] = expect_args::<3>(command, args)?;
            let status: AttendanceStatus = status.parse().map_err(|e: String| anyhow!(e))?;
            print_json(&client.add_attendance(id, date, status).await?)
        }
        "add-event" => {
            let [body] = expect_args::<1>(command, args)?;
            let event: NewEvent = parse_body(body)?;
            println!("{}", client.add_event(&event).await?.message);
            Ok(())
        }
        "cache" => match args.first().map(String::as_str) {
            Some("status") => {
                print_cache_status(client);
                Ok(())
            }
            Some("clear") => {
                println!("Removed {} cached responses", client.clear_cache());
                Ok(())
            }
            _ => bail!("Usage: schoolcache cache <status|clear>"),
        },
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
}

/// Fetch one student's scores and attendance alongside the event list
async fn run_report(client: &ApiClient, student_id: &str) -> Result<()> {
    let (scores, attendance, events) = tokio::join!(
        client.fetch_student_scores(student_id),
        client.fetch_student_attendance(student_id),
        client.fetch_events(),
    );

    println!("== Scores ==");
    match scores {
        Ok(entries) => print_scores(&FormattedScore::from_entries(&entries)),
        Err(e) => println!("  unavailable: {}", e),
    }

    println!("\n== Attendance ==");
    match attendance {
        Ok(entries) => print_summary(&AttendanceSummary::from_entries(&entries)),
        Err(e) => println!("  unavailable: {}", e),
    }

    println!("\n== Upcoming events ==");
    match events {
        Ok(events) => {
            let events = EventsResponse { events };
            let upcoming = events.upcoming(&today());
            if upcoming.is_empty() {
                println!("  none");
            }
            for event in upcoming {
                println!("  {} {}  {}", event.date, event.time, event.title);
            }
        }
        Err(e) => println!("  unavailable: {}", e),
    }
    Ok(())
}

/// Interactive demo assistant: one line in, one delayed reply out.
async fn run_chat(config: &Config) -> Result<()> {
    let session = ChatSession::new(config.chat_reply_delay());
    let mut transcript = session.subscribe();
    let mut shown = 0;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        for message in &transcript.borrow_and_update()[shown..] {
            let speaker = if message.is_user { "you" } else { "bot" };
            println!("{}: {}", speaker, message.text);
        }
        shown = transcript.borrow().len();

        if session.pending_replies() > 0 {
            transcript.changed().await.context("Chat session closed")?;
            continue;
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if matches!(line.trim(), "quit" | "exit") {
            break;
        }
        if session.send(&line) {
            // The user's own line is already on screen
            shown += 1;
        }
    }

    session.close();
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn expect_args<'a, const N: usize>(command: &str, args: &'a [String]) -> Result<[&'a str; N]> {
    if args.len() != N {
        bail!("'{}' takes {} argument(s), got {}\n\n{}", command, N, args.len(), USAGE);
    }
    let mut out = [""; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg.as_str();
    }
    Ok(out)
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).context("Request body is not valid JSON for this command")
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

fn fmt_mark(mark: Option<f64>) -> String {
    mark.map(|m| format!("{:.0}", m)).unwrap_or_else(|| "-".to_string())
}

fn print_scores(rows: &[FormattedScore]) {
    if rows.is_empty() {
        println!("  no scores recorded");
        return;
    }
    println!(
        "  {:<12} {:<8} {:>5} {:>7} {:>7} {:>7} {:>7}",
        "Date", "Test", "Math", "Science", "English", "History", "Avg"
    );
    for row in rows {
        let avg = row
            .average()
            .map(|a| format!("{:.1}", a))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<12} {:<8} {:>5} {:>7} {:>7} {:>7} {:>7}",
            row.date,
            row.test_type.to_string(),
            fmt_mark(row.math),
            fmt_mark(row.science),
            fmt_mark(row.english),
            fmt_mark(row.history),
            avg
        );
    }
}

fn print_summary(summary: &AttendanceSummary) {
    println!(
        "  {} days recorded: {} present, {} absent ({:.1}% present)",
        summary.total_days, summary.present_days, summary.absent_days, summary.present_rate
    );
}

fn print_cache_status(client: &ApiClient) {
    let stats = client.cache().stats();
    println!(
        "{} cached responses ({} valid, {} expired), {} bytes stored, TTL {}s",
        stats.entries.len(),
        stats.valid_count(),
        stats.expired_count(),
        stats.used_bytes,
        client.cache().ttl_ms() / 1000
    );
    for entry in &stats.entries {
        let marker = if entry.expired { " (expired)" } else { "" };
        println!("  {:<45} {:>8}  {}{}", entry.key, entry.bytes, entry.age, marker);
    }
}
