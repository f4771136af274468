use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::{DetailState, ListState, ReportDraft, StatusBuckets, SyncClient};
use shared::domain::{Report, ReportAction, ReportId, UserRef, Viewer};
use storage::SqliteStore;

mod config;

#[derive(Parser, Debug)]
struct Cli {
    /// Overrides the configured store location.
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    uid: String,
    #[arg(long)]
    email: String,
    /// Grants the admin role for this invocation.
    #[arg(long, default_value_t = false)]
    admin: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Files a new report.
    File {
        title: String,
        description: String,
        #[arg(long, default_value = "normal")]
        urgency: String,
        #[arg(long, default_value = "general")]
        category: String,
    },
    /// Prints the live report buckets for this viewer.
    List,
    /// Prints one report.
    Show { id: String },
    /// Appends a comment to a report.
    Comment { id: String, text: String },
    /// Applies a status action: 0|1|2 set the status, 3 deletes.
    Status { id: String, action: u8 },
    /// Deletes a report.
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let settings = config::load_settings();
    let database_url = cli.database_url.unwrap_or(settings.database_url);
    let store = Arc::new(SqliteStore::new(&database_url).await?);

    let viewer = Viewer::new(UserRef::new(cli.uid, cli.email), cli.admin);
    let client = SyncClient::new(store, viewer);

    match cli.command {
        Command::File {
            title,
            description,
            urgency,
            category,
        } => {
            let id = client
                .reports()
                .create(ReportDraft {
                    title,
                    description,
                    urgency,
                    category,
                })
                .await?;
            println!("filed report id={id}");
        }
        Command::List => {
            let handle = client.watch_reports().await?;
            let mut state = handle.state();
            while matches!(*state.borrow(), ListState::Loading) {
                state.changed().await?;
            }
            match state.borrow().clone() {
                ListState::Ready(buckets) => print_buckets(&buckets),
                ListState::Failed(message) => println!("list failed: {message}"),
                ListState::Loading => {}
            }
            handle.detach();
        }
        Command::Show { id } => match client.reports().get_one(&ReportId::from(id)).await? {
            Some(report) => print_report(&report),
            None => println!("no results found"),
        },
        Command::Comment { id, text } => {
            client
                .reports()
                .append_comment(&ReportId::from(id), text)
                .await?;
            println!("comment added");
        }
        Command::Status { id, action } => {
            let Some(action) = ReportAction::from_raw(action) else {
                anyhow::bail!("invalid action {action}; expected 0..=3");
            };
            let handle = client.watch_report(ReportId::from(id)).await?;
            let mut state = handle.state();
            while matches!(*state.borrow(), DetailState::Loading) {
                state.changed().await?;
            }
            handle.apply(action).await?;
            println!("action applied");
            handle.detach();
        }
        Command::Delete { id } => {
            client.reports().delete(&ReportId::from(id)).await?;
            println!("report deleted");
        }
    }

    Ok(())
}

fn print_buckets(buckets: &StatusBuckets) {
    let pending = buckets.pending();
    println!("pending ({}):", pending.len());
    for report in pending {
        print_line(report);
    }
    println!("closed ({}):", buckets.closed.len());
    for report in &buckets.closed {
        print_line(report);
    }
}

fn print_line(report: &Report) {
    println!(
        "  {} {} [{}] owner={}",
        report.id,
        report.title,
        report.status.label(),
        report.owner.email
    );
}

fn print_report(report: &Report) {
    println!("{} [{}]", report.title, report.status.label());
    println!(
        "filed by {} at {} (urgency: {}, category: {})",
        report.owner.email, report.created_at, report.urgency, report.category
    );
    for comment in &report.comments {
        println!("  {} at {}: {}", comment.author.email, comment.created_at, comment.text);
    }
}
