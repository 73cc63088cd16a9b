use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use school_authz::{Role, TokenAuthority};
use school_kernel::settings::Settings;
use school_library_ui::{render, CatalogQuery, LibraryClient, LibraryController, NewBook};
use time::OffsetDateTime;

#[derive(Debug, Parser)]
#[command(name = "school", version, about = "School library service and operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP service until Ctrl-C.
    Serve,
    /// Apply pending database migrations and exit.
    Migrate,
    /// Mint a bearer token signed with the configured secret.
    Token {
        #[arg(long)]
        sub: String,
        #[arg(long, default_value = "librarian")]
        role: String,
        #[arg(long, default_value_t = 12)]
        ttl_hours: i64,
    },
    /// Talk to a running service.
    Library(LibraryArgs),
}

#[derive(Debug, Args)]
struct LibraryArgs {
    #[arg(long, env = "SCHOOL_API_URL", default_value = "http://localhost:5000")]
    api_url: String,
    #[arg(long, env = "SCHOOL_TOKEN", hide_env_values = true)]
    token: Option<String>,
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
    #[command(subcommand)]
    command: LibraryCommand,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Html,
}

#[derive(Debug, Subcommand)]
enum LibraryCommand {
    /// List the catalog. `--class` wins over `--search`.
    Books {
        #[arg(long = "class")]
        class_name: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Add a title to the catalog.
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long = "class")]
        class_name: String,
        #[arg(long, default_value = "")]
        genre: String,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, default_value_t = 1)]
        copies: i64,
    },
    /// Issue one copy of a book to a student (id or admission number).
    Issue {
        #[arg(long)]
        book: String,
        #[arg(long)]
        student: String,
    },
    /// Close an open issue record.
    Return { issue_id: String },
    /// Show the issue ledger.
    Issued,
    /// Delete books one after another; failures do not stop the run.
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Write the given books to a CSV file.
    Export {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => school_app::serve(&operator_settings()?).await,
        Command::Migrate => {
            let applied = school_app::migrate(&operator_settings()?).await?;
            println!("applied {applied} migration(s)");
            Ok(())
        }
        Command::Token { sub, role, ttl_hours } => {
            let role: Role = role.parse()?;
            let settings = operator_settings()?;
            let authority = TokenAuthority::new(settings.auth.jwt_secret.as_bytes())
                .context("auth.jwt_secret must be configured to mint tokens")?;
            let token = authority.issue(&sub, role, time::Duration::hours(ttl_hours))?;
            println!("{token}");
            Ok(())
        }
        Command::Library(args) => library(args).await,
    }
}

/// Service-side settings with telemetry installed. Library commands are
/// plain API clients and never read them.
fn operator_settings() -> anyhow::Result<Settings> {
    let settings = Settings::load().with_context(|| "failed to load school settings")?;
    school_telemetry::init(&settings.telemetry)?;
    Ok(settings)
}

async fn library(args: LibraryArgs) -> anyhow::Result<()> {
    let client = LibraryClient::new(&args.api_url, args.token)?;
    let mut controller = LibraryController::new(client);
    let format = args.format;

    let outcome = run_library(&mut controller, args.command, format).await;
    for notification in controller.take_notifications() {
        eprintln!("{notification}");
    }
    outcome
}

async fn run_library(
    controller: &mut LibraryController<LibraryClient>,
    command: LibraryCommand,
    format: Format,
) -> anyhow::Result<()> {
    match command {
        LibraryCommand::Books { class_name, search } => {
            if !controller.set_query(CatalogQuery { class_name, search }).await {
                bail!("could not load the catalog");
            }
            let selection = controller.selection();
            match format {
                Format::Text => print!("{}", render::catalog_text(controller.catalog(), selection)),
                Format::Html => println!("{}", render::catalog_html(controller.catalog(), selection)),
            }
        }
        LibraryCommand::Add {
            title,
            author,
            class_name,
            genre,
            year,
            copies,
        } => {
            let book = controller
                .add_book(&NewBook {
                    title,
                    author,
                    year,
                    genre,
                    class_name,
                    copies,
                })
                .await?;
            println!("{}", book.id);
        }
        LibraryCommand::Issue { book, student } => {
            let record = controller.issue(&book, &student).await?;
            println!("{}", record.id);
        }
        LibraryCommand::Return { issue_id } => {
            let record = controller.return_issue(&issue_id).await?;
            println!("returned {} (fine {})", record.id, record.fine);
        }
        LibraryCommand::Issued => {
            if !controller.reload_ledger().await {
                bail!("could not load the issue ledger");
            }
            match format {
                Format::Text => print!("{}", render::ledger_text(controller.ledger())),
                Format::Html => println!("{}", render::ledger_html(controller.ledger())),
            }
            eprintln!(
                "{} record(s), {} open",
                controller.issued_count(),
                controller.ledger().open_count()
            );
        }
        LibraryCommand::Delete { ids } => {
            controller.init().await;
            for id in controller.select(&ids) {
                eprintln!("skipped {id}: not in the catalog");
            }

            let report = controller.bulk_delete().await;
            for id in &report.deleted {
                println!("deleted {id}");
            }
            for (id, reason) in &report.failed {
                eprintln!("failed {id}: {reason}");
            }
            if !report.is_complete() {
                bail!(
                    "{} of {} deletions failed",
                    report.failed.len(),
                    report.failed.len() + report.deleted.len()
                );
            }
        }
        LibraryCommand::Export { ids, out } => {
            controller.init().await;
            for id in controller.select(&ids) {
                eprintln!("skipped {id}: not in the catalog");
            }

            let today = OffsetDateTime::now_utc().date();
            let Some(export) = controller.export_selected(today).await? else {
                bail!("nothing to export");
            };
            let path = out.unwrap_or_else(|| PathBuf::from(&export.file_name));
            std::fs::write(&path, export.contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn library_flags_parse() {
        let cli = Cli::try_parse_from([
            "school",
            "library",
            "--api-url",
            "http://127.0.0.1:9",
            "--format",
            "html",
            "books",
            "--class",
            "Form 2",
        ])
        .unwrap();

        let Command::Library(args) = cli.command else {
            panic!("expected library command");
        };
        assert_eq!(args.api_url, "http://127.0.0.1:9");
        assert!(matches!(args.format, Format::Html));
        assert!(matches!(
            args.command,
            LibraryCommand::Books { class_name: Some(ref c), search: None } if c == "Form 2"
        ));
    }

    #[test]
    fn delete_requires_ids() {
        assert!(Cli::try_parse_from(["school", "library", "delete"]).is_err());
    }
}
