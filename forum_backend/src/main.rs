use anyhow::Result;
use clap::{Parser, Subcommand};
use forum_backend::api;
use forum_backend::boards::BoardService;
use forum_backend::bootstrap;
use forum_backend::config::ForumConfig;
use forum_backend::telemetry;
use forum_backend::utils;

#[derive(Parser)]
#[command(author, version, about = "Discussion forum server and admin CLI")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (pages and JSON API)
    Serve,
    /// Create a new board
    AddBoard {
        #[arg(long)]
        slug: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Print every board
    ListBoards,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let args = Args::parse();

    let config = ForumConfig::from_env()?;
    let resources = bootstrap::initialize(&config)?;
    tracing::info!(
        app = utils::APP_NAME,
        db = %config.paths.db_path.display(),
        new_database = resources.database_initialized,
        created = ?resources.directories_created,
        "bootstrap complete"
    );

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => api::serve_http(config, resources.database).await,
        Command::AddBoard {
            slug,
            title,
            description,
        } => {
            let board = BoardService::new(resources.database).create(&slug, &title, &description)?;
            println!("created board {} ({}) with id {}", board.slug, board.title, board.id);
            Ok(())
        }
        Command::ListBoards => {
            for board in BoardService::new(resources.database).list()? {
                println!("{:>4}  {:<12} {}", board.id, board.slug, board.title);
            }
            Ok(())
        }
    }
}
