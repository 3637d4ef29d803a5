//! Creates a staff account. There is no admin UI, so this is how the first staff user appears.

use clap::Parser;
use shopcatalog::config::Config;
use shopcatalog::db::Database;
use shopcatalog::models::Role;

#[derive(Parser, Debug)]
#[command(name = "create_staff", about = "Create a staff user for the catalog")]
struct Args {
    #[arg(long)]
    username: String,

    #[arg(long, default_value = "")]
    email: String,

    #[arg(long)]
    password: String,

    /// Overrides the configured database path
    #[arg(long)]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = Config::load()?;
    let path = args.database.unwrap_or(config.database_path);

    let db = Database::new(&path)?;
    db.create_schema().await?;
    let user = db
        .create_user(&args.username, &args.email, &args.password, Role::Staff)
        .await?;
    println!("Created staff user '{}' (id {}) in {}", user.username, user.id, path);
    Ok(())
}
