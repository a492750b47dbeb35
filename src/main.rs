use chrono::Utc;
use clap::Parser;
use log::{debug, error};
use pawflow::{config, connect, AppConfig, AppError, Cli};

fn main() {
    // .env antes del logger para que RUST_LOG pueda venir de ahí.
    let dotenv = config::load_dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Some(path) = dotenv {
        debug!("loaded env file {}", path.display());
    }

    let cli = Cli::parse();
    match run(&cli) {
        Ok(out) => println!("{out}"),
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

fn run(cli: &Cli) -> Result<String, AppError> {
    let config = AppConfig::from_env()?;
    let app = connect(&config)?;
    let now = cli.now.unwrap_or_else(Utc::now);
    app.execute(&cli.command, now)?.render(cli.json)
}
