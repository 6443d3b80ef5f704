use std::path::PathBuf;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use fern::colors::{Color, ColoredLevelConfig};
use log::{debug, LevelFilter};
use birdtag_lib::cli;
use birdtag_lib::cli::{parse_species_arg, SearchArgs};
use birdtag_lib::config::AppConfig;
use birdtag_lib::entities::TagOperation;
use birdtag_lib::query::{FileTypeFilter, SortKey};

#[derive(Parser, Debug)]
#[command(name = "birdtag", version, about = "Browse, tag and upload bird media")]
struct Cli {
    #[arg(long, env = "BIRDTAG_WORKDIR", help = "Directory holding config.json and the session file")]
    workdir: Option<PathBuf>,

    #[arg(long, env = "BIRDTAG_CONFIG", help = "Path to config.json")]
    config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, help = "Increase log verbosity")]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long, env = "BIRDTAG_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Register a new account
    SignUp {
        #[arg(long)]
        email: String,
        #[arg(long, env = "BIRDTAG_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, env = "BIRDTAG_CONFIRM_PASSWORD", hide_env_values = true)]
        confirm_password: String,
    },
    /// Confirm a new account with the emailed code
    Confirm {
        #[arg(long)]
        email: String,
        #[arg(long)]
        code: String,
    },
    /// Drop the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Search media by species, then filter, sort and page locally
    Search(SearchCommand),
    /// Print the full-size URL for a thumbnail
    Fullsize { thumb_url: String },
    /// Add or remove tags on stored files
    Tags {
        #[command(subcommand)]
        action: TagsCommand,
    },
    /// Upload files to the media bucket
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, help = "Comma separated tags")]
        tags: Option<String>,
    },
    /// Get notified when a species is uploaded
    Subscribe { species: String },
    /// Stop notifications for a species
    Unsubscribe { species: String },
    /// Read or change config.json
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Args, Debug)]
struct SearchCommand {
    #[arg(long, value_parser = parse_species_arg, help = "name or name:count, repeatable")]
    species: Vec<(String, u32)>,
    #[arg(long, default_value = "all")]
    file_type: FileTypeFilter,
    #[arg(long, help = "Only thumbnails whose URL contains this text")]
    thumb: Option<String>,
    #[arg(long, default_value_t = 0)]
    min_count: u32,
    #[arg(long, default_value = "date")]
    sort: SortKey,
    #[arg(long, default_value_t = 1)]
    page: usize,
    #[arg(long, help = "Browse the built-in sample media instead of the API")]
    offline: bool,
}

#[derive(Args, Debug)]
struct TagTarget {
    #[arg(long = "url", required = true)]
    urls: Vec<String>,
    #[arg(long = "tag", required = true)]
    tags: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum TagsCommand {
    Add(TagTarget),
    Remove(TagTarget),
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Get { key: String },
    Set { key: String, value: String },
}

fn setup_logger(verbose: u8) -> anyhow::Result<()> {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red)
        .debug(Color::Blue);
    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("reqwest", LevelFilter::Warn)
        .level_for("hyper_util", LevelFilter::Warn)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    setup_logger(args.verbose)?;

    let mut config = AppConfig::load(args.workdir, args.config)?;
    debug!("workdir: {}", config.workdir.display());

    let ok = match args.command {
        Command::SignIn { email, password } => cli::sign_in(&config, &email, &password).await?,
        Command::SignUp { email, password, confirm_password } => cli::sign_up(&config, &email, &password, &confirm_password).await?,
        Command::Confirm { email, code } => cli::confirm(&config, &email, &code).await?,
        Command::Logout => cli::logout(&config).await?,
        Command::Whoami => cli::whoami(&config).await?,
        Command::Search(search) => {
            let search_args = SearchArgs {
                species: search.species,
                file_type: search.file_type,
                thumbnail_substring: search.thumb,
                min_count: search.min_count,
                sort: search.sort,
                page: search.page,
                offline: search.offline,
            };
            cli::search(&config, search_args).await?
        }
        Command::Fullsize { thumb_url } => cli::fullsize(&config, &thumb_url).await?,
        Command::Tags { action } => match action {
            TagsCommand::Add(target) => cli::update_tags(&config, &target.urls, TagOperation::Add, &target.tags).await?,
            TagsCommand::Remove(target) => cli::update_tags(&config, &target.urls, TagOperation::Remove, &target.tags).await?,
        },
        Command::Upload { files, tags } => cli::upload(&config, &files, tags.as_deref()).await?,
        Command::Subscribe { species } => cli::subscribe(&config, &species, true).await?,
        Command::Unsubscribe { species } => cli::subscribe(&config, &species, false).await?,
        Command::Config { action } => match action {
            ConfigCommand::Get { key } => {
                println!("{}", cli::get_config_value(&config, &key)?);
                true
            }
            ConfigCommand::Set { key, value } => {
                cli::set_config_value(&mut config, &key, &value)?;
                println!("{} {} = {}", "Saved".green(), key, value);
                true
            }
        },
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_passwords_can_come_from_env() {
        let command = Cli::command();
        let sign_up = command.find_subcommand("sign-up").unwrap();
        for (id, env) in [("password", "BIRDTAG_PASSWORD"), ("confirm_password", "BIRDTAG_CONFIRM_PASSWORD")] {
            let arg = sign_up.get_arguments().find(|x| x.get_id() == id).unwrap();
            assert_eq!(arg.get_env().and_then(|x| x.to_str()), Some(env));
            assert!(arg.is_hide_env_values_set());
        }
    }
}
