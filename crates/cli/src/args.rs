use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "celi", version, about = "Offline cache proxy and cache administration for the celi app")]
pub struct Cli {
    /// Cache database path (overrides CELI_DB_PATH)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Current cache generation (overrides CELI_CACHE_NAME)
    #[arg(long, global = true)]
    pub cache_name: Option<String>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the caching proxy in front of the app origin
    Serve(ServeArgs),
    /// List cache generations with entry counts and sizes
    Generations,
    /// List the entries of a generation
    Entries(EntriesArgs),
    /// Show one stored response
    Get(GetArgs),
    /// Delete a generation, or every generation except the current one
    Purge(PurgeArgs),
    /// Fetch the user/session snapshot from the backend
    Dashboard(SessionArgs),
    /// Submit a profile edit to the backend
    Profile(ProfileArgs),
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Listen address (overrides CELI_LISTEN_ADDR)
    #[arg(long)]
    pub listen: Option<String>,

    /// App origin (overrides CELI_ORIGIN)
    #[arg(long)]
    pub origin: Option<String>,
}

#[derive(Args, Debug)]
pub struct EntriesArgs {
    /// Generation to list (default: current)
    #[arg(long)]
    pub generation: Option<String>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// URL or origin-relative path
    pub url: String,

    /// Generation to read (default: current)
    #[arg(long)]
    pub generation: Option<String>,

    /// Print the stored body instead of metadata
    #[arg(long)]
    pub body: bool,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct PurgeArgs {
    /// Generation to delete
    #[arg(long)]
    pub generation: Option<String>,

    /// Delete every generation except the current one
    #[arg(long)]
    pub stale: bool,
}

#[derive(Args, Debug, Default)]
pub struct SessionArgs {
    /// Raw Cookie header for an authenticated session
    #[arg(long, env = "CELI_SESSION_COOKIE")]
    pub cookie: Option<String>,
}

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    #[arg(long)]
    pub first_name: Option<String>,

    #[arg(long)]
    pub last_name: Option<String>,

    #[arg(long)]
    pub bio: Option<String>,

    /// Aura color as #rrggbb
    #[arg(long)]
    pub aura_color: Option<String>,

    /// Send JSON instead of a form body
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_purge_requires_one_target() {
        assert!(Cli::try_parse_from(["celi", "purge"]).is_err());
        assert!(Cli::try_parse_from(["celi", "purge", "--stale", "--generation", "v1"]).is_err());

        let cli = Cli::try_parse_from(["celi", "purge", "--stale"]).unwrap();
        assert!(matches!(cli.cmd, Command::Purge(PurgeArgs { stale: true, generation: None })));
    }

    #[test]
    fn test_parse_global_overrides() {
        let cli = Cli::try_parse_from(["celi", "generations", "--db", "/tmp/c.sqlite", "--cache-name", "v2"]).unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/c.sqlite")));
        assert_eq!(cli.cache_name.as_deref(), Some("v2"));
    }

    #[test]
    fn test_parse_profile() {
        let cli = Cli::try_parse_from(["celi", "profile", "--bio", "hi", "--json", "--cookie", "session=x"]).unwrap();
        let Command::Profile(args) = cli.cmd else { panic!("expected profile") };
        assert_eq!(args.bio.as_deref(), Some("hi"));
        assert!(args.json);
        assert_eq!(args.session.cookie.as_deref(), Some("session=x"));
    }
}
