use std::ffi::OsString;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{Args, CommandFactory, Parser, Subcommand};

const KEYS: &str = "Keys: j/k move, space play/pause, l like, c comments, i type, Enter send,
      s share, o open, p profile, r retry, q quit";

/// Reels-TUI - Scroll, like and comment on short videos from the terminal.
#[derive(Parser, Debug)]
#[command(name = "reels-tui")]
#[command(version, about, long_about = None, after_help = KEYS)]
pub struct Cli {
    /// Browse built-in sample reels without a server
    #[arg(long)]
    pub offline: bool,

    /// Use a different config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in (password from REELS_PASSWORD or stdin)
    Login { email: String },

    /// Forget the stored session
    Logout,

    /// Create an account and send a verification email
    Register { email: String },

    /// Confirm an email address
    Verify { token: String },

    /// Upload a reel
    Upload(UploadArgs),

    /// Print a user's profile and videos
    Profile { user: String },

    /// Save the service base URL to the config file
    Server { url: String },
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct UploadArgs {
    /// Vertical MP4/WebM/MOV clip, at most 100 MB
    #[arg(long, value_name = "PATH")]
    pub video: PathBuf,

    /// JPEG/PNG/WebP cover image, at most 5 MB
    #[arg(long, value_name = "PATH")]
    pub thumbnail: PathBuf,

    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub description: String,

    /// Clip length in seconds when the media host can't tell
    #[arg(long, value_name = "SECS")]
    pub duration: Option<f64>,
}

/// Parses arguments including the program name. `--offline` only applies to the feed.
pub fn parse_from<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    if cli.offline && cli.command.is_some() {
        return Err(Cli::command().error(
            ErrorKind::ArgumentConflict,
            "--offline only applies to the feed and can't be combined with a subcommand",
        ));
    }
    Ok(cli)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        parse_from(std::iter::once("reels-tui").chain(args.iter().copied()))
    }

    #[test]
    fn no_arguments_opens_the_feed() {
        let cli = parse(&[]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.offline);

        let cli = parse(&["--offline", "--config", "/tmp/r.yaml"]).unwrap();
        assert!(cli.offline);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/r.yaml")));
    }

    #[test]
    fn config_is_accepted_after_a_subcommand() {
        let cli = parse(&["login", "sam@example.com", "--config", "c.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("c.yaml")));
        match cli.command {
            Some(Commands::Login { email }) => assert_eq!(email, "sam@example.com"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn upload_collects_all_flags() {
        let cli = parse(&[
            "upload",
            "--video",
            "clip.mp4",
            "--thumbnail",
            "cover.png",
            "--title",
            "Sunset",
            "--description",
            "Golden hour",
            "--duration",
            "42.5",
        ])
        .unwrap();
        let Some(Commands::Upload(args)) = cli.command else {
            panic!("expected upload");
        };
        assert_eq!(
            args,
            UploadArgs {
                video: PathBuf::from("clip.mp4"),
                thumbnail: PathBuf::from("cover.png"),
                title: "Sunset".into(),
                description: "Golden hour".into(),
                duration: Some(42.5),
            }
        );
    }

    #[test]
    fn flag_names_are_not_taken_as_values() {
        let err = parse(&[
            "upload",
            "--title",
            "--video",
            "clip.mp4",
            "--thumbnail",
            "cover.png",
            "--description",
            "d",
        ])
        .unwrap_err();
        assert_ne!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn upload_requires_a_description() {
        let err = parse(&[
            "upload",
            "--video",
            "clip.mp4",
            "--thumbnail",
            "cover.png",
            "--title",
            "Sunset",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert!(err.to_string().contains("--description"));
    }

    #[test]
    fn offline_with_a_subcommand_is_rejected() {
        let err = parse(&["--offline", "login", "sam@example.com"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn bad_duration_is_rejected() {
        let err = parse(&[
            "upload",
            "--video",
            "a.mp4",
            "--thumbnail",
            "b.png",
            "--title",
            "t",
            "--description",
            "d",
            "--duration",
            "long",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
