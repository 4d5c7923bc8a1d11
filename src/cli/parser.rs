use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use secrecy::SecretString;
use tracing::Level;

use crate::changes::ChangeFilter;
use crate::gitlab::GitLab;
use crate::server::{Pipeline, Settings, SummaryReviewer};
use crate::utils::get_credential;

#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Log level for this service's own messages
    #[arg(long, env, global = true, default_value_t = Level::INFO)]
    pub(crate) log_level: Level,
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Start web hook server
    Serve(ServeArgs),
    /// Review a stored webhook payload and print the result instead of posting it
    Replay(ReplayArgs),
}

#[derive(Args)]
pub(crate) struct ServeArgs {
    /// IP and port to listen on
    #[arg(default_value = "0.0.0.0:5001")]
    pub(crate) addr: String,
    #[command(flatten)]
    pub(crate) gitlab: GitLabArgs,
}

#[derive(Args)]
pub(crate) struct ReplayArgs {
    /// JSON file containing a merge request or push hook body
    pub(crate) payload: PathBuf,
    #[command(flatten)]
    pub(crate) gitlab: GitLabArgs,
}

#[derive(Args)]
pub(crate) struct GitLabArgs {
    /// Base URL of the GitLab instance
    #[arg(long, env, default_value = "https://gitlab.com")]
    pub(crate) gitlab_url: String,
    /// Access token for the GitLab API (falls back to the `gitlab_access_token` credential)
    #[arg(long, env, hide_env_values = true)]
    pub(crate) gitlab_access_token: Option<String>,
    /// File extensions to review, comma separated
    #[arg(
        long,
        env,
        value_delimiter = ',',
        default_values = [".java", ".py", ".php"]
    )]
    pub(crate) supported_extensions: Vec<String>,
    /// Review pushes in addition to merge requests
    #[arg(
        long,
        env,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        default_value_t = false
    )]
    pub(crate) push_review_enabled: bool,
    /// Only review merge requests targeting a protected branch
    #[arg(
        long,
        env = "MERGE_REVIEW_ONLY_PROTECTED_BRANCHES_ENABLED",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        default_value_t = false
    )]
    pub(crate) protected_branches_only: bool,
    /// Timeout for each GitLab API request, in seconds
    #[arg(long, env = "GITLAB_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub(crate) request_timeout_secs: u64,
}

impl GitLabArgs {
    fn token(&mut self) -> Result<SecretString> {
        // If the token has not been passed via CLI or env, get it as a credential.
        self.gitlab_access_token
            .take()
            .map(SecretString::from)
            .ok_or(())
            .or_else(|()| get_credential("gitlab_access_token"))
    }

    fn change_filter(&self) -> ChangeFilter {
        ChangeFilter::new(self.supported_extensions.iter().map(|ext| ext.trim()))
    }

    pub(crate) fn into_pipeline(mut self, dry_run: bool) -> Result<Pipeline<SummaryReviewer>> {
        let token = self.token()?;
        let gitlab = GitLab::new(
            &self.gitlab_url,
            token,
            Duration::from_secs(self.request_timeout_secs),
        )?;
        Ok(Pipeline {
            gitlab,
            filter: self.change_filter(),
            reviewer: SummaryReviewer,
            settings: Settings {
                push_review_enabled: self.push_review_enabled,
                protected_branches_only: self.protected_branches_only,
                dry_run,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    const VARS: [&str; 7] = [
        "LOG_LEVEL",
        "GITLAB_URL",
        "GITLAB_ACCESS_TOKEN",
        "SUPPORTED_EXTENSIONS",
        "PUSH_REVIEW_ENABLED",
        "MERGE_REVIEW_ONLY_PROTECTED_BRANCHES_ENABLED",
        "GITLAB_REQUEST_TIMEOUT_SECS",
    ];

    /// Parse `args` with only the given configuration variables set.
    fn parse_with(vars: &[(&str, &str)], args: &[&str]) -> Cli {
        let env: Vec<(&str, Option<&str>)> = VARS
            .iter()
            .map(|name| {
                let value = vars.iter().find(|(k, _)| k == name).map(|(_, v)| *v);
                (*name, value)
            })
            .collect();
        temp_env::with_vars(env, || Cli::try_parse_from(args).unwrap())
    }

    fn serve_args(cli: Cli) -> ServeArgs {
        match cli.command {
            Commands::Serve(args) => args,
            Commands::Replay(_) => panic!("expected serve"),
        }
    }

    #[test]
    fn test_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = parse_with(&[], &["hook", "serve"]);
        assert_eq!(cli.log_level, Level::INFO);
        let args = serve_args(cli);
        assert_eq!(args.addr, "0.0.0.0:5001");
        assert_eq!(args.gitlab.gitlab_url, "https://gitlab.com");
        assert_eq!(args.gitlab.gitlab_access_token, None);
        assert_eq!(args.gitlab.supported_extensions, [".java", ".py", ".php"]);
        assert!(!args.gitlab.push_review_enabled);
        assert!(!args.gitlab.protected_branches_only);
        assert_eq!(args.gitlab.request_timeout_secs, 30);
    }

    #[test]
    fn test_environment() {
        let cli = parse_with(
            &[
                ("LOG_LEVEL", "debug"),
                ("GITLAB_URL", "https://gitlab.example.com"),
                ("GITLAB_ACCESS_TOKEN", "glpat-secret"),
                ("SUPPORTED_EXTENSIONS", ".rs, .go"),
                ("PUSH_REVIEW_ENABLED", "1"),
                ("MERGE_REVIEW_ONLY_PROTECTED_BRANCHES_ENABLED", "true"),
            ],
            &["hook", "serve", "127.0.0.1:8080"],
        );
        assert_eq!(cli.log_level, Level::DEBUG);
        let args = serve_args(cli);
        assert_eq!(args.addr, "127.0.0.1:8080");
        assert_eq!(args.gitlab.gitlab_access_token.as_deref(), Some("glpat-secret"));
        assert!(args.gitlab.push_review_enabled);
        assert!(args.gitlab.protected_branches_only);
        assert_eq!(args.gitlab.change_filter().extensions(), [".rs", ".go"]);

        let pipeline = args.gitlab.into_pipeline(true).unwrap();
        assert_eq!(pipeline.gitlab.base_url(), "https://gitlab.example.com");
        assert_eq!(pipeline.filter.extensions(), [".rs", ".go"]);
        assert_eq!(
            pipeline.settings,
            Settings {
                push_review_enabled: true,
                protected_branches_only: true,
                dry_run: true,
            }
        );
    }

    #[test]
    fn test_flags_override_environment() {
        let cli = parse_with(
            &[("PUSH_REVIEW_ENABLED", "yes")],
            &[
                "hook",
                "replay",
                "payload.json",
                "--push-review-enabled",
                "false",
                "--supported-extensions",
                ".ts,.tsx",
            ],
        );
        let Commands::Replay(args) = cli.command else {
            panic!("expected replay");
        };
        assert_eq!(args.payload, PathBuf::from("payload.json"));
        assert!(!args.gitlab.push_review_enabled);
        assert_eq!(args.gitlab.supported_extensions, [".ts", ".tsx"]);
    }
}
