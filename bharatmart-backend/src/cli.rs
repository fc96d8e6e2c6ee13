use std::fmt;
use std::str::FromStr;

/// Which halves of the service this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// HTTP only.
    Api,
    /// Queue workers only.
    Worker,
    /// HTTP and workers in one process.
    #[default]
    All,
}

impl RunMode {
    pub fn serves_http(self) -> bool {
        matches!(self, RunMode::Api | RunMode::All)
    }

    pub fn runs_workers(self) -> bool {
        matches!(self, RunMode::Worker | RunMode::All)
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(RunMode::Api),
            "worker" | "workers" => Ok(RunMode::Worker),
            "all" => Ok(RunMode::All),
            other => Err(format!("unknown mode '{other}' (expected api, worker or all)")),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunMode::Api => "api",
            RunMode::Worker => "worker",
            RunMode::All => "all",
        })
    }
}

/// Parsed command-line arguments.
pub struct CliArgs {
    /// Path to configuration file, if provided via `--config-path` or `-c`.
    pub config_path: Option<String>,
    /// Raw `--mode` value, if provided.
    pub mode: Option<String>,
    /// Whether help was requested.
    pub help_requested: bool,
}

impl CliArgs {
    /// Parse command-line arguments.
    ///
    /// Supported flags:
    /// - `--config-path <path>` or `--config-path=<path>` or `-c <path>`: Path to config file
    /// - `--mode <api|worker|all>` or `--mode=<...>`: What to run (default `all`)
    /// - `--help` or `-h`: Print help and exit
    pub fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    fn from_args(args: &[String]) -> Self {
        let help_requested = args.iter().any(|a| a == "--help" || a == "-h");
        Self {
            config_path: Self::extract_flag(args, "--config-path", Some("-c")),
            mode: Self::extract_flag(args, "--mode", None),
            help_requested,
        }
    }

    /// Print usage information to stderr.
    pub fn print_help() {
        eprintln!(
            "Usage: bharatmart [--config-path PATH] [--mode api|worker|all] [--help]\n\n\
             --config-path, -c    Path to configuration file (overrides BHARATMART_CONFIG_PATH env var)\n\
             --mode               api: HTTP only, worker: queue workers only, all: both (default)"
        );
    }

    /// Resolve the run mode: CLI flag, then `BHARATMART_MODE`, then `all`.
    pub fn run_mode(&self) -> Result<RunMode, String> {
        match self
            .mode
            .clone()
            .or_else(|| std::env::var("BHARATMART_MODE").ok())
        {
            Some(raw) => raw.parse(),
            None => Ok(RunMode::default()),
        }
    }

    fn extract_flag(args: &[String], long: &str, short: Option<&str>) -> Option<String> {
        let long_eq = format!("{long}=");
        let short_eq = short.map(|s| format!("{s}="));
        let mut i = 1usize;
        while i < args.len() {
            let a = &args[i];
            if let Some(stripped) = a.strip_prefix(&long_eq) {
                return Some(stripped.to_string());
            } else if a == long || Some(a.as_str()) == short {
                return args.get(i + 1).cloned();
            } else if let Some(stripped) = short_eq.as_deref().and_then(|p| a.strip_prefix(p)) {
                return Some(stripped.to_string());
            }
            i += 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("bharatmart")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn parses_flags_in_both_forms() {
        let cli = CliArgs::from_args(&args(&["-c", "cfg.toml", "--mode=worker"]));
        assert_eq!(cli.config_path.as_deref(), Some("cfg.toml"));
        assert_eq!(cli.run_mode().unwrap(), RunMode::Worker);

        let cli = CliArgs::from_args(&args(&["--config-path=x.yaml", "--mode", "api"]));
        assert_eq!(cli.config_path.as_deref(), Some("x.yaml"));
        assert_eq!(cli.mode.as_deref(), Some("api"));
        assert!(!cli.help_requested);
    }

    #[test]
    fn modes() {
        assert!(RunMode::All.serves_http() && RunMode::All.runs_workers());
        assert!(!RunMode::Api.runs_workers());
        assert!(!RunMode::Worker.serves_http());
        assert!("bogus".parse::<RunMode>().is_err());
    }
}
