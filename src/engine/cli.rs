//! Command-line interface for raycast-drive.

use std::path::PathBuf;

use clap::Parser;

use crate::engine::user_input::{Control, InputState};

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "raycast-drive")]
#[command(about = "Drive a raycast-wheel car around a flat plane")]
pub struct Cli {
    /// TOML file overriding any subset of the default configuration
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub dump_config: bool,

    /// Simulate this many frames without opening a window
    #[arg(long, value_name = "FRAMES")]
    pub headless: Option<u64>,

    /// Controls held for the whole headless run
    #[arg(long, value_enum, value_delimiter = ',', value_name = "CONTROL,...")]
    pub hold: Vec<Control>,
}

impl Cli {
    pub fn held_input(&self) -> InputState {
        InputState::holding(&self.hold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_runs_windowed_with_defaults() {
        let cli = Cli::try_parse_from(["raycast-drive"]).unwrap();
        assert_eq!(cli.config, None);
        assert!(!cli.dump_config);
        assert_eq!(cli.headless, None);
        assert_eq!(cli.held_input(), InputState::default());
    }

    #[test]
    fn parses_headless_run_with_held_controls() {
        let cli = Cli::try_parse_from([
            "raycast-drive",
            "--config",
            "car.toml",
            "--headless",
            "120",
            "--hold",
            "forward,left",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("car.toml")));
        assert_eq!(cli.headless, Some(120));
        let input = cli.held_input();
        assert!(input.forward && input.left);
        assert!(!input.backward && !input.right && !input.brake);
    }

    #[test]
    fn rejects_unknown_controls() {
        assert!(Cli::try_parse_from(["raycast-drive", "--hold", "jump"]).is_err());
    }
}
