// src/cli.rs

//! Command-line parsing for the `sessiond` binary.

use crate::config::DispatchStrategy;

pub const USAGE: &str = "Usage: sessiond <port> [--config <path>] [--dispatch <poll|worker>]";

/// Command-line options after the positional port has been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub port: u16,
    pub config_path: Option<String>,
    pub dispatch: Option<DispatchStrategy>,
}

/// Parses `<port> [--config <path>] [--dispatch <poll|worker>]`, excluding the program name.
///
/// The error is a one-line diagnostic; the caller prints it with [`USAGE`] and exits nonzero.
pub fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut port = None;
    let mut config_path = None;
    let mut dispatch = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().ok_or("--config flag requires a value")?;
                config_path = Some(path.clone());
            }
            "--dispatch" => {
                let value = iter.next().ok_or("--dispatch flag requires a value")?;
                let strategy = value
                    .parse::<DispatchStrategy>()
                    .map_err(|_| format!("Invalid dispatch strategy: {value}"))?;
                dispatch = Some(strategy);
            }
            flag if flag.starts_with("--") => return Err(format!("Unknown flag: {flag}")),
            value if port.is_none() => {
                let parsed = value
                    .parse::<u16>()
                    .ok()
                    .filter(|p| *p != 0)
                    .ok_or_else(|| format!("Invalid port number: {value}"))?;
                port = Some(parsed);
            }
            extra => return Err(format!("Unexpected argument: {extra}")),
        }
    }

    Ok(CliArgs {
        port: port.ok_or("Missing <port> argument")?,
        config_path,
        dispatch,
    })
}
