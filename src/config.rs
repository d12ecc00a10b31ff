use crate::settlement::DEFAULT_API_URL;
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::{
    path::PathBuf,
    time::Duration,
};

pub const API_URL_ENV: &str = "COINFLIP_API_URL";
pub const DEFAULT_LOG_DIR: &str = "./logs";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub api_url: String,
    pub host_context: Option<PathBuf>,
    pub log_dir: PathBuf,
    pub request_timeout: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            host_context: None,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            request_timeout: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Invocation {
    Run(AppConfig),
    Help,
}

pub fn usage() -> String {
    format!(
        "Usage: coinflip [--api-url <url>] [--host-context <path>] [--log-dir <path>]\n\
         [--request-timeout <secs>]\n\
         \n\
         Flags:\n\
           --api-url <url>           Settlement service base URL (default {DEFAULT_API_URL},\n\
                                     or ${API_URL_ENV} when set)\n\
           --host-context <path>     JSON file with the host's initDataUnsafe context\n\
           --log-dir <path>          Directory for rolling log files (default {DEFAULT_LOG_DIR})\n\
           --request-timeout <secs>  Give up on settlement requests after this many seconds\n\
           -h, --help                Print this message"
    )
}

/// Parses process arguments, with `COINFLIP_API_URL` as the fallback URL.
pub fn from_env() -> Result<Invocation> {
    parse_args(std::env::args().skip(1), std::env::var(API_URL_ENV).ok())
}

pub fn parse_args(
    args: impl IntoIterator<Item = String>,
    env_api_url: Option<String>,
) -> Result<Invocation> {
    let mut args = args.into_iter();
    let mut api_url: Option<String> = None;
    let mut host_context: Option<PathBuf> = None;
    let mut log_dir: Option<PathBuf> = None;
    let mut request_timeout: Option<Duration> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--api-url" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--api-url requires a URL argument"))?;
                if api_url.is_some() {
                    return Err(eyre!("--api-url may only be specified once"));
                }
                api_url = Some(url);
            }
            "--host-context" => {
                let path = args
                    .next()
                    .ok_or_else(|| eyre!("--host-context requires a path argument"))?;
                if host_context.is_some() {
                    return Err(eyre!("--host-context may only be specified once"));
                }
                host_context = Some(expand_path(&path));
            }
            "--log-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--log-dir requires a path argument"))?;
                if log_dir.is_some() {
                    return Err(eyre!("--log-dir may only be specified once"));
                }
                log_dir = Some(expand_path(&dir));
            }
            "--request-timeout" => {
                let raw = args.next().ok_or_else(|| {
                    eyre!("--request-timeout requires a number of seconds")
                })?;
                if request_timeout.is_some() {
                    return Err(eyre!("--request-timeout may only be specified once"));
                }
                let secs: u64 = raw.parse().map_err(|_| {
                    eyre!("--request-timeout expects whole seconds, got {raw}")
                })?;
                if secs == 0 {
                    return Err(eyre!("--request-timeout must be greater than zero"));
                }
                request_timeout = Some(Duration::from_secs(secs));
            }
            "--help" | "-h" => return Ok(Invocation::Help),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let api_url = api_url
        .or(env_api_url.filter(|url| !url.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let api_url = api_url.trim().trim_end_matches('/').to_string();
    if api_url.is_empty() {
        return Err(eyre!("--api-url must not be empty"));
    }

    Ok(Invocation::Run(AppConfig {
        api_url,
        host_context,
        log_dir: log_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
        request_timeout,
    }))
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}
