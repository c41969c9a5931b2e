//! Command-line parsing and subcommand execution.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use getopts::Options;
use pagecache_client::{CachedFetcher, FetchConfig, HttpFetcher};
use pagecache_core::{AppConfig, CacheManager};
use serde_json::json;
use tokio::io::AsyncReadExt;

/// A parsed subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get { id: String },
    Set { id: String, content: Option<String> },
    Fetch { url: String },
    Stats,
    ClearExpired { max_age_secs: Option<u64> },
    Invalidate { id: String },
    Clear,
    Help,
}

/// Everything taken from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: Command,
    pub cache_dir: Option<PathBuf>,
    pub max_age_secs: Option<u64>,
    pub no_compression: bool,
    pub refresh: bool,
}

impl Invocation {
    /// Layer command-line overrides over loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = dir.clone();
        }
        if let Some(secs) = self.max_age_secs {
            config.max_age_secs = secs;
        }
        if self.no_compression {
            config.compression = false;
        }
    }
}

fn options() -> Options {
    let mut opts = Options::new();
    opts.optopt("c", "cache-dir", "cache root directory", "DIR");
    opts.optopt("", "max-age", "entry time-to-live in seconds", "SECS");
    opts.optflag("", "no-compression", "store records as plain text");
    opts.optflag("r", "refresh", "fetch: bypass the cache");
    opts.optflag("h", "help", "print this help menu");
    opts
}

pub fn usage() -> String {
    let brief = "Usage: pagecache [options] <command> [args]\n\n\
                 Commands:\n    \
                 get <id>                  print a cached body\n    \
                 set <id> [content|-]      cache content (stdin when omitted or -)\n    \
                 fetch <url>               fetch through the cache\n    \
                 stats                     print cache statistics\n    \
                 clear-expired [secs]      remove stale entries\n    \
                 invalidate <id>           drop one entry\n    \
                 clear                     drop every entry";
    options().usage(brief)
}

fn parse_secs(value: &str, what: &str) -> Result<u64> {
    value
        .parse()
        .with_context(|| format!("{what} must be a whole number of seconds, got {value:?}"))
}

/// Parse arguments (without the program name).
pub fn parse(args: &[String]) -> Result<Invocation> {
    let matches = options().parse(args)?;

    let max_age_secs = matches
        .opt_str("max-age")
        .map(|v| parse_secs(&v, "--max-age"))
        .transpose()?;

    let mut free = matches.free.iter().map(String::as_str);
    let command = if matches.opt_present("h") {
        Command::Help
    } else {
        let Some(name) = free.next() else {
            bail!("missing command\n\n{}", usage());
        };
        let mut arg = |what: &str| free.next().map(str::to_string).with_context(|| format!("{name}: missing {what}"));

        match name {
            "get" => Command::Get { id: arg("identifier")? },
            "set" => {
                let id = arg("identifier")?;
                let content = arg("content").ok().filter(|c| c != "-");
                Command::Set { id, content }
            }
            "fetch" => Command::Fetch { url: arg("url")? },
            "stats" => Command::Stats,
            "clear-expired" => Command::ClearExpired {
                max_age_secs: arg("max age").ok().map(|v| parse_secs(&v, "clear-expired")).transpose()?,
            },
            "invalidate" => Command::Invalidate { id: arg("identifier")? },
            "clear" => Command::Clear,
            other => bail!("unknown command: {other}\n\n{}", usage()),
        }
    };

    if let Some(extra) = free.next() {
        bail!("unexpected argument: {extra}");
    }

    Ok(Invocation {
        command,
        cache_dir: matches.opt_str("cache-dir").map(PathBuf::from),
        max_age_secs,
        no_compression: matches.opt_present("no-compression"),
        refresh: matches.opt_present("refresh"),
    })
}

async fn read_stdin() -> Result<String> {
    let mut content = String::new();
    tokio::io::stdin()
        .read_to_string(&mut content)
        .await
        .context("failed to read content from stdin")?;
    Ok(content)
}

/// Execute `invocation` against a cache built from `config`.
pub async fn run(invocation: Invocation, config: &AppConfig) -> Result<ExitCode> {
    if invocation.command == Command::Help {
        println!("{}", usage());
        return Ok(ExitCode::SUCCESS);
    }

    let cache = CacheManager::new(config.cache_config())?;

    match invocation.command {
        Command::Help => {}
        Command::Get { id } => match cache.get(&id).await {
            Some(body) => print!("{body}"),
            None => {
                eprintln!("miss: {id}");
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::Set { id, content } => {
            let content = match content {
                Some(content) => content,
                None => read_stdin().await?,
            };
            cache.set_persisted(&id, content).await?;
        }
        Command::Fetch { url } => {
            let fetcher = HttpFetcher::new(FetchConfig::from(config))?;
            let client = CachedFetcher::new(fetcher, cache).with_persisted_writes(true);
            let page = client.get(&url, invocation.refresh).await?;
            tracing::info!(url = %page.url, from_cache = page.from_cache, "page ready");
            print!("{}", page.body);
        }
        Command::Stats => {
            println!("{}", serde_json::to_string_pretty(&cache.stats().await)?);
        }
        Command::ClearExpired { max_age_secs } => {
            let cleared = cache.clear_expired(max_age_secs.map(Duration::from_secs)).await;
            println!("{}", json!({ "cleared": cleared }));
        }
        Command::Invalidate { id } => {
            let invalidated = cache.invalidate(&id).await;
            println!("{}", json!({ "invalidated": invalidated }));
        }
        Command::Clear => {
            let cleared = cache.clear().await;
            println!("{}", json!({ "cleared": cleared }));
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_get_with_options() {
        let inv = parse(&args(&["-c", "/tmp/pages", "--max-age", "60", "get", "https://example.com/"])).unwrap();
        assert_eq!(inv.command, Command::Get { id: "https://example.com/".into() });
        assert_eq!(inv.cache_dir, Some(PathBuf::from("/tmp/pages")));
        assert_eq!(inv.max_age_secs, Some(60));
        assert!(!inv.no_compression);
    }

    #[test]
    fn test_parse_set_variants() {
        let inline = parse(&args(&["set", "id", "body"])).unwrap();
        assert_eq!(inline.command, Command::Set { id: "id".into(), content: Some("body".into()) });

        let dash = parse(&args(&["set", "id", "-"])).unwrap();
        assert_eq!(dash.command, Command::Set { id: "id".into(), content: None });

        let omitted = parse(&args(&["set", "id"])).unwrap();
        assert_eq!(omitted.command, Command::Set { id: "id".into(), content: None });
    }

    #[test]
    fn test_parse_fetch_refresh() {
        let inv = parse(&args(&["fetch", "example.com", "--refresh"])).unwrap();
        assert_eq!(inv.command, Command::Fetch { url: "example.com".into() });
        assert!(inv.refresh);
    }

    #[test]
    fn test_parse_clear_expired() {
        let inv = parse(&args(&["clear-expired"])).unwrap();
        assert_eq!(inv.command, Command::ClearExpired { max_age_secs: None });

        let inv = parse(&args(&["clear-expired", "30"])).unwrap();
        assert_eq!(inv.command, Command::ClearExpired { max_age_secs: Some(30) });

        assert!(parse(&args(&["clear-expired", "soon"])).is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&args(&[])).is_err());
        assert!(parse(&args(&["explode"])).is_err());
        assert!(parse(&args(&["get"])).is_err());
        assert!(parse(&args(&["stats", "extra"])).is_err());
        assert!(parse(&args(&["--max-age", "-5", "stats"])).is_err());
    }

    #[test]
    fn test_help_flag() {
        assert_eq!(parse(&args(&["-h"])).unwrap().command, Command::Help);
        assert!(usage().contains("clear-expired"));
    }

    #[test]
    fn test_apply_overrides() {
        let inv = parse(&args(&["--no-compression", "-c", "/srv/cache", "--max-age", "5", "stats"])).unwrap();
        let mut config = AppConfig::default();
        inv.apply(&mut config);
        assert_eq!(config.cache_dir, PathBuf::from("/srv/cache"));
        assert_eq!(config.max_age_secs, 5);
        assert!(!config.compression);
    }

    #[tokio::test]
    async fn test_run_set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig { cache_dir: dir.path().to_path_buf(), ..Default::default() };

        let set = parse(&args(&["set", "id", "body"])).unwrap();
        assert_eq!(run(set, &config).await.unwrap(), ExitCode::SUCCESS);

        let get = parse(&args(&["get", "id"])).unwrap();
        assert_eq!(run(get, &config).await.unwrap(), ExitCode::SUCCESS);

        let missing = parse(&args(&["get", "other"])).unwrap();
        assert_eq!(run(missing, &config).await.unwrap(), ExitCode::FAILURE);
    }
}
