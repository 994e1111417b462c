//! urltidy 命令行工具
//!
//! 清理 URL 中的追踪参数，管理远程规则缓存。

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use urltidy::{
    CleanResult, ConfigManager, FileRuleCache, GlobalConfig, MatchEngine, NavigationEvent, NavigationKind,
    Navigator, Orchestrator, RemoteRuleProvider, RuleCacheStore, RuleStore,
};

#[derive(Parser)]
#[command(name = "urltidy", version)]
#[command(about = "Strip tracking parameters from URLs")]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalOpts {
    /// Remote rule feed URL
    #[arg(long, global = true)]
    feed_url: Option<String>,

    /// Rule cache file
    #[arg(long, global = true)]
    cache_path: Option<PathBuf>,

    /// Cache time-to-live in seconds
    #[arg(long, global = true)]
    ttl_secs: Option<u64>,

    /// HTTP timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Use built-in rules only
    #[arg(long, global = true)]
    offline: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean URLs given as arguments, or one per stdin line
    Clean {
        urls: Vec<String>,

        /// Print removed parameter names to stderr
        #[arg(long)]
        explain: bool,

        /// Fetch the remote feed before cleaning and wait for it
        #[arg(long)]
        refresh: bool,
    },
    /// Treat stdin lines as navigation events and print every rewrite
    Watch,
    /// Fetch and cache the remote rule feed
    Refresh,
    /// Remove the cached remote rule feed
    CacheClear,
}

impl GlobalOpts {
    fn to_config(&self) -> GlobalConfig {
        let mut builder = ConfigManager::custom().remote_rules_enabled(!self.offline);
        if let Some(url) = &self.feed_url {
            builder = builder.rule_feed_url(url.clone());
        }
        if let Some(path) = &self.cache_path {
            builder = builder.rule_cache_path(path.clone());
        }
        if let Some(ttl) = self.ttl_secs {
            builder = builder.cache_ttl(Duration::from_secs(ttl));
        }
        if let Some(timeout) = self.timeout_secs {
            builder = builder.http_timeout(Duration::from_secs(timeout));
        }
        builder.build()
    }
}

/// 把改写结果打印到标准输出的宿主
struct ConsoleNavigator {
    current: Mutex<String>,
}

impl ConsoleNavigator {
    fn set_current(&self, url: &str) {
        if let Ok(mut current) = self.current.lock() {
            *current = url.to_string();
        }
    }
}

impl Navigator for ConsoleNavigator {
    fn current_url(&self) -> String {
        self.current.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn replace_url(&self, url: &str) {
        println!("{}", url);
        self.set_current(url);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.opts.verbose);
    let config = cli.opts.to_config();

    match cli.command {
        Commands::Clean { urls, explain, refresh } => cmd_clean(&config, urls, explain, refresh).await,
        Commands::Watch => cmd_watch(&config).await,
        Commands::Refresh => cmd_refresh(&config).await,
        Commands::CacheClear => {
            FileRuleCache::from_config(&config).clear().await?;
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// 创建提供者并加载缓存；离线模式下不加载
async fn open_provider(config: &GlobalConfig) -> Result<Arc<RemoteRuleProvider>> {
    let provider = Arc::new(RemoteRuleProvider::from_config(config).context("创建远程规则提供者失败")?);
    if config.remote_rules_enabled {
        provider.load_cached().await;
    }
    Ok(provider)
}

async fn read_stdin_lines() -> Result<Vec<String>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut urls = Vec::new();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if !line.is_empty() {
            urls.push(line.to_string());
        }
    }
    Ok(urls)
}

async fn cmd_clean(config: &GlobalConfig, urls: Vec<String>, explain: bool, refresh: bool) -> Result<()> {
    let provider = open_provider(config).await?;
    if config.remote_rules_enabled {
        if refresh {
            if let Err(e) = provider.refresh().await {
                eprintln!("warning: remote rules not refreshed: {}", e);
            }
        } else if let Some(handle) = provider.ensure_fresh() {
            // 命令行一次性运行，等待后台刷新完成再清理；失败时沿用旧规则
            let _ = handle.await;
        }
    }

    let urls = if urls.is_empty() { read_stdin_lines().await? } else { urls };
    let store = RuleStore::builtin();
    let snapshot = provider.snapshot();

    for url in urls {
        if explain {
            let removed = MatchEngine::removed_params(&url, store, snapshot.as_deref());
            if !removed.is_empty() {
                eprintln!("{}: removed {}", url, removed.join(", "));
            }
        }
        match MatchEngine::clean(&url, store, snapshot.as_deref()) {
            CleanResult::Cleaned(cleaned) => println!("{}", cleaned),
            CleanResult::Unchanged => println!("{}", url),
        }
    }
    Ok(())
}

async fn cmd_watch(config: &GlobalConfig) -> Result<()> {
    let provider = open_provider(config).await?;
    let navigator = Arc::new(ConsoleNavigator { current: Mutex::new(String::new()) });
    let orchestrator = Arc::new(
        Orchestrator::new(RuleStore::builtin(), provider, navigator.clone())
            .auto_refresh(config.remote_rules_enabled),
    );

    let (tx, rx) = mpsc::channel(64);
    let task = tokio::spawn(orchestrator.run(rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut kind = NavigationKind::InitialLoad;
    while let Some(line) = lines.next_line().await? {
        let url = line.trim();
        if url.is_empty() {
            continue;
        }
        navigator.set_current(url);
        tx.send(NavigationEvent::new(kind, url)).await.context("编排器已退出")?;
        kind = NavigationKind::HistoryPush;
    }

    drop(tx);
    task.await.context("编排器任务异常退出")?;
    Ok(())
}

async fn cmd_refresh(config: &GlobalConfig) -> Result<()> {
    let provider = RemoteRuleProvider::from_config(config).context("创建远程规则提供者失败")?;
    let snapshot = provider.refresh().await.context("远程规则拉取失败")?;

    println!("{} rule sets compiled from {}", snapshot.compiled_rule_sets.len(), config.rule_feed_url);
    for (name, count) in snapshot.summary() {
        println!("  {:<32} {}", name, count);
    }
    Ok(())
}
