mod cli;

use mediascout::report;
use ms_core::config::{Config, DiscoveryConfig};
use ms_discover::{discover, DiscoveryResult, ResourceLocator};
use ms_ffprobe::FfprobeRuntime;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

/// Overrides for discovery settings given on the command line.
struct DiscoverOptions {
    json: bool,
    max_interleave: Option<f64>,
    timeout_ms: Option<u64>,
    defer_unrecognized: bool,
}

impl DiscoverOptions {
    fn apply(&self, discovery: &mut DiscoveryConfig) {
        if let Some(secs) = self.max_interleave {
            discovery.max_interleave_secs = secs;
        }
        if let Some(ms) = self.timeout_ms {
            discovery.timeout_ms = ms;
        }
        if self.defer_unrecognized {
            discovery.defer_unrecognized_failure = true;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediascout=trace,ms_discover=trace,ms_ffprobe=trace,ms_graph=trace".to_string()
        } else {
            "mediascout=info,ms_discover=info".to_string()
        }
    });

    // Logs go to stderr so reports on stdout stay machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Discover {
            locators,
            json,
            max_interleave,
            timeout_ms,
            defer_unrecognized,
        } => {
            let options = DiscoverOptions {
                json,
                max_interleave,
                timeout_ms,
                defer_unrecognized,
            };
            discover_all(&locators, cli.config.as_deref(), &options)
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Version => {
            println!("mediascout {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::load_or_default(path).context("failed to load configuration")?;
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }
    Ok(config)
}

fn discover_all(inputs: &[String], config_path: Option<&Path>, options: &DiscoverOptions) -> Result<()> {
    let mut config = load_config(config_path)?;
    options.apply(&mut config.discovery);
    config
        .discovery
        .check()
        .context("invalid discovery settings")?;

    let locators = inputs
        .iter()
        .map(|input| ResourceLocator::parse(input).with_context(|| format!("cannot discover {input:?}")))
        .collect::<Result<Vec<_>>>()?;

    // An ffprobe run never needs to outlive the session waiting on it.
    let runtime = FfprobeRuntime::from_config(&config.tools)?.with_timeout(config.discovery.timeout());
    tracing::debug!(ffprobe = %runtime.ffprobe_path().display(), "using ffprobe");

    // Sessions run strictly one after another on a single thread.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let results: Vec<DiscoveryResult> = rt.block_on(async {
        let mut results = Vec::with_capacity(locators.len());
        for locator in locators {
            let discovered = discover(locator, config.discovery.clone(), &runtime).await;
            if !options.json {
                print_result(&discovered.result);
            }
            results.push(discovered.result);
        }
        results
    });

    if options.json {
        println!("{}", report::to_json(&results)?);
    }

    let failed = results.iter().filter(|r| !r.success).count();
    if failed > 0 {
        anyhow::bail!("{} of {} resources could not be discovered", failed, results.len());
    }
    Ok(())
}

fn print_result(result: &DiscoveryResult) {
    println!("{}", result.locator);
    match report::render(result) {
        Some(text) => print!("{text}"),
        None => println!("No audio or video found"),
    }
    if !result.success {
        println!("Discovery failed");
    }
    println!();
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = load_config(config_path)?;
    let tools = ms_ffprobe::check_tools(&config.tools);
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffprobe to discover real media.");
    }

    Ok(())
}
