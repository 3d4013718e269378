use anyhow::Result;
use clap::Parser;
use colored::*;
use std::time::Duration;

mod output;
mod scenarios;
mod sse_client;

use output::print_test_summary;

#[derive(Parser)]
#[command(name = "sse-test-client")]
#[command(about = "Patch stream integration testing tool")]
struct Cli {
    /// Base URL of the backend (e.g., http://localhost:4000)
    #[arg(long, default_value = "http://localhost:4000")]
    base_url: String,

    /// Test scenario to run
    #[arg(long, value_enum, default_value = "all")]
    scenario: ScenarioChoice,

    /// Seconds to wait for each stream
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, PartialEq)]
enum ScenarioChoice {
    /// Check the server answers on /health
    Health,
    /// Stream the hello message to completion
    Hello,
    /// Echo signals carried in the query string
    SignalsGet,
    /// Echo signals carried in a JSON body
    SignalsPost,
    /// Malformed signals are rejected with 400
    MalformedSignals,
    /// Run an operation batch through /test
    Conformance,
    /// Receive two ticks from the unmanaged ticker stream
    Ticks,
    /// Run every scenario
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    let client = reqwest::Client::new();
    let timeout = Duration::from_secs(cli.timeout_secs);
    let base_url = cli.base_url.trim_end_matches('/');
    let runs = |choice: ScenarioChoice| cli.scenario == choice || cli.scenario == ScenarioChoice::All;

    println!("{}", "=== TEST PHASE ===".bright_white().bold());
    println!("{} Target: {}", "→".blue(), base_url);

    let mut results = Vec::new();

    if runs(ScenarioChoice::Health) {
        results.push(scenarios::test_health(&client, base_url).await?);
    }
    if runs(ScenarioChoice::Hello) {
        results.push(scenarios::test_hello(base_url, timeout).await?);
    }
    if runs(ScenarioChoice::SignalsGet) {
        results.push(scenarios::test_signals_get(base_url, timeout).await?);
    }
    if runs(ScenarioChoice::SignalsPost) {
        results.push(scenarios::test_signals_post(&client, base_url).await?);
    }
    if runs(ScenarioChoice::MalformedSignals) {
        results.push(scenarios::test_malformed_signals(&client, base_url).await?);
    }
    if runs(ScenarioChoice::Conformance) {
        results.push(scenarios::test_conformance(&client, base_url).await?);
    }
    if runs(ScenarioChoice::Ticks) {
        results.push(scenarios::test_ticks(base_url, timeout).await?);
    }

    // Print summary
    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
