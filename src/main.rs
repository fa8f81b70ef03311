use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{mpsc, Arc};

use anyhow::{Context, Result};
use clap::Parser;
use cityweather_core::Config;
use cityweather_forecast::{
    request_fetch, CancellationToken, Forecast, ForecastError, ForecastProvider,
    ForecastServiceMessage,
};

mod render;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// City to look up; omit to start an interactive prompt
    city: Option<String>,

    /// Path to config.toml (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the forecast service endpoint
    #[arg(long, env = "CITYWEATHER_SERVICE_URL")]
    service_url: Option<String>,

    /// Request timeout in seconds (0 disables it)
    #[arg(long)]
    timeout: Option<u64>,

    /// Retries after a transient failure
    #[arg(long)]
    retries: Option<u32>,

    /// Print the forecast as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    cityweather_core::init("warn")?;

    let config = load_config(&cli)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let provider = ForecastProvider::new(&config.forecast)
        .map_err(|e| anyhow::anyhow!("Failed to create forecast client: {}", e))?;

    let ok = match &cli.city {
        Some(city) => runtime.block_on(run_once(&provider, city, &cli, &config)),
        None => run_interactive(&runtime, Arc::new(provider), &cli, &config)?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn load_config(cli: &Cli) -> Result<Config> {
    let (mut config, _) = Config::load_validated(cli.config.as_deref())?;

    if let Some(url) = &cli.service_url {
        config.forecast.service_url = url.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.forecast.timeout_secs = timeout;
    }
    if let Some(retries) = cli.retries {
        config.forecast.max_retries = retries;
    }

    let validation = config.validate();
    if !validation.is_valid() {
        anyhow::bail!("Invalid options: {}", validation.error_summary());
    }

    Ok(config)
}

/// One lookup; Ctrl-C cancels it.
async fn run_once(provider: &ForecastProvider, city: &str, cli: &Cli, config: &Config) -> bool {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let result = provider.get_forecast_cancellable(city, &cancel).await;
    print_result(&result, cli, config)
}

/// Prompt loop: each line is a query run on the runtime while this thread
/// waits on the result channel. Lookups are not cancellable here; Ctrl-C
/// ends the whole session and the request timeout bounds each lookup.
fn run_interactive(
    runtime: &tokio::runtime::Runtime,
    provider: Arc<ForecastProvider>,
    cli: &Cli,
    config: &Config,
) -> Result<bool> {
    let (tx, rx) = mpsc::channel::<ForecastServiceMessage>();
    let stdin = std::io::stdin();
    let mut all_ok = true;

    loop {
        print!("City name: ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).context("Failed to read input")? == 0 {
            println!();
            break;
        }

        let place = line.trim_end_matches(['\r', '\n']).to_string();
        if place.trim().eq_ignore_ascii_case("quit") {
            break;
        }

        request_fetch(&tx, runtime.handle(), provider.clone(), place, None);

        let ForecastServiceMessage::FetchDone { place, result } =
            rx.recv().context("Forecast worker stopped")?;
        tracing::debug!("Lookup for {:?} finished", place);
        let printed = print_result(&result, cli, config);
        if affects_exit_status(&result) {
            all_ok &= printed;
        }
        println!();
    }

    Ok(all_ok)
}

/// Whether an interactive result affects the exit status. A blank line only
/// re-prompts.
fn affects_exit_status(result: &Result<Forecast, ForecastError>) -> bool {
    !matches!(result, Err(ForecastError::EmptyInput))
}

fn print_result(result: &Result<Forecast, ForecastError>, cli: &Cli, config: &Config) -> bool {
    match result {
        Ok(forecast) if cli.json => match serde_json::to_string_pretty(forecast) {
            Ok(json) => {
                println!("{}", json);
                true
            }
            Err(e) => {
                eprintln!("Failed to encode forecast: {}", e);
                false
            }
        },
        Ok(forecast) => {
            println!(
                "{}",
                render::render_forecast(forecast, &config.forecast.icon_base_url)
            );
            true
        }
        Err(e) => {
            tracing::debug!(kind = e.kind(), "Lookup failed: {}", e);
            println!("{}", render::render_error(e));
            false
        }
    }
}
