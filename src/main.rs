// BRAINHUNT - Continuous Brain-Wallet Passphrase Auditor
// Pipeline: source → dedup ledger → key derivation → balance oracle → store

use std::io::{stdout, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use brainhunt::oracle::{BalanceOracle, BalanceOutcome, BlockchainInfoOracle};
use brainhunt::stats::StatsAggregator;
use brainhunt::store::ResultStore;
use brainhunt::{Config, Engine};

#[derive(Parser, Debug)]
#[command(author, version, about = "Continuous brain-wallet passphrase auditor")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the discovery engine until Ctrl+C
    Run {
        /// Number of concurrent pipeline workers
        #[arg(short, long)]
        workers: Option<usize>,
        /// State directory (ledger, attempts, results, stats)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        /// Oracle admission rate, requests per second
        #[arg(long)]
        rate: Option<f64>,
        /// Balance provider base URL
        #[arg(long)]
        oracle_url: Option<String>,
    },
    /// Derive key material for one passphrase and check its balance
    TestCrypto { passphrase: String },
    /// Print cumulative statistics
    Stats {
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
    /// Clear results, attempt history and stats (the dedup ledger is kept)
    Clear {
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
}

fn build_config(
    workers: Option<usize>,
    data_dir: Option<PathBuf>,
    rate: Option<f64>,
    oracle_url: Option<String>,
) -> Config {
    let mut config = Config::default();
    if let Some(w) = workers {
        config.workers = w;
    }
    if let Some(d) = data_dir {
        config.data_dir = d;
    }
    if let Some(r) = rate {
        config.requests_per_sec = r;
    }
    if let Some(u) = oracle_url {
        config.oracle_url = u;
    }
    config
}

fn main() -> brainhunt::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Command::Run {
            workers,
            data_dir,
            rate,
            oracle_url,
        } => run(build_config(workers, data_dir, rate, oracle_url)),
        Command::TestCrypto { passphrase } => test_crypto(&passphrase),
        Command::Stats { data_dir } => {
            let config = build_config(None, data_dir, None, None);
            print_stats(&config)
        }
        Command::Clear { data_dir } => {
            let config = build_config(None, data_dir, None, None);
            clear(&config)
        }
    }
}

fn run(config: Config) -> brainhunt::Result<()> {
    println!("\n\x1b[1;36m╔═══════════════════════════════════════════════════════╗");
    println!("║   BRAINHUNT  •  Brain-Wallet Passphrase Auditor        ║");
    println!("║   continuous • deduplicated • rate-limited             ║");
    println!("╚═══════════════════════════════════════════════════════╝\x1b[0m\n");

    let engine = Arc::new(Engine::with_default_oracle(config)?);

    let quit = Arc::new(AtomicBool::new(false));
    let quit_sig = quit.clone();
    ctrlc::set_handler(move || {
        println!("\n[!] Stopping...");
        quit_sig.store(true, Ordering::SeqCst);
    })
    .ok();

    let start = Instant::now();
    engine.start()?;
    println!("[▶] Hunting... (Ctrl+C to stop)\n");

    let mut last_stat = Instant::now();
    while !quit.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));

        if last_stat.elapsed() >= Duration::from_millis(500) {
            let status = engine.status();
            let snap = engine.stats_snapshot();
            print!(
                "\r[⚡] {} checked | {:.0}/h | {} found | now: {:<30}",
                format_num(snap.total_checked_passphrases),
                status.progress,
                status.found_keys,
                truncate(&status.current_passphrase, 30),
            );
            stdout().flush().ok();
            last_stat = Instant::now();
        }
    }

    engine.stop()?;

    let snap = engine.stats_snapshot();
    let elapsed = start.elapsed().as_secs_f64();
    println!(
        "\n\n[Done] {} checked, {} found in {}",
        format_num(snap.total_checked_passphrases),
        snap.total_successful_cracks,
        format_time(elapsed)
    );
    Ok(())
}

fn test_crypto(passphrase: &str) -> brainhunt::Result<()> {
    let config = Config::default();
    let derived = brainhunt::derive(passphrase)?;

    println!("Passphrase:  {}", passphrase);
    println!("Private key: {}", derived.private_key_hex);
    println!("WIF:         {}", derived.private_key_wif);
    println!("Address:     {}", derived.address);

    let oracle = BlockchainInfoOracle::new(&config)?;
    match oracle.lookup(&derived.address, &AtomicBool::new(false))? {
        BalanceOutcome::Confirmed(balance) => println!("Balance:     {:.8} BTC", balance),
        BalanceOutcome::Unknown => println!("Balance:     unavailable (provider unreachable)"),
    }
    Ok(())
}

fn print_stats(config: &Config) -> brainhunt::Result<()> {
    let stats = StatsAggregator::open(&config.data_dir)?;
    let snap = stats.snapshot();
    let counters = stats.counters();

    println!("Checked passphrases: {}", format_num(snap.total_checked_passphrases));
    println!("Total attempts:      {}", format_num(snap.total_attempts));
    println!("Successful cracks:   {}", snap.total_successful_cracks);
    println!("Success rate:        {:.6}%", snap.success_rate_percentage);
    println!("Derivation faults:   {}", counters.derivation_faults);
    println!("Lookup failures:     {}", counters.lookup_failures);
    Ok(())
}

fn clear(config: &Config) -> brainhunt::Result<()> {
    let store = ResultStore::open(&config.data_dir, config.recent_attempts)?;
    store.clear()?;
    let stats = StatsAggregator::open(&config.data_dir)?;
    stats.reset()?;
    println!("[✓] Results, attempts and stats cleared (ledger kept)");
    Ok(())
}

fn format_num(n: u64) -> String {
    let s = n.to_string();
    let mut r = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            r.push(',');
        }
        r.push(c);
    }
    r.chars().rev().collect()
}

fn format_time(s: f64) -> String {
    if s < 60.0 {
        format!("{:.0}s", s)
    } else if s < 3600.0 {
        format!("{:.0}m{:.0}s", s / 60.0, s % 60.0)
    } else {
        format!("{:.0}h{:.0}m", s / 3600.0, (s % 3600.0) / 60.0)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
