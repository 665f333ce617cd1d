use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use interview_scheduler::display::{print_interest_popularity, print_run_summary, print_unchosen_hosts};
use interview_scheduler::export::export_all;
use interview_scheduler::logging::init_tracing;
use interview_scheduler::parser::load_record_store;
use interview_scheduler::{
    run_scheduler, EngineConfig, ExhaustionContext, ExhaustionDecision, ExhaustionPolicy, StopOnExhaustion,
};

#[derive(Parser)]
#[command(name = "interview-scheduler")]
#[command(about = "Allocates interview slots between hosts and requesters")]
struct Args {
    /// Directory holding hosts.csv, requesters.csv and the optional choice/cancellation files
    input: PathBuf,

    /// Directory the schedules and summary are written to
    #[arg(long, short, default_value = "out")]
    output: PathBuf,

    /// JSON file overriding the default engine settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base seed; a run with the same seed and input is reproducible
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    max_attempts: Option<usize>,

    /// Minimum interviews per host
    #[arg(long)]
    min_host: Option<usize>,

    /// Minimum interviews per requester
    #[arg(long)]
    min_requester: Option<usize>,

    /// Ask on the terminal whether to keep trying when the attempt budget runs out
    #[arg(long)]
    interactive: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_json_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }
        if let Some(min) = self.min_host {
            config.min_host_interviews = min;
        }
        if let Some(min) = self.min_requester {
            config.min_requester_interviews = min;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Terminal prompt shown when the attempt budget is spent
struct PromptOnExhaustion {
    increment: usize,
}

impl ExhaustionPolicy for PromptOnExhaustion {
    fn decide(&mut self, context: &ExhaustionContext) -> ExhaustionDecision {
        let report = &context.best_report;
        println!(
            "\nNo complete schedule after {} attempts. Best (attempt {}): {} host(s) and {} requester(s) below minimum.",
            context.attempts,
            context.best_attempt,
            report.hosts_below_min.len(),
            report.requesters_below_min.len()
        );
        print!("Try {} more attempts? [y/N] ", self.increment);
        let _ = io::stdout().flush();

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) if answer.trim().eq_ignore_ascii_case("y") => ExhaustionDecision::Continue,
            _ => ExhaustionDecision::Stop,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = args.engine_config()?;
    let labels = config.labels()?;

    println!("Loading records from {}...", args.input.display());
    let store = load_record_store(&args.input, &config)
        .with_context(|| format!("loading records from {}", args.input.display()))?;
    println!(
        "Loaded {} hosts and {} requesters ({} live / {} live)",
        store.hosts.len(),
        store.requesters.len(),
        store.live_hosts().count(),
        store.live_requesters().count()
    );
    print_interest_popularity(&store.interest_popularity());
    print_unchosen_hosts(&store.unchosen_hosts());

    println!("\n=== Running Scheduler ===");
    let mut policy: Box<dyn ExhaustionPolicy> = if args.interactive {
        Box::new(PromptOnExhaustion {
            increment: config.attempt_increment,
        })
    } else {
        Box::new(StopOnExhaustion)
    };
    let (roster, outcome) = run_scheduler(&store, &config, policy.as_mut());
    print_run_summary(&roster, &outcome);

    export_all(&roster, &outcome, &labels, &args.output)
        .with_context(|| format!("writing reports to {}", args.output.display()))?;
    info!(output = %args.output.display(), "reports written");
    println!("\nSchedules saved to {}", args.output.display());

    Ok(())
}
