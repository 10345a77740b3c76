use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use simplelog::{ColorChoice, LevelFilter, TermLogger, TerminalMode};
use uuid::Uuid;

use threat_hub::detectors::{LogAnalyzer, MalwareDetector, NetworkIds};
use threat_hub::{
    Alert, AlertStore, CorrelatedFinding, CorrelationEngine, Detector, HubConfig, Incident,
    IncidentStatus, IncidentStore, IncidentUpdate, NewIncident, ScanInput, Severity, SourceModule,
    ThreatLevelPolicy, ValidationMode,
};

const ALERTS_FILE: &str = "alerts.jsonl";
const INCIDENTS_FILE: &str = "incidents.jsonl";
const CONFIG_FILE: &str = "config/hub_rules.json";

#[derive(Parser)]
#[command(name = "hub-cli")]
#[command(about = "Threat Intelligence Hub command line interface", long_about = None)]
struct Cli {
    /// Directory holding the alert and incident journals
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Rule configuration file
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a detector over an input file and record its alerts
    Scan {
        /// Which detector to run
        module: ScanTarget,

        /// Input file: text lines for logs, JSON/JSONL records otherwise
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Display the recorded alert population
    Threats {
        /// Filter by module (network, logs, malware)
        #[arg(short, long)]
        module: Option<String>,

        /// Filter by severity (LOW, MEDIUM, HIGH, CRITICAL)
        #[arg(short, long)]
        severity: Option<String>,

        /// Show only the last N alerts
        #[arg(short, long)]
        last: Option<usize>,
    },

    /// Correlate the recorded alerts into findings
    Correlate,

    /// Manage incidents
    Incident {
        #[command(subcommand)]
        action: IncidentAction,
    },

    /// Show platform statistics and the current threat level
    Stats,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScanTarget {
    Network,
    Logs,
    Malware,
}

#[derive(Subcommand)]
enum IncidentAction {
    /// Open a new incident
    Open {
        #[arg(long)]
        title: Option<String>,

        /// LOW, MEDIUM, HIGH, or CRITICAL
        #[arg(long)]
        severity: Option<String>,

        #[arg(long)]
        assigned_to: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Alert/finding ids this incident is about (repeatable)
        #[arg(long = "threat-id")]
        threat_ids: Vec<Uuid>,
    },

    /// Apply a partial update to an incident
    Update {
        id: u64,

        /// Open, InProgress, Resolved, or Closed
        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        severity: Option<String>,

        #[arg(long)]
        assigned_to: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List incidents
    List {
        /// Filter by status (Open, InProgress, Resolved, Closed)
        #[arg(long)]
        status: Option<String>,
    },
}

fn main() -> Result<()> {
    TermLogger::init(
        LevelFilter::Info,
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let cli = Cli::parse();
    fs::create_dir_all(&cli.data_dir)?;

    let config = HubConfig::load(&cli.config);
    config.validate().context("invalid configuration")?;

    match cli.command {
        Commands::Scan { module, input } => run_scan(&cli.data_dir, &config, module, &input)?,
        Commands::Threats {
            module,
            severity,
            last,
        } => show_threats(&cli.data_dir, module, severity, last)?,
        Commands::Correlate => run_correlate(&cli.data_dir, &config)?,
        Commands::Incident { action } => run_incident(&cli.data_dir, &config, action)?,
        Commands::Stats => show_stats(&cli.data_dir, &config)?,
    }

    Ok(())
}

fn run_scan(data_dir: &Path, config: &HubConfig, target: ScanTarget, input: &Path) -> Result<()> {
    let detector: Box<dyn Detector> = match target {
        ScanTarget::Network => Box::new(NetworkIds::with_heuristic_scorer(config.network.clone())),
        ScanTarget::Logs => Box::new(LogAnalyzer::new(config)?),
        ScanTarget::Malware => Box::new(MalwareDetector::new(&config.malware)?),
    };

    let content = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let scan_input = if content.trim_start().starts_with('[') {
        ScanInput::Records(serde_json::from_str(&content).context("invalid JSON array input")?)
    } else {
        ScanInput::Lines(content.lines().map(str::to_string).collect())
    };

    log::info!("Starting {} scan over {}", detector.name(), input.display());

    // Alerts stream through a channel to a collector that journals and
    // prints them while the scan runs.
    let (alert_tx, alert_rx) = crossbeam_channel::unbounded::<Alert>();
    let alerts_path = data_dir.join(ALERTS_FILE);
    let collector = thread::spawn(move || -> Result<Vec<Alert>> {
        let mut journal = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&alerts_path)?;
        let mut collected = Vec::new();
        for alert in alert_rx {
            writeln!(journal, "{}", serde_json::to_string(&alert)?)?;
            print_alert(&alert);
            collected.push(alert);
        }
        Ok(collected)
    });

    let result = detector.scan(&scan_input);
    for alert in result.alerts {
        alert_tx.send(alert)?;
    }
    drop(alert_tx);

    let batch = collector
        .join()
        .map_err(|_| anyhow::anyhow!("alert collector panicked"))??;

    println!();
    println!(
        "{} {} records, {} alerts, {} malformed records skipped",
        "Scan complete:".bold(),
        result.stats.records_seen,
        result.stats.alerts_emitted,
        result.stats.errors
    );

    let engine = CorrelationEngine::new(config)?;
    let outcome = engine.correlate(&batch);
    if !outcome.findings.is_empty() {
        println!("\n{}", "Correlated findings in this batch:".bold());
        for finding in &outcome.findings {
            print_finding(finding);
        }
    }
    if outcome.rule_errors > 0 {
        println!(
            "{}",
            format!("{} alerts skipped by rule matchers", outcome.rule_errors).yellow()
        );
    }

    Ok(())
}

fn show_threats(
    data_dir: &Path,
    module: Option<String>,
    severity: Option<String>,
    last: Option<usize>,
) -> Result<()> {
    let module = match module {
        Some(token) => match SourceModule::from_query(&token) {
            Some(module) => Some(module),
            None => bail!(
                "unknown module: {} (expected network, logs, or malware)",
                token
            ),
        },
        None => None,
    };
    let severity: Option<Severity> = match severity {
        Some(s) => Some(s.parse().map_err(anyhow::Error::msg)?),
        None => None,
    };

    let mut alerts = load_alerts(data_dir)?;
    if let Some(module) = module {
        alerts.retain(|a| a.source_module == module);
    }
    if let Some(severity) = severity {
        alerts.retain(|a| a.severity == severity);
    }
    if let Some(n) = last {
        let start = alerts.len().saturating_sub(n);
        alerts = alerts[start..].to_vec();
    }

    if alerts.is_empty() {
        println!("{}", "No alerts matching criteria.".yellow());
        return Ok(());
    }

    for alert in &alerts {
        print_alert(alert);
    }
    println!("\n{} {}", "Total:".bold(), alerts.len());

    Ok(())
}

fn run_correlate(data_dir: &Path, config: &HubConfig) -> Result<()> {
    let alerts = load_alerts(data_dir)?;
    let engine = CorrelationEngine::new(config)?;
    let outcome = engine.correlate(&alerts);

    if outcome.findings.is_empty() {
        println!(
            "{}",
            "No patterns detected in the current population.".green()
        );
    } else {
        for finding in &outcome.findings {
            print_finding(finding);
        }
    }
    if outcome.rule_errors > 0 {
        println!(
            "{}",
            format!("{} alerts skipped by rule matchers", outcome.rule_errors).yellow()
        );
    }

    Ok(())
}

fn run_incident(data_dir: &Path, config: &HubConfig, action: IncidentAction) -> Result<()> {
    let mode = if config.strict_incident_validation {
        ValidationMode::Strict
    } else {
        ValidationMode::Lenient
    };
    let store = IncidentStore::with_mode(mode);
    store.preload(load_incidents(data_dir)?);

    match action {
        IncidentAction::Open {
            title,
            severity,
            assigned_to,
            notes,
            threat_ids,
        } => {
            let severity = severity
                .map(|s| s.parse::<Severity>().map_err(anyhow::Error::msg))
                .transpose()?;
            let incident = store.create(NewIncident {
                threat_ids,
                title,
                severity,
                assigned_to,
                notes,
            })?;
            save_incidents(data_dir, &store.list(None))?;
            println!("{} #{}", "Opened incident".green().bold(), incident.id);
            print_incident(&incident);
        }
        IncidentAction::Update {
            id,
            status,
            title,
            severity,
            assigned_to,
            notes,
        } => {
            let status = status
                .map(|s| s.parse::<IncidentStatus>().map_err(anyhow::Error::msg))
                .transpose()?;
            let severity = severity
                .map(|s| s.parse::<Severity>().map_err(anyhow::Error::msg))
                .transpose()?;
            let incident = store.update(
                id,
                IncidentUpdate {
                    threat_ids: None,
                    title,
                    severity,
                    status,
                    assigned_to,
                    notes,
                },
            )?;
            save_incidents(data_dir, &store.list(None))?;
            println!("{} #{}", "Updated incident".green().bold(), incident.id);
            print_incident(&incident);
        }
        IncidentAction::List { status } => {
            let status = status
                .map(|s| s.parse::<IncidentStatus>().map_err(anyhow::Error::msg))
                .transpose()?;
            let incidents = store.list(status);
            if incidents.is_empty() {
                println!("{}", "No incidents.".yellow());
            } else {
                for incident in &incidents {
                    print_incident(incident);
                }
            }
        }
    }

    Ok(())
}

fn show_stats(data_dir: &Path, config: &HubConfig) -> Result<()> {
    let alerts = load_alerts(data_dir)?;
    let incidents = load_incidents(data_dir)?;

    let store = AlertStore::new();
    store.ingest(alerts.clone());
    let counts = store.counts_by_module();
    let severities = store.counts_by_severity();

    println!("\n{}", "Threat Intelligence Hub - Statistics".bold());
    println!("  network_alerts:      {}", counts.network_alerts);
    println!("  log_events:          {}", counts.log_events);
    println!("  malware_detections:  {}", counts.malware_detections);
    println!("  incidents:           {}", incidents.len());
    println!(
        "  by severity:         {} LOW / {} MEDIUM / {} HIGH / {} CRITICAL",
        severities.low, severities.medium, severities.high, severities.critical
    );

    let count_level = threat_hub::threat_level::level(ThreatLevelPolicy::CountBased, &alerts, &[]);
    let severity_level =
        threat_hub::threat_level::level(ThreatLevelPolicy::SeverityBased, &alerts, &incidents);
    println!(
        "  threat level (count policy):    {}",
        colored_severity(count_level)
    );
    println!(
        "  threat level (severity policy): {}",
        colored_severity(severity_level)
    );

    let engine = CorrelationEngine::new(config)?;
    let outcome = engine.correlate(&alerts);
    println!("  active findings:     {}", outcome.findings.len());

    Ok(())
}

fn load_alerts(data_dir: &Path) -> Result<Vec<Alert>> {
    load_jsonl(&data_dir.join(ALERTS_FILE))
}

fn load_incidents(data_dir: &Path) -> Result<Vec<Incident>> {
    load_jsonl(&data_dir.join(INCIDENTS_FILE))
}

/// Reads a JSONL journal, skipping lines that no longer parse.
fn load_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut items = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(item) => items.push(item),
            Err(e) => log::warn!("Skipping unreadable journal line: {}", e),
        }
    }
    Ok(items)
}

fn save_incidents(data_dir: &Path, incidents: &[Incident]) -> Result<()> {
    let mut file = File::create(data_dir.join(INCIDENTS_FILE))?;
    for incident in incidents {
        writeln!(file, "{}", serde_json::to_string(incident)?)?;
    }
    Ok(())
}

fn colored_severity(severity: Severity) -> ColoredString {
    match severity {
        Severity::Critical => severity.as_str().red().bold(),
        Severity::High => severity.as_str().red(),
        Severity::Medium => severity.as_str().yellow(),
        Severity::Low => severity.as_str().green(),
    }
}

fn print_alert(alert: &Alert) {
    println!(
        "[{}] {} {} ({})",
        alert.created_at.to_rfc3339().bright_black(),
        colored_severity(alert.severity),
        alert.threat_type.bright_white().bold(),
        alert.source_module
    );
    println!("  {} {}", "Details:".bright_blue(), alert.description);
}

fn print_finding(finding: &CorrelatedFinding) {
    println!(
        "[{}] {}",
        colored_severity(finding.severity),
        finding.pattern_type.bright_white().bold()
    );
    println!("  {} {}", "Details:".bright_blue(), finding.description);
    println!(
        "  {} {} alerts over {}",
        "Members:".bright_blue(),
        finding.event_count,
        finding.time_span
    );
    if !finding.attack_chain.is_empty() {
        let chain: Vec<&str> = finding.attack_chain.iter().map(|s| s.as_str()).collect();
        println!("  {} {}", "Chain:".bright_blue(), chain.join(" -> "));
    }
}

fn print_incident(incident: &Incident) {
    println!(
        "#{} [{}] {} {}",
        incident.id,
        colored_severity(incident.severity),
        incident.status.as_str().cyan(),
        incident.title.bright_white().bold()
    );
    println!(
        "  {} {}  {} {}",
        "Assigned:".bright_blue(),
        incident.assigned_to,
        "Updated:".bright_blue(),
        incident.updated_at.to_rfc3339().bright_black()
    );
    if !incident.threat_ids.is_empty() {
        println!(
            "  {} {}",
            "Threats:".bright_blue(),
            incident
                .threat_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    if !incident.notes.is_empty() {
        println!("  {} {}", "Notes:".bright_blue(), incident.notes);
    }
}
