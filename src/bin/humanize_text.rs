use anyhow::{bail, Context, Result};
use humanizer_lib::services::text_processor::{detect_language, normalize_punctuation};
use humanizer_lib::{
    init_logging, Approach, CancelToken, ConfigStore, DetectionReport, HumanizationSession, HumanizeEvent,
    HumanizeOutcome, OptimizationHistoryItem, Pipeline,
};
use serde::Serialize;
use std::io::Read;

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read stdin failed")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("read file failed: {}", path))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HumanizeOutput {
    session_id: String,
    language: String,
    remote: bool,
    outcome: HumanizeOutcome,
    history: Vec<OptimizationHistoryItem>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || has_flag(&args, "--help") {
        eprintln!(
            "Usage:\n  humanize_text <path|-> [--remote] [--provider <name[:model]>] [--target <n>] [--approach <standard|aggressive|ultra>] [--style <s>] [--iterations <n>] [--no-auto] [--detect-only] [--out <json_path>]\n\nNotes:\n  - Without --remote everything runs on local heuristics; no API key needed.\n  - Progress is logged to stderr; the JSON result goes to stdout (or --out)."
        );
        return Ok(());
    }

    init_logging();

    let path = args[1].clone();
    let use_remote = has_flag(&args, "--remote");
    let detect_only = has_flag(&args, "--detect-only");
    let out_path = parse_arg_value(&args, "--out");

    let mut config = match ConfigStore::default_config_dir() {
        Some(dir) => ConfigStore::new(dir).load()?,
        None => Default::default(),
    };
    if let Some(provider) = parse_arg_value(&args, "--provider") {
        config.remote.provider = provider;
    }

    let pipeline = if use_remote {
        Pipeline::from_config(&config)?
    } else {
        Pipeline::local(&config)
    };

    let mut options = pipeline.defaults.clone();
    if let Some(target) = parse_arg_value(&args, "--target") {
        options.target_score = target.parse().with_context(|| format!("invalid --target: {}", target))?;
    }
    if let Some(approach) = parse_arg_value(&args, "--approach") {
        options.approach = Approach::from_str(&approach);
    }
    if let Some(style) = parse_arg_value(&args, "--style") {
        options.style = style;
    }
    if let Some(iterations) = parse_arg_value(&args, "--iterations") {
        options.iterations = iterations
            .parse()
            .with_context(|| format!("invalid --iterations: {}", iterations))?;
    }
    if has_flag(&args, "--no-auto") {
        options.auto_optimize = false;
    }
    if !(0..=100).contains(&options.target_score) {
        bail!("--target must be between 0 and 100");
    }

    let text = normalize_punctuation(&read_input(&path)?);
    let language = detect_language(&text).code().to_string();

    let cancel = CancelToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    eprintln!("Input: {} ({} chars, {})", path, text.chars().count(), language);
    eprintln!("Mode: {}", if use_remote { "remote" } else { "local" });

    let json = if detect_only {
        let report: DetectionReport = pipeline.detection().detect(&text, use_remote, &cancel).await?;
        serde_json::to_string_pretty(&report)?
    } else {
        let mut session = HumanizationSession::new();
        let outcome = pipeline
            .orchestrator
            .humanize(&mut session, &text, use_remote, &options, &cancel, |event: &HumanizeEvent| {
                match event {
                    HumanizeEvent::InputScored { ai_score } => eprintln!("Input AI score: {}", ai_score),
                    HumanizeEvent::PassCompleted { iteration, score, text } => {
                        eprintln!("[P{:02}] human={}  {}", iteration, score, preview(text, 100))
                    }
                    HumanizeEvent::Finished { score, iterations } => {
                        eprintln!("Finished: human={} after {} pass(es)", score, iterations)
                    }
                    HumanizeEvent::StateChanged { .. } => {}
                }
            })
            .await?;

        let output = HumanizeOutput {
            session_id: session.id().to_string(),
            language,
            remote: use_remote,
            outcome,
            history: session.history().to_vec(),
        };
        serde_json::to_string_pretty(&output)?
    };

    match out_path {
        Some(out_path) => {
            std::fs::write(&out_path, &json).with_context(|| format!("write out failed: {}", out_path))?;
            eprintln!("Wrote JSON: {}", out_path);
        }
        None => println!("{}", json),
    }

    Ok(())
}
