//! Watch Command - follow executions until they finish

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use runwatch_common::{FetchError, LifecycleState, StatusSnapshot};
use runwatch_monitor::{JobPoller, MultiJobPoller, PollOptions};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::HttpStatusFetcher;
use crate::config::WatchConfig;
use crate::output::{self, JobReport, OutputFormat};

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Execution IDs to follow
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Poll interval in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Keep polling after executions reach a terminal state
    #[arg(long)]
    pub no_auto_stop: bool,

    /// Print console output without colours
    #[arg(long)]
    pub plain: bool,

    /// Do not print console output, only state changes and the summary
    #[arg(short, long)]
    pub quiet: bool,
}

/// Callback traffic forwarded from the poller to the printing loop
#[derive(Debug)]
enum WatchEvent {
    Update(StatusSnapshot),
    Terminal(StatusSnapshot),
    TransportError(String, FetchError),
}

enum Monitor {
    Single(JobPoller),
    Multi(MultiJobPoller),
}

impl Monitor {
    fn stop(&self) {
        match self {
            Monitor::Single(poller) => poller.stop(),
            Monitor::Multi(poller) => poller.stop(),
        }
    }

    fn is_polling(&self) -> bool {
        match self {
            Monitor::Single(poller) => poller.is_polling(),
            Monitor::Multi(poller) => poller.is_polling(),
        }
    }

    /// Latest snapshot, keyed by the id that was polled
    fn snapshot(&self, job_id: &str) -> Option<Arc<StatusSnapshot>> {
        match self {
            Monitor::Single(poller) => poller.snapshot(),
            Monitor::Multi(poller) => poller.snapshot(job_id),
        }
    }
}

/// Follow the executions; returns whether every one of them passed
pub async fn execute(args: WatchArgs, mut config: WatchConfig, format: OutputFormat) -> Result<bool> {
    if let Some(interval_ms) = args.interval_ms {
        config.poll.interval_ms = interval_ms;
    }
    if args.no_auto_stop {
        config.poll.auto_stop_on_terminal = false;
    }
    config.validate()?;

    let ids: BTreeSet<String> = args
        .ids
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    if ids.is_empty() {
        bail!("no execution ids given");
    }

    let fetcher = HttpStatusFetcher::new(&config)?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let options = forwarding_options(PollOptions::from_config(&config.poll), tx);

    let monitor = if ids.len() == 1 {
        let poller = JobPoller::new(fetcher, options);
        if let Some(id) = ids.iter().next() {
            poller.start(id.clone());
        }
        Monitor::Single(poller)
    } else {
        let poller = MultiJobPoller::new(fetcher, options);
        poller.set_job_ids(ids.iter().cloned());
        Monitor::Multi(poller)
    };

    let mut reporter = Reporter::new(args.plain, args.quiet, ids.len() > 1);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                warn!("Interrupted, stopping");
                monitor.stop();
                break;
            }
            event = rx.recv() => {
                let Some(event) = event else { break };
                reporter.handle(event);
            }
        }

        if config.poll.auto_stop_on_terminal && reporter.all_terminal(&ids) {
            debug!("Every execution reached a terminal state");
            break;
        }
        if config.poll.auto_stop_on_terminal && !monitor.is_polling() {
            while let Ok(event) = rx.try_recv() {
                reporter.handle(event);
            }
            debug!("Polling stopped");
            break;
        }
    }
    monitor.stop();
    reporter.finish();

    let reports: Vec<JobReport> = ids
        .iter()
        .filter_map(|id| monitor.snapshot(id))
        .map(|snapshot| JobReport::from(snapshot.as_ref()))
        .collect();
    println!();
    output::print_list(&reports, format);

    Ok(reports.len() == ids.len()
        && reports.iter().all(|r| r.state == LifecycleState::Passed))
}

fn forwarding_options(options: PollOptions, tx: mpsc::UnboundedSender<WatchEvent>) -> PollOptions {
    let update_tx = tx.clone();
    let terminal_tx = tx.clone();
    options
        .on_update(move |snapshot| {
            let _ = update_tx.send(WatchEvent::Update(snapshot.clone()));
        })
        .on_terminal(move |snapshot| {
            let _ = terminal_tx.send(WatchEvent::Terminal(snapshot.clone()));
        })
        .on_transport_error(move |id, err| {
            let _ = tx.send(WatchEvent::TransportError(id.to_string(), err.clone()));
        })
}

/// Prints what changed between successive snapshots
struct Reporter {
    plain: bool,
    quiet: bool,
    prefix_ids: bool,
    last: HashMap<String, StatusSnapshot>,
    bar: Option<ProgressBar>,
}

impl Reporter {
    fn new(plain: bool, quiet: bool, prefix_ids: bool) -> Self {
        Self {
            plain,
            quiet,
            prefix_ids,
            last: HashMap::new(),
            bar: None,
        }
    }

    fn handle(&mut self, event: WatchEvent) {
        match event {
            WatchEvent::Update(snapshot) => self.update(snapshot),
            WatchEvent::Terminal(snapshot) => {
                let message = format!("{} {}", snapshot.id, snapshot.lifecycle_state);
                self.clear_bar();
                match snapshot.lifecycle_state {
                    LifecycleState::Passed => output::print_success(&message),
                    _ => output::print_error(&message),
                }
            }
            WatchEvent::TransportError(id, err) => {
                self.println(format!("{} {}", self.prefix(&id), err.to_string().yellow()));
            }
        }
    }

    fn update(&mut self, snapshot: StatusSnapshot) {
        let previous = self.last.get(&snapshot.id);
        let prefix = self.prefix(&snapshot.id);

        let mut lines = Vec::new();
        if previous.map(|p| p.lifecycle_state) != Some(snapshot.lifecycle_state) {
            lines.push(format!("{}state: {}", prefix, snapshot.lifecycle_state.to_string().bold()));
        }
        if !self.quiet {
            for line in snapshot.output_since(previous) {
                lines.push(format!("{}{}", prefix, output::render_line(line, self.plain)));
            }
        }
        for artifact in snapshot.artifacts_since(previous) {
            lines.push(format!("{}artifact {} -> {}", prefix, artifact.name, artifact.reference));
        }
        if snapshot.lifecycle_state == LifecycleState::Cancelled {
            lines.push(format!("{}{}", prefix, "cancelled".yellow()));
        }
        for line in lines {
            self.println(line);
        }

        if !self.prefix_ids {
            self.track_progress(&snapshot);
        }
        self.last.insert(snapshot.id.clone(), snapshot);
    }

    fn track_progress(&mut self, snapshot: &StatusSnapshot) {
        if snapshot.is_terminal() {
            self.clear_bar();
            return;
        }
        let Some(progress) = snapshot.progress.as_ref() else {
            return;
        };

        let bar = self.bar.get_or_insert_with(|| {
            let bar = ProgressBar::new(progress.total as u64);
            bar.set_style(
                ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        });
        bar.set_length(progress.total as u64);
        bar.set_position(progress.current as u64);
        bar.set_message(progress.current_label.clone().unwrap_or_default());
    }

    fn prefix(&self, id: &str) -> String {
        if self.prefix_ids {
            format!("[{}] ", id)
        } else {
            String::new()
        }
    }

    fn println(&self, line: String) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => println!("{}", line),
        }
    }

    fn clear_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    fn all_terminal(&self, ids: &BTreeSet<String>) -> bool {
        ids.iter()
            .all(|id| self.last.get(id).map_or(false, |s| s.is_terminal()))
    }

    fn finish(&mut self) {
        self.clear_bar();
    }
}
