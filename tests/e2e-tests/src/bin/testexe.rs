//! Stand-in for the external tools rtbench drives.
//!
//! Without `-h` it behaves like a load: it runs until SIGINT/SIGTERM (or
//! for `--run-duration-ms`), optionally ignoring either signal and
//! optionally forking a long-lived child into its process group.
//!
//! With `-h<buckets>` it behaves like cyclictest: it accepts cyclictest's
//! flags, records a synthetic latency per thread every tick and prints the
//! histogram in cyclictest's format when signalled.

use clap::Parser;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{interval, sleep};

#[derive(Parser, Debug)]
#[command(name = "testexe", disable_help_flag = true)]
#[command(about = "Load and latency-sampler stand-in for rtbench testing", long_about = None)]
struct Args {
    /// cyclictest: quiet
    #[arg(short = 'q')]
    quiet: bool,

    /// cyclictest: lock memory
    #[arg(short = 'm')]
    mlock: bool,

    /// cyclictest: wakeup interval in microseconds
    #[arg(short = 'i', default_value = "100")]
    interval: u32,

    /// cyclictest: interval increment per thread
    #[arg(short = 'd', default_value = "0")]
    distance: u32,

    /// cyclictest: histogram buckets; turns on sampler mode
    #[arg(short = 'h')]
    histogram: Option<usize>,

    /// cyclictest: thread priority
    #[arg(short = 'p', default_value = "0")]
    priority: u32,

    /// cyclictest: one thread per cpu
    #[arg(long)]
    smp: bool,

    /// cyclictest: one thread per cpu, NUMA aware
    #[arg(long)]
    numa: bool,

    /// cyclictest: thread count
    #[arg(short = 't')]
    threads: Option<usize>,

    /// Exit on its own after this many milliseconds (0 = run until signalled)
    #[arg(long, default_value = "0")]
    run_duration_ms: u64,

    /// Exit code used when exiting
    #[arg(long, default_value = "0")]
    exit_code: i32,

    /// Keep running on SIGINT
    #[arg(long)]
    ignore_sigint: bool,

    /// Keep running on SIGTERM
    #[arg(long)]
    ignore_sigterm: bool,

    /// Write our pid here once running
    #[arg(long)]
    pid_file: Option<PathBuf>,

    /// Fork a `sleep` child and write its pid here
    #[arg(long)]
    child_pid_file: Option<PathBuf>,
}

impl Args {
    fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// Per-thread latency histogram, as cyclictest keeps it.
struct Histogram {
    buckets: usize,
    counts: Vec<Vec<u64>>,
    overflows: Vec<u64>,
}

impl Histogram {
    fn new(buckets: usize, threads: usize) -> Self {
        Self {
            buckets,
            counts: vec![vec![0; buckets]; threads],
            overflows: vec![0; threads],
        }
    }

    fn record(&mut self, thread: usize, latency: usize) {
        if latency < self.buckets {
            self.counts[thread][latency] += 1;
        } else {
            self.overflows[thread] += 1;
        }
    }

    fn print(&self) {
        println!("# Histogram");
        for index in 0..self.buckets {
            let mut line = format!("{:06}", index);
            for thread in &self.counts {
                line.push_str(&format!("\t{:06}", thread[index]));
            }
            println!("{}", line);
        }
        let totals: Vec<String> = self
            .counts
            .iter()
            .map(|c| format!("{:09}", c.iter().sum::<u64>()))
            .collect();
        println!("# Total: {}", totals.join(" "));
        let overflows: Vec<String> = self.overflows.iter().map(|o| format!("{:05}", o)).collect();
        println!("# Histogram Overflows: {}", overflows.join(" "));
    }
}

fn write_pid(path: &PathBuf, pid: u32) {
    if let Err(e) = std::fs::write(path, format!("{}\n", pid)) {
        eprintln!("testexe: failed to write {}: {}", path.display(), e);
        std::process::exit(2);
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // before the pid file, so a stop right after start is still handled
    let (Ok(mut sigint), Ok(mut sigterm)) = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) else {
        eprintln!("testexe: failed to install signal handlers");
        std::process::exit(2);
    };

    if let Some(path) = &args.pid_file {
        write_pid(path, std::process::id());
    }

    // kept alive for the lifetime of main so the child stays in our group
    let _child = match &args.child_pid_file {
        Some(path) => {
            let child = std::process::Command::new("sleep")
                .arg("3600")
                .stdin(Stdio::null())
                .spawn();
            match child {
                Ok(child) => {
                    write_pid(path, child.id());
                    Some(child)
                }
                Err(e) => {
                    eprintln!("testexe: failed to spawn child: {}", e);
                    std::process::exit(2);
                }
            }
        }
        None => None,
    };

    let mut histogram = args
        .histogram
        .map(|buckets| Histogram::new(buckets, args.thread_count()));

    let run_for = (args.run_duration_ms > 0).then(|| Duration::from_millis(args.run_duration_ms));
    let deadline = sleep(run_for.unwrap_or(Duration::from_secs(u32::MAX as u64)));
    tokio::pin!(deadline);

    // no faster than 10ms; the latencies are synthetic anyway
    let mut tick = interval(Duration::from_micros(u64::from(args.interval)).max(Duration::from_millis(10)));
    let mut ticks: usize = 0;

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = sigint.recv() => {
                if !args.ignore_sigint {
                    break;
                }
            }
            _ = sigterm.recv() => {
                if !args.ignore_sigterm {
                    break;
                }
            }
            _ = tick.tick() => {
                if let Some(h) = histogram.as_mut() {
                    ticks += 1;
                    for thread in 0..h.counts.len() {
                        h.record(thread, (ticks * 7 + thread * 3) % 17 + 1);
                    }
                }
            }
        }
    }

    if let Some(h) = &histogram {
        h.print();
    }
    std::process::exit(args.exit_code);
}
