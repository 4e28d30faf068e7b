//! # Store Server Daemon
//!
//! Binary entry point for the slotstore server. All of the administrative
//! glue lives here: argument parsing, logging setup and the signal
//! handlers that feed the loop's edge-triggered flags (SIGINT/SIGTERM
//! request shutdown, SIGHUP rotates the log level). A periodic alarm
//! raises the flush flag every 15 seconds so dirty cache entries never
//! sit unwritten for long on an otherwise idle server.
//!
//! ## Usage
//!
//! ```bash
//! # Serve the default data file in the current directory
//! slotstored
//!
//! # Explicit data file and cache size
//! slotstored --db /var/lib/slotstore.dat --cache 128
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use eyre::{bail, Result};

use slotstore::config::{CACHE_ENTRIES, DB_FILE_NAME};
use slotstore::{ServerConfig, StoreServer};

struct Flags {
    shutdown: Arc<AtomicBool>,
    rotate: Arc<AtomicBool>,
    flush: Arc<AtomicBool>,
    stats: Arc<AtomicBool>,
}

static FLAGS: OnceLock<Flags> = OnceLock::new();

/// Seconds between automatic flushes of dirty cache entries.
const FLUSH_INTERVAL_SECS: libc::c_uint = 15;

extern "C" fn handle_signal(sig: libc::c_int) {
    // Only atomic stores and alarm() here; the loop does the real work.
    if let Some(flags) = FLAGS.get() {
        match sig {
            libc::SIGINT | libc::SIGTERM => flags.shutdown.store(true, Ordering::Relaxed),
            libc::SIGHUP => flags.rotate.store(true, Ordering::Relaxed),
            libc::SIGUSR1 => flags.stats.store(true, Ordering::Relaxed),
            libc::SIGUSR2 => flags.flush.store(true, Ordering::Relaxed),
            libc::SIGALRM => {
                flags.flush.store(true, Ordering::Relaxed);
                // One-shot timer: re-arm for the next interval.
                unsafe { libc::alarm(FLUSH_INTERVAL_SECS) };
            }
            _ => {}
        }
    }
}

fn install_signal_handlers() -> Result<()> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handle_signal as extern "C" fn(libc::c_int) as usize;
        // No SA_RESTART: the blocking receive must come back with EINTR so
        // the loop re-checks its flags.
        action.sa_flags = 0;
        libc::sigemptyset(&mut action.sa_mask);

        for sig in [
            libc::SIGINT,
            libc::SIGTERM,
            libc::SIGHUP,
            libc::SIGUSR1,
            libc::SIGUSR2,
            libc::SIGALRM,
        ] {
            if libc::sigaction(sig, &action, std::ptr::null_mut()) != 0 {
                bail!("failed to install handler for signal {sig}");
            }
        }
    }
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let mut db_path = PathBuf::from(DB_FILE_NAME);
    let mut cache_entries = CACHE_ENTRIES;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            "--version" | "-v" => {
                println!("slotstored {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--db" => {
                i += 1;
                match args.get(i) {
                    Some(path) => db_path = PathBuf::from(path),
                    None => bail!("--db requires a path"),
                }
            }
            "--cache" => {
                i += 1;
                match args.get(i) {
                    Some(n) => {
                        cache_entries = n
                            .parse()
                            .map_err(|_| eyre::eyre!("--cache requires a number, got {n:?}"))?;
                    }
                    None => bail!("--cache requires a number"),
                }
            }
            arg => bail!("Unknown option: {arg}"),
        }
        i += 1;
    }

    slotstore::logging::init();

    let mut config = ServerConfig::new(db_path);
    config.cache_entries = cache_entries;

    let server = StoreServer::bind(config)?;
    let _ = FLAGS.set(Flags {
        shutdown: server.shutdown_flag(),
        rotate: server.rotate_log_flag(),
        flush: server.flush_flag(),
        stats: server.stats_flag(),
    });
    install_signal_handlers()?;
    unsafe { libc::alarm(FLUSH_INTERVAL_SECS) };

    server.run()
}

fn print_usage() {
    println!("slotstore server");
    println!();
    println!("USAGE:");
    println!("    slotstored [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --db <path>      Data file (default: {DB_FILE_NAME})");
    println!("    --cache <n>      Cache entries (default: {CACHE_ENTRIES})");
    println!("    -h, --help       Show this help");
    println!("    -v, --version    Show version");
    println!();
    println!("SIGNALS:");
    println!("    SIGINT/SIGTERM   Flush, close and exit");
    println!("    SIGHUP           Rotate log level (error→info→debug→trace)");
    println!("    SIGUSR1          Log cache stats");
    println!("    SIGUSR2          Flush all dirty cache entries");
    println!();
    println!("Dirty cache entries are also flushed automatically every");
    println!("{FLUSH_INTERVAL_SECS} seconds.");
}
