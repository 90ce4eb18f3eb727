//! Default logging setup for the lzdict tools and tests.
//!
//! Every line is prefixed with the elapsed time and the current and peak resident set size,
//! which is the number to watch when comparing dictionary strategies.
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]
#![warn(missing_docs)]

use std::{
    fmt,
    io::Write,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Instant,
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct MemoryAmount(usize);

impl fmt::Display for MemoryAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(char, u32); 3] = [('K', 10), ('M', 20), ('G', 30)];
        if self.0 < 1000 {
            return write!(f, "{:5}B", self.0);
        }
        let (unit, shift) = UNITS
            .into_iter()
            .find(|&(_, shift)| (self.0 as u64) < 1000u64 << shift)
            .unwrap_or(UNITS[2]);
        write!(f, "{:5.1}{unit}", self.0 as f64 / (1u64 << shift) as f64)
    }
}

/// Current and peak resident set size of this process.
struct RssStats {
    current: MemoryAmount,
    peak: MemoryAmount,
}

impl RssStats {
    #[cfg(all(target_os = "linux", not(miri)))]
    fn now() -> Self {
        // SAFETY: rusage is plain old data so all zeros is valid
        let mut rusage: libc::rusage = unsafe { std::mem::zeroed() };
        // SAFETY: getrusage only writes to the passed pointer, which is valid for writes
        let peak = if unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut rusage) } < 0 {
            0
        } else {
            rusage.ru_maxrss as usize * 1024
        };
        // SAFETY: sysconf has no preconditions
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) }.max(0) as usize;
        let resident_pages = std::fs::read_to_string("/proc/self/statm")
            .ok()
            .and_then(|statm| statm.split_ascii_whitespace().nth(1)?.parse::<usize>().ok())
            .unwrap_or(0);
        Self {
            current: MemoryAmount(resident_pages * page_size),
            peak: MemoryAmount(peak),
        }
    }

    #[cfg(not(all(target_os = "linux", not(miri))))]
    fn now() -> Self {
        Self {
            current: MemoryAmount(0),
            peak: MemoryAmount(0),
        }
    }
}

const TIMESTAMP_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::BrightBlack)));
const MEMORY_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Blue)));
const MEMORY_NEW_PEAK_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red)));
const MEMORY_PEAK_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::BrightBlack)));
const TARGET_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Magenta)));

/// Builder with the lzdict line format, reading its filter from `LZDICT_LOG` (default
/// `default_filter`) and its color choice from `LZDICT_LOG_STYLE`.
fn builder(default_filter: &str) -> env_logger::Builder {
    let start_time = Instant::now();
    let peak = AtomicUsize::new(RssStats::now().peak.0);
    let last_target = Mutex::new(String::new());

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::new()
            .filter_or("LZDICT_LOG", default_filter)
            .write_style("LZDICT_LOG_STYLE"),
    );
    builder.format(move |buf, record| {
        let elapsed = start_time.elapsed();
        let RssStats { current, peak: max } = RssStats::now();
        let new_peak = peak.fetch_max(max.0, Ordering::Relaxed) < max.0;
        let max_style = if new_peak {
            MEMORY_NEW_PEAK_STYLE
        } else {
            MEMORY_PEAK_STYLE
        };
        let prefix = format!(
            "{TIMESTAMP_STYLE}{elapsed:>9.2?}{TIMESTAMP_STYLE:#} \
             {MEMORY_STYLE}{current}{MEMORY_STYLE:#} {max_style}{max}{max_style:#}"
        );

        // The target is printed on its own line whenever it changes.
        let target = record.target();
        let mut last_target = last_target.lock().unwrap_or_else(|poison| poison.into_inner());
        if *last_target != target {
            last_target.clear();
            last_target.push_str(target);
            writeln!(buf, "{prefix} {TARGET_STYLE}{target}{TARGET_STYLE:#}")?;
        }
        let level_style = buf.default_level_style(record.level());
        writeln!(
            buf,
            "{prefix} {level_style}{}{level_style:#} {}",
            record.level(),
            record.args()
        )
    });
    builder
}

/// Installs the default logger for binaries, logging at `info` unless `LZDICT_LOG` says
/// otherwise.
pub fn setup() {
    builder("info").init();
}

/// Installs the default logger for tests, capturing output per test.
///
/// Can be called from every test, only the first call has an effect.
pub fn test_setup(default_filter: &str) {
    let _ = builder(default_filter).is_test(true).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_amounts_are_scaled() {
        assert_eq!(MemoryAmount(999).to_string(), "  999B");
        assert_eq!(MemoryAmount(1536).to_string(), "  1.5K");
        assert_eq!(MemoryAmount(3 << 20).to_string(), "  3.0M");
        assert_eq!(MemoryAmount(5 << 30).to_string(), "  5.0G");
    }

    #[test]
    fn test_setup_is_idempotent() {
        test_setup("trace");
        test_setup("info");
        log::info!("logging from a test");
    }
}
