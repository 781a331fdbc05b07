//! Free system memory via `/proc/meminfo`.
//!
//! Only the `MemAvailable` line is consulted: it accounts for free pages
//! plus reclaimable cache, which is the best estimate of what a new
//! allocation can use without swapping. On platforms without procfs the
//! query reports `None` and callers fall back to their own ceiling.

use std::path::Path;

const MEMINFO_PATH: &str = "/proc/meminfo";

/// Available system memory in bytes, if the platform reports it.
pub fn available_bytes() -> Option<u64> {
    read_from(Path::new(MEMINFO_PATH))
}

fn read_from(path: &Path) -> Option<u64> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_available(&content)
}

/// Extract `MemAvailable` (reported in kB) from meminfo-formatted text.
pub(crate) fn parse_available(content: &str) -> Option<u64> {
    content.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        if parts.next()? != "MemAvailable:" {
            return None;
        }
        let kb: u64 = parts.next()?.parse().ok()?;
        kb.checked_mul(1024)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_MEMINFO: &str = "\
MemTotal:        3884292 kB
MemFree:          218456 kB
MemAvailable:    2456780 kB
Buffers:          123456 kB
Cached:          1987654 kB
";

    #[test]
    fn parses_mem_available() {
        assert_eq!(parse_available(SAMPLE_MEMINFO), Some(2456780 * 1024));
    }

    #[test]
    fn missing_line_is_none() {
        assert_eq!(parse_available("MemTotal: 10 kB\n"), None);
    }

    #[test]
    fn garbage_value_is_none() {
        assert_eq!(parse_available("MemAvailable: lots kB\n"), None);
    }

    #[test]
    fn missing_file_is_none() {
        assert_eq!(read_from(Path::new("/definitely/not/a/meminfo")), None);
    }
}
