use std::fs;

/// Host memory sample taken from the operating system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostMemorySample {
    /// Physical memory the kernel reports as available for new allocations, in bytes.
    pub available_bytes: Option<u64>,
    /// Total installed physical memory, in bytes.
    pub total_bytes: Option<u64>,
}

/// Samples host memory from the operating system.
///
/// Currently supports Linux via `/proc/meminfo`. Returns default (None)
/// on other platforms.
pub fn sample_host_memory() -> HostMemorySample {
    #[cfg(target_os = "linux")]
    {
        let contents = match fs::read_to_string("/proc/meminfo") {
            Ok(contents) => contents,
            Err(_) => return HostMemorySample::default(),
        };

        parse_meminfo(&contents)
    }

    #[cfg(not(target_os = "linux"))]
    {
        HostMemorySample::default()
    }
}

/// Parses the `MemAvailable:` and `MemTotal:` fields of a meminfo listing.
pub fn parse_meminfo(contents: &str) -> HostMemorySample {
    HostMemorySample {
        available_bytes: parse_kib_field(contents, "MemAvailable:"),
        total_bytes: parse_kib_field(contents, "MemTotal:"),
    }
}

fn parse_kib_field(listing: &str, field: &str) -> Option<u64> {
    let line = listing.lines().find(|line| line.starts_with(field))?;
    let value_kib = line
        .split_whitespace()
        .nth(1)
        .and_then(|value| value.parse::<u64>().ok())?;

    value_kib.checked_mul(1024)
}
