//! Human-readable byte sizes.

const BINARY_UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];
const DECIMAL_UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];

const DECIMALS: i32 = 2;

/// `1536` → `1.5KB`, powers of 1024, two decimals.
pub fn format_size_binary(bytes: u64) -> String {
    scale(bytes, 1024.0, &BINARY_UNITS)
}

/// `1500` → `1.5kB`, powers of 1000, two decimals.
pub fn format_size_decimal(bytes: u64) -> String {
    scale(bytes, 1000.0, &DECIMAL_UNITS)
}

/// Unit system for sizes in console summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeUnits {
    /// KB, MB, ... in powers of 1024
    #[default]
    Binary,
    /// kB, MB, ... in powers of 1000
    Decimal,
}

impl SizeUnits {
    pub fn format(self, bytes: u64) -> String {
        match self {
            SizeUnits::Binary => format_size_binary(bytes),
            SizeUnits::Decimal => format_size_decimal(bytes),
        }
    }
}

fn scale(bytes: u64, base: f64, units: &[&str]) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= base && unit < units.len() - 1 {
        value /= base;
        unit += 1;
    }

    // Trailing zeros are dropped: 1.50 prints as 1.5.
    let factor = 10f64.powi(DECIMALS);
    let rounded = (value * factor).round() / factor;
    format!("{}{}", rounded, units[unit])
}
