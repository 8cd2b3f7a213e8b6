//! Human-readable byte sizes: `8Gb`, `512MiB`, `1073741824`.
//!
//! `b`, `kb`, `mb`, `gb`, `tb` are decimal (×1000ⁿ); `kib`, `mib`, `gib`, `tib`
//! are binary (×1024ⁿ). Units are case-insensitive; a bare number is bytes.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SizeError {
    #[error("'{0}' is not a size, expected <number><unit> such as 8Gb or 512MiB")]
    Malformed(String),

    #[error("unknown size unit '{unit}' in '{input}'")]
    UnknownUnit { input: String, unit: String },

    #[error("'{0}' does not fit in 64 bits")]
    Overflow(String),
}

const BINARY_UNITS: [(&str, u64); 4] = [
    ("TiB", 1 << 40),
    ("GiB", 1 << 30),
    ("MiB", 1 << 20),
    ("KiB", 1 << 10),
];

fn multiplier(unit: &str) -> Option<u64> {
    let factor = match unit.to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "kb" => 1_000,
        "mb" => 1_000_000,
        "gb" => 1_000_000_000,
        "tb" => 1_000_000_000_000,
        "kib" => 1 << 10,
        "mib" => 1 << 20,
        "gib" => 1 << 30,
        "tib" => 1 << 40,
        _ => return None,
    };
    Some(factor)
}

/// Parse a size string into bytes.
pub fn parse_size(input: &str) -> Result<u64, SizeError> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    if number.is_empty() {
        return Err(SizeError::Malformed(input.to_string()));
    }

    let factor = multiplier(unit.trim_start()).ok_or_else(|| SizeError::UnknownUnit {
        input: input.to_string(),
        unit: unit.trim_start().to_string(),
    })?;

    number
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(factor))
        .ok_or_else(|| SizeError::Overflow(input.to_string()))
}

/// Render a byte count with the largest binary unit that divides it exactly.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0b".to_string();
    }
    BINARY_UNITS
        .iter()
        .find(|(_, factor)| bytes % factor == 0)
        .map(|(unit, factor)| format!("{}{unit}", bytes / factor))
        .unwrap_or_else(|| format!("{bytes}b"))
}
