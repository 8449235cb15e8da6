//! Size bookkeeping for conversions.

/// Sizes of one successful conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionRecord {
    /// Size of the source file in bytes.
    pub original_size: u64,
    /// Size of the converted file in bytes.
    pub converted_size: u64,
}

impl ConversionRecord {
    /// Percentage of the original size saved; negative if the output grew.
    #[must_use]
    pub fn saved_percent(&self) -> f64 {
        saved_percent(self.original_size, self.converted_size).unwrap_or(0.0)
    }
}

/// What happened to one source file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    /// Converted with the recorded sizes.
    Converted(ConversionRecord),
    /// Output already existed and overwriting was off.
    Skipped,
    /// Conversion failed with this message.
    Failed(String),
}

/// Aggregate over a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub converted: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Bytes of the sources that were converted.
    pub total_original: u64,
    /// Bytes of the outputs that were written.
    pub total_converted: u64,
}

impl Summary {
    /// Fold one outcome into the totals.
    pub fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Converted(record) => {
                self.converted += 1;
                self.total_original += record.original_size;
                self.total_converted += record.converted_size;
            }
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Failed(_) => self.errors += 1,
        }
    }

    /// Bytes saved across the batch; negative if outputs grew.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn saved_bytes(&self) -> i64 {
        self.total_original as i64 - self.total_converted as i64
    }

    /// Percentage saved across the batch, if anything was converted.
    #[must_use]
    pub fn saved_percent(&self) -> Option<f64> {
        saved_percent(self.total_original, self.total_converted)
    }

    /// Whether the batch finished without a failed file.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.errors == 0
    }
}

#[allow(clippy::cast_precision_loss)]
fn saved_percent(original: u64, converted: u64) -> Option<f64> {
    (original > 0).then(|| (1.0 - converted as f64 / original as f64) * 100.0)
}

/// Human readable size with one decimal, in 1024 steps.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{value:.1} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.1} TB")
}

/// [`format_bytes`] for a signed difference.
#[must_use]
pub fn format_byte_delta(bytes: i64) -> String {
    if bytes < 0 {
        format!("-{}", format_bytes(bytes.unsigned_abs()))
    } else {
        format_bytes(bytes.unsigned_abs())
    }
}
