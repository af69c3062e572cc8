//! Content-based column sizing.

use unicode_width::UnicodeWidthStr;

use super::Column;
use crate::model::Row;

/// Measurement parameters for [`measure_column`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSizeOptions {
    /// Maximum rows measured.
    pub sample: usize,
    /// Pixels per display column.
    pub char_width: u32,
    /// Pixels added to the widest text.
    pub padding: u32,
}

impl Default for AutoSizeOptions {
    fn default() -> Self {
        Self {
            sample: 100,
            char_width: 8,
            padding: 16,
        }
    }
}

/// Up to `sample` row positions spread evenly over `len` rows.
pub fn sample_indices(len: usize, sample: usize) -> Vec<usize> {
    if sample == 0 || len == 0 {
        return Vec::new();
    }
    if len <= sample {
        return (0..len).collect();
    }
    (0..sample).map(|i| i * len / sample).collect()
}

/// Width that fits the header and the formatted values of a row sample,
/// clamped to the column's bounds.
pub fn measure_column(column: &Column, rows: &[Row], options: AutoSizeOptions) -> u32 {
    let widest = sample_indices(rows.len(), options.sample)
        .into_iter()
        .map(|i| column.format(&column.value(&rows[i])).width())
        .fold(column.header.width(), usize::max);

    let chars = u32::try_from(widest).unwrap_or(u32::MAX);
    let width = chars
        .saturating_mul(options.char_width)
        .saturating_add(options.padding);
    column.clamp_width(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_is_bounded_and_strided() {
        assert_eq!(sample_indices(5, 100), [0, 1, 2, 3, 4]);
        let sample = sample_indices(1000, 10);
        assert_eq!(sample.len(), 10);
        assert_eq!(sample[0], 0);
        assert_eq!(sample[9], 900);
        assert!(sample_indices(10, 0).is_empty());
    }

    #[test]
    fn test_measure_uses_display_width() {
        let column = Column::new("k").with_header("K").with_min_width(0);
        let rows = vec![Row::new().set("k", "ab"), Row::new().set("k", "日本語")];
        let options = AutoSizeOptions {
            sample: 100,
            char_width: 10,
            padding: 4,
        };
        // Three wide characters occupy six display columns.
        assert_eq!(measure_column(&column, &rows, options), 64);
    }

    #[test]
    fn test_measure_clamps_and_counts_header() {
        let column = Column::new("k")
            .with_header("A long header")
            .with_min_width(10)
            .with_max_width(100);
        let options = AutoSizeOptions::default();
        assert_eq!(measure_column(&column, &[], options), 100);

        let column = Column::new("k").with_header("").with_min_width(60);
        assert_eq!(measure_column(&column, &[Row::new().set("k", "x")], options), 60);
    }

    #[test]
    fn test_measure_reads_sample_only() {
        // Only every 10th row is measured; the wide row at 5 is skipped.
        let mut rows: Vec<Row> = (0..100).map(|_| Row::new().set("k", "a")).collect();
        rows[5] = Row::new().set("k", "a".repeat(50));
        let column = Column::new("k").with_header("").with_min_width(0);
        let options = AutoSizeOptions {
            sample: 10,
            char_width: 1,
            padding: 0,
        };
        assert_eq!(measure_column(&column, &rows, options), 1);
    }
}
