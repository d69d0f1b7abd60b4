use rbd_wire::MAX_RECORD_SIZE;

/// Width of the progress bar in cells.
pub const DEFAULT_BAR_WIDTH: usize = 50;

/// Tunables for [`DiffApplier`](crate::DiffApplier).
///
/// ```text
/// ┌───────────┬──────────────────────────────────────────────┬───────────┐
/// │ Field     │ Purpose                                      │ Default   │
/// ├───────────┼──────────────────────────────────────────────┼───────────┤
/// │ max_unit  │ Largest piece read and written at once       │ 1 MiB     │
/// │ bar_width │ Cells in the rendered progress bar           │ 50        │
/// │ progress  │ Whether the progress line is drawn at all    │ true      │
/// └───────────┴──────────────────────────────────────────────┴───────────┘
/// ```
///
/// `max_unit` bounds memory use: a chunk of any length is copied through a
/// single buffer of this size. A value of 0 is treated as 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplyConfig {
    pub max_unit: usize,
    pub bar_width: usize,
    /// When false, counters and rate sampling still run but nothing is
    /// written to the progress sink.
    pub progress: bool,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            max_unit: MAX_RECORD_SIZE,
            bar_width: DEFAULT_BAR_WIDTH,
            progress: true,
        }
    }
}

impl ApplyConfig {
    pub(crate) fn effective_max_unit(&self) -> usize {
        self.max_unit.max(1)
    }
}
