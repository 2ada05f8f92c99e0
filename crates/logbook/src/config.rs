/// Tunables for the post-processing layer. The only knob exposed today is
/// the cancellation-trimming threshold factor (see `ops::cut_cancellations`);
/// everything else in the core is parameter-free by design.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Multiplied by the observed mean inter-update gap to get the absolute
    /// cutoff (in seconds) below which a trailing `STOPPED_OR_SKIPPED` run is
    /// considered a cancellation stub rather than a real skip. The source
    /// heuristic reports ~98% effectiveness at a factor of 1.0; there is no
    /// value that eliminates the false-positive risk on short routes (e.g.
    /// two-stop shuttles), so this is surfaced as a knob rather than baked in.
    pub cancellation_threshold_factor: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cancellation_threshold_factor: 1.0,
        }
    }
}
