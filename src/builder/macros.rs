//! Macros for terse chart construction.

/// Build a [`Chart`](crate::core::Chart) from a command table.
///
/// Each row names a source state and its outgoing `command => target`
/// bindings. States are created on first mention.
///
/// # Example
///
/// ```rust
/// use chartflow::chart;
/// use chartflow::core::Chart;
///
/// let chart: Chart<()> = chart! {
///     initial: "idle",
///     "idle": { "start" => "running" },
///     "running": { "pause" => "paused", "finish" => "done" },
///     "paused": { "resume" => "running" },
/// };
///
/// assert_eq!(chart.state_count(), 4);
/// assert_eq!(chart.transition_count(), 4);
/// ```
#[macro_export]
macro_rules! chart {
    (
        initial: $initial:literal
        $(, $source:literal : { $( $command:literal => $target:literal ),* $(,)? } )*
        $(,)?
    ) => {{
        let mut chart = $crate::core::Chart::new();
        chart.initial($initial);
        $(
            $(
                chart.transition($source, $target).command($command);
            )*
        )*
        chart
    }};
}
