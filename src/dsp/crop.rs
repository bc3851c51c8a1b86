use log::{debug, warn};

use crate::data::model::{Signal, TimeWindow};
use crate::error::Result;

/// Keep the samples whose time falls in `window`.
///
/// Times stay absolute: the result's first sample keeps its original time.
/// Membership is `start_s <= t < end_s`, except that an end at or beyond the
/// last sample is clamped to it and includes it, so a window covering the
/// whole recording returns the whole recording. An end that falls on an
/// interior sample excludes it: `[2, 4]` at 10 Hz ends at 3.9 s. A window
/// starting after the last sample yields an empty signal.
pub fn crop(signal: &Signal, window: &TimeWindow) -> Result<Signal> {
    window.validate()?;

    let Some(last) = signal.last_time_s() else {
        return Ok(signal.derive(Vec::new(), window.start_s));
    };

    let times = signal.times();
    let first = times.partition_point(|&t| t < window.start_s);
    let stop = if window.end_s >= last {
        if window.end_s > last {
            debug!(
                "crop end {} s clamped to last sample at {last} s",
                window.end_s
            );
        }
        times.len()
    } else {
        times.partition_point(|&t| t < window.end_s)
    };

    if first >= stop {
        warn!(
            "time window [{}, {}] s selects no samples of '{}' (last sample at {last} s)",
            window.start_s,
            window.end_s,
            signal.name()
        );
        return Ok(signal.derive(Vec::new(), window.start_s));
    }

    debug!("crop [{}, {}] s -> samples {first}..{stop}", window.start_s, window.end_s);
    Ok(signal.derive(signal.values()[first..stop].to_vec(), times[first]))
}
