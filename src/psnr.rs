//! ffmpeg `psnr` stats file parsing.
//!
//! The filter writes one line per frame:
//!
//! ```text
//! n:1 mse_avg:0.58 mse_y:0.73 mse_u:0.29 mse_v:0.28 psnr_avg:50.49 psnr_y:49.48 psnr_u:53.53 psnr_v:53.69
//! ```
//!
//! Only `psnr_avg` is kept. Identical frames produce `inf`, and some
//! builds print `nan`; such frames carry no usable value and are dropped.

use std::sync::LazyLock;

use regex::Regex;

use crate::quality::FrameMetric;

static PSNR_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^n:\s*(?P<n>\d+)\s+mse_avg:\s*\S+\s+mse_y:\s*\S+\s+mse_u:\s*\S+\s+mse_v:\s*\S+\s+psnr_avg:\s*(?P<avg>\S+)\s+psnr_y:\s*\S+\s+psnr_u:\s*\S+\s+psnr_v:\s*\S+",
    )
    .expect("invalid PSNR stats regex")
});

/// Per-frame average PSNR from a stats file, in file order.
///
/// Lines that do not match the stats layout are logged and skipped.
pub fn parse_psnr_stats(contents: &str) -> Vec<FrameMetric> {
    let mut frames = Vec::new();

    for (line_number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(captures) = PSNR_LINE.captures(line) else {
            log::warn!("Skipping unrecognised PSNR stats line {}: {line}", line_number + 1);
            continue;
        };

        let raw = &captures["avg"];
        let lowered = raw.to_ascii_lowercase();
        if lowered == "nan" || lowered.contains("inf") {
            log::debug!("Skipping frame {} with psnr_avg {raw}", &captures["n"]);
            continue;
        }

        let (Ok(index), Ok(value)) = (captures["n"].parse::<u64>(), raw.parse::<f64>()) else {
            log::warn!("Skipping PSNR stats line {} with unparseable values", line_number + 1);
            continue;
        };
        frames.push(FrameMetric { index, value });
    }

    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_average() {
        let frames = parse_psnr_stats(
            "n:1 mse_avg:0.58 mse_y:0.73 mse_u:0.29 mse_v:0.28 psnr_avg:50.49 psnr_y:49.48 psnr_u:53.53 psnr_v:53.69\n\
             n:2 mse_avg:1.02 mse_y:1.20 mse_u:0.60 mse_v:0.70 psnr_avg:48.04 psnr_y:47.33 psnr_u:50.35 psnr_v:49.68\n",
        );
        assert_eq!(
            frames,
            vec![
                FrameMetric { index: 1, value: 50.49 },
                FrameMetric { index: 2, value: 48.04 },
            ]
        );
    }

    #[test]
    fn rejects_nan_and_inf() {
        let frames = parse_psnr_stats(
            "n:1 mse_avg:0.00 mse_y:0.00 mse_u:0.00 mse_v:0.00 psnr_avg:inf psnr_y:inf psnr_u:inf psnr_v:inf\n\
             n:2 mse_avg:0.00 mse_y:0.00 mse_u:0.00 mse_v:0.00 psnr_avg:nan psnr_y:nan psnr_u:nan psnr_v:nan\n\
             n:3 mse_avg:0.00 mse_y:0.00 mse_u:0.00 mse_v:0.00 psnr_avg:-inf psnr_y:1 psnr_u:1 psnr_v:1\n\
             n:4 mse_avg:2.00 mse_y:2.00 mse_u:2.00 mse_v:2.00 psnr_avg:45.12 psnr_y:45 psnr_u:45 psnr_v:45\n",
        );
        assert_eq!(frames, vec![FrameMetric { index: 4, value: 45.12 }]);
    }

    #[test]
    fn skips_garbage_lines() {
        let frames = parse_psnr_stats("garbage\n\nn:1 psnr_avg:40.0\nn:x mse_avg:1\n");
        assert!(frames.is_empty());
    }
}
