use crate::types::{Calibration, ScanKind, ScanWindow};
use log::trace;

/// Angle of `step` in radians, counter-clockwise from the forward direction.
pub fn step_angle(step: u32, calibration: &Calibration) -> f64 {
    (i64::from(step) - i64::from(calibration.count_zero)) as f64 * calibration.angle_resolution
}

/// Range count in metres.
pub fn range_to_metres(count: u32, calibration: &Calibration) -> f64 {
    f64::from(count) * calibration.dist_resolution
}

/// `true` if `count` lies inside the device's measuring range.
///
/// Counts below the minimum distance are error codes rather than distances.
pub fn is_valid_range(count: u32, calibration: &Calibration) -> bool {
    let metres = range_to_metres(count, calibration);
    metres >= calibration.dist_min && metres <= calibration.dist_max
}

/// Converts decoded range values to `(angle, distance)` pairs in radians and metres.
///
/// Each value is placed at the first step of its cluster. For intensity scans
/// only the range of each (range, intensity) pair is kept. Invalid readings are
/// kept too, so indices line up with the scan; filter with [`is_valid_range`].
///
/// # Arguments
///
/// * `ranges` - Values as returned by an acquisition of `window`.
/// * `calibration` - Calibration of the device that produced them.
/// * `window` - The window the values were acquired with.
pub fn to_polar(ranges: &[u32], calibration: &Calibration, window: &ScanWindow) -> Vec<(f64, f64)> {
    let cluster = u32::from(window.skip.max(1));
    let stride = match window.kind {
        ScanKind::Regular => 1,
        ScanKind::Intensity => 2,
    };
    trace!(
        "to_polar: {} values from step {} (cluster {})",
        ranges.len(),
        window.start_step,
        cluster
    );
    ranges
        .iter()
        .step_by(stride)
        .enumerate()
        .map(|(i, &count)| {
            let step = window.start_step + i as u32 * cluster;
            (
                step_angle(step, calibration),
                range_to_metres(count, calibration),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::SensorParameters;
    use std::f64::consts::PI;

    fn urg_calibration() -> Calibration {
        let params = SensorParameters {
            model: "URG-04LX".to_owned(),
            dist_min: 20,
            dist_max: 5600,
            angle_resolution: 1024,
            count_min: 44,
            count_max: 725,
            count_zero: 384,
            scan_rpm: 600,
        };
        Calibration::from_parameters(&params).unwrap()
    }

    #[test]
    fn forward_step_is_zero_angle() {
        let calibration = urg_calibration();
        assert_eq!(step_angle(384, &calibration), 0.0);
        assert!((step_angle(640, &calibration) - PI / 2.0).abs() < 1e-12);
        assert!((step_angle(128, &calibration) + PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn polar_follows_window_and_clusters() {
        let calibration = urg_calibration();
        let window = ScanWindow::new(384, 387).with_skip(2);
        let points = to_polar(&[1000, 2500], &calibration, &window);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].0, 0.0);
        assert!((points[0].1 - 1.0).abs() < 1e-12);
        assert!((points[1].0 - 2.0 * calibration.angle_resolution).abs() < 1e-12);
        assert!((points[1].1 - 2.5).abs() < 1e-12);
    }

    #[test]
    fn intensity_pairs_keep_ranges() {
        let calibration = urg_calibration();
        let window = ScanWindow::new(384, 385).with_kind(ScanKind::Intensity);
        let points = to_polar(&[1000, 77, 2000, 88], &calibration, &window);
        assert_eq!(points.len(), 2);
        assert!((points[1].1 - 2.0).abs() < 1e-12);
    }

    #[test]
    fn error_codes_are_not_ranges() {
        let calibration = urg_calibration();
        assert!(!is_valid_range(7, &calibration));
        assert!(is_valid_range(21, &calibration));
        assert!(is_valid_range(5599, &calibration));
        assert!(!is_valid_range(5601, &calibration));
    }
}
