//! Rotation planning and tilt-series naming.

use log::warn;

/// Label for the nth tilt series, using lowercase letters as base-26
/// digits with `a` as zero: 0 → `a`, 25 → `z`, 26 → `ba`, 27 → `bb`
/// (there is no `aa` since `a` is the zero digit).
pub fn tilt_series_label(tilt_number: usize) -> String {
    const BASE: usize = 26;
    let mut label = String::new();
    let mut num = tilt_number;
    while num >= BASE {
        let digit = num % BASE;
        label.insert(0, (b'a' + digit as u8) as char);
        num /= BASE;
    }
    label.insert(0, (b'a' + num as u8) as char);
    label
}

/// Rotation angles spread evenly over the half circle.
///
/// Delta is 180/n; angles are delta, 2·delta, ... strictly below 180.
/// The baseline 0 rotation is not included here, the caller always adds
/// it.
pub fn evenly_distributed_rotations(num_rotations: usize) -> Vec<f64> {
    let mut rotations = Vec::new();
    let delta = 180.0 / num_rotations as f64;
    let mut current = delta;
    while current < 180.0 {
        rotations.push(current);
        current += delta;
    }
    rotations
}

/// Assemble the full sorted rotation list for a pipeline run.
///
/// The baseline 0° rotation is always present. When `num_rotations` is
/// set the rest are evenly distributed; otherwise `angles` is parsed as
/// a comma-delimited list, keeping values in (0, 180], dropping
/// duplicates, and warn-logging anything unparsable.
pub fn assemble_rotation_angles(angles: &str, num_rotations: Option<usize>) -> Vec<f64> {
    let mut rotations = vec![0.0_f64];

    if let Some(n) = num_rotations {
        rotations.extend(evenly_distributed_rotations(n));
    } else {
        for element in angles.split(',').filter(|e| !e.is_empty()) {
            match element.trim().parse::<f64>() {
                Ok(a) if a > 0.0 && a <= 180.0 => {
                    if !rotations.contains(&a) {
                        rotations.push(a);
                    }
                }
                Ok(a) => warn!("Dropping out of range angle {a}"),
                Err(_) => warn!("Unable to parse angle from element {element}"),
            }
        }
    }

    rotations.sort_by(|a, b| a.partial_cmp(b).expect("angles are finite"));
    rotations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tilt_series_label() {
        assert_eq!(tilt_series_label(0), "a");
        assert_eq!(tilt_series_label(1), "b");
        assert_eq!(tilt_series_label(25), "z");
        assert_eq!(tilt_series_label(26), "ba");
        assert_eq!(tilt_series_label(27), "bb");
        assert_eq!(tilt_series_label(26 * 26), "baa");
    }

    #[test]
    fn test_evenly_distributed_rotations() {
        assert_eq!(evenly_distributed_rotations(2), vec![90.0]);
        assert_eq!(evenly_distributed_rotations(4), vec![45.0, 90.0, 135.0]);
        assert_eq!(
            evenly_distributed_rotations(3),
            vec![60.0, 120.0]
        );
    }

    #[test]
    fn test_assemble_from_num_rotations() {
        assert_eq!(assemble_rotation_angles("", Some(2)), vec![0.0, 90.0]);
        assert_eq!(
            assemble_rotation_angles("ignored", Some(4)),
            vec![0.0, 45.0, 90.0, 135.0]
        );
    }

    #[test]
    fn test_assemble_from_angle_list() {
        assert_eq!(
            assemble_rotation_angles("45,90,135", None),
            vec![0.0, 45.0, 90.0, 135.0]
        );
        // unsorted input comes out sorted
        assert_eq!(
            assemble_rotation_angles("135,45", None),
            vec![0.0, 45.0, 135.0]
        );
    }

    #[test]
    fn test_assemble_filters_and_dedups() {
        // garbage, out-of-range, and duplicate entries all drop out
        assert_eq!(
            assemble_rotation_angles("foo,45,-10,200,45,180", None),
            vec![0.0, 45.0, 180.0]
        );
        assert_eq!(assemble_rotation_angles("", None), vec![0.0]);
    }
}
