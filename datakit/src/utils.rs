//! General Utilities

use rayon::prelude::*;
use std::fmt::Display;
use std::fs::File;
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};

use crate::bbox::BoundingBox;
use crate::image_proc::{self, io as image_io};
use crate::intervals::Interval;

/// Writes data and intervals to `{prefix}_data.txt` and
/// `{prefix}_intervals.txt`, respectively. Intervals are written one per
/// line as `start,stop`.
///
/// # Errors
/// If data cannot be written to disk, an error is returned.
pub fn write_sequence_and_intervals<T: Display>(
    prefix: &str,
    data: &[T],
    intervals: &[Interval],
) -> io::Result<()> {
    // Write Data
    let data_file_path = format!("{prefix}_data.txt");
    let mut data_f = File::create(data_file_path)?;
    data.iter().try_for_each(|d| writeln!(data_f, "{d}"))?;

    // Write intervals
    let intervals_path = format!("{prefix}_intervals.txt");
    let mut iv_f = File::create(intervals_path)?;
    intervals
        .iter()
        .try_for_each(|iv| writeln!(iv_f, "{},{}", iv.start, iv.stop))?;

    Ok(())
}

/// Per-sample membership: `true` where some interval covers the index.
#[must_use]
pub fn interval_mask(len: usize, intervals: &[Interval]) -> Vec<bool> {
    let mut mask = vec![false; len];
    for iv in intervals {
        mask.iter_mut()
            .take(iv.stop.saturating_add(1))
            .skip(iv.start)
            .for_each(|m| *m = true);
    }
    mask
}

/// Load every image in parallel and compute its projection boxes.
///
/// Results keep the order of `paths`; a failing image does not stop the
/// others.
#[must_use]
pub fn projection_boxes_for_files(
    paths: &[PathBuf],
    discard: f64,
    max_h: usize,
    max_v: usize,
) -> Vec<(PathBuf, image_proc::Result<Vec<BoundingBox>>)> {
    paths
        .par_iter()
        .map(|path| {
            let boxes = image_io::load(path)
                .and_then(|img| img.projection_boxes(discard, max_h, max_v));
            (path.clone(), boxes)
        })
        .collect()
}

/// Crop `boxes` out of the image at `source` and save them as
/// `{stem}_{i}.png` in `out_dir`. Returns the written paths.
///
/// # Errors
/// Any [`image_proc::ImageError`] from loading, cropping or saving, or an
/// IO error wrapped in it when `out_dir` cannot be created.
pub fn save_crops(
    source: &Path,
    boxes: &[BoundingBox],
    out_dir: &Path,
) -> image_proc::Result<Vec<PathBuf>> {
    let img = image_io::load(source)?;
    std::fs::create_dir_all(out_dir).map_err(image::ImageError::IoError)?;
    let stem = source
        .file_stem()
        .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().into_owned());
    boxes
        .iter()
        .enumerate()
        .map(|(i, bbox)| {
            let path = out_dir.join(format!("{stem}_{i}.png"));
            image_io::save(&img.crop(bbox)?, &path)?;
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::boxes_image;
    use crate::image_proc::Image;

    #[test]
    fn sequence_files() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("run");
        let prefix = prefix.to_str().unwrap();
        let intervals = [Interval::new(2, 3), Interval::new(6, 8)];
        write_sequence_and_intervals(prefix, &[0, 0, 5, 5], &intervals).unwrap();

        let data = std::fs::read_to_string(format!("{prefix}_data.txt")).unwrap();
        assert_eq!(data, "0\n0\n5\n5\n");
        let ivs = std::fs::read_to_string(format!("{prefix}_intervals.txt")).unwrap();
        assert_eq!(ivs, "2,3\n6,8\n");
    }

    #[test]
    fn mask_covers_inclusive_bounds() {
        let mask = interval_mask(6, &[Interval::new(1, 2), Interval::new(5, 9)]);
        assert_eq!(mask, vec![false, true, true, false, false, true]);
        assert!(interval_mask(3, &[]).iter().all(|m| !m));
    }

    #[test]
    fn boxes_for_files_keep_order_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        let bbox = BoundingBox::new((3, 2), (6, 4));
        let img: Image<u8> = boxes_image(10, 12, 1, &[bbox], 200);
        image_io::save(&img, &good).unwrap();
        let missing = dir.path().join("missing.png");

        let results = projection_boxes_for_files(&[good.clone(), missing.clone()], 0.0, 1, 3);
        assert_eq!(results[0].0, good);
        assert_eq!(results[0].1.as_ref().unwrap(), &vec![bbox]);
        assert_eq!(results[1].0, missing);
        assert!(results[1].1.is_err());

        let crops = save_crops(&good, &[bbox], &dir.path().join("crops")).unwrap();
        assert_eq!(crops.len(), 1);
        let crop = image_io::load(&crops[0]).unwrap();
        assert_eq!((crop.height(), crop.width()), (2, 3));
    }
}
