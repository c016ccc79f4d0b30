//! Functions to generate synthetic sequences and images
use crate::bbox::BoundingBox;
use crate::image_proc::Image;
use ndarray::Array3;
use rand::Rng;

/// Generate a sequence of background (`0`) and foreground runs.
///
/// Each step switches between background and foreground with probability
/// `p_switch`; foreground samples take random values in `1..=255`. The first
/// and last samples are always background.
///
/// # Example
/// ```rust
/// use datakit::generators::random_runs;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
/// let mut rng: StdRng = StdRng::seed_from_u64(0x12345);
/// let seq: Vec<u8> = random_runs(&mut rng, 100, 0.2);
/// assert_eq!(seq.len(), 100);
/// assert_eq!(seq[0], 0);
/// assert_eq!(seq[99], 0);
/// ```
pub fn random_runs<R: Rng>(rng: &mut R, len: usize, p_switch: f64) -> Vec<u8> {
    let mut foreground = false;
    let mut seq: Vec<u8> = (0..len)
        .map(|_| {
            if rng.gen_bool(p_switch) {
                foreground = !foreground;
            }
            if foreground {
                rng.gen_range(1..=255)
            } else {
                0
            }
        })
        .collect();
    if let Some(first) = seq.first_mut() {
        *first = 0;
    }
    if let Some(last) = seq.last_mut() {
        *last = 0;
    }
    seq
}

/// Black image of `height x width x channels` with every box filled with
/// `value` on all channels. Box corners are inclusive and clipped to the
/// image.
#[must_use]
pub fn boxes_image(
    height: usize,
    width: usize,
    channels: usize,
    boxes: &[BoundingBox],
    value: u8,
) -> Image<u8> {
    let data = Array3::from_shape_fn((height, width, channels), |(y, x, _)| {
        let inside = boxes
            .iter()
            .any(|b| (b.tl.x..=b.br.x).contains(&x) && (b.tl.y..=b.br.y).contains(&y));
        if inside {
            value
        } else {
            0
        }
    });
    Image::from_array(data)
}
