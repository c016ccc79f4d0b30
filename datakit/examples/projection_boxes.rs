//! Draw a few boxes on a synthetic image, recover them from the row and
//! column projections and write the crops next to a projection plot.

use datakit::bbox::BoundingBox;
use datakit::generators::boxes_image;
use datakit::image_proc::io as image_io;
use datakit::plot::plot_projection;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error + 'static>> {
    let out_dir = PathBuf::from("projection_boxes");
    std::fs::create_dir_all(&out_dir)?;

    // Three objects side by side on one shelf
    println!("Generating image");
    let drawn = [
        BoundingBox::new((10, 40), (50, 90)),
        BoundingBox::new((80, 35), (120, 95)),
        BoundingBox::new((150, 40), (190, 90)),
    ];
    let img = boxes_image(128, 200, 3, &drawn, 220);
    image_io::save(&img, out_dir.join("input.png"))?;

    println!("Finding boxes");
    let found = img.projection_boxes(0.0, 1, 3)?;
    for bbox in &found {
        println!("  {bbox}");
    }

    plot_projection(&out_dir.join("projection.png"), &img.projection())?;
    for (i, bbox) in found.iter().enumerate() {
        let crop = img.crop(&BoundingBox::new(
            (bbox.tl.x, bbox.tl.y),
            (bbox.br.x + 1, bbox.br.y + 1),
        ))?;
        image_io::save(&crop, out_dir.join(format!("crop_{i}.png")))?;
    }
    println!("Output written to {}", out_dir.display());
    Ok(())
}
