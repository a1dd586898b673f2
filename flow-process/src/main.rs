//! Run flow field pipelines over `.flo` sequences

use clap::*;
use flowops::prelude::v1::{Result, *};
use log::*;
use std::path::{Path, PathBuf};

mod pipeline;

use pipeline::Pipeline;

const MASK_EXTENSIONS: &[&str] = &["png", "pgm", "bmp", "tif", "tiff", "jpg", "jpeg"];

fn main() -> Result<()> {
    env_logger::init();

    let matches = Command::new("flow-process")
        .version(crate_version!())
        .author(crate_authors!())
        .arg(
            Arg::new("input")
                .long("input")
                .short('i')
                .takes_value(true)
                .required_unless_present("list-nodes"),
        )
        .arg(
            Arg::new("pipeline")
                .long("pipeline")
                .short('p')
                .takes_value(true)
                .required_unless_present("list-nodes"),
        )
        .arg(
            Arg::new("masks")
                .long("masks")
                .short('m')
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::new("batch")
                .long("batch")
                .short('b')
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::new("list-nodes")
                .long("list-nodes")
                .short('l')
                .required(false),
        )
        .arg(
            Arg::new("output")
                .takes_value(true)
                .required_unless_present("list-nodes"),
        )
        .get_matches();

    if matches.is_present("list-nodes") {
        list_nodes();
        return Ok(());
    }

    let input = matches.value_of("input").unwrap();
    let pipeline = matches.value_of("pipeline").unwrap();
    let output = matches.value_of("output").unwrap();
    let batch = matches
        .value_of("batch")
        .map(str::parse::<usize>)
        .transpose()?;

    let mut pipeline = Pipeline::from_reader(std::fs::File::open(pipeline)?)?;

    let masks = matches.value_of("masks").map(load_masks).transpose()?;

    if pipeline.takes_masks() && masks.as_ref().map_or(true, Vec::is_empty) {
        return Err(anyhow!("pipeline masks flow, but no masks were supplied"));
    }

    let flow = list_files(input, &["flo"])?
        .iter()
        .map(flowops::flo::open_flo)
        .collect::<Result<Vec<_>>>()?;

    info!("loaded {} flow frames from {}", flow.len(), input);

    std::fs::create_dir_all(output)?;

    let batch = batch.unwrap_or(flow.len()).max(1);

    let mut cnt = 0usize;

    for chunk in flow.chunks(batch) {
        match pipeline.run(chunk.to_vec(), masks.as_deref())? {
            NodeOutput::Flow(frames) => {
                for frame in &frames {
                    flowops::flo::save_flo(format!("{output}/{cnt:06}.flo"), frame)?;
                    cnt += 1;
                }
            }
            NodeOutput::Mask(mask_batch) => {
                for mask in mask_batch.into_masks() {
                    save_mask(format!("{output}/{cnt:06}.png"), &mask)?;
                    cnt += 1;
                }
            }
        }
    }

    info!("wrote {} frames to {}", cnt, output);

    Ok(())
}

fn list_nodes() {
    for mut kind in NodeKind::defaults() {
        println!("{} [{}]", kind.name(), NodeKind::CATEGORY);

        if kind.takes_masks() {
            println!("  mask: mask sequence");
        }

        for (n, p) in kind.props() {
            println!("  {n}: {p}");
        }
    }
}

/// List files in a directory with one of the given extensions, sorted by name.
fn list_files(dir: impl AsRef<Path>, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = std::fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;

    files.retain(|p| {
        p.extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    });

    files.sort();

    Ok(files)
}

/// Load grayscale masks, scaled to the 0-1 range.
fn load_masks(dir: &str) -> Result<Vec<MaskField>> {
    let masks = list_files(dir, MASK_EXTENSIONS)?
        .iter()
        .map(|path| -> Result<MaskField> {
            let img = image::open(path)?.to_luma8();
            let (width, height) = img.dimensions();
            let values = img.into_raw().into_iter().map(|v| v as f32 / 255.0).collect();
            MaskField::from_vec(width as usize, height as usize, values)
        })
        .collect::<Result<Vec<_>>>()?;

    info!("loaded {} masks from {}", masks.len(), dir);

    Ok(masks)
}

fn save_mask(path: impl AsRef<Path>, mask: &MaskField) -> Result<()> {
    let (width, height) = mask.dim();

    let pixels = mask
        .as_slice()
        .iter()
        .map(|v| v.clamp(0.0, 255.0) as u8)
        .collect();

    image::GrayImage::from_raw(width as u32, height as u32, pixels)
        .ok_or_else(|| anyhow!("mask buffer does not fit {}x{}", width, height))?
        .save(path)?;

    Ok(())
}
