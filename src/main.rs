//! dfise - DF-ISE mesh and dataset file inspector
//!
//! Reads a grid or boundary file plus any number of dataset files and prints
//! a summary of what they contain.
//!
//! # Usage
//!
//! ```bash
//! dfise device.grd device.dat thermal.dat
//! ```

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use dfise_core::{DataReader, MeshReader, Result};

/// DF-ISE mesh and dataset file inspector
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the grid or boundary file (.grd/.bnd)
    #[arg(value_name = "GRID_FILE")]
    grid_file: PathBuf,

    /// Paths to dataset files (.dat) resolved against the grid
    #[arg(value_name = "DATA_FILE")]
    dataset_files: Vec<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let start = Instant::now();

    let mesh = MeshReader::from_file(&args.grid_file)?;

    println!("{}", args.grid_file.display());
    println!("  kind:       {}", mesh.kind());
    println!("  dimension:  {}", mesh.dimension());
    println!("  vertices:   {}", mesh.vertex_count());
    println!("  elements:   {}", mesh.elements().len());
    println!("  regions:    {}", mesh.regions().len());
    for (name, region) in mesh.regions() {
        println!(
            "    {} ({}): {} elements",
            name,
            region.material,
            region.element_indices.len()
        );
    }

    let mut reader = DataReader::new(&mesh);
    for path in &args.dataset_files {
        reader.read(path)?;
    }
    let datasets = reader.into_datasets()?;

    if !args.dataset_files.is_empty() {
        println!("datasets:");
        for (name, dataset) in &datasets.complete {
            println!(
                "  {} (complete): dimension {}, {} values",
                name,
                dataset.dimension,
                dataset.values.len()
            );
        }
        for (name, dataset) in &datasets.partial {
            println!(
                "  {} (partial): dimension {}, {} of {} vertices",
                name,
                dataset.dimension,
                dataset.vertex_indices.len(),
                mesh.vertex_count()
            );
        }
    }

    println!("parsed in {:.3} s", start.elapsed().as_secs_f64());
    Ok(())
}
