//! An application for printing the contents of an OCT file.

use std::env;
use uoct::sectors::{sector_values, ContourSelection};
use uoct::{ReaderOptions, Sector};

fn main() {
    env_logger::init();
    let mut args = env::args().skip(1);
    let filename = args.next().expect("Path to OCT file is required");
    let subject = ReaderOptions::new()
        .read_file(&filename)
        .expect("Failed to read OCT file");

    for (key, value) in &subject.info {
        println!("{}: {}", key, value);
    }
    for (id, scan) in &subject.scans {
        println!("scan \"{}\"", id);
        for (key, value) in &scan.info {
            println!("  {}: {}", key, value);
        }
        println!(
            "  fundus {}x{}x{}, tomogram {}x{}x{}, size {:?} mm",
            scan.fundus.channels(),
            scan.fundus.width(),
            scan.fundus.height(),
            scan.tomogram.width(),
            scan.tomogram.height(),
            scan.tomogram.depth(),
            scan.size
        );
        let names: Vec<_> = scan.contours.keys().map(String::as_str).collect();
        println!("  contours: {}", names.join(", "));
        match sector_values(scan, ContourSelection::Default) {
            Ok(v) => {
                for (sector, avg) in Sector::ALL.iter().zip(v.averages().iter()) {
                    println!("  {:>12}: {:.1} µm", sector, avg * 1000.);
                }
                println!("  total volume: {:.3} mm³", v.total_volume);
            }
            Err(e) => println!("  no thickness map: {}", e),
        }
    }
}
