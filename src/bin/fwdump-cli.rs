//! fwdump-cli - Command-line interface for ndsfw
//!
//! A command-line tool for unpacking Nintendo DS firmware images.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use ndsfw::header::FwHeader;
use ndsfw::unpack::{self, RegionKind};
use ndsfw::{part345, FW_IMAGE_SIZES};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "fwdump-cli")]
#[command(about = "A CLI tool for unpacking Nintendo DS firmware images")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Unpack a firmware image into its decoded regions
    Unpack {
        /// Input firmware image (128, 256 or 512 KiB)
        input: PathBuf,

        /// Output file (concatenated stream, or basename with --split)
        output: PathBuf,

        /// Write one file per region instead of a concatenated stream
        #[arg(short, long)]
        split: bool,

        /// Force overwrite of output files
        #[arg(short, long)]
        force: bool,
    },

    /// Show header information for a firmware image
    Info {
        /// Firmware image to analyze
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Unpack {
            input,
            output,
            split,
            force,
        } => unpack_image(&input, &output, split, force, cli.verbose, cli.quiet),
        Commands::Info { input } => show_image_info(&input, cli.verbose),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn split_path(output: &PathBuf, kind: RegionKind) -> PathBuf {
    let mut name = output.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.bin", kind.name()));
    output.with_file_name(name)
}

fn unpack_image(
    input: &PathBuf,
    output: &PathBuf,
    split: bool,
    force: bool,
    verbose: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Check if input file exists
    if !input.exists() {
        return Err(format!("Input file '{}' does not exist", input.display()).into());
    }

    // Check if output files exist and force flag
    let targets: Vec<PathBuf> = if split {
        RegionKind::ALL.iter().map(|&k| split_path(output, k)).collect()
    } else {
        vec![output.clone()]
    };
    for target in &targets {
        if target.exists() && !force {
            return Err(format!(
                "Output file '{}' already exists. Use --force to overwrite",
                target.display()
            )
            .into());
        }
    }

    if verbose {
        println!("Unpacking '{}' to '{}'", input.display(), output.display());
    }

    let start_time = Instant::now();

    let fw = fs::read(input)?;
    if verbose {
        println!("Firmware size: {:#x} bytes", fw.len());
    }

    let progress = if !quiet {
        let pb = ProgressBar::new(RegionKind::ALL.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
                )
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_message("Decoding regions...");
        Some(pb)
    } else {
        None
    };

    // The library decodes all five regions in one call; the bar tracks the
    // per-region reporting below.
    let unpacked = unpack::unpack(&fw).map_err(|e| format!("Unpack failed: {}", e))?;

    let mut failed = 0;
    for region in &unpacked.regions {
        if let Some(ref pb) = progress {
            pb.inc(1);
        }
        match &region.error {
            None => {
                if verbose {
                    println!(
                        "  {}: {:#010x} -> {} bytes",
                        region.kind,
                        region.rom_offset,
                        region.data.len()
                    );
                }
            }
            Some(e) => {
                failed += 1;
                eprintln!("  {}: FAILED ({})", region.kind, e);
            }
        }
    }
    if let Some(ref pb) = progress {
        pb.finish_with_message("Decoding complete");
    }

    if split {
        for region in &unpacked.regions {
            let target = split_path(output, region.kind);
            fs::write(&target, &region.data)?;
            if verbose {
                println!("  Wrote '{}'", target.display());
            }
        }
    } else {
        fs::write(output, unpacked.concat())?;
    }

    let elapsed = start_time.elapsed();
    if !quiet {
        println!("✓ Unpack finished!");
        println!("  Input:   {} bytes", fw.len());
        println!("  Output:  {} bytes", unpacked.total_len());
        println!("  Regions: {}/{} decoded", unpacked.regions.len() - failed, unpacked.regions.len());
        println!("  Time:    {:.2?}", elapsed);
    }

    if failed > 0 {
        return Err(format!("{} region(s) failed to decode", failed).into());
    }

    Ok(())
}

fn show_image_info(input: &PathBuf, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("Input file '{}' does not exist", input.display()).into());
    }

    let fw = fs::read(input)?;

    println!("DS Firmware Image Information:");
    println!("  File: {}", input.display());
    println!("  Size: {:#x} bytes", fw.len());

    if !FW_IMAGE_SIZES.contains(&fw.len()) {
        println!("  Status: ✗ Not a valid firmware image size");
        return Ok(());
    }

    match unpack::validate_image(&fw) {
        Ok(()) => println!("  Marker: ✓ \"MAC\" identifier present"),
        Err(e) => {
            println!("  Status: ✗ {}", e);
            return Ok(());
        }
    }

    let header = FwHeader::parse(&fw)?;
    println!("  Identifier: {:?}", String::from_utf8_lossy(&header.fw_identifier));
    println!("  Console type: {:#04x}", header.console_type);

    println!("  ARM9 Boot: from {:#010x} to {:#010x}", header.arm9_boot_rom(), header.arm9_boot_ram());
    println!("  ARM7 Boot: from {:#010x} to {:#010x}", header.arm7_boot_rom(), header.arm7_boot_ram());
    println!("  ARM9 GUI:  from {:#010x}", header.arm9_gui_rom());
    println!("  ARM7 GUI:  from {:#010x}", header.arm7_gui_rom());
    println!("  GUI Data:  from {:#010x}", header.gui_data_rom());

    // Probe the unencrypted regions for their declared sizes.
    for kind in [RegionKind::Arm7Gui, RegionKind::Arm9Gui, RegionKind::GuiData] {
        let offset = unpack::region_offset(&header, kind) as usize;
        match fw.get(offset..).map(part345::declared_size) {
            Some(Ok(size)) => println!("  {} declared size: {:#x} bytes", kind, size),
            Some(Err(e)) => println!("  {} declared size: unavailable ({})", kind, e),
            None => println!("  {} declared size: offset out of range", kind),
        }
    }

    if verbose {
        println!(
            "  Header bytes: {:02x?}",
            &fw[..ndsfw::header::FW_HEADER_LEN]
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndsfw::key1::Key1;
    use tempfile::tempdir;

    /// Minimal valid image: "MAC" marker plus one decodable region layout.
    fn synthetic_firmware() -> Vec<u8> {
        let mut fw = vec![0u8; 0x2_0000];
        fw[8..12].copy_from_slice(b"MACP");
        // part1 -> 0x200, part2 -> 0x400, shifts zero
        fw[12..14].copy_from_slice(&0x0080u16.to_le_bytes());
        fw[16..18].copy_from_slice(&0x0100u16.to_le_bytes());
        // part3 -> 0x600, part4 -> 0x700, part5 -> 0x800
        fw[0..2].copy_from_slice(&0x00C0u16.to_le_bytes());
        fw[2..4].copy_from_slice(&0x00E0u16.to_le_bytes());
        fw[22..24].copy_from_slice(&0x0100u16.to_le_bytes());

        // Boot regions: literal-only LZ77 streams, encrypted in place.
        let key = Key1::new(u32::from_le_bytes(*b"MACP"), 2);
        for offset in [0x400usize, 0x200] {
            let mut region = vec![0x10, 0x04, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0xCC];
            region.extend_from_slice(&[0xDD, 0, 0, 0, 0, 0, 0, 0]);
            for chunk in region.chunks_exact_mut(8) {
                let block: &mut [u8; 8] = chunk.try_into().unwrap();
                key.encrypt_block(block);
            }
            fw[offset..offset + 16].copy_from_slice(&region);
        }

        // GUI regions: literal-only part345 streams.
        for offset in [0x600usize, 0x700, 0x800] {
            let region = [0x10, 0x02, 0x00, 0x00, 0x00, 0x11, 0x22];
            fw[offset..offset + region.len()].copy_from_slice(&region);
        }

        fw
    }

    #[test]
    fn test_unpack_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input_path = dir.path().join("firmware.bin");
        let output_path = dir.path().join("firmware.unpacked");

        fs::write(&input_path, synthetic_firmware())?;

        unpack_image(&input_path, &output_path, false, false, false, true)?;

        let result = fs::read(&output_path)?;
        // arm7boot + arm9boot (4 bytes each) then three 2-byte GUI regions.
        assert_eq!(
            result,
            [0xAA, 0xBB, 0xCC, 0xDD, 0xAA, 0xBB, 0xCC, 0xDD, 0x11, 0x22, 0x11, 0x22, 0x11, 0x22]
        );
        Ok(())
    }

    #[test]
    fn test_split_output() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input_path = dir.path().join("firmware.bin");
        let output_path = dir.path().join("fw");

        fs::write(&input_path, synthetic_firmware())?;
        unpack_image(&input_path, &output_path, true, false, false, true)?;

        let arm9 = fs::read(dir.path().join("fw.arm9boot.bin"))?;
        assert_eq!(arm9, [0xAA, 0xBB, 0xCC, 0xDD]);
        let gui = fs::read(dir.path().join("fw.guidata.bin"))?;
        assert_eq!(gui, [0x11, 0x22]);
        Ok(())
    }
}
