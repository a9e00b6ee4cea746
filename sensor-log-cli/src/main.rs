//! Demo CLI driving the flash-backed sample FIFO and the S4PP uploader
//! against a file standing in for a NOR-flash region.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use flash_fifo::{FlashFifo, Sample};
use s4pp::{Credentials, FifoSource, UploadOptions};

use sensor_log_cli::flash_file::FileBackedFlash;
use sensor_log_cli::transport::TcpTransport;
use sensor_log_cli::{open_fifo, save_fifo};

const SECTOR_SIZE: usize = 4096;

#[derive(Parser, Debug)]
#[command(author, version, about = "Flash sample FIFO + S4PP upload demo")]
struct Cli {
    /// Path to the file standing in for the NOR-flash region.
    #[arg(short, long, global = true, default_value = "fifo.bin")]
    image: PathBuf,

    /// Number of data sectors in the FIFO (N in the layout, N >= 3).
    #[arg(long, global = true, default_value_t = 8)]
    sectors: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Erase the region and initialize an empty FIFO.
    Format,
    /// Push one sample onto the FIFO.
    Push {
        /// Up to four ASCII characters identifying the metric.
        tag: String,
        /// Seconds since the Unix epoch.
        time: u32,
        /// Raw integer reading.
        value: i32,
        /// Implicit decimal places applied to `value` when rendered.
        #[arg(default_value_t = 0)]
        decimals: u8,
    },
    /// Print the sample at `offset` from the head, or all samples if
    /// `offset` is omitted.
    Peek {
        #[arg(long)]
        offset: Option<u32>,
    },
    /// Print how many samples the FIFO currently holds.
    Count,
    /// Upload pending samples to an S4PP server, dropping what gets
    /// acknowledged.
    Upload {
        #[arg(long)]
        server: String,
        #[arg(long, default_value_t = 22226)]
        port: u16,
        #[arg(long)]
        user: String,
        /// Shared HMAC key, as a UTF-8 string (not hex-decoded).
        #[arg(long)]
        key: String,
        /// Cap samples per sequence; 0 means no cap beyond the payload limit.
        #[arg(long, default_value_t = 0)]
        batch_size: u32,
    },
}

fn open(image: &PathBuf, data_sectors: u32) -> Result<FlashFifo<FileBackedFlash<SECTOR_SIZE>, SECTOR_SIZE>> {
    open_fifo(image, data_sectors).with_context(|| format!("opening flash image {}", image.display()))
}

fn save(image: &PathBuf, fifo: &FlashFifo<FileBackedFlash<SECTOR_SIZE>, SECTOR_SIZE>) -> Result<()> {
    save_fifo(image, fifo).with_context(|| format!("writing flash image {}", image.display()))
}

fn print_sample(offset: u32, sample: &Sample) {
    println!(
        "{offset}: tag={} time={} value={} decimals={}",
        sample.tag_as_str().unwrap_or("?"),
        sample.timestamp,
        sample.value,
        sample.decimals
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Command::Format => {
            let flash = FileBackedFlash::<SECTOR_SIZE>::load(&cli.image, 2 + cli.sectors)
                .with_context(|| format!("loading flash image {}", cli.image.display()))?;
            let fifo = FlashFifo::format(flash, cli.sectors)?;
            save(&cli.image, &fifo)?;
            println!("formatted {} data sectors", cli.sectors);
        }
        Command::Push {
            tag,
            time,
            value,
            decimals,
        } => {
            if *decimals > 7 {
                bail!("decimals must be 0-7");
            }
            let mut fifo = open(&cli.image, cli.sectors)?;
            let sample = Sample {
                timestamp: *time,
                value: *value,
                decimals: *decimals,
                tag: Sample::tag_from_str(tag),
            };
            fifo.push(&sample)?;
            save(&cli.image, &fifo)?;
            println!("pushed, count now {}", fifo.count());
        }
        Command::Peek { offset } => {
            let mut fifo = open(&cli.image, cli.sectors)?;
            match offset {
                Some(offset) => match fifo.peek(*offset)? {
                    Some(sample) => print_sample(*offset, &sample),
                    None => println!("no sample at offset {offset}"),
                },
                None => {
                    let mut cursor = fifo.cursor();
                    let mut i = 0;
                    while let Some(sample) = cursor.next()? {
                        print_sample(i, &sample);
                        i += 1;
                    }
                }
            }
        }
        Command::Count => {
            let fifo = open(&cli.image, cli.sectors)?;
            println!(
                "count={} capacity={} max_capacity={}",
                fifo.count(),
                fifo.capacity(),
                fifo.max_capacity()
            );
        }
        Command::Upload {
            server,
            port,
            user,
            key,
            batch_size,
        } => {
            let mut fifo = open(&cli.image, cli.sectors)?;
            let mut source = FifoSource::new(&mut fifo);
            let mut transport = TcpTransport::new(server.clone(), *port);
            let credentials = Credentials {
                server,
                port: *port,
                secure: false,
                user,
                key: key.as_bytes(),
            };
            let options = UploadOptions {
                batch_size: *batch_size,
                ..UploadOptions::default()
            };
            let report = s4pp::run_upload(&mut transport, &credentials, &options, &mut source).await;
            drop(source);

            if report.acknowledged > 0 {
                fifo.drop_front(report.acknowledged)?;
                save(&cli.image, &fifo)?;
            }

            match report.result {
                Ok(()) => println!("uploaded and acknowledged {} samples", report.acknowledged),
                Err(err) => bail!("upload failed after {} acknowledged: {err}", report.acknowledged),
            }
        }
    }

    Ok(())
}
