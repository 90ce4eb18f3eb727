#![allow(missing_docs)]

use std::{ffi::OsString, io::BufWriter, time::Instant};

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{bail, ensure};
use compact_hash::{
    BucketedStorage, CvIndex, DisplacementIndex, EliasGammaDisplacement, FixedDisplacement,
    FlatStorage, IndexStructure, LayeredDisplacement, Storage, TableConfig,
};
use lz_trie::{lz78, lzw, CompactHashTrie, LzTrie};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Algorithm {
    Lz78,
    Lzw,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Strategy {
    SparseCv,
    PlainCv,
    SparseLayered,
    PlainLayered,
    SparseElias,
    PlainElias,
    SparseFixed,
    PlainFixed,
}

/// Factorizes a file with an LZ78 or LZW dictionary stored in a compact hash table.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    input: OsString,
    #[clap(short = 'a', long, value_enum, default_value = "lz78")]
    algorithm: Algorithm,
    #[clap(short = 's', long, value_enum, default_value = "sparse-cv")]
    strategy: Strategy,

    /// Clear the dictionary whenever it reaches this many phrases.
    #[clap(short = 'm', long)]
    max_dict_size: Option<usize>,

    #[clap(short = 'c', long, default_value = "0")]
    capacity: usize,
    #[clap(short = 'l', long, default_value = "0.5")]
    load_factor: f32,
    #[clap(long, default_value = "1024")]
    elias_bucket_size: usize,
    #[clap(long)]
    elias_growing_buckets: bool,

    /// Decode the factors again and compare with the input.
    #[clap(long)]
    verify: bool,
    /// Write the final dictionary table to this file.
    #[clap(long)]
    save_table: Option<OsString>,
}

fn run<S: Storage, I: IndexStructure>(
    args: &Args,
    config: TableConfig,
    input: &[u8],
) -> color_eyre::Result<()> {
    let start = Instant::now();
    let mut trie = match args.algorithm {
        Algorithm::Lz78 => CompactHashTrie::<S, I>::lz78(config)?,
        Algorithm::Lzw => CompactHashTrie::<S, I>::lzw(config)?,
    };

    let (factor_count, decoded) = match args.algorithm {
        Algorithm::Lz78 => {
            let factors = lz78::factorize(&mut trie, input, args.max_dict_size);
            let decoded = args
                .verify
                .then(|| lz78::decode(&factors, args.max_dict_size))
                .transpose()?;
            (factors.len(), decoded)
        }
        Algorithm::Lzw => {
            let factors = lzw::factorize(&mut trie, input, args.max_dict_size);
            let decoded = args
                .verify
                .then(|| lzw::decode(&factors, args.max_dict_size))
                .transpose()?;
            (factors.len(), decoded)
        }
    };

    let table = trie.table();
    log::info!(
        "{} bytes in {} factors after {:.2?}",
        input.len(),
        factor_count,
        start.elapsed()
    );
    log::info!(
        "dictionary: {} phrases, capacity {}, {} bytes ({:.2} bits per phrase)",
        trie.size(),
        table.capacity(),
        trie.heap_size(),
        trie.heap_size() as f64 * 8.0 / trie.size().max(1) as f64
    );
    log::info!(
        "slot widths: quotient {} bits, value {} bits",
        table.slot_widths().quotient,
        table.slot_widths().value
    );

    if let Some(decoded) = decoded {
        ensure!(decoded == input, "decoded factors differ from the input");
        log::info!("verified");
    }

    if let Some(path) = &args.save_table {
        let mut writer = BufWriter::new(std::fs::File::create(path)?);
        table.write_to(&mut writer)?;
        writer.into_inner()?.sync_all()?;
    }
    Ok(())
}

fn main() -> color_eyre::Result<()> {
    let args = Args::parse();

    color_eyre::install()?;
    lzdict_logger::setup();

    let config = TableConfig::default()
        .with_capacity(args.capacity)
        .with_max_load_factor(args.load_factor)
        .with_elias_buckets(args.elias_bucket_size, args.elias_growing_buckets);
    if let Err(err) = config.validate() {
        bail!("invalid table configuration: {err}");
    }

    let input = std::fs::read(&args.input)?;

    type Layered = DisplacementIndex<LayeredDisplacement>;
    type Elias = DisplacementIndex<EliasGammaDisplacement>;
    type Fixed = DisplacementIndex<FixedDisplacement>;

    match args.strategy {
        Strategy::SparseCv => run::<BucketedStorage, CvIndex>(&args, config, &input),
        Strategy::PlainCv => run::<FlatStorage, CvIndex>(&args, config, &input),
        Strategy::SparseLayered => run::<BucketedStorage, Layered>(&args, config, &input),
        Strategy::PlainLayered => run::<FlatStorage, Layered>(&args, config, &input),
        Strategy::SparseElias => run::<BucketedStorage, Elias>(&args, config, &input),
        Strategy::PlainElias => run::<FlatStorage, Elias>(&args, config, &input),
        Strategy::SparseFixed => run::<BucketedStorage, Fixed>(&args, config, &input),
        Strategy::PlainFixed => run::<FlatStorage, Fixed>(&args, config, &input),
    }
}
