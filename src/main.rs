//! Demo driver for the bitblt engine.
//!
//! Builds a checkerboard source, copies a rectangle of it through the
//! configured back-end, and renders both bitmaps. Useful for eyeballing a
//! back-end and for watching the specialization cache do its job across
//! repeated runs (`--runs`).

use anyhow::{Result, bail};
use bitblt::{BackendKind, BlitOp, Config, Engine, get_pixel, set_pixel, stride_words};
use clap::Parser;

#[derive(Parser)]
#[command(name = "bitblt", version, about = "Specialized bit-block transfer demo")]
struct Args {
    /// Back-end: textual, binary or aligned-binary.
    #[arg(long, default_value = "textual")]
    back_end: String,

    /// Shadow the copy with the reference implementation and compare.
    #[arg(long)]
    verify: bool,

    /// Skip specialization and run the reference only.
    #[arg(long)]
    no_specialize: bool,

    /// Force loop unrolling.
    #[arg(long)]
    unroll: bool,

    /// Inline frozen dimensions as constants.
    #[arg(long)]
    inline_constants: bool,

    /// Allow the whole-word fast path for aligned operations.
    #[arg(long)]
    align_opt: bool,

    /// Log generated source and disassembly (needs RUST_LOG=debug).
    #[arg(long)]
    debug_codegen: bool,

    /// Emit one timing line per call.
    #[arg(long)]
    log_perf: bool,

    /// Source bitmap width in pixels.
    #[arg(long, default_value_t = 16)]
    width: u32,

    /// Source bitmap height in pixels.
    #[arg(long, default_value_t = 16)]
    height: u32,

    /// Copy rectangle: source origin.
    #[arg(long, default_value_t = 0)]
    src_x: u32,
    #[arg(long, default_value_t = 0)]
    src_y: u32,

    /// Copy rectangle: destination origin.
    #[arg(long, default_value_t = 0)]
    dst_x: u32,
    #[arg(long, default_value_t = 0)]
    dst_y: u32,

    /// Copy rectangle size; defaults to the whole source.
    #[arg(long)]
    copy_width: Option<u32>,
    #[arg(long)]
    copy_height: Option<u32>,

    /// Repeat the call to exercise the cache.
    #[arg(long, default_value_t = 1)]
    runs: u32,
}

fn checkerboard(w: u32, h: u32) -> Vec<u32> {
    let mut words = vec![0u32; (stride_words(w) * h) as usize];
    for y in 0..h {
        for x in 0..w {
            set_pixel(&mut words, w, x, y, ((x ^ y) & 1 == 0) as u32);
        }
    }
    words
}

fn render(words: &[u32], w: u32, h: u32) -> String {
    let mut out = String::with_capacity(((w + 1) * h) as usize);
    for y in 0..h {
        for x in 0..w {
            out.push(if get_pixel(words, w, x, y) != 0 { '#' } else { '.' });
        }
        out.push('\n');
    }
    out
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let kind = BackendKind::from_name(&args.back_end)?;
    let mut config = Config::new();
    config
        .back_end(kind)
        .verify(args.verify)
        .use_specialized(!args.no_specialize)
        .log_perf(args.log_perf)
        .unroll(args.unroll)
        .inline_constants(args.inline_constants)
        .align_opt(args.align_opt)
        .debug_output(args.debug_codegen);
    let engine = Engine::new(&config)?;

    let width = args.copy_width.unwrap_or(args.width);
    let height = args.copy_height.unwrap_or(args.height);
    let op = BlitOp {
        src_w: args.width,
        src_h: args.height,
        src_x: args.src_x,
        src_y: args.src_y,
        dst_w: args.dst_x + width,
        dst_x: args.dst_x,
        dst_y: args.dst_y,
        width,
        height,
    };

    if args.runs == 0 {
        bail!("--runs must be at least 1");
    }

    let src = checkerboard(args.width, args.height);
    let dst_rows = op.dst_y + height;
    let mut dst = vec![0u32; (stride_words(op.dst_w) * dst_rows) as usize];
    for _ in 0..args.runs {
        dst.iter_mut().for_each(|w| *w = 0);
        engine.bitblt(&src, &mut dst, &op)?;
    }

    println!("source ({}x{}):", args.width, args.height);
    print!("{}", render(&src, args.width, args.height));
    println!();
    println!("destination ({}x{}):", op.dst_w, dst_rows);
    print!("{}", render(&dst, op.dst_w, dst_rows));

    let stats = engine.cache_stats(kind);
    println!();
    println!(
        "back-end: {kind}; cache: {} miss(es), {} hit(s)",
        stats.misses, stats.hits
    );
    Ok(())
}
