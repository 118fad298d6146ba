//! CLI demo: filter a horizontal-cross environment image into an
//! irradiance map.
//!
//! Plays the preview-consumer role against the detached filter worker:
//! polls the dirty flag at ~60 Hz, keeps the latest frame as its "upload",
//! raises the upload signal (which paces the GPU backend between faces),
//! and saves the final frame.

use std::time::Duration;

use irrmap::Backend;

fn parse_backend(name: &str) -> Option<Backend> {
    match name {
        "direct" => Some(Backend::Direct),
        "sh" => Some(Backend::Sh),
        #[cfg(feature = "gpu")]
        "gpu" => Some(Backend::Gpu),
        _ => None,
    }
}

fn usage() -> ! {
    log::error!("Usage: irrmap <input> [output] [--backend direct|sh|gpu]");
    std::process::exit(1);
}

struct Args {
    input: String,
    output: String,
    backend: Backend,
}

fn parse_args() -> Args {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let mut input = None;
    let mut output = None;
    let mut backend = Backend::Sh;

    let mut iter = argv.iter();
    while let Some(arg) = iter.next() {
        if arg == "--backend" {
            match iter.next().map(String::as_str).and_then(parse_backend) {
                Some(parsed) => backend = parsed,
                None => {
                    log::error!(
                        "unknown or unavailable backend \
                         (expected direct, sh or gpu)"
                    );
                    std::process::exit(1);
                }
            }
        } else if input.is_none() {
            input = Some(arg.clone());
        } else if output.is_none() {
            output = Some(arg.clone());
        } else {
            log::error!("unexpected argument: {arg}");
            usage();
        }
    }

    let Some(input) = input else { usage() };
    let output = output.unwrap_or_else(|| {
        let stem = std::path::Path::new(&input)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("envmap");
        format!("{stem}_irr.png")
    });
    Args {
        input,
        output,
        backend,
    }
}

fn main() {
    env_logger::init();
    let args = parse_args();

    let loaded = match image::open(&args.input) {
        Ok(loaded) => loaded,
        Err(e) => {
            log::error!("failed to load {}: {e}", args.input);
            std::process::exit(1);
        }
    };
    let rgb = loaded.to_rgb8();
    let (width, height) = rgb.dimensions();

    let layout = irrmap::Layout::detect(width, height);
    if layout != irrmap::Layout::HCross {
        log::error!(
            "{}x{} detected as {layout:?}; only horizontal-cross input \
             is filterable",
            width,
            height
        );
        std::process::exit(1);
    }
    log::info!(
        "{}x{} horizontal cross, face size {}, {:?} backend",
        width,
        height,
        width / 4,
        args.backend
    );

    let context = match irrmap::spawn_filter_worker(
        rgb.into_raw(),
        width,
        height,
        3,
        args.backend,
    ) {
        Ok(context) => context,
        Err(e) => {
            log::error!("failed to start filter worker: {e}");
            std::process::exit(1);
        }
    };

    // Preview consumer loop.
    let mut latest: Vec<u8> = Vec::new();
    let mut logged_percent = 0u32;
    loop {
        let finished = context.is_finished();
        if let Some(frame) = context.take_frame(|f| f.data.to_vec()) {
            latest = frame;
            context.notify_uploaded();
        }
        let percent = (context.progress() * 100.0) as u32;
        if percent >= logged_percent + 10 {
            log::info!("filtering... {percent}%");
            logged_percent = percent;
        }
        if finished {
            break;
        }
        std::thread::sleep(Duration::from_millis(16));
    }

    if context.has_failed() {
        log::error!("filter pass failed; not writing output");
        std::process::exit(1);
    }

    let Some(result) = image::RgbImage::from_raw(width, height, latest)
    else {
        log::error!("filter produced no output");
        std::process::exit(1);
    };
    if let Err(e) = result.save(&args.output) {
        log::error!("failed to save {}: {e}", args.output);
        std::process::exit(1);
    }
    log::info!("wrote {}", args.output);
}
