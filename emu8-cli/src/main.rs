//! Entrypoint for CLI
use std::{env, error::Error, fs, time::Instant};

use emu8::{clock::Clock, prelude::*, IMPL_VERSION};
use log::{error, info};

static USAGE: &str = r#"
usage: emu8 CMD FILE [FRAMES]

commands:
    run     Run the target ROM file headless, then print the display
    dis     Disassemble the target ROM into readable assembly

environment:
    RUST_LOG            Log level, for example `trace` to print every instruction
    EMU8_UNTHROTTLED    Run frames as fast as possible instead of at 60 Hz

examples:
    emu8 run maze.ch8
    emu8 run maze.ch8 120
    emu8 dis maze.ch8
"#;

/// Number of frames to run when not specified, 10 seconds at 60 Hz.
const DEFAULT_FRAMES: usize = 600;

fn run_bytecode(filepath: impl AsRef<str>, frames: usize) -> Chip8Result<()> {
    info!("running {} for {frames} frames", filepath.as_ref());

    let mut vm = Chip8Vm::new(Chip8Conf::default());
    vm.load_file(filepath.as_ref())?;

    let throttle = env::var_os("EMU8_UNTHROTTLED").is_none();
    let mut clock = Clock::timers();

    let start = Instant::now();
    let result = run_frames(&mut vm, &mut clock, frames, throttle);
    let end = Instant::now();

    println!(
        "time taken: {}ms",
        end.duration_since(start).as_nanos() as f64 / 1000000.0
    ); // to millis
    println!("{}", vm.dump_display()?);

    if let Err(ref err) = result {
        error!("machine fault\n{}", vm.dump_ram(16)?);
        error!("{err}");
    }

    result
}

/// Host loop: a frame of instructions, then the 60 Hz timer tick,
/// then present the display if something was drawn.
fn run_frames(
    vm: &mut Chip8Vm,
    clock: &mut Clock,
    frames: usize,
    throttle: bool,
) -> Chip8Result<()> {
    let mut presented = 0;

    for _ in 0..frames {
        if throttle {
            clock.wait();
        }

        vm.run_frame()?;
        vm.tick_timers();

        if vm.display_ready() {
            // Headless: the display buffer is only printed at the end.
            vm.consume_frame();
            presented += 1;
        }
    }

    info!("presented {presented} frames");

    Ok(())
}

fn run_disassembler(filepath: impl AsRef<str>) -> Chip8Result<()> {
    info!("disassembling {}", filepath.as_ref());

    let bytecode = fs::read(filepath.as_ref())?;
    Disassembler::new(bytecode.as_slice()).print_bytecode()?;

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new().env().init().unwrap();

    match parse_args() {
        Some(Cmd::Run { filepath, frames }) => run_bytecode(filepath, frames)?,
        Some(Cmd::Dis { filepath }) => run_disassembler(filepath)?,
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    }

    Ok(())
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    match args.next() {
        Some(cmd) => {
            // don't format me T.T
            match cmd.as_str() {
                "run" => Some(Cmd::Run {
                    filepath: args.next()?,
                    frames: match args.next() {
                        Some(frames) => frames.parse().ok()?,
                        None => DEFAULT_FRAMES,
                    },
                }),
                "dis" => Some(Cmd::Dis {
                    filepath: args.next()?,
                }),
                _ => None,
            }
        }
        None => None,
    }
}

fn print_usage() {
    println!("Emu8 v{IMPL_VERSION}");
    println!("{USAGE}");
}

enum Cmd {
    /// Run file
    Run { filepath: String, frames: usize },
    /// Disassemble
    Dis { filepath: String },
}
