use std::env;
use std::fs;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: tvlink <file.o> [file.o ...]");
        std::process::exit(1);
    }

    let paths = &args[1..];
    let binary = match tvasm::link::link(paths) {
        Ok(binary) => binary,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = fs::write("program.bin", &binary) {
        eprintln!("failed to write 'program.bin': {err}");
        std::process::exit(1);
    }
    log::info!("wrote 'program.bin' ({} bytes)", binary.len());
}
