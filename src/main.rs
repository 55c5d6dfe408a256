use std::env;
use std::fs;
use std::path::Path;

use tvasm::assembler::Assembler;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: tvasm <file.tv>");
        std::process::exit(1);
    }

    let source_path = Path::new(&args[1]);
    let object = match Assembler::assemble_file(source_path) {
        Ok(object) => object,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    let basename = source_path.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
    let object_path = Path::new("objects").join(format!("{basename}.o"));
    if let Some(parent) = object_path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            eprintln!("failed to create '{}': {err}", parent.display());
            std::process::exit(1);
        }
    }

    let mut file = match fs::File::create(&object_path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("failed to create '{}': {err}", object_path.display());
            std::process::exit(1);
        }
    };
    if let Err(err) = object.write_to(&mut file) {
        eprintln!("failed to write '{}': {err}", object_path.display());
        std::process::exit(1);
    }
    log::info!("wrote '{}'", object_path.display());

    match tvasm::link::link(&[&object_path]) {
        Ok(binary) => {
            if let Err(err) = fs::write("program.bin", &binary) {
                eprintln!("failed to write 'program.bin': {err}");
                std::process::exit(1);
            }
            log::info!("wrote 'program.bin' ({} bytes)", binary.len());
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
