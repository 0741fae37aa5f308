use std::process::exit;

use clap::{App, Arg};

use disasm86::disasm::Decoder;
use disasm86::tools;

fn main() {
    let matches = App::new("disasm86")
        .version("0.1")
        .about("Linear sweep disassembler for a 32-bit x86 subset")
        .arg(Arg::with_name("INPUT")
            .short("i")
            .help("File to disassemble")
            .required(true)
            .takes_value(true))
        .get_matches();

    let filename = matches.value_of("INPUT").unwrap();

    let data = match tools::read_binary(filename) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("failed to read {}: {}", filename, err);
            exit(1);
        }
    };

    let mut decoder = Decoder::default();
    decoder.sweep(&data);
    print!("{}", decoder.present_listing());
}
