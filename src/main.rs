use clap::Parser;

use v2s::{compile_flow, Args};

fn main() {
	env_logger::init();
	let args = Args::parse();
	if let Err(e) = compile_flow(args) {
		eprintln!("{e:#?}");
		std::process::exit(1);
	}
}
