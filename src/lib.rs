use std::path::PathBuf;

use clap::Parser;
use log::info;

pub mod cfg;
pub mod hierarchy;
pub mod layout;
pub mod library;
pub mod logical_design;
pub mod lowering;
pub mod mapped_design;
pub mod save_design;
pub mod svg;
pub mod synth;
pub mod wires;

mod util;

#[cfg(test)]
mod tests;

#[derive(Debug)]
pub enum Error {
	// Malformed input.
	UnknownModule(String),
	UnknownCellType(String),
	UnsupportedWidth(usize),
	UnsupportedInout(String),
	MalformedBit(String),
	MissingConnection(String, String),
	MissingCustomMeta(String),
	ModuleCycle(String),
	TwoDrivers(
		logical_design::NetId,
		logical_design::PortRef,
		logical_design::PortRef,
	),
	// Internal invariant violations.
	UndrivenNet(logical_design::NetId),
	DanglingPortRef(logical_design::NetId),
	UnknownPort(String, String),
	NoTemplate(library::TemplateOp, library::Width),
	NoPlacement(logical_design::ComponentId),
	NonUnitMove,
	// Encoding overflow.
	TooLong(&'static str, usize),
	ValueOutOfRange(&'static str),
	// External failures.
	SynthNotFound,
	SynthFailed(String),
	Compress(snap::Error),
	IOError(std::io::Error),
	SerializationError(serde_json::Error),
}

impl From<std::io::Error> for Error {
	fn from(value: std::io::Error) -> Self {
		Self::IOError(value)
	}
}

impl From<serde_json::Error> for Error {
	fn from(value: serde_json::Error) -> Self {
		Self::SerializationError(value)
	}
}

pub type Result<T> = std::result::Result<T, Error>;

/// Verilog to grid-sandbox schematic compiler (v2s)
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
	/// Top module name.
	#[arg(short, long, required_unless_present = "dump_cfg")]
	pub top: Option<String>,

	/// Pack components into tight columns and use teleport wires.
	#[arg(long)]
	pub compact: bool,

	/// Keep the synthesizer from flattening the hierarchy.
	#[arg(long)]
	pub no_flatten: bool,

	/// Also write a debug SVG next to each schematic.
	#[arg(long)]
	pub svg: bool,

	/// Dump a template cfg/v2s_template.toml. Rename to cfg/v2s.toml to use
	/// for real.
	#[arg(long)]
	pub dump_cfg: bool,

	/// Input source file.
	#[arg(required_unless_present = "dump_cfg")]
	pub input: Option<PathBuf>,

	/// Output directory; receives circuit.data and dependencies/.
	#[arg(required_unless_present = "dump_cfg")]
	pub output_dir: Option<PathBuf>,
}

/// Whole-job flow: read one source file, compile the hierarchy bottom-up,
/// write one schematic per module.
pub fn compile_flow(args: Args) -> Result<()> {
	if args.dump_cfg {
		cfg::dump_cfg();
		return Ok(());
	}
	let input = args.input.unwrap();
	let output_dir = args.output_dir.unwrap();
	let top = args.top.unwrap();
	let source = std::fs::read_to_string(&input)?;
	let opts = hierarchy::CompileOptions {
		compact: args.compact,
		flatten: !args.no_flatten,
	};
	let compiled = hierarchy::compile_all(&source, &top, &opts)?;
	for module in &compiled {
		// All bytes exist before the first file is created.
		let bytes = module.save.to_bytes()?;
		let dir = if module.is_top {
			output_dir.clone()
		} else {
			output_dir.join("dependencies").join(&module.name)
		};
		std::fs::create_dir_all(&dir)?;
		let path = dir.join("circuit.data");
		std::fs::write(&path, &bytes)?;
		info!("wrote {} ({} bytes)", path.display(), bytes.len());
		if args.svg {
			svg::save_svg(&module.design, &module.phy, dir.join("circuit.svg"))?;
		}
	}
	Ok(())
}
