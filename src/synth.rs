//! External synthesizer invocation.
//!
//! The pipeline consumes a pre-synthesized netlist; this module only knows
//! how to find the Yosys executable, run a fixed script over a source
//! snippet in a scratch directory, and parse the JSON it writes back.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::Command;

use log::{debug, info};

use crate::mapped_design::MappedDesign;
use crate::{Error, Result};

pub fn find_synth_exe() -> Result<PathBuf> {
	if let Ok(v) = std::env::var("YOSYS_EXE") {
		if PathBuf::from(&v).is_file() {
			return Ok(PathBuf::from(v));
		}
		// An explicitly configured path that is wrong should not fall
		// through to whatever happens to be on PATH.
		return Err(Error::SynthNotFound);
	}
	let probe = Command::new("yosys").arg("--version").output();
	if probe.is_ok_and(|out| out.status.success()) {
		return Ok(PathBuf::from("yosys"));
	}
	Err(Error::SynthNotFound)
}

/// Run the synthesizer over `source` and parse the resulting netlist.
pub fn synthesize(source: &str, top: &str, flatten: bool) -> Result<MappedDesign> {
	let exe = find_synth_exe()?;
	let dir = tempfile::tempdir()?;
	let src_path = dir.path().join("design.v");
	let json_path = dir.path().join("design.json");
	std::fs::write(&src_path, source)?;
	let script = format!(
		"read_verilog {src}; hierarchy -top {top}; proc; {flatten}opt; fsm; opt; memory; opt; write_json {json}",
		src = src_path.display(),
		json = json_path.display(),
		flatten = if flatten { "flatten; " } else { "" },
	);
	debug!("synthesizer script: {script}");
	let output = Command::new(&exe).arg("-p").arg(&script).output()?;
	if !output.status.success() {
		return Err(Error::SynthFailed(
			String::from_utf8_lossy(&output.stderr).into_owned(),
		));
	}
	info!("synthesized module {top}");
	let file = File::open(&json_path)?;
	let mapped: MappedDesign = serde_json::from_reader(BufReader::new(file))?;
	Ok(mapped)
}
