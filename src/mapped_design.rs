//! Input model for the synthesizer's JSON netlist dump. Only the slices the
//! pipeline consumes are modeled: module ports and cells. Cell and port maps
//! deserialize into `BTreeMap` so enumeration order, and with it permanent
//! id assignment, is deterministic across runs.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::util::from_bin_str;
use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct MappedDesign {
	#[serde(default)]
	pub modules: BTreeMap<String, Module>,
}

impl MappedDesign {
	pub fn module(&self, name: &str) -> Result<&Module> {
		self.modules
			.get(name)
			.ok_or_else(|| Error::UnknownModule(name.to_owned()))
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Module {
	#[serde(default)]
	pub ports: BTreeMap<String, Port>,
	#[serde(default)]
	pub cells: BTreeMap<String, Cell>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
	Input,
	Output,
	Inout,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Port {
	pub direction: Direction,
	pub bits: Vec<Bit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cell {
	#[serde(rename = "type")]
	pub cell_type: String,
	#[serde(default)]
	pub parameters: BTreeMap<String, ParamValue>,
	#[serde(default)]
	pub connections: BTreeMap<String, Vec<Bit>>,
}

impl Cell {
	pub fn connection(&self, port: &str) -> Result<&Vec<Bit>> {
		self.connections
			.get(port)
			.ok_or_else(|| Error::MissingConnection(self.cell_type.clone(), port.to_owned()))
	}

	pub fn param_u64(&self, name: &str) -> Option<u64> {
		self.parameters.get(name).map(ParamValue::as_u64)
	}

	/// Polarity parameters default to active-high when absent.
	pub fn param_bool_or(&self, name: &str, default: bool) -> bool {
		self.param_u64(name).map(|v| v != 0).unwrap_or(default)
	}
}

/// One bit reference in the synthesizer's flat bit space: either a numbered
/// net or a literal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Bit {
	Net(u64),
	Literal(String),
}

impl Bit {
	/// Literal "1" is the only constant-one spelling; "0", "x" and "z" all
	/// lower to constant zero.
	pub fn literal_value(&self) -> Result<Option<bool>> {
		match self {
			Bit::Net(_) => Ok(None),
			Bit::Literal(s) => match s.as_str() {
				"0" | "x" | "z" => Ok(Some(false)),
				"1" => Ok(Some(true)),
				_ => Err(Error::MalformedBit(s.clone())),
			},
		}
	}
}

/// Synthesizer parameters arrive either as JSON integers or as binary-digit
/// strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
	Int(i64),
	Str(String),
}

impl ParamValue {
	pub fn as_u64(&self) -> u64 {
		match self {
			ParamValue::Int(v) => *v as u64,
			ParamValue::Str(s) => from_bin_str(s),
		}
	}
}
