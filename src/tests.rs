pub(crate) mod lowering_tests;

use crate::logical_design::LogicalDesign;
use crate::lowering::lower_module;
use crate::mapped_design::MappedDesign;
use crate::util::hash_map;

pub(crate) fn mapped(json: &str) -> MappedDesign {
	serde_json::from_str(json).unwrap()
}

/// Lower the `top` module of a fixture into a fresh design.
pub(crate) fn lower_top(json: &str) -> LogicalDesign {
	try_lower_top(json).unwrap()
}

pub(crate) fn try_lower_top(json: &str) -> crate::Result<LogicalDesign> {
	let mapped = mapped(json);
	let mut design = LogicalDesign::new();
	lower_module(
		&mut design,
		mapped.module("top").unwrap(),
		&hash_map(),
		&hash_map(),
	)?;
	Ok(design)
}

pub(crate) fn op_count(design: &LogicalDesign, op: crate::library::TemplateOp) -> usize {
	design.iter_live().filter(|c| c.template.op == op).count()
}

pub(crate) fn edge_count(design: &LogicalDesign) -> usize {
	design
		.iter_nets()
		.filter(|(_, net)| net.source.is_some())
		.map(|(_, net)| net.sinks.len())
		.sum()
}
