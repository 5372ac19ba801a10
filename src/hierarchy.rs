//! Hierarchy driver: finds submodules in the source text, gives each a
//! stable 63-bit identity, orders them below their parents, and runs the
//! full compile pipeline once per module from the leaves up so every parent
//! can place its children as opaque custom components.

use std::hash::Hasher;

use hashers::fnv::FNV1aHasher64;
use log::info;

use crate::layout::layered::LayeredOracle;
use crate::layout::PhysicalDesign;
use crate::library::{Bounds, Point, PortDir};
use crate::logical_design::{
	CustomMetadata, CustomPort, LogicalDesign, CUSTOM_META_OFFSET, CUSTOM_UNIT,
};
use crate::lowering::lower_module;
use crate::mapped_design::{Direction, MappedDesign};
use crate::save_design::SaveDesign;
use crate::synth::synthesize;
use crate::util::{hash_map, HashM};
use crate::wires::encode_wires;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct ModuleDecl {
	pub name: String,
	pub body: String,
	/// Byte offset of the `module` keyword in the source.
	pub offset: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
	pub compact: bool,
	pub flatten: bool,
}

pub struct CompiledModule {
	pub name: String,
	pub id: u64,
	pub is_top: bool,
	pub save: SaveDesign,
	pub design: LogicalDesign,
	pub phy: PhysicalDesign,
	pub meta: CustomMetadata,
}

fn is_ident_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Lenient lexical scan for `module <name> ... endmodule` declarations.
/// Enough structure for identity and dependency discovery; the synthesizer
/// does the real parsing.
pub fn scan_modules(source: &str) -> Vec<ModuleDecl> {
	let mut modules = vec![];
	let bytes = source.as_bytes();
	let mut pos = 0;
	while let Some(found) = source[pos..].find("module") {
		let at = pos + found;
		let end = at + "module".len();
		let boundary_before = at == 0 || !is_ident_char(bytes[at - 1] as char);
		let boundary_after = end >= source.len() || !is_ident_char(bytes[end] as char);
		// "endmodule" also ends in "module".
		let not_end_keyword = at < 3 || &source[at - 3..at] != "end";
		if !(boundary_before && boundary_after && not_end_keyword) {
			pos = end;
			continue;
		}
		let rest = source[end..].trim_start();
		let name: String = rest.chars().take_while(|&c| is_ident_char(c)).collect();
		if name.is_empty() {
			pos = end;
			continue;
		}
		let body_end = source[end..]
			.find("endmodule")
			.map(|i| end + i)
			.unwrap_or(source.len());
		modules.push(ModuleDecl {
			name,
			body: source[end..body_end].to_owned(),
			offset: at,
		});
		pos = body_end;
	}
	modules
}

/// A declared numeric `CUSTOM_ID` parameter, if the module carries one.
pub fn declared_custom_id(decl: &ModuleDecl) -> Option<u64> {
	let at = decl.body.find("CUSTOM_ID")?;
	let rest = decl.body[at + "CUSTOM_ID".len()..].trim_start();
	let rest = rest.strip_prefix('=')?.trim_start();
	let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
	digits.parse().ok()
}

/// Stable 63-bit module identity: a declared `CUSTOM_ID` wins, otherwise
/// FNV-1a of the name with the top bit masked off.
pub fn module_id(decl: &ModuleDecl) -> u64 {
	if let Some(id) = declared_custom_id(decl) {
		return id;
	}
	let mut hasher = FNV1aHasher64::default();
	hasher.write(decl.name.as_bytes());
	hasher.finish() & !(1 << 63)
}

fn mentions(body: &str, name: &str) -> bool {
	let mut pos = 0;
	while let Some(found) = body[pos..].find(name) {
		let at = pos + found;
		let end = at + name.len();
		let before_ok = at == 0 || !is_ident_char(body.as_bytes()[at - 1] as char);
		let after_ok = end >= body.len() || !is_ident_char(body.as_bytes()[end] as char);
		if before_ok && after_ok {
			return true;
		}
		pos = end;
	}
	false
}

/// Depth-first topological order over textual containment, leaves first.
fn topo_order(modules: &[ModuleDecl], top: &str) -> Result<Vec<usize>> {
	let index: HashM<&str, usize> = {
		let mut m = hash_map();
		for (i, decl) in modules.iter().enumerate() {
			m.insert(decl.name.as_str(), i);
		}
		m
	};
	let deps: Vec<Vec<usize>> = modules
		.iter()
		.map(|decl| {
			modules
				.iter()
				.enumerate()
				.filter(|(_, other)| other.name != decl.name && other.name != top)
				.filter(|(_, other)| mentions(&decl.body, &other.name))
				.map(|(i, _)| i)
				.collect()
		})
		.collect();

	fn visit(
		i: usize,
		modules: &[ModuleDecl],
		deps: &[Vec<usize>],
		state: &mut [u8],
		order: &mut Vec<usize>,
	) -> Result<()> {
		match state[i] {
			2 => return Ok(()),
			1 => return Err(Error::ModuleCycle(modules[i].name.clone())),
			_ => {}
		}
		state[i] = 1;
		for &dep in &deps[i] {
			visit(dep, modules, deps, state, order)?;
		}
		state[i] = 2;
		order.push(i);
		Ok(())
	}

	let top_index = *index
		.get(top)
		.ok_or_else(|| Error::UnknownModule(top.to_owned()))?;
	let mut state = vec![0u8; modules.len()];
	let mut order = vec![];
	visit(top_index, modules, &deps, &mut state, &mut order)?;
	// Reachable submodules only, with the top excluded from the list.
	order.retain(|&i| i != top_index);
	Ok(order)
}

/// Prefix every module declaration except `keep` with a blackbox attribute
/// so the synthesizer preserves instances instead of flattening them.
fn inject_blackboxes(source: &str, modules: &[ModuleDecl], keep: &str) -> String {
	let mut offsets: Vec<usize> = modules
		.iter()
		.filter(|m| m.name != keep)
		.map(|m| m.offset)
		.collect();
	offsets.sort_unstable();
	let mut out = String::with_capacity(source.len() + offsets.len() * 16);
	let mut prev = 0;
	for offset in offsets {
		out.push_str(&source[prev..offset]);
		out.push_str("(* blackbox *) ");
		prev = offset;
	}
	out.push_str(&source[prev..]);
	out
}

fn div_floor(a: i32, b: i32) -> i32 {
	a.div_euclid(b)
}

fn div_ceil(a: i32, b: i32) -> i32 {
	(a + b - 1).div_euclid(b)
}

/// Exported face of a compiled module: bounding box and IO port positions
/// in 8-cell units, shifted by the host's metadata origin offset.
pub fn extract_meta(design: &LogicalDesign, phy: &PhysicalDesign) -> Result<CustomMetadata> {
	let mut min = Point::new(i32::MAX, i32::MAX);
	let mut max = Point::new(i32::MIN, i32::MIN);
	for placement in &phy.layout.placements {
		min.x = min.x.min(placement.pos.x);
		min.y = min.y.min(placement.pos.y);
		max.x = max.x.max(placement.pos.x + placement.width);
		max.y = max.y.max(placement.pos.y + placement.height);
	}
	if min.x > max.x {
		min = Point::new(0, 0);
		max = Point::new(0, 0);
	}
	let bounds = Bounds {
		min: Point::new(
			div_floor(min.x, CUSTOM_UNIT) - CUSTOM_META_OFFSET,
			div_floor(min.y, CUSTOM_UNIT) - CUSTOM_META_OFFSET,
		),
		max: Point::new(
			div_ceil(max.x, CUSTOM_UNIT) - CUSTOM_META_OFFSET,
			div_ceil(max.y, CUSTOM_UNIT) - CUSTOM_META_OFFSET,
		),
	};
	let mut ports = vec![];
	for comp in design.iter_live() {
		let Some(io) = &comp.io else { continue };
		let (port, dir) = match io.dir {
			Direction::Input => ("out", PortDir::Input),
			Direction::Output => ("in", PortDir::Output),
			Direction::Inout => return Err(Error::UnsupportedInout(io.name.clone())),
		};
		let coordinate = crate::wires::port_coordinate(design, phy, comp.id, port)?;
		ports.push(CustomPort {
			name: io.name.clone(),
			dir,
			pos: Point::new(
				div_floor(coordinate.x, CUSTOM_UNIT) - CUSTOM_META_OFFSET,
				div_floor(coordinate.y, CUSTOM_UNIT) - CUSTOM_META_OFFSET,
			),
			width: comp.template.width,
		});
	}
	Ok(CustomMetadata { bounds, ports })
}

/// One full pipeline run over an already-synthesized module.
pub fn compile_module(
	mapped: &MappedDesign,
	name: &str,
	save_id: u64,
	custom_ids: &HashM<String, u64>,
	custom_meta: &HashM<String, CustomMetadata>,
	opts: &CompileOptions,
) -> Result<(SaveDesign, LogicalDesign, PhysicalDesign)> {
	let module = mapped.module(name)?;
	let mut design = LogicalDesign::new();
	let deps = lower_module(&mut design, module, custom_ids, custom_meta)?;
	let phy = PhysicalDesign::build_from(&design, &LayeredOracle, opts.compact)?;
	let wires = encode_wires(&design, &phy)?;
	let save = SaveDesign::build_from(&design, &phy, wires, save_id, deps)?;
	Ok((save, design, phy))
}

/// Compile every reachable module bottom-up, the top last.
pub fn compile_all(source: &str, top: &str, opts: &CompileOptions) -> Result<Vec<CompiledModule>> {
	let modules = scan_modules(source);
	let order = topo_order(&modules, top)?;

	let mut custom_ids: HashM<String, u64> = hash_map();
	for &i in &order {
		custom_ids.insert(modules[i].name.clone(), module_id(&modules[i]));
	}
	let mut custom_meta: HashM<String, CustomMetadata> = hash_map();
	let mut compiled = vec![];

	for &i in &order {
		let decl = &modules[i];
		info!("compiling submodule {}", decl.name);
		let prepared = inject_blackboxes(source, &modules, &decl.name);
		let mapped = synthesize(&prepared, &decl.name, false)?;
		let id = custom_ids[&decl.name];
		let (save, design, phy) =
			compile_module(&mapped, &decl.name, id, &custom_ids, &custom_meta, opts)?;
		let meta = extract_meta(&design, &phy)?;
		custom_meta.insert(decl.name.clone(), meta.clone());
		compiled.push(CompiledModule {
			name: decl.name.clone(),
			id,
			is_top: false,
			save,
			design,
			phy,
			meta,
		});
	}

	info!("compiling top module {top}");
	let top_decl = modules
		.iter()
		.find(|m| m.name == top)
		.ok_or_else(|| Error::UnknownModule(top.to_owned()))?;
	let top_id = module_id(top_decl);
	let prepared = inject_blackboxes(source, &modules, top);
	let mapped = synthesize(&prepared, top, opts.flatten)?;
	let (save, design, phy) =
		compile_module(&mapped, top, top_id, &custom_ids, &custom_meta, opts)?;
	let meta = extract_meta(&design, &phy)?;
	compiled.push(CompiledModule {
		name: top.to_owned(),
		id: top_id,
		is_top: true,
		save,
		design,
		phy,
		meta,
	});
	Ok(compiled)
}

#[cfg(test)]
mod tests {
	use super::*;

	const TWO_MODULES: &str = "
module adder(input [7:0] a, input [7:0] b, output [7:0] y);
	assign y = a + b;
endmodule

module top(input [7:0] p, input [7:0] q, output [7:0] r);
	adder u0(.a(p), .b(q), .y(r));
endmodule
";

	#[test]
	fn scan_finds_both_modules() {
		let modules = scan_modules(TWO_MODULES);
		let names: Vec<&str> = modules.iter().map(|m| m.name.as_str()).collect();
		assert_eq!(names, vec!["adder", "top"]);
		assert!(modules[0].body.contains("assign y"));
		assert!(!modules[0].body.contains("endmodule"));
	}

	#[test]
	fn declared_id_wins_over_the_hash() {
		let source = "module blinker; parameter CUSTOM_ID = 4242; endmodule";
		let decl = &scan_modules(source)[0];
		assert_eq!(declared_custom_id(decl), Some(4242));
		assert_eq!(module_id(decl), 4242);
	}

	#[test]
	fn hashed_ids_are_stable_and_63_bit() {
		let source = "module alpha; endmodule module alpha_copy; endmodule";
		let modules = scan_modules(source);
		let a = module_id(&modules[0]);
		let b = module_id(&scan_modules(source)[0]);
		assert_eq!(a, b);
		assert_eq!(a >> 63, 0);
		assert_ne!(a, module_id(&modules[1]));
	}

	#[test]
	fn topo_orders_leaves_first() {
		let source = "
module leaf; endmodule
module mid; leaf u(); endmodule
module root; mid m(); leaf l(); endmodule
";
		let modules = scan_modules(source);
		let order = topo_order(&modules, "root").unwrap();
		let names: Vec<&str> = order.iter().map(|&i| modules[i].name.as_str()).collect();
		assert_eq!(names, vec!["leaf", "mid"]);
	}

	#[test]
	fn cycles_are_rejected() {
		let source = "
module ouro; boros b(); endmodule
module boros; ouro o(); endmodule
module top; ouro o(); endmodule
";
		let modules = scan_modules(source);
		assert!(matches!(
			topo_order(&modules, "top"),
			Err(Error::ModuleCycle(_))
		));
	}

	#[test]
	fn blackboxes_only_touch_other_modules() {
		let modules = scan_modules(TWO_MODULES);
		let prepared = inject_blackboxes(TWO_MODULES, &modules, "top");
		assert!(prepared.contains("(* blackbox *) module adder"));
		assert!(!prepared.contains("(* blackbox *) module top"));
	}
}
