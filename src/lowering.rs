//! Lowering from the synthesizer's cell soup to concrete grid components.
//!
//! Every cell type becomes a small sub-circuit drawn from the template
//! library: wide cells turn into bus components fed through makers, narrow
//! cells into discrete gates, synchronous cells into register + multiplexer
//! loops. Buses are packed and unpacked through maker/splitter trees; a
//! round trip through a splitter immediately followed by a maker of the
//! same shape is erased on the spot or merged by the late passes.

use std::cmp::max;

use log::debug;

use crate::library::{Library, Template, TemplateOp, Width};
use crate::logical_design::{
	ComponentId, CustomInstance, CustomMetadata, IoPin, LogicalDesign, NetId,
};
use crate::mapped_design::{Bit, Cell, Direction, Module};
use crate::util::{hash_map, HashM};
use crate::{Error, Result};

const AND: &str = "$and";
const OR: &str = "$or";
const XOR: &str = "$xor";
const XNOR: &str = "$xnor";
const NOT: &str = "$not";
const BUF: &str = "$buf";
const MUX: &str = "$mux";
const PMUX: &str = "$pmux";
const DFF: &str = "$dff";
const DFFE: &str = "$dffe";
const SDFF: &str = "$sdff";
const SDFFE: &str = "$sdffe";
const EQ: &str = "$eq";
const NE: &str = "$ne";
const LT: &str = "$lt";
const GT: &str = "$gt";
const LE: &str = "$le";
const GE: &str = "$ge";
const REDUCE_OR: &str = "$reduce_or";
const REDUCE_BOOL: &str = "$reduce_bool";
const REDUCE_AND: &str = "$reduce_and";
const LOGIC_NOT: &str = "$logic_not";
const LOGIC_AND: &str = "$logic_and";
const LOGIC_OR: &str = "$logic_or";
const ADD: &str = "$add";
const SUB: &str = "$sub";
const MUL: &str = "$mul";
const NEG: &str = "$neg";
const SHL: &str = "$shl";
const SSHL: &str = "$sshl";
const SHR: &str = "$shr";
const SSHR: &str = "$sshr";

/// Lower one synthesized module into `design`. Returns the custom ids of
/// every submodule actually instantiated, for the payload dependency list.
pub fn lower_module(
	design: &mut LogicalDesign,
	module: &Module,
	custom_ids: &HashM<String, u64>,
	custom_meta: &HashM<String, CustomMetadata>,
) -> Result<Vec<u64>> {
	let mut lowering = Lowering {
		design,
		custom_ids,
		custom_meta,
		const_bits: hash_map(),
		split_origin: hash_map(),
		splitter_input: hash_map(),
		zero_nets: hash_map(),
		pending_forwards: vec![],
		deps: vec![],
	};
	lowering.lower_inputs(module)?;
	lowering.lower_cells(module)?;
	lowering.lower_outputs(module)?;
	lowering.resolve_forwards()?;
	lowering.fold_zero_constants();
	lowering.merge_splitter_makers();
	lowering.cleanup_dead();
	lowering.repair_zero_nets()?;
	lowering.design.prune_empty_nets();
	lowering.design.validate()?;
	let mut deps = lowering.deps;
	deps.sort_unstable();
	deps.dedup();
	Ok(deps)
}

struct Lowering<'a> {
	design: &'a mut LogicalDesign,
	custom_ids: &'a HashM<String, u64>,
	custom_meta: &'a HashM<String, CustomMetadata>,
	/// Single-bit nets with a known literal value.
	const_bits: HashM<NetId, bool>,
	/// Provenance of nets driven by splitter pins: (splitter, pin index).
	split_origin: HashM<NetId, (ComponentId, usize)>,
	/// The bus net feeding each splitter's `in` port.
	splitter_input: HashM<ComponentId, NetId>,
	/// Nets whose driver was folded away as constant zero, with the width
	/// a replacement driver must have.
	zero_nets: HashM<NetId, Width>,
	/// Source-to-target aliases whose driver was not known yet when the
	/// alias was requested; resolved once every cell has lowered.
	pending_forwards: Vec<(NetId, NetId)>,
	deps: Vec<u64>,
}

impl<'a> Lowering<'a> {
	fn lib(&self) -> &'static Library {
		Library::get()
	}

	fn add(&mut self, template: &'static Template) -> ComponentId {
		self.design.add_component(template)
	}

	fn add_op(&mut self, op: TemplateOp, width: Width) -> Result<ComponentId> {
		Ok(self.add(self.lib().template(op, width)?))
	}

	// ---- bit normalization -------------------------------------------------

	/// Net for a bit consumed as an input. Literals materialize a fresh net
	/// with its own constant driver; constants are never shared.
	fn input_bit(&mut self, bit: &Bit) -> Result<NetId> {
		match bit.literal_value()? {
			None => match bit {
				Bit::Net(n) => Ok(NetId::bit(*n)),
				Bit::Literal(_) => unreachable!(),
			},
			Some(value) => Ok(self.const_bit(value)?),
		}
	}

	/// Net for a bit driven as an output. Literal targets become throwaway
	/// nets that the cleanup pass deletes.
	fn output_bit(&mut self, bit: &Bit) -> Result<NetId> {
		match bit.literal_value()? {
			None => match bit {
				Bit::Net(n) => Ok(NetId::bit(*n)),
				Bit::Literal(_) => unreachable!(),
			},
			Some(_) => Ok(self.design.fresh_net()),
		}
	}

	fn input_bits(&mut self, bits: &[Bit]) -> Result<Vec<NetId>> {
		bits.iter().map(|b| self.input_bit(b)).collect()
	}

	fn output_bits(&mut self, bits: &[Bit]) -> Result<Vec<NetId>> {
		bits.iter().map(|b| self.output_bit(b)).collect()
	}

	/// Fresh single-bit net with an Off/On driver.
	fn const_bit(&mut self, value: bool) -> Result<NetId> {
		let template = if value { self.lib().on() } else { self.lib().off() };
		let comp = self.add(template);
		let net = self.design.fresh_net();
		self.design.connect_source(&net, comp, "out")?;
		self.const_bits.insert(net.clone(), value);
		Ok(net)
	}

	/// Fresh bus net carrying a constant value at the given width.
	fn const_bus(&mut self, value: u64, width: Width) -> Result<NetId> {
		if width == Width::W1 {
			return self.const_bit(value != 0);
		}
		let comp = self.add_op(TemplateOp::Constant, width)?;
		self.design.component_mut(comp).setting = Some(value);
		let net = self.design.fresh_net();
		self.design.connect_source(&net, comp, "out")?;
		Ok(net)
	}

	// ---- pack / unpack -----------------------------------------------------

	fn all_const(&self, bits: &[NetId]) -> Option<u64> {
		let mut value = 0u64;
		for (i, bit) in bits.iter().enumerate() {
			if *self.const_bits.get(bit)? {
				value |= 1 << i;
			}
		}
		Some(value)
	}

	/// Detect a full in-order fan from one splitter so the round trip can
	/// be erased: returns the splitter's driven input bus.
	fn splitter_roundtrip(&self, pins: &[NetId], width: Width) -> Option<NetId> {
		if pins.len() != width.pin_count() {
			return None;
		}
		let (splitter, first) = *self.split_origin.get(&pins[0])?;
		if first != 0 || !self.design.is_live(splitter) {
			return None;
		}
		let template = self.design.component(splitter).template;
		if template.op != TemplateOp::Splitter || template.width != width {
			return None;
		}
		for (i, pin) in pins.iter().enumerate() {
			if *self.split_origin.get(pin)? != (splitter, i) {
				return None;
			}
		}
		let input = self.splitter_input.get(&splitter)?;
		self.design.source_of(input)?;
		Some(input.clone())
	}

	/// Produce a `width`-wide bus net carrying the given bits (LSB first),
	/// padding with constant zero when short.
	fn pack(&mut self, bits: &[NetId], width: Width) -> Result<NetId> {
		if width == Width::W1 {
			return Ok(bits[0].clone());
		}
		if let Some(value) = self.all_const(bits) {
			return self.const_bus(value, width);
		}
		if let Some(bus) = self.splitter_roundtrip(bits, width) {
			return Ok(bus);
		}
		if width > Width::W8 {
			let mut chunks = vec![];
			for i in 0..width.pin_count() {
				let lo = i * 8;
				let hi = ((i + 1) * 8).min(bits.len());
				let slice: Vec<NetId> = if lo < bits.len() {
					bits[lo..hi].to_vec()
				} else {
					vec![self.const_bit(false)?]
				};
				chunks.push(self.pack(&slice, Width::W8)?);
			}
			if let Some(bus) = self.splitter_roundtrip(&chunks, width) {
				return Ok(bus);
			}
			let maker = self.add_op(TemplateOp::Maker, width)?;
			for (i, chunk) in chunks.iter().enumerate() {
				self.design.connect_sink(chunk, maker, &format!("in{i}"));
			}
			let out = self.design.fresh_net();
			self.design.connect_source(&out, maker, "out")?;
			return Ok(out);
		}
		let maker = self.add_op(TemplateOp::Maker, width)?;
		for i in 0..width.pin_count() {
			let bit = match bits.get(i) {
				Some(bit) => bit.clone(),
				None => self.const_bit(false)?,
			};
			self.design.connect_sink(&bit, maker, &format!("in{i}"));
		}
		let out = self.design.fresh_net();
		self.design.connect_source(&out, maker, "out")?;
		Ok(out)
	}

	/// Make `to` carry the same signal as `from` by registering `from`'s
	/// driver as `to`'s driver. When `from` has no driver yet (its cell
	/// lowers later), the alias is parked until [`Self::resolve_forwards`].
	fn forward(&mut self, from: &NetId, to: &NetId) -> Result<()> {
		if from == to {
			return Ok(());
		}
		if let Some(&value) = self.const_bits.get(from) {
			self.const_bits.insert(to.clone(), value);
		}
		match self.design.source_of(from).cloned() {
			Some(src) => self.design.connect_source(to, src.component, &src.port),
			None => {
				self.pending_forwards.push((from.clone(), to.clone()));
				Ok(())
			}
		}
	}

	/// Connect parked aliases now that every driver exists. Chains resolve
	/// over multiple sweeps; anything still driverless afterwards is left
	/// for validation to report.
	fn resolve_forwards(&mut self) -> Result<()> {
		let mut pending = std::mem::take(&mut self.pending_forwards);
		loop {
			let mut still_pending = vec![];
			let before = pending.len();
			for (from, to) in pending {
				match self.design.source_of(&from).cloned() {
					Some(src) => {
						self.design.connect_source(&to, src.component, &src.port)?;
					}
					None => still_pending.push((from, to)),
				}
			}
			if still_pending.is_empty() || still_pending.len() == before {
				return Ok(());
			}
			pending = still_pending;
		}
	}

	/// Drive the given target bits (LSB first) from a `width`-wide bus.
	fn unpack(&mut self, bus: &NetId, bits: &[NetId], width: Width) -> Result<()> {
		if width == Width::W1 {
			return self.forward(bus, &bits[0]);
		}
		let splitter = self.add_op(TemplateOp::Splitter, width)?;
		self.design.connect_sink(bus, splitter, "in");
		self.splitter_input.insert(splitter, bus.clone());
		if width > Width::W8 {
			for i in 0..width.pin_count() {
				let lo = i * 8;
				if lo >= bits.len() {
					break;
				}
				let hi = ((i + 1) * 8).min(bits.len());
				let chunk = self.design.fresh_net();
				self.design
					.connect_source(&chunk, splitter, &format!("out{i}"))?;
				self.split_origin.insert(chunk.clone(), (splitter, i));
				self.unpack(&chunk, &bits[lo..hi], Width::W8)?;
			}
		} else {
			for (i, bit) in bits.iter().enumerate().take(width.pin_count()) {
				self.design.connect_source(bit, splitter, &format!("out{i}"))?;
				self.split_origin.insert(bit.clone(), (splitter, i));
			}
		}
		Ok(())
	}

	// ---- module ports ------------------------------------------------------

	fn lower_inputs(&mut self, module: &Module) -> Result<()> {
		for (name, port) in &module.ports {
			match port.direction {
				Direction::Input => {}
				Direction::Output => continue,
				Direction::Inout => return Err(Error::UnsupportedInout(name.clone())),
			}
			let width = Width::for_bits(port.bits.len())?;
			let comp = self.add_op(TemplateOp::Input, width)?;
			{
				let c = self.design.component_mut(comp);
				c.label = Some(name.clone());
				c.io = Some(IoPin {
					name: name.clone(),
					dir: Direction::Input,
				});
			}
			let bits = self.output_bits(&port.bits)?;
			if width == Width::W1 {
				self.design.connect_source(&bits[0], comp, "out")?;
			} else {
				let bus = self.design.fresh_net();
				self.design.connect_source(&bus, comp, "out")?;
				self.unpack(&bus, &bits, width)?;
			}
		}
		Ok(())
	}

	fn lower_outputs(&mut self, module: &Module) -> Result<()> {
		for (name, port) in &module.ports {
			if port.direction != Direction::Output {
				continue;
			}
			let width = Width::for_bits(port.bits.len())?;
			let bits = self.input_bits(&port.bits)?;
			let bus = self.pack(&bits, width)?;
			let comp = self.add_op(TemplateOp::Output, width)?;
			{
				let c = self.design.component_mut(comp);
				c.label = Some(name.clone());
				c.io = Some(IoPin {
					name: name.clone(),
					dir: Direction::Output,
				});
			}
			self.design.connect_sink(&bus, comp, "in");
		}
		Ok(())
	}

	// ---- cells -------------------------------------------------------------

	fn lower_cells(&mut self, module: &Module) -> Result<()> {
		for (name, cell) in &module.cells {
			debug!("lowering cell {name} ({})", cell.cell_type);
			match cell.cell_type.as_str() {
				AND | "$_AND_" => self.lower_bitwise(cell, TemplateOp::And)?,
				OR | "$_OR_" => self.lower_bitwise(cell, TemplateOp::Or)?,
				XOR | "$_XOR_" => self.lower_bitwise(cell, TemplateOp::Xor)?,
				XNOR | "$_XNOR_" => self.lower_bitwise(cell, TemplateOp::Xnor)?,
				NOT | "$_NOT_" => self.lower_unary(cell, TemplateOp::Not)?,
				BUF | "$_BUF_" => self.lower_buf(cell)?,
				"$_NAND_" => self.lower_composite_gate(cell, TemplateOp::And, false, true)?,
				"$_NOR_" => self.lower_composite_gate(cell, TemplateOp::Or, false, true)?,
				"$_ANDNOT_" => self.lower_composite_gate(cell, TemplateOp::And, true, false)?,
				"$_ORNOT_" => self.lower_composite_gate(cell, TemplateOp::Or, true, false)?,
				MUX | "$_MUX_" => self.lower_mux(cell)?,
				PMUX => self.lower_pmux(cell)?,
				DFF => self.lower_dff(cell, None)?,
				"$_DFF_P_" => self.lower_dff(cell, Some(true))?,
				"$_DFF_N_" => self.lower_dff(cell, Some(false))?,
				DFFE => self.lower_dffe(cell)?,
				SDFF => self.lower_sdff(cell)?,
				SDFFE => self.lower_sdffe(cell)?,
				EQ => self.lower_eq(cell, false)?,
				NE => self.lower_eq(cell, true)?,
				LT | GT | LE | GE => self.lower_compare(cell)?,
				REDUCE_OR | REDUCE_BOOL => self.lower_reduce_or(cell, false)?,
				LOGIC_NOT => self.lower_reduce_or(cell, true)?,
				REDUCE_AND => self.lower_reduce_and(cell)?,
				LOGIC_AND => self.lower_logic_binop(cell, TemplateOp::And)?,
				LOGIC_OR => self.lower_logic_binop(cell, TemplateOp::Or)?,
				ADD => self.lower_add(cell)?,
				SUB => self.lower_sub(cell)?,
				MUL => self.lower_mul(cell)?,
				NEG => self.lower_unary(cell, TemplateOp::Neg)?,
				SHL | SSHL => self.lower_shift(cell, TemplateOp::Shl)?,
				SHR => self.lower_shift(cell, TemplateOp::Shr)?,
				SSHR => self.lower_sshr(cell)?,
				other if self.custom_ids.contains_key(other) => self.lower_custom(cell)?,
				other => return Err(Error::UnknownCellType(other.to_owned())),
			}
		}
		Ok(())
	}

	/// Pack a named input connection to the given width.
	fn input_bus(&mut self, cell: &Cell, port: &str, width: Width) -> Result<NetId> {
		let bits = self.input_bits(cell.connection(port)?)?;
		self.pack(&bits, width)
	}

	/// Unpack a fresh output net onto a named output connection.
	fn output_bus(&mut self, bus: &NetId, cell: &Cell, port: &str, width: Width) -> Result<()> {
		let bits = self.output_bits(cell.connection(port)?)?;
		self.unpack(bus, &bits, width)
	}

	fn cell_width(&self, cell: &Cell, ports: &[&str]) -> Result<Width> {
		let mut bits = 0;
		for port in ports {
			bits = max(bits, cell.connection(port)?.len());
		}
		Width::for_bits(bits)
	}

	fn lower_bitwise(&mut self, cell: &Cell, op: TemplateOp) -> Result<()> {
		let width = self.cell_width(cell, &["A", "B", "Y"])?;
		let a = self.input_bus(cell, "A", width)?;
		let b = self.input_bus(cell, "B", width)?;
		let gate = self.add_op(op, width)?;
		self.design.connect_sink(&a, gate, "A");
		self.design.connect_sink(&b, gate, "B");
		let out = self.design.fresh_net();
		self.design.connect_source(&out, gate, "out")?;
		self.output_bus(&out, cell, "Y", width)
	}

	fn lower_unary(&mut self, cell: &Cell, op: TemplateOp) -> Result<()> {
		let width = self.cell_width(cell, &["A", "Y"])?;
		let a = self.input_bus(cell, "A", width)?;
		let gate = self.add_op(op, width)?;
		self.design.connect_sink(&a, gate, "A");
		let out = self.design.fresh_net();
		self.design.connect_source(&out, gate, "out")?;
		self.output_bus(&out, cell, "Y", width)
	}

	/// A buffer contributes no component; its output bits alias its inputs.
	fn lower_buf(&mut self, cell: &Cell) -> Result<()> {
		let width = self.cell_width(cell, &["A", "Y"])?;
		let bus = self.input_bus(cell, "A", width)?;
		self.output_bus(&bus, cell, "Y", width)
	}

	/// Single-bit technology-mapped gates that fold an inverter into one
	/// operand (`invert_b`) or the result (`invert_out`).
	fn lower_composite_gate(
		&mut self,
		cell: &Cell,
		op: TemplateOp,
		invert_b: bool,
		invert_out: bool,
	) -> Result<()> {
		let a = self.input_bits(cell.connection("A")?)?[0].clone();
		let mut b = self.input_bits(cell.connection("B")?)?[0].clone();
		if invert_b {
			b = self.not1(&b)?;
		}
		let mut out = self.gate1(op, &a, &b)?;
		if invert_out {
			out = self.not1(&out)?;
		}
		let bits = self.output_bits(cell.connection("Y")?)?;
		self.unpack(&out, &bits[..1], Width::W1)
	}

	// ---- small single-bit circuits ----------------------------------------

	/// `out = ¬a`, as a fresh net.
	fn not1(&mut self, a: &NetId) -> Result<NetId> {
		let gate = self.add_op(TemplateOp::Not, Width::W1)?;
		self.design.connect_sink(a, gate, "A");
		let out = self.design.fresh_net();
		self.design.connect_source(&out, gate, "out")?;
		Ok(out)
	}

	fn gate1(&mut self, op: TemplateOp, a: &NetId, b: &NetId) -> Result<NetId> {
		let gate = self.add_op(op, Width::W1)?;
		self.design.connect_sink(a, gate, "A");
		self.design.connect_sink(b, gate, "B");
		let out = self.design.fresh_net();
		self.design.connect_source(&out, gate, "out")?;
		Ok(out)
	}

	/// Single-bit select between `old` (sel = 0) and `new` (sel = 1),
	/// decomposed to gates with constant-aware short circuits.
	fn mux1(&mut self, old: &NetId, new: &NetId, sel: &NetId) -> Result<NetId> {
		let term_old = match self.const_bits.get(old).copied() {
			Some(false) => None,
			Some(true) => Some(self.not1(sel)?),
			None => {
				let not_sel = self.not1(sel)?;
				Some(self.gate1(TemplateOp::And, old, &not_sel)?)
			}
		};
		let term_new = match self.const_bits.get(new).copied() {
			Some(false) => None,
			Some(true) => Some(sel.clone()),
			None => Some(self.gate1(TemplateOp::And, new, sel)?),
		};
		match (term_old, term_new) {
			(Some(a), Some(b)) => self.gate1(TemplateOp::Or, &a, &b),
			(Some(t), None) | (None, Some(t)) => Ok(t),
			(None, None) => self.const_bit(false),
		}
	}

	/// Width-wide select between two buses.
	fn mux_bus(&mut self, old: &NetId, new: &NetId, sel: &NetId, width: Width) -> Result<NetId> {
		if width == Width::W1 {
			return self.mux1(old, new, sel);
		}
		let mux = self.add_op(TemplateOp::Mux, width)?;
		self.design.connect_sink(old, mux, "A");
		self.design.connect_sink(new, mux, "B");
		self.design.connect_sink(sel, mux, "S");
		let out = self.design.fresh_net();
		self.design.connect_source(&out, mux, "out")?;
		Ok(out)
	}

	fn lower_mux(&mut self, cell: &Cell) -> Result<()> {
		let width = self.cell_width(cell, &["A", "B", "Y"])?;
		let sel_bits = self.input_bits(cell.connection("S")?)?;
		let a = self.input_bus(cell, "A", width)?;
		let b = self.input_bus(cell, "B", width)?;
		let out = self.mux_bus(&a, &b, &sel_bits[0], width)?;
		self.output_bus(&out, cell, "Y", width)
	}

	fn lower_pmux(&mut self, cell: &Cell) -> Result<()> {
		let width = self.cell_width(cell, &["A", "Y"])?;
		let slots = self.input_bits(cell.connection("B")?)?;
		let sels = self.input_bits(cell.connection("S")?)?;
		let word = cell.connection("A")?.len();
		let mut current = self.input_bus(cell, "A", width)?;
		for (i, sel) in sels.iter().enumerate() {
			let lo = i * word;
			let hi = ((i + 1) * word).min(slots.len());
			if lo >= slots.len() {
				break;
			}
			let slot = self.pack(&slots[lo..hi], width)?;
			current = self.mux_bus(&current, &slot, sel, width)?;
		}
		let bits = self.output_bits(cell.connection("Y")?)?;
		self.unpack(&current, &bits, width)
	}

	// ---- synchronous cells -------------------------------------------------

	fn clock_net(&mut self, cell: &Cell, polarity_override: Option<bool>) -> Result<NetId> {
		let bits = cell
			.connections
			.get("CLK")
			.or_else(|| cell.connections.get("C"))
			.ok_or_else(|| Error::MissingConnection(cell.cell_type.clone(), "CLK".to_owned()))?
			.clone();
		let clk = self.input_bit(&bits[0])?;
		let positive = polarity_override.unwrap_or_else(|| cell.param_bool_or("CLK_POLARITY", true));
		if positive {
			Ok(clk)
		} else {
			self.not1(&clk)
		}
	}

	/// Instantiate a register (or the 1-bit flip-flop) clocked by `save`,
	/// loading `value`, and return its output bus net.
	fn register(&mut self, save: &NetId, value: &NetId, width: Width) -> Result<NetId> {
		let reg = self.add_op(TemplateOp::Reg, width)?;
		self.design.connect_sink(save, reg, "save");
		self.design.connect_sink(value, reg, "value");
		if width != Width::W1 {
			let high = self.const_bit(true)?;
			self.design.connect_sink(&high, reg, "load");
		}
		let out = self.design.fresh_net();
		self.design.connect_source(&out, reg, "out")?;
		Ok(out)
	}

	fn lower_dff(&mut self, cell: &Cell, polarity_override: Option<bool>) -> Result<()> {
		let width = Width::for_bits(cell.connection("D")?.len())?;
		let clk = self.clock_net(cell, polarity_override)?;
		let value = self.input_bus(cell, "D", width)?;
		let out = self.register(&clk, &value, width)?;
		self.output_bus(&out, cell, "Q", width)
	}

	fn enable_net(&mut self, cell: &Cell) -> Result<NetId> {
		let bits = self.input_bits(cell.connection("EN")?)?;
		if cell.param_bool_or("EN_POLARITY", true) {
			Ok(bits[0].clone())
		} else {
			self.not1(&bits[0])
		}
	}

	fn reset_net(&mut self, cell: &Cell) -> Result<NetId> {
		let bits = self.input_bits(cell.connection("SRST")?)?;
		if cell.param_bool_or("SRST_POLARITY", true) {
			Ok(bits[0].clone())
		} else {
			self.not1(&bits[0])
		}
	}

	fn lower_dffe(&mut self, cell: &Cell) -> Result<()> {
		let width = Width::for_bits(cell.connection("D")?.len())?;
		let clk = self.clock_net(cell, None)?;
		let en = self.enable_net(cell)?;
		let d = self.input_bus(cell, "D", width)?;
		// Feedback: the register keeps its own value unless enabled.
		let reg = self.add_op(TemplateOp::Reg, width)?;
		let out = self.design.fresh_net();
		self.design.connect_source(&out, reg, "out")?;
		let value = self.mux_bus(&out, &d, &en, width)?;
		self.design.connect_sink(&clk, reg, "save");
		self.design.connect_sink(&value, reg, "value");
		if width != Width::W1 {
			let high = self.const_bit(true)?;
			self.design.connect_sink(&high, reg, "load");
		}
		self.output_bus(&out, cell, "Q", width)
	}

	fn lower_sdff(&mut self, cell: &Cell) -> Result<()> {
		let width = Width::for_bits(cell.connection("D")?.len())?;
		let clk = self.clock_net(cell, None)?;
		let srst = self.reset_net(cell)?;
		let d = self.input_bus(cell, "D", width)?;
		let reset_value = cell.param_u64("SRST_VALUE").unwrap_or(0);
		let reset_bus = self.const_bus(reset_value, width)?;
		let value = self.mux_bus(&d, &reset_bus, &srst, width)?;
		let out = self.register(&clk, &value, width)?;
		self.output_bus(&out, cell, "Q", width)
	}

	fn lower_sdffe(&mut self, cell: &Cell) -> Result<()> {
		let width = Width::for_bits(cell.connection("D")?.len())?;
		let clk = self.clock_net(cell, None)?;
		let en = self.enable_net(cell)?;
		let srst = self.reset_net(cell)?;
		let d = self.input_bus(cell, "D", width)?;
		let reset_value = cell.param_u64("SRST_VALUE").unwrap_or(0);
		let reset_bus = self.const_bus(reset_value, width)?;
		let reg = self.add_op(TemplateOp::Reg, width)?;
		let out = self.design.fresh_net();
		self.design.connect_source(&out, reg, "out")?;
		let inner = self.mux_bus(&out, &d, &en, width)?;
		let value = self.mux_bus(&inner, &reset_bus, &srst, width)?;
		self.design.connect_sink(&clk, reg, "save");
		self.design.connect_sink(&value, reg, "value");
		if width != Width::W1 {
			let high = self.const_bit(true)?;
			self.design.connect_sink(&high, reg, "load");
		}
		self.output_bus(&out, cell, "Q", width)
	}

	// ---- comparisons and reductions ---------------------------------------

	/// Drive the Y connection from a single-bit net; surplus target bits
	/// are tied to zero.
	fn output_flag(&mut self, flag: &NetId, cell: &Cell) -> Result<()> {
		let bits = self.output_bits(cell.connection("Y")?)?;
		if bits.is_empty() {
			return Ok(());
		}
		self.unpack(flag, &bits[..1], Width::W1)?;
		for bit in &bits[1..] {
			let zero = self.const_bit(false)?;
			self.unpack(&zero, std::slice::from_ref(bit), Width::W1)?;
		}
		Ok(())
	}

	/// `a == b` as a single-bit net.
	fn equal_flag(&mut self, cell: &Cell) -> Result<NetId> {
		let width = self.cell_width(cell, &["A", "B"])?;
		if width == Width::W1 {
			let a = self.input_bus(cell, "A", width)?;
			let b = self.input_bus(cell, "B", width)?;
			return self.gate1(TemplateOp::Xnor, &a, &b);
		}
		let a = self.input_bus(cell, "A", width)?;
		let b = self.input_bus(cell, "B", width)?;
		let eq = self.add_op(TemplateOp::Equal, width)?;
		self.design.connect_sink(&a, eq, "A");
		self.design.connect_sink(&b, eq, "B");
		let out = self.design.fresh_net();
		self.design.connect_source(&out, eq, "out")?;
		Ok(out)
	}

	fn lower_eq(&mut self, cell: &Cell, invert: bool) -> Result<()> {
		let mut flag = self.equal_flag(cell)?;
		if invert {
			flag = self.not1(&flag)?;
		}
		self.output_flag(&flag, cell)
	}

	/// `a != 0` (or `a == 0` when `invert`) as a single-bit net driven onto Y.
	fn lower_reduce_or(&mut self, cell: &Cell, invert: bool) -> Result<()> {
		let a_bits = cell.connection("A")?.clone();
		let width = Width::for_bits(a_bits.len())?;
		let flag = if width == Width::W1 {
			let bit = self.input_bits(&a_bits)?[0].clone();
			if invert {
				self.not1(&bit)?
			} else {
				bit
			}
		} else {
			let a = self.input_bus(cell, "A", width)?;
			let zero = self.const_bus(0, width)?;
			let eq = self.add_op(TemplateOp::Equal, width)?;
			self.design.connect_sink(&a, eq, "A");
			self.design.connect_sink(&zero, eq, "B");
			let is_zero = self.design.fresh_net();
			self.design.connect_source(&is_zero, eq, "out")?;
			if invert {
				is_zero
			} else {
				self.not1(&is_zero)?
			}
		};
		self.output_flag(&flag, cell)
	}

	fn lower_reduce_and(&mut self, cell: &Cell) -> Result<()> {
		let a_bits = cell.connection("A")?.clone();
		let n = a_bits.len();
		let width = Width::for_bits(n)?;
		let flag = if width == Width::W1 {
			self.input_bits(&a_bits)?[0].clone()
		} else {
			// All original bits set; the padding above bit n stays zero on
			// both sides of the comparison.
			let mask = if n >= 64 { u64::MAX } else { (1u64 << n) - 1 };
			let a = self.input_bus(cell, "A", width)?;
			let ones = self.const_bus(mask, width)?;
			let eq = self.add_op(TemplateOp::Equal, width)?;
			self.design.connect_sink(&a, eq, "A");
			self.design.connect_sink(&ones, eq, "B");
			let out = self.design.fresh_net();
			self.design.connect_source(&out, eq, "out")?;
			out
		};
		self.output_flag(&flag, cell)
	}

	/// Reduce one operand of a logic op to a non-zero flag.
	fn nonzero_flag(&mut self, cell: &Cell, port: &str) -> Result<NetId> {
		let bits = cell.connection(port)?.clone();
		let width = Width::for_bits(bits.len())?;
		if width == Width::W1 {
			return Ok(self.input_bits(&bits)?[0].clone());
		}
		let a = self.input_bits(&bits)?;
		let a = self.pack(&a, width)?;
		let zero = self.const_bus(0, width)?;
		let eq = self.add_op(TemplateOp::Equal, width)?;
		self.design.connect_sink(&a, eq, "A");
		self.design.connect_sink(&zero, eq, "B");
		let is_zero = self.design.fresh_net();
		self.design.connect_source(&is_zero, eq, "out")?;
		self.not1(&is_zero)
	}

	fn lower_logic_binop(&mut self, cell: &Cell, op: TemplateOp) -> Result<()> {
		let a = self.nonzero_flag(cell, "A")?;
		let b = self.nonzero_flag(cell, "B")?;
		let flag = self.gate1(op, &a, &b)?;
		self.output_flag(&flag, cell)
	}

	fn lower_compare(&mut self, cell: &Cell) -> Result<()> {
		let swap = matches!(cell.cell_type.as_str(), GT | LE);
		let invert = matches!(cell.cell_type.as_str(), GE | LE);
		let signed = cell.param_bool_or("A_SIGNED", false);
		let width = self.cell_width(cell, &["A", "B"])?;
		let a = self.input_bus(cell, "A", width)?;
		let b = self.input_bus(cell, "B", width)?;
		let (lhs, rhs) = if swap { (&b, &a) } else { (&a, &b) };
		let mut flag = if width == Width::W1 {
			// lhs < rhs over single bits: ¬lhs ∧ rhs.
			let not_lhs = self.not1(lhs)?;
			self.gate1(TemplateOp::And, &not_lhs, rhs)?
		} else {
			let op = if signed {
				TemplateOp::LessS
			} else {
				TemplateOp::LessU
			};
			let less = self.add_op(op, width)?;
			self.design.connect_sink(lhs, less, "A");
			self.design.connect_sink(rhs, less, "B");
			let out = self.design.fresh_net();
			self.design.connect_source(&out, less, "out")?;
			out
		};
		if invert {
			flag = self.not1(&flag)?;
		}
		self.output_flag(&flag, cell)
	}

	// ---- arithmetic --------------------------------------------------------

	/// Shared tail for add/sub: when the output bit list is exactly one
	/// longer than the operand width, the top bit is the carry.
	fn adder_output(&mut self, adder: ComponentId, cell: &Cell, width: Width) -> Result<()> {
		let bits = self.output_bits(cell.connection("Y")?)?;
		let word = width.bits();
		let sum = self.design.fresh_net();
		self.design.connect_source(&sum, adder, "sum")?;
		if bits.len() <= word {
			return self.unpack(&sum, &bits, width);
		}
		self.unpack(&sum, &bits[..word], width)?;
		self.design.connect_source(&bits[word], adder, "carry_out")?;
		for bit in &bits[word + 1..] {
			let zero = self.const_bit(false)?;
			self.unpack(&zero, std::slice::from_ref(bit), Width::W1)?;
		}
		Ok(())
	}

	fn lower_add(&mut self, cell: &Cell) -> Result<()> {
		let width = self.cell_width(cell, &["A", "B"])?;
		let a = self.input_bus(cell, "A", width)?;
		let b = self.input_bus(cell, "B", width)?;
		let adder = self.add_op(TemplateOp::Add, width)?;
		self.design.connect_sink(&a, adder, "A");
		self.design.connect_sink(&b, adder, "B");
		self.adder_output(adder, cell, width)
	}

	fn lower_sub(&mut self, cell: &Cell) -> Result<()> {
		let width = self.cell_width(cell, &["A", "B", "Y"])?;
		let a = self.input_bus(cell, "A", width)?;
		let b = self.input_bus(cell, "B", width)?;
		let neg = self.add_op(TemplateOp::Neg, width)?;
		self.design.connect_sink(&b, neg, "A");
		let neg_b = self.design.fresh_net();
		self.design.connect_source(&neg_b, neg, "out")?;
		let adder = self.add_op(TemplateOp::Add, width)?;
		self.design.connect_sink(&a, adder, "A");
		self.design.connect_sink(&neg_b, adder, "B");
		let bits = self.output_bits(cell.connection("Y")?)?;
		let sum = self.design.fresh_net();
		self.design.connect_source(&sum, adder, "sum")?;
		self.unpack(&sum, &bits[..bits.len().min(width.bits())], width)
	}

	fn lower_mul(&mut self, cell: &Cell) -> Result<()> {
		let width = self.cell_width(cell, &["A", "B", "Y"])?;
		let a = self.input_bus(cell, "A", width)?;
		let b = self.input_bus(cell, "B", width)?;
		let mul = self.add_op(TemplateOp::Mul, width)?;
		self.design.connect_sink(&a, mul, "A");
		self.design.connect_sink(&b, mul, "B");
		let out = self.design.fresh_net();
		self.design.connect_source(&out, mul, "out")?;
		self.output_bus(&out, cell, "Y", width)
	}

	fn shift_amount(&mut self, cell: &Cell, width: Width) -> Result<NetId> {
		let bits = self.input_bits(cell.connection("B")?)?;
		self.pack(&bits, width)
	}

	fn lower_shift(&mut self, cell: &Cell, op: TemplateOp) -> Result<()> {
		let width = self.cell_width(cell, &["A", "Y"])?;
		let a = self.input_bus(cell, "A", width)?;
		let amount = self.shift_amount(cell, width)?;
		let gate = self.add_op(op, width)?;
		self.design.connect_sink(&a, gate, "A");
		self.design.connect_sink(&amount, gate, "shift");
		let out = self.design.fresh_net();
		self.design.connect_source(&out, gate, "out")?;
		self.output_bus(&out, cell, "Y", width)
	}

	/// Arithmetic right shift: logical shift, plus a sign-selected mask of
	/// the vacated high bits OR'd back in.
	fn lower_sshr(&mut self, cell: &Cell) -> Result<()> {
		let a_bits = cell.connection("A")?.clone();
		let width = self.cell_width(cell, &["A", "Y"])?;
		let a = self.input_bus(cell, "A", width)?;
		let amount = self.shift_amount(cell, width)?;

		let shr = self.add_op(TemplateOp::Shr, width)?;
		self.design.connect_sink(&a, shr, "A");
		self.design.connect_sink(&amount, shr, "shift");
		let logical = self.design.fresh_net();
		self.design.connect_source(&logical, shr, "out")?;

		let word = width.bits();
		let ones = self.const_bus(
			if word >= 64 { u64::MAX } else { (1 << word) - 1 },
			width,
		)?;
		let ones_shr = self.add_op(TemplateOp::Shr, width)?;
		self.design.connect_sink(&ones, ones_shr, "A");
		self.design.connect_sink(&amount, ones_shr, "shift");
		let low_mask = self.design.fresh_net();
		self.design.connect_source(&low_mask, ones_shr, "out")?;
		let not = self.add_op(TemplateOp::Not, width)?;
		self.design.connect_sink(&low_mask, not, "A");
		let high_mask = self.design.fresh_net();
		self.design.connect_source(&high_mask, not, "out")?;

		let sign = self.input_bit(&a_bits[a_bits.len() - 1])?;
		let zero = self.const_bus(0, width)?;
		let fill = self.mux_bus(&zero, &high_mask, &sign, width)?;

		let or = self.add_op(TemplateOp::Or, width)?;
		self.design.connect_sink(&logical, or, "A");
		self.design.connect_sink(&fill, or, "B");
		let out = self.design.fresh_net();
		self.design.connect_source(&out, or, "out")?;
		self.output_bus(&out, cell, "Y", width)
	}

	// ---- hierarchy ---------------------------------------------------------

	fn lower_custom(&mut self, cell: &Cell) -> Result<()> {
		let custom_id = self.custom_ids[&cell.cell_type];
		let meta = self
			.custom_meta
			.get(&cell.cell_type)
			.ok_or_else(|| Error::MissingCustomMeta(cell.cell_type.clone()))?
			.clone();
		let comp = self.add(self.lib().custom());
		{
			let c = self.design.component_mut(comp);
			c.label = Some(cell.cell_type.clone());
			c.custom = Some(CustomInstance {
				id: custom_id,
				meta: meta.clone(),
			});
		}
		self.deps.push(custom_id);
		for (port_name, bits) in &cell.connections {
			let port = meta
				.port(port_name)
				.ok_or_else(|| Error::UnknownPort(cell.cell_type.clone(), port_name.clone()))?;
			match port.dir {
				crate::library::PortDir::Input => {
					let bits = self.input_bits(bits)?;
					let bus = self.pack(&bits, port.width)?;
					self.design.connect_sink(&bus, comp, port_name);
				}
				crate::library::PortDir::Output => {
					let bits = self.output_bits(bits)?;
					if port.width == Width::W1 {
						self.design.connect_source(&bits[0], comp, port_name)?;
					} else {
						let bus = self.design.fresh_net();
						self.design.connect_source(&bus, comp, port_name)?;
						self.unpack(&bus, &bits, port.width)?;
					}
				}
			}
		}
		Ok(())
	}

	// ---- late passes -------------------------------------------------------

	/// Remove known-zero drivers and the 1-bit AND gates they feed, marking
	/// the affected nets so they can be re-driven later. Two sweeps so a
	/// zero produced by the first sweep propagates once more.
	fn fold_zero_constants(&mut self) {
		for _ in 0..2 {
			let mut removed = 0usize;
			for id in self.design.live_ids() {
				let comp = self.design.component(id);
				let zero = match comp.template.op {
					TemplateOp::Off => true,
					TemplateOp::Constant => comp.setting.unwrap_or(0) == 0,
					_ => false,
				};
				if !zero {
					continue;
				}
				for (net, port) in self.design.nets_driven_by(id) {
					let width = self.design.component(id).port_width(&port);
					self.zero_nets.insert(net, width);
				}
				self.design.remove_component(id);
				removed += 1;
			}
			for id in self.design.live_ids() {
				let comp = self.design.component(id);
				if comp.template.op != TemplateOp::And || comp.template.width != Width::W1 {
					continue;
				}
				let fed_zero = ["A", "B"].iter().any(|&port| {
					self.design
						.net_of_sink(id, port)
						.is_some_and(|net| self.zero_nets.contains_key(&net))
				});
				if !fed_zero {
					continue;
				}
				for (net, _) in self.design.nets_driven_by(id) {
					self.zero_nets.insert(net, Width::W1);
				}
				self.design.remove_component(id);
				removed += 1;
			}
			debug!("zero folding removed {removed} components");
			if removed == 0 {
				break;
			}
		}
	}

	/// Erase makers that reassemble, pin for pin, what a splitter just took
	/// apart: their consumers can read the splitter's input bus directly.
	fn merge_splitter_makers(&mut self) {
		for id in self.design.live_ids() {
			if !self.design.is_live(id) {
				continue;
			}
			let comp = self.design.component(id);
			if comp.template.op != TemplateOp::Maker {
				continue;
			}
			let width = comp.template.width;
			let mut feeder: Option<ComponentId> = None;
			let mut contiguous = true;
			for i in 0..width.pin_count() {
				let Some(net) = self.design.net_of_sink(id, &format!("in{i}")) else {
					contiguous = false;
					break;
				};
				let Some(&(splitter, pin)) = self.split_origin.get(&net) else {
					contiguous = false;
					break;
				};
				if pin != i
					|| !self.design.is_live(splitter)
					|| *feeder.get_or_insert(splitter) != splitter
				{
					contiguous = false;
					break;
				}
			}
			let Some(splitter) = feeder else { continue };
			if !contiguous
				|| self.design.component(splitter).template.width != width
				|| self.design.component(splitter).template.op != TemplateOp::Splitter
			{
				continue;
			}
			let Some(bus_in) = self.splitter_input.get(&splitter).cloned() else {
				continue;
			};
			if self.design.source_of(&bus_in).is_none() {
				continue;
			}
			for (out_net, _) in self.design.nets_driven_by(id) {
				self.design.rewire_sinks(&out_net, &bus_in);
			}
			debug!("merged maker {:?} into splitter {:?} bus", id, splitter);
			self.design.remove_component(id);
		}
	}

	/// Iteratively drop makers, splitters and constants nothing listens to.
	fn cleanup_dead(&mut self) {
		loop {
			let mut changed = false;
			for id in self.design.live_ids() {
				let comp = self.design.component(id);
				if !matches!(
					comp.template.op,
					TemplateOp::Maker
						| TemplateOp::Splitter
						| TemplateOp::Constant
						| TemplateOp::Off
						| TemplateOp::On
				) {
					continue;
				}
				let driven = self.design.nets_driven_by(id);
				if driven
					.iter()
					.all(|(net, _)| self.design.sink_count(net) == 0)
				{
					self.design.remove_component(id);
					changed = true;
				}
			}
			if !changed {
				break;
			}
		}
	}

	/// Zero-marked nets that still feed something get a fresh constant
	/// driver of the recorded width. Sorted by net id so component
	/// insertion order, and with it permanent id assignment, stays
	/// deterministic.
	fn repair_zero_nets(&mut self) -> Result<()> {
		let mut pending: Vec<(NetId, Width)> = self
			.zero_nets
			.iter()
			.map(|(net, width)| (net.clone(), *width))
			.collect();
		pending.sort_unstable_by(|a, b| a.0.cmp(&b.0));
		for (net, width) in pending {
			let needs_driver = self
				.design
				.net(&net)
				.is_some_and(|n| !n.sinks.is_empty() && n.source.is_none());
			if !needs_driver {
				continue;
			}
			let comp = if width == Width::W1 {
				self.add(self.lib().off())
			} else {
				let c = self.add_op(TemplateOp::Constant, width)?;
				self.design.component_mut(c).setting = Some(0);
				c
			};
			self.design.connect_source(&net, comp, "out")?;
		}
		Ok(())
	}
}
