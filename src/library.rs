//! Static catalogue of the component primitives the target sandbox offers.
//!
//! Every template is registered once into [`LIBRARY`] with its port layout
//! and grid bounding box. Lowering asks for templates through the typed
//! [`Library::template`] lookup so the closed set of (operation, width)
//! pairs is checked in one place instead of being scattered through string
//! concatenation.

use std::sync::LazyLock;

use crate::util::{hash_map, HashM};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Point {
	pub x: i32,
	pub y: i32,
}

impl Point {
	pub const fn new(x: i32, y: i32) -> Point {
		Point { x, y }
	}

	pub fn offset(self, dx: i32, dy: i32) -> Point {
		Point {
			x: self.x + dx,
			y: self.y + dy,
		}
	}
}

impl std::ops::Add for Point {
	type Output = Point;

	fn add(self, rhs: Point) -> Point {
		Point::new(self.x + rhs.x, self.y + rhs.y)
	}
}

impl std::ops::Sub for Point {
	type Output = Point;

	fn sub(self, rhs: Point) -> Point {
		Point::new(self.x - rhs.x, self.y - rhs.y)
	}
}

impl std::fmt::Display for Point {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "({}, {})", self.x, self.y)
	}
}

/// Grid-aligned bounding box, inclusive on both corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
	pub min: Point,
	pub max: Point,
}

impl Bounds {
	pub const fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Bounds {
		Bounds {
			min: Point::new(min_x, min_y),
			max: Point::new(max_x, max_y),
		}
	}

	pub fn width(&self) -> i32 {
		self.max.x - self.min.x + 1
	}

	pub fn height(&self) -> i32 {
		self.max.y - self.min.y + 1
	}
}

/// Bus widths the component set exists for. `W1` doubles as "not a bus".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Width {
	W1,
	W8,
	W16,
	W32,
	W64,
}

impl Width {
	pub fn bits(self) -> usize {
		match self {
			Width::W1 => 1,
			Width::W8 => 8,
			Width::W16 => 16,
			Width::W32 => 32,
			Width::W64 => 64,
		}
	}

	/// The smallest width that holds `n` bits: 1 stays 1, everything else
	/// rounds up to 8/16/32/64.
	pub fn for_bits(n: usize) -> Result<Width> {
		match n {
			0 => Err(Error::UnsupportedWidth(0)),
			1 => Ok(Width::W1),
			2..=8 => Ok(Width::W8),
			9..=16 => Ok(Width::W16),
			17..=32 => Ok(Width::W32),
			33..=64 => Ok(Width::W64),
			n => Err(Error::UnsupportedWidth(n)),
		}
	}

	/// Pin count on a maker/splitter of this width: per-bit pins up to 8,
	/// one pin per 8-bit chunk beyond that.
	pub fn pin_count(self) -> usize {
		match self {
			Width::W1 => 1,
			Width::W8 => 8,
			Width::W16 => 2,
			Width::W32 => 4,
			Width::W64 => 8,
		}
	}

	/// Width carried by a single maker/splitter pin.
	pub fn pin_width(self) -> Width {
		match self {
			Width::W1 | Width::W8 => Width::W1,
			_ => Width::W8,
		}
	}
}

impl std::fmt::Display for Width {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.bits())
	}
}

/// The operation a template implements, independent of width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateOp {
	Input,
	Output,
	Constant,
	Off,
	On,
	Not,
	And,
	Or,
	Xor,
	Xnor,
	Mux,
	Maker,
	Splitter,
	Add,
	Mul,
	Shl,
	Shr,
	Ashr,
	Neg,
	Equal,
	LessU,
	LessS,
	Reg,
	FlipFlop,
	Custom,
}

/// Serialized component kind. The ordinal is the 16-bit value written into
/// the save payload and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ComponentKind {
	Off = 0,
	On = 1,
	Not = 2,
	And = 3,
	Or = 4,
	Xor = 5,
	Xnor = 6,
	FlipFlop = 7,
	Input1 = 8,
	Output1 = 9,

	Input8 = 10,
	Output8 = 11,
	Constant8 = 12,
	Not8 = 13,
	And8 = 14,
	Or8 = 15,
	Xor8 = 16,
	Xnor8 = 17,
	Mux8 = 18,
	Maker8 = 19,
	Splitter8 = 20,
	Add8 = 21,
	Mul8 = 22,
	Shl8 = 23,
	Shr8 = 24,
	Ashr8 = 25,
	Neg8 = 26,
	Equal8 = 27,
	LessU8 = 28,
	LessS8 = 29,
	Reg8 = 30,

	Input16 = 31,
	Output16 = 32,
	Constant16 = 33,
	Not16 = 34,
	And16 = 35,
	Or16 = 36,
	Xor16 = 37,
	Xnor16 = 38,
	Mux16 = 39,
	Maker16 = 40,
	Splitter16 = 41,
	Add16 = 42,
	Mul16 = 43,
	Shl16 = 44,
	Shr16 = 45,
	Ashr16 = 46,
	Neg16 = 47,
	Equal16 = 48,
	LessU16 = 49,
	LessS16 = 50,
	Reg16 = 51,

	Input32 = 52,
	Output32 = 53,
	Constant32 = 54,
	Not32 = 55,
	And32 = 56,
	Or32 = 57,
	Xor32 = 58,
	Xnor32 = 59,
	Mux32 = 60,
	Maker32 = 61,
	Splitter32 = 62,
	Add32 = 63,
	Mul32 = 64,
	Shl32 = 65,
	Shr32 = 66,
	Ashr32 = 67,
	Neg32 = 68,
	Equal32 = 69,
	LessU32 = 70,
	LessS32 = 71,
	Reg32 = 72,

	Input64 = 73,
	Output64 = 74,
	Constant64 = 75,
	Not64 = 76,
	And64 = 77,
	Or64 = 78,
	Xor64 = 79,
	Xnor64 = 80,
	Mux64 = 81,
	Maker64 = 82,
	Splitter64 = 83,
	Add64 = 84,
	Mul64 = 85,
	Shl64 = 86,
	Shr64 = 87,
	Ashr64 = 88,
	Neg64 = 89,
	Equal64 = 90,
	LessU64 = 91,
	LessS64 = 92,
	Reg64 = 93,

	Custom = 94,
}

impl ComponentKind {
	pub fn as_u16(self) -> u16 {
		self as u16
	}

	/// Whether this kind carries a selected-program list in the save
	/// payload. None of the compiled kinds do; the hook exists because the
	/// wire format has the field.
	pub fn is_program_kind(self) -> bool {
		false
	}
}

macro_rules! wide_kinds {
	($($op:ident => $k8:ident $k16:ident $k32:ident $k64:ident),+ $(,)?) => {
		fn wide_kind(op: TemplateOp, width: Width) -> ComponentKind {
			match (op, width) {
				$(
					(TemplateOp::$op, Width::W8) => ComponentKind::$k8,
					(TemplateOp::$op, Width::W16) => ComponentKind::$k16,
					(TemplateOp::$op, Width::W32) => ComponentKind::$k32,
					(TemplateOp::$op, Width::W64) => ComponentKind::$k64,
				)+
				(op, width) => panic!("no wide kind for {op:?} at width {width}"),
			}
		}
	};
}

wide_kinds! {
	Input => Input8 Input16 Input32 Input64,
	Output => Output8 Output16 Output32 Output64,
	Constant => Constant8 Constant16 Constant32 Constant64,
	Not => Not8 Not16 Not32 Not64,
	And => And8 And16 And32 And64,
	Or => Or8 Or16 Or32 Or64,
	Xor => Xor8 Xor16 Xor32 Xor64,
	Xnor => Xnor8 Xnor16 Xnor32 Xnor64,
	Mux => Mux8 Mux16 Mux32 Mux64,
	Maker => Maker8 Maker16 Maker32 Maker64,
	Splitter => Splitter8 Splitter16 Splitter32 Splitter64,
	Add => Add8 Add16 Add32 Add64,
	Mul => Mul8 Mul16 Mul32 Mul64,
	Shl => Shl8 Shl16 Shl32 Shl64,
	Shr => Shr8 Shr16 Shr32 Shr64,
	Ashr => Ashr8 Ashr16 Ashr32 Ashr64,
	Neg => Neg8 Neg16 Neg32 Neg64,
	Equal => Equal8 Equal16 Equal32 Equal64,
	LessU => LessU8 LessU16 LessU32 LessU64,
	LessS => LessS8 LessS16 LessS32 LessS64,
	Reg => Reg8 Reg16 Reg32 Reg64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDir {
	Input,
	Output,
}

#[derive(Debug, Clone)]
pub struct TemplatePort {
	pub name: String,
	pub dir: PortDir,
	pub pos: Point,
}

#[derive(Debug, Clone)]
pub struct Template {
	pub kind: ComponentKind,
	pub op: TemplateOp,
	pub width: Width,
	pub name: String,
	pub rotation: u8,
	pub bounds: Bounds,
	pub ports: Vec<TemplatePort>,
}

impl Template {
	pub fn port(&self, name: &str) -> Result<&TemplatePort> {
		self.ports
			.iter()
			.find(|p| p.name == name)
			.ok_or_else(|| Error::UnknownPort(self.name.clone(), name.to_owned()))
	}

	/// Bus width carried by a named port of this template. Custom instances
	/// override this per instance; everything else is decided by the
	/// template alone.
	pub fn port_width(&self, name: &str) -> Width {
		match self.op {
			TemplateOp::Off | TemplateOp::On | TemplateOp::FlipFlop => Width::W1,
			TemplateOp::Equal | TemplateOp::LessU | TemplateOp::LessS => match name {
				"out" => Width::W1,
				_ => self.width,
			},
			TemplateOp::Mux => match name {
				"S" => Width::W1,
				_ => self.width,
			},
			TemplateOp::Add => match name {
				"carry_in" | "carry_out" => Width::W1,
				_ => self.width,
			},
			TemplateOp::Reg => match name {
				"load" | "save" => Width::W1,
				_ => self.width,
			},
			TemplateOp::Maker => match name {
				"out" => self.width,
				_ => self.width.pin_width(),
			},
			TemplateOp::Splitter => match name {
				"in" => self.width,
				_ => self.width.pin_width(),
			},
			_ => self.width,
		}
	}
}

fn in_port(name: &str, x: i32, y: i32) -> TemplatePort {
	TemplatePort {
		name: name.to_owned(),
		dir: PortDir::Input,
		pos: Point::new(x, y),
	}
}

fn out_port(name: &str, x: i32, y: i32) -> TemplatePort {
	TemplatePort {
		name: name.to_owned(),
		dir: PortDir::Output,
		pos: Point::new(x, y),
	}
}

fn template(
	kind: ComponentKind,
	op: TemplateOp,
	width: Width,
	name: String,
	bounds: Bounds,
	ports: Vec<TemplatePort>,
) -> Template {
	Template {
		kind,
		op,
		width,
		name,
		rotation: 0,
		bounds,
		ports,
	}
}

fn unary(kind: ComponentKind, op: TemplateOp, width: Width, name: String) -> Template {
	template(
		kind,
		op,
		width,
		name,
		Bounds::new(-1, -1, 1, 1),
		vec![in_port("A", -1, 0), out_port("out", 1, 0)],
	)
}

fn binary(kind: ComponentKind, op: TemplateOp, width: Width, name: String) -> Template {
	template(
		kind,
		op,
		width,
		name,
		Bounds::new(-1, -1, 1, 1),
		vec![
			in_port("A", -1, -1),
			in_port("B", -1, 1),
			out_port("out", 1, 0),
		],
	)
}

fn shift(kind: ComponentKind, op: TemplateOp, width: Width, name: String) -> Template {
	template(
		kind,
		op,
		width,
		name,
		Bounds::new(-1, -1, 1, 1),
		vec![
			in_port("A", -1, -1),
			in_port("shift", -1, 1),
			out_port("out", 1, 0),
		],
	)
}

/// Maker/splitter pins run vertically, centered around y = 0.
fn pin_rows(n: usize) -> impl Iterator<Item = i32> {
	let half = n as i32 / 2;
	(0..n as i32).map(move |i| i - half)
}

fn maker(kind: ComponentKind, width: Width) -> Template {
	let pins = width.pin_count();
	let half = pins as i32 / 2;
	let ports = pin_rows(pins)
		.enumerate()
		.map(|(i, y)| in_port(&format!("in{i}"), -1, y))
		.chain([out_port("out", 1, 0)])
		.collect();
	template(
		kind,
		TemplateOp::Maker,
		width,
		format!("Maker{width}"),
		Bounds::new(-1, -half, 1, half.max(1)),
		ports,
	)
}

fn splitter(kind: ComponentKind, width: Width) -> Template {
	let pins = width.pin_count();
	let half = pins as i32 / 2;
	let ports = [in_port("in", -1, 0)]
		.into_iter()
		.chain(
			pin_rows(pins)
				.enumerate()
				.map(|(i, y)| out_port(&format!("out{i}"), 1, y)),
		)
		.collect();
	template(
		kind,
		TemplateOp::Splitter,
		width,
		format!("Splitter{width}"),
		Bounds::new(-1, -half, 1, half.max(1)),
		ports,
	)
}

fn wide_family(width: Width) -> Vec<Template> {
	use TemplateOp::*;
	let k = |op| wide_kind(op, width);
	vec![
		template(
			k(Input),
			Input,
			width,
			format!("Input{width}"),
			Bounds::new(-1, -1, 1, 1),
			vec![out_port("out", 1, 0)],
		),
		template(
			k(Output),
			Output,
			width,
			format!("Output{width}"),
			Bounds::new(-1, -1, 1, 1),
			vec![in_port("in", -1, 0)],
		),
		template(
			k(Constant),
			Constant,
			width,
			format!("Constant{width}"),
			Bounds::new(-1, -1, 1, 1),
			vec![out_port("out", 1, 0)],
		),
		unary(k(Not), Not, width, format!("Not{width}")),
		binary(k(And), And, width, format!("And{width}")),
		binary(k(Or), Or, width, format!("Or{width}")),
		binary(k(Xor), Xor, width, format!("Xor{width}")),
		binary(k(Xnor), Xnor, width, format!("Xnor{width}")),
		template(
			k(Mux),
			Mux,
			width,
			format!("Mux{width}"),
			Bounds::new(-1, -1, 1, 1),
			vec![
				in_port("A", -1, -1),
				in_port("B", -1, 0),
				in_port("S", -1, 1),
				out_port("out", 1, 0),
			],
		),
		maker(k(Maker), width),
		splitter(k(Splitter), width),
		template(
			k(Add),
			Add,
			width,
			format!("Add{width}"),
			Bounds::new(-1, -1, 1, 1),
			vec![
				in_port("carry_in", -1, -1),
				in_port("A", -1, 0),
				in_port("B", -1, 1),
				out_port("sum", 1, -1),
				out_port("carry_out", 1, 0),
			],
		),
		binary(k(Mul), Mul, width, format!("Mul{width}")),
		shift(k(Shl), Shl, width, format!("Shl{width}")),
		shift(k(Shr), Shr, width, format!("Shr{width}")),
		shift(k(Ashr), Ashr, width, format!("Ashr{width}")),
		unary(k(Neg), Neg, width, format!("Neg{width}")),
		binary(k(Equal), Equal, width, format!("Equal{width}")),
		binary(k(LessU), LessU, width, format!("LessU{width}")),
		binary(k(LessS), LessS, width, format!("LessS{width}")),
		template(
			k(Reg),
			Reg,
			width,
			format!("Reg{width}"),
			Bounds::new(-1, -1, 1, 1),
			vec![
				in_port("load", -1, -1),
				in_port("save", -1, 0),
				in_port("value", -1, 1),
				out_port("out", 1, 0),
			],
		),
	]
}

fn one_bit_family() -> Vec<Template> {
	use ComponentKind as K;
	use TemplateOp::*;
	vec![
		template(
			K::Off,
			Off,
			Width::W1,
			"Off".to_owned(),
			Bounds::new(-1, -1, 1, 1),
			vec![out_port("out", 1, 0)],
		),
		template(
			K::On,
			On,
			Width::W1,
			"On".to_owned(),
			Bounds::new(-1, -1, 1, 1),
			vec![out_port("out", 1, 0)],
		),
		unary(K::Not, Not, Width::W1, "Not".to_owned()),
		binary(K::And, And, Width::W1, "And".to_owned()),
		binary(K::Or, Or, Width::W1, "Or".to_owned()),
		binary(K::Xor, Xor, Width::W1, "Xor".to_owned()),
		binary(K::Xnor, Xnor, Width::W1, "Xnor".to_owned()),
		template(
			K::FlipFlop,
			FlipFlop,
			Width::W1,
			"FlipFlop".to_owned(),
			Bounds::new(-1, -1, 1, 1),
			vec![
				in_port("save", -1, -1),
				in_port("value", -1, 1),
				out_port("out", 1, 0),
			],
		),
		template(
			K::Input1,
			Input,
			Width::W1,
			"Input1".to_owned(),
			Bounds::new(-1, -1, 1, 1),
			vec![out_port("out", 1, 0)],
		),
		template(
			K::Output1,
			Output,
			Width::W1,
			"Output1".to_owned(),
			Bounds::new(-1, -1, 1, 1),
			vec![in_port("in", -1, 0)],
		),
	]
}

pub struct Library {
	templates: Vec<Template>,
	idx_kind: HashM<u16, usize>,
	idx_op: HashM<(TemplateOp, Width), usize>,
}

pub static LIBRARY: LazyLock<Library> = LazyLock::new(Library::build);

impl Library {
	fn build() -> Library {
		let mut templates = one_bit_family();
		for width in [Width::W8, Width::W16, Width::W32, Width::W64] {
			templates.extend(wide_family(width));
		}
		templates.push(template(
			ComponentKind::Custom,
			TemplateOp::Custom,
			Width::W1,
			"Custom".to_owned(),
			Bounds::new(0, 0, 0, 0),
			vec![],
		));
		let mut idx_kind = hash_map();
		let mut idx_op = hash_map();
		for (i, t) in templates.iter().enumerate() {
			idx_kind.insert(t.kind.as_u16(), i);
			idx_op.insert((t.op, t.width), i);
		}
		Library {
			templates,
			idx_kind,
			idx_op,
		}
	}

	pub fn get() -> &'static Library {
		&LIBRARY
	}

	/// Typed lookup over the closed (operation, width) set.
	pub fn template(&'static self, op: TemplateOp, width: Width) -> Result<&'static Template> {
		// 1-bit registers are a distinct primitive in the target set.
		let key = match (op, width) {
			(TemplateOp::Reg, Width::W1) => (TemplateOp::FlipFlop, Width::W1),
			key => key,
		};
		self.idx_op
			.get(&key)
			.map(|&i| &self.templates[i])
			.ok_or(Error::NoTemplate(op, width))
	}

	pub fn by_kind(&'static self, kind: ComponentKind) -> &'static Template {
		&self.templates[self.idx_kind[&kind.as_u16()]]
	}

	pub fn off(&'static self) -> &'static Template {
		self.by_kind(ComponentKind::Off)
	}

	pub fn on(&'static self) -> &'static Template {
		self.by_kind(ComponentKind::On)
	}

	pub fn custom(&'static self) -> &'static Template {
		self.by_kind(ComponentKind::Custom)
	}
}
