//! Debug rendering of a placed layout. Purely a development aid; nothing
//! in the save path depends on it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::layout::PhysicalDesign;
use crate::library::TemplateOp;
use crate::logical_design::LogicalDesign;
use crate::Result;

const SCALE: i32 = 8;

fn fill_for(op: TemplateOp) -> &'static str {
	match op {
		TemplateOp::Input => "#7fbf7f",
		TemplateOp::Output => "#bf7f7f",
		TemplateOp::Maker | TemplateOp::Splitter => "#bfbf7f",
		TemplateOp::Reg | TemplateOp::FlipFlop => "#7f9fbf",
		TemplateOp::Custom => "#bf9fbf",
		_ => "#9f9f9f",
	}
}

pub fn save_svg<P: AsRef<Path>>(
	design: &LogicalDesign,
	phy: &PhysicalDesign,
	path: P,
) -> Result<()> {
	let layout = &phy.layout;
	let mut min = (i32::MAX, i32::MAX);
	let mut max = (i32::MIN, i32::MIN);
	for p in &layout.placements {
		min.0 = min.0.min(p.pos.x);
		min.1 = min.1.min(p.pos.y);
		max.0 = max.0.max(p.pos.x + p.width);
		max.1 = max.1.max(p.pos.y + p.height);
	}
	if min.0 > max.0 {
		min = (0, 0);
		max = (1, 1);
	}
	let pad = 4;
	let view = (
		(min.0 - pad) * SCALE,
		(min.1 - pad) * SCALE,
		(max.0 - min.0 + 2 * pad) * SCALE,
		(max.1 - min.1 + 2 * pad) * SCALE,
	);
	let file = File::create(path)?;
	let mut w = BufWriter::new(file);
	writeln!(
		w,
		"<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"{} {} {} {}\">",
		view.0, view.1, view.2, view.3
	)?;
	for edge in &layout.edges {
		if edge.points.len() < 2 {
			continue;
		}
		let path: Vec<String> = edge
			.points
			.iter()
			.map(|p| format!("{},{}", p.x * SCALE, p.y * SCALE))
			.collect();
		writeln!(
			w,
			"  <polyline points=\"{}\" fill=\"none\" stroke=\"#5050c0\" stroke-width=\"2\"/>",
			path.join(" ")
		)?;
	}
	for p in &layout.placements {
		let comp = design.component(p.id);
		writeln!(
			w,
			"  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" stroke=\"black\"><title>{}</title></rect>",
			p.pos.x * SCALE,
			p.pos.y * SCALE,
			p.width * SCALE,
			p.height * SCALE,
			fill_for(comp.template.op),
			comp.label.as_deref().unwrap_or(&comp.template.name),
		)?;
	}
	writeln!(w, "</svg>")?;
	Ok(())
}
