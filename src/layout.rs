//! Bridge between the netlist and a layered-graph layout engine.
//!
//! The netlist is flattened into a request of sized nodes (west input pins,
//! east output pins, first/last-layer hints for module IO) and one edge per
//! source-sink pair. Whatever engine answers the request, the bridge owns
//! the passes that run afterwards: IO alignment, the optional compact
//! column packing for area-constrained targets, and centering on the grid
//! origin.

pub mod layered;

use log::info;

use crate::cfg::CFG;
use crate::library::{Point, PortDir, TemplateOp};
use crate::logical_design::{ComponentId, LogicalDesign};
use crate::util::{hash_map, HashM};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerPin {
	First,
	Last,
	Free,
}

#[derive(Debug, Clone)]
pub struct LayoutPort {
	pub name: String,
	pub dir: PortDir,
	/// Offset from the node's top-left corner.
	pub offset: Point,
}

#[derive(Debug, Clone)]
pub struct LayoutNode {
	pub id: ComponentId,
	pub width: i32,
	pub height: i32,
	pub ports: Vec<LayoutPort>,
	pub pin: LayerPin,
}

impl LayoutNode {
	pub fn port_offset(&self, name: &str) -> Option<Point> {
		self.ports.iter().find(|p| p.name == name).map(|p| p.offset)
	}
}

#[derive(Debug, Clone)]
pub struct LayoutEdge {
	pub id: usize,
	pub source: (ComponentId, String),
	pub target: (ComponentId, String),
}

#[derive(Debug, Clone)]
pub struct LayoutRequest {
	pub nodes: Vec<LayoutNode>,
	pub edges: Vec<LayoutEdge>,
}

impl LayoutRequest {
	pub fn node(&self, id: ComponentId) -> Option<&LayoutNode> {
		self.nodes.iter().find(|n| n.id == id)
	}
}

#[derive(Debug, Clone)]
pub struct Placement {
	pub id: ComponentId,
	/// Top-left corner of the node's bounding box.
	pub pos: Point,
	pub width: i32,
	pub height: i32,
}

#[derive(Debug, Clone)]
pub struct RoutedEdge {
	pub id: usize,
	/// Bend points, source end first. Ignored for teleport wires.
	pub points: Vec<Point>,
}

#[derive(Debug, Clone, Default)]
pub struct PlacedLayout {
	pub placements: Vec<Placement>,
	pub edges: Vec<RoutedEdge>,
	idx: HashM<ComponentId, usize>,
}

impl PlacedLayout {
	pub fn new(placements: Vec<Placement>, edges: Vec<RoutedEdge>) -> PlacedLayout {
		let mut idx = hash_map();
		for (i, p) in placements.iter().enumerate() {
			idx.insert(p.id, i);
		}
		PlacedLayout {
			placements,
			edges,
			idx,
		}
	}

	pub fn placement(&self, id: ComponentId) -> Result<&Placement> {
		self.idx
			.get(&id)
			.map(|&i| &self.placements[i])
			.ok_or(Error::NoPlacement(id))
	}

	fn placement_mut(&mut self, id: ComponentId) -> Option<&mut Placement> {
		self.idx.get(&id).map(|&i| &mut self.placements[i])
	}
}

/// The layout engine seam. The bridge hands over a [`LayoutRequest`] and
/// expects a placement for every node plus a polyline for every edge.
pub trait LayoutOracle {
	fn layout(&self, request: &LayoutRequest) -> Result<PlacedLayout>;
}

/// The placed-and-routed stage of the pipeline.
pub struct PhysicalDesign {
	pub layout: PlacedLayout,
	pub request: LayoutRequest,
	pub compact: bool,
}

impl PhysicalDesign {
	pub fn build_from(
		design: &LogicalDesign,
		oracle: &dyn LayoutOracle,
		compact: bool,
	) -> Result<PhysicalDesign> {
		let request = build_request(design);
		let mut layout = oracle.layout(&request)?;
		for node in &request.nodes {
			layout.placement(node.id)?;
		}
		align_io(design, &request, &mut layout);
		if compact {
			compact_pack(design, &mut layout);
		}
		center(&mut layout);
		info!(
			"layout: {} nodes, {} edges{}",
			layout.placements.len(),
			layout.edges.len(),
			if compact { " (compact)" } else { "" }
		);
		Ok(PhysicalDesign {
			layout,
			request,
			compact,
		})
	}
}

pub fn build_request(design: &LogicalDesign) -> LayoutRequest {
	let mut nodes = vec![];
	for comp in design.iter_live() {
		let bounds = comp.bounds();
		let ports = comp
			.layout_ports()
			.iter()
			.map(|p| LayoutPort {
				name: p.name.clone(),
				dir: p.dir,
				offset: p.pos - bounds.min,
			})
			.collect();
		let pin = match comp.template.op {
			TemplateOp::Input => LayerPin::First,
			TemplateOp::Output => LayerPin::Last,
			_ => LayerPin::Free,
		};
		nodes.push(LayoutNode {
			id: comp.id,
			width: bounds.width(),
			height: bounds.height(),
			ports,
			pin,
		});
	}
	let mut edges = vec![];
	for (_, net) in design.iter_nets() {
		let Some(source) = &net.source else { continue };
		for sink in &net.sinks {
			edges.push(LayoutEdge {
				id: edges.len(),
				source: (source.component, source.port.clone()),
				target: (sink.component, sink.port.clone()),
			});
		}
	}
	LayoutRequest { nodes, edges }
}

fn io_components(design: &LogicalDesign, dir: TemplateOp) -> Vec<ComponentId> {
	design
		.iter_live()
		.filter(|c| c.template.op == dir)
		.map(|c| c.id)
		.collect()
}

/// Pull inputs into a column a fixed margin left of everything they feed,
/// outputs a margin right of everything feeding them, dragging the attached
/// edge endpoints along.
fn align_io(design: &LogicalDesign, request: &LayoutRequest, layout: &mut PlacedLayout) {
	let margin = CFG.layout.io_margin;
	let inputs = io_components(design, TemplateOp::Input);
	let outputs = io_components(design, TemplateOp::Output);

	if let Some(leftmost) = inputs
		.iter()
		.filter_map(|&id| layout.placement(id).ok())
		.map(|p| p.pos.x)
		.min()
	{
		let target = leftmost - margin;
		for &id in &inputs {
			shift_component_x(request, layout, id, target);
		}
	}

	if let Some(rightmost) = outputs
		.iter()
		.filter_map(|&id| layout.placement(id).ok())
		.map(|p| p.pos.x + p.width)
		.max()
	{
		let target = rightmost + margin;
		for &id in &outputs {
			shift_component_x(request, layout, id, target);
		}
	}
}

/// Move a component to the given x, dragging the touching ends of its
/// attached polylines along.
fn shift_component_x(
	request: &LayoutRequest,
	layout: &mut PlacedLayout,
	id: ComponentId,
	target_x: i32,
) {
	let dx = {
		let Some(p) = layout.placement_mut(id) else { return };
		let dx = target_x - p.pos.x;
		p.pos.x = target_x;
		dx
	};
	if dx == 0 {
		return;
	}
	for edge in &mut layout.edges {
		let Some(meta) = request.edges.get(edge.id) else { continue };
		if meta.source.0 == id {
			if let Some(first) = edge.points.first_mut() {
				first.x += dx;
			}
		}
		if meta.target.0 == id {
			if let Some(last) = edge.points.last_mut() {
				last.x += dx;
			}
		}
	}
}

/// Repack the oracle's answer into tight vertical columns. The x order of
/// the placements is kept as a linearization; inputs, logic and outputs
/// each get their own group of columns so the reading order survives. IO
/// components sit in fixed-height slots so their bus pins line up.
fn compact_pack(design: &LogicalDesign, layout: &mut PlacedLayout) {
	let slot = CFG.layout.compact_io_slot;
	let node_gap = CFG.layout.node_gap;
	let col_gap = CFG.layout.layer_gap;

	let mut inputs = vec![];
	let mut logic = vec![];
	let mut outputs = vec![];
	for p in &layout.placements {
		let comp = design.component(p.id);
		match comp.template.op {
			TemplateOp::Input => inputs.push(p.id),
			TemplateOp::Output => outputs.push(p.id),
			_ => logic.push(p.id),
		}
	}
	let key = |layout: &PlacedLayout, id: ComponentId| {
		let p = layout.placement(id).unwrap();
		(p.pos.x, p.pos.y, p.id)
	};
	inputs.sort_by_key(|&id| key(layout, id));
	logic.sort_by_key(|&id| key(layout, id));
	outputs.sort_by_key(|&id| key(layout, id));

	let total_area: i64 = layout
		.placements
		.iter()
		.map(|p| p.width as i64 * p.height as i64)
		.sum();
	let tallest = layout
		.placements
		.iter()
		.map(|p| p.height)
		.max()
		.unwrap_or(1);
	// Roughly square overall, never shorter than the tallest element, and
	// tall enough that a handful of IO slots share a column. The factor is
	// empirical.
	let column_height = ((2.0 * total_area as f64).sqrt().ceil() as i32)
		.max(tallest)
		.max(4 * slot);

	let mut x = 0;
	x = pack_group(layout, &inputs, x, column_height, col_gap, Some(slot), 0);
	x = pack_group(layout, &logic, x, column_height, col_gap, None, node_gap);
	pack_group(layout, &outputs, x, column_height, col_gap, Some(slot), 0);

	// Routed polylines are meaningless after repacking; wires become
	// teleports with explicit endpoints.
	for edge in &mut layout.edges {
		edge.points.clear();
	}
}

/// Fill columns top to bottom; returns the x cursor after the group.
fn pack_group(
	layout: &mut PlacedLayout,
	group: &[ComponentId],
	mut x: i32,
	column_height: i32,
	col_gap: i32,
	fixed_slot: Option<i32>,
	gap: i32,
) -> i32 {
	if group.is_empty() {
		return x;
	}
	let mut y = 0;
	let mut col_width = 0;
	for &id in group {
		let (w, h) = {
			let p = layout.placement(id).unwrap();
			(p.width, p.height)
		};
		let advance = fixed_slot.unwrap_or(h + gap).max(h);
		if y > 0 && y + h > column_height {
			x += col_width + col_gap;
			col_width = 0;
			y = 0;
		}
		let p = layout.placement_mut(id).unwrap();
		p.pos = Point::new(x, y);
		y += advance;
		col_width = col_width.max(w);
	}
	x + col_width + col_gap
}

/// Translate everything so the bounding box over node rectangles and edge
/// points straddles the origin. Integer arithmetic; running it twice moves
/// nothing further (up to the one-cell rounding of the center).
pub(crate) fn center(layout: &mut PlacedLayout) {
	let mut min = Point::new(i32::MAX, i32::MAX);
	let mut max = Point::new(i32::MIN, i32::MIN);
	for p in &layout.placements {
		min.x = min.x.min(p.pos.x);
		min.y = min.y.min(p.pos.y);
		max.x = max.x.max(p.pos.x + p.width);
		max.y = max.y.max(p.pos.y + p.height);
	}
	for e in &layout.edges {
		for pt in &e.points {
			min.x = min.x.min(pt.x);
			min.y = min.y.min(pt.y);
			max.x = max.x.max(pt.x);
			max.y = max.y.max(pt.y);
		}
	}
	if min.x > max.x {
		return;
	}
	let dx = -((min.x + max.x) / 2);
	let dy = -((min.y + max.y) / 2);
	for p in &mut layout.placements {
		p.pos = p.pos.offset(dx, dy);
	}
	for e in &mut layout.edges {
		for pt in &mut e.points {
			*pt = pt.offset(dx, dy);
		}
	}
}
