//! Orthogonal wire polylines and their byte encoding.
//!
//! A routed polyline leaves the layout stage as loose bend points. Encoding
//! pins both ends to the exact port coordinates, splits any diagonal into
//! two orthogonal moves, expands everything to unit steps and packs the
//! steps into direction-run bytes: high three bits compass direction, low
//! five bits run length, zero byte terminator. Compact layouts skip routing
//! entirely and emit a single teleport byte with an explicit end point.

use crate::layout::PhysicalDesign;
use crate::library::{Point, Width};
use crate::logical_design::{ComponentId, LogicalDesign};
use crate::{Error, Result};

/// Body byte marking a wire with no path, just two endpoints.
pub const TELEPORT: u8 = 0b0010_0000;

const MAX_RUN: u8 = 31;

/// Compass directions in encoding order.
const DIRECTIONS: [(i32, i32); 8] = [
	(1, 0),   // E
	(1, 1),   // SE
	(0, 1),   // S
	(-1, 1),  // SW
	(-1, 0),  // W
	(-1, -1), // NW
	(0, -1),  // N
	(1, -1),  // NE
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireKind {
	Wk1 = 0,
	Wk8 = 1,
	Wk16 = 2,
	Wk32 = 3,
	Wk64 = 4,
}

impl WireKind {
	pub fn from_width(width: Width) -> WireKind {
		match width {
			Width::W1 => WireKind::Wk1,
			Width::W8 => WireKind::Wk8,
			Width::W16 => WireKind::Wk16,
			Width::W32 => WireKind::Wk32,
			Width::W64 => WireKind::Wk64,
		}
	}
}

#[derive(Debug, Clone)]
pub struct SaveWire {
	pub kind: WireKind,
	pub color: u8,
	pub comment: String,
	pub start: Point,
	pub body: Vec<u8>,
	/// Present exactly when the body ends in the teleport marker.
	pub end: Option<Point>,
}

/// Grid coordinate of a component port under the final placement.
pub fn port_coordinate(
	design: &LogicalDesign,
	phy: &PhysicalDesign,
	component: ComponentId,
	port: &str,
) -> Result<Point> {
	let comp = design.component(component);
	let local = comp.port_position(port)?;
	let bounds = comp.bounds();
	let placement = phy.layout.placement(component)?;
	Ok(placement.pos + (local - bounds.min))
}

/// Derive every wire record from the routed layout, in edge order.
pub fn encode_wires(design: &LogicalDesign, phy: &PhysicalDesign) -> Result<Vec<SaveWire>> {
	let mut wires = vec![];
	for edge in &phy.layout.edges {
		let meta = &phy.request.edges[edge.id];
		let start = port_coordinate(design, phy, meta.source.0, &meta.source.1)?;
		let end = port_coordinate(design, phy, meta.target.0, &meta.target.1)?;
		let width = design.component(meta.source.0).port_width(&meta.source.1);
		let kind = WireKind::from_width(width);
		let wire = if phy.compact || edge.points.len() < 2 {
			SaveWire {
				kind,
				color: 0,
				comment: String::new(),
				start,
				body: vec![TELEPORT],
				end: Some(end),
			}
		} else {
			let mut points = edge.points.clone();
			// Pin both ends to the true port coordinates; routing may have
			// drifted under grid snapping and the alignment passes.
			*points.first_mut().unwrap() = start;
			*points.last_mut().unwrap() = end;
			let dense = densify(&points);
			SaveWire {
				kind,
				color: 0,
				comment: String::new(),
				start,
				body: encode_runs(&dense)?,
				end: None,
			}
		};
		wires.push(wire);
	}
	Ok(wires)
}

/// Expand a polyline into unit moves, splitting diagonal segments at the
/// horizontally-aligned midpoint.
pub fn densify(points: &[Point]) -> Vec<Point> {
	let mut ortho = vec![points[0]];
	for pair in points.windows(2) {
		let (a, b) = (pair[0], pair[1]);
		if a.x != b.x && a.y != b.y {
			ortho.push(Point::new(b.x, a.y));
		}
		ortho.push(b);
	}
	let mut dense = vec![ortho[0]];
	for pair in ortho.windows(2) {
		let (a, b) = (pair[0], pair[1]);
		let dx = (b.x - a.x).signum();
		let dy = (b.y - a.y).signum();
		let mut cursor = a;
		while cursor != b {
			cursor = cursor.offset(dx, dy);
			dense.push(cursor);
		}
	}
	dense
}

/// Run-length encode a dense unit-move polyline, zero terminated.
pub fn encode_runs(dense: &[Point]) -> Result<Vec<u8>> {
	let mut body = vec![];
	let mut run: Option<(usize, u8)> = None;
	for pair in dense.windows(2) {
		let step = (pair[1].x - pair[0].x, pair[1].y - pair[0].y);
		let dir = DIRECTIONS
			.iter()
			.position(|&d| d == step)
			.ok_or(Error::NonUnitMove)?;
		run = Some(match run {
			Some((d, len)) if d == dir && len < MAX_RUN => (d, len + 1),
			Some((d, len)) => {
				body.push(run_byte(d, len));
				(dir, 1)
			}
			None => (dir, 1),
		});
	}
	if let Some((d, len)) = run {
		body.push(run_byte(d, len));
	}
	body.push(0);
	Ok(body)
}

fn run_byte(dir: usize, len: u8) -> u8 {
	((dir as u8) << 5) | len
}

/// Walk an encoded body back into unit moves. The inverse of
/// [`encode_runs`]; wire verification and the save reader tests use it.
pub fn decode_runs(start: Point, body: &[u8]) -> Vec<Point> {
	let mut points = vec![start];
	let mut cursor = start;
	for &byte in body {
		if byte == 0 || byte == TELEPORT {
			break;
		}
		let (dx, dy) = DIRECTIONS[(byte >> 5) as usize];
		for _ in 0..(byte & 0x1f) {
			cursor = cursor.offset(dx, dy);
			points.push(cursor);
		}
	}
	points
}

#[cfg(test)]
mod tests {
	use super::*;

	fn p(x: i32, y: i32) -> Point {
		Point::new(x, y)
	}

	#[test]
	fn densify_splits_diagonals() {
		let dense = densify(&[p(0, 0), p(2, 2)]);
		// Horizontal first, then vertical.
		assert_eq!(dense, vec![p(0, 0), p(1, 0), p(2, 0), p(2, 1), p(2, 2)]);
	}

	#[test]
	fn runs_round_trip() {
		let polyline = [p(0, 0), p(40, 0), p(40, -7), p(3, -7), p(3, -7)];
		let dense = densify(&polyline);
		let body = encode_runs(&dense).unwrap();
		assert_eq!(*body.last().unwrap(), 0);
		assert_eq!(decode_runs(p(0, 0), &body), dense);
	}

	#[test]
	fn long_runs_split_at_31() {
		let dense = densify(&[p(0, 0), p(64, 0)]);
		let body = encode_runs(&dense).unwrap();
		// 64 east = 31 + 31 + 2, then the terminator.
		assert_eq!(body, vec![31, 31, 2, 0]);
	}

	#[test]
	fn zero_length_wire_is_just_a_terminator() {
		let body = encode_runs(&[p(5, 5)]).unwrap();
		assert_eq!(body, vec![0]);
	}

	#[test]
	fn direction_indices_match_the_compass() {
		let east = encode_runs(&densify(&[p(0, 0), p(1, 0)])).unwrap();
		assert_eq!(east, vec![0b000_00001, 0]);
		let north = encode_runs(&densify(&[p(0, 0), p(0, -1)])).unwrap();
		assert_eq!(north, vec![0b110_00001, 0]);
		let west = encode_runs(&densify(&[p(0, 0), p(-2, 0)])).unwrap();
		assert_eq!(west, vec![0b100_00010, 0]);
	}

	#[test]
	fn teleport_marker_is_length_zero() {
		// A southeast run of length zero can never be produced by the
		// encoder, which is what makes the marker unambiguous.
		assert_eq!(TELEPORT, run_byte(1, 0));
	}

	#[test]
	fn kinds_map_from_widths() {
		assert_eq!(WireKind::from_width(Width::W1), WireKind::Wk1);
		assert_eq!(WireKind::from_width(Width::W64), WireKind::Wk64);
	}
}
