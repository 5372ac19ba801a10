//! Built-in layered layout engine.
//!
//! Deliberately plain: longest-path layering with first/last pinning,
//! one barycenter ordering sweep, stacked coordinates, and three-segment
//! orthogonal edge routes fanned over a few vertical channels. Crossing
//! minimization is out of scope; determinism and orthogonality are not.

use crate::cfg::CFG;
use crate::library::Point;
use crate::logical_design::ComponentId;
use crate::util::{hash_map, HashM};
use crate::Result;

use super::{LayerPin, LayoutOracle, LayoutRequest, PlacedLayout, Placement, RoutedEdge};

pub struct LayeredOracle;

impl LayoutOracle for LayeredOracle {
	fn layout(&self, request: &LayoutRequest) -> Result<PlacedLayout> {
		let node_index: HashM<ComponentId, usize> = {
			let mut m = hash_map();
			for (i, n) in request.nodes.iter().enumerate() {
				m.insert(n.id, i);
			}
			m
		};
		let n = request.nodes.len();
		if n == 0 {
			return Ok(PlacedLayout::new(vec![], vec![]));
		}

		// Predecessors per node, for layering and barycenters.
		let mut preds: Vec<Vec<usize>> = vec![vec![]; n];
		for edge in &request.edges {
			let (Some(&s), Some(&t)) = (node_index.get(&edge.source.0), node_index.get(&edge.target.0))
			else {
				continue;
			};
			if s != t {
				preds[t].push(s);
			}
		}

		let layers = assign_layers(request, &preds);
		let max_layer = layers.iter().copied().max().unwrap_or(0);
		// Pin outputs to the far side.
		let layers: Vec<usize> = request
			.nodes
			.iter()
			.zip(layers)
			.map(|(node, layer)| match node.pin {
				LayerPin::Last => max_layer.max(1),
				_ => layer,
			})
			.collect();
		let max_layer = layers.iter().copied().max().unwrap_or(0);

		let mut by_layer: Vec<Vec<usize>> = vec![vec![]; max_layer + 1];
		for (i, &layer) in layers.iter().enumerate() {
			by_layer[layer].push(i);
		}

		// Column x positions: each layer is as wide as its widest node.
		let gap = CFG.layout.layer_gap;
		let node_gap = CFG.layout.node_gap;
		let mut layer_x = vec![0i32; max_layer + 1];
		let mut x = 0;
		for (l, members) in by_layer.iter().enumerate() {
			layer_x[l] = x;
			let widest = members
				.iter()
				.map(|&i| request.nodes[i].width)
				.max()
				.unwrap_or(0);
			x += widest + gap;
		}

		// Vertical order: first layer keeps request order, later layers
		// sort by the mean center of their predecessors.
		let mut centers = vec![0f64; n];
		let mut placements: Vec<Option<Placement>> = vec![None; n];
		for (l, members) in by_layer.iter().enumerate() {
			let mut members = members.clone();
			if l > 0 {
				members.sort_by(|&a, &b| {
					let key = |i: usize| {
						let ps = &preds[i];
						if ps.is_empty() {
							f64::MAX
						} else {
							ps.iter().map(|&p| centers[p]).sum::<f64>() / ps.len() as f64
						}
					};
					key(a).partial_cmp(&key(b)).unwrap().then(a.cmp(&b))
				});
			}
			let mut y = 0;
			for &i in &members {
				let node = &request.nodes[i];
				placements[i] = Some(Placement {
					id: node.id,
					pos: Point::new(layer_x[l], y),
					width: node.width,
					height: node.height,
				});
				centers[i] = y as f64 + node.height as f64 / 2.0;
				y += node.height + node_gap;
			}
		}
		let placements: Vec<Placement> = placements.into_iter().flatten().collect();

		let mut layout = PlacedLayout::new(placements, vec![]);
		let channels = (gap - 2).max(1);
		let mut edges = vec![];
		for edge in &request.edges {
			let source = port_point(request, &layout, edge.source.0, &edge.source.1);
			let target = port_point(request, &layout, edge.target.0, &edge.target.1);
			let (Some(s), Some(t)) = (source, target) else {
				edges.push(RoutedEdge {
					id: edge.id,
					points: vec![],
				});
				continue;
			};
			let channel = s.x + 1 + (edge.id as i32 % channels);
			let points = if s.y == t.y {
				vec![s, t]
			} else {
				vec![s, Point::new(channel, s.y), Point::new(channel, t.y), t]
			};
			edges.push(RoutedEdge {
				id: edge.id,
				points,
			});
		}
		layout.edges = edges;
		Ok(layout)
	}
}

/// Longest path from any first-layer source, with cycle edges relaxed so
/// register feedback loops terminate.
fn assign_layers(request: &LayoutRequest, preds: &[Vec<usize>]) -> Vec<usize> {
	#[derive(Clone, Copy, PartialEq)]
	enum State {
		Fresh,
		OnStack,
		Done,
	}
	fn visit(
		i: usize,
		request: &LayoutRequest,
		preds: &[Vec<usize>],
		state: &mut [State],
		layers: &mut [usize],
	) -> usize {
		match state[i] {
			State::Done => return layers[i],
			// Back edge: break the cycle by not constraining this node.
			State::OnStack => return 0,
			State::Fresh => {}
		}
		state[i] = State::OnStack;
		let layer = if request.nodes[i].pin == LayerPin::First {
			0
		} else {
			let deepest = preds[i]
				.iter()
				.map(|&p| visit(p, request, preds, state, layers))
				.max();
			match deepest {
				Some(d) => d + 1,
				None => 1,
			}
		};
		state[i] = State::Done;
		layers[i] = layer;
		layer
	}

	let n = request.nodes.len();
	let mut state = vec![State::Fresh; n];
	let mut layers = vec![0usize; n];
	for i in 0..n {
		visit(i, request, preds, &mut state, &mut layers);
	}
	layers
}

fn port_point(
	request: &LayoutRequest,
	layout: &PlacedLayout,
	id: ComponentId,
	port: &str,
) -> Option<Point> {
	let node = request.node(id)?;
	let offset = node.port_offset(port)?;
	let placement = layout.placement(id).ok()?;
	Some(placement.pos + offset)
}
