//! In-memory netlist graph sitting between lowering and layout.
//!
//! Components live in an insertion-ordered arena; the order fixes permanent
//! id assignment in the save payload, so passes that delete components leave
//! tombstones instead of shifting the arena. Nets are keyed by string ids
//! minted from the synthesizer's bit numbering (or freshly for constants and
//! internal wires) and carry at most one driver plus any number of sinks.
//! Components never point at each other directly; every edge goes through
//! the net table.

use std::collections::BTreeMap;

use crate::library::{Bounds, PortDir, Template, TemplatePort, Width};
use crate::mapped_design::Direction;
use crate::{Error, Result};

/// Scale between a custom component's exported metadata units and grid
/// cells, and the origin shift the host applies to exported coordinates.
pub const CUSTOM_UNIT: i32 = 8;
pub const CUSTOM_META_OFFSET: i32 = 16;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NetId(pub(crate) String);

impl NetId {
	/// Net for a numbered synthesizer bit.
	pub fn bit(n: u64) -> NetId {
		NetId(format!("b{n}"))
	}
}

impl std::fmt::Display for NetId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub(crate) usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRef {
	pub component: ComponentId,
	pub port: String,
}

impl PortRef {
	pub fn new(component: ComponentId, port: &str) -> PortRef {
		PortRef {
			component,
			port: port.to_owned(),
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct Net {
	pub source: Option<PortRef>,
	pub sinks: Vec<PortRef>,
}

/// Module-port descriptor kept on IO components so the writer can label
/// them and the hierarchy driver can export them.
#[derive(Debug, Clone)]
pub struct IoPin {
	pub name: String,
	pub dir: Direction,
}

/// Exported face of a compiled submodule, in [`CUSTOM_UNIT`] cells with the
/// host's [`CUSTOM_META_OFFSET`] origin shift already applied.
#[derive(Debug, Clone)]
pub struct CustomMetadata {
	pub bounds: Bounds,
	pub ports: Vec<CustomPort>,
}

#[derive(Debug, Clone)]
pub struct CustomPort {
	pub name: String,
	pub dir: PortDir,
	pub pos: crate::library::Point,
	pub width: Width,
}

impl CustomMetadata {
	pub fn port(&self, name: &str) -> Option<&CustomPort> {
		self.ports.iter().find(|p| p.name == name)
	}
}

#[derive(Debug, Clone)]
pub struct CustomInstance {
	pub id: u64,
	pub meta: CustomMetadata,
}

#[derive(Debug, Clone)]
pub struct Component {
	pub id: ComponentId,
	pub template: &'static Template,
	pub label: Option<String>,
	pub io: Option<IoPin>,
	pub setting: Option<u64>,
	pub custom: Option<CustomInstance>,
}

impl Component {
	/// Local bounding box in grid cells. Custom instances derive theirs
	/// from the child's exported metadata.
	pub fn bounds(&self) -> Bounds {
		match &self.custom {
			Some(c) => Bounds {
				min: scale_meta_point(c.meta.bounds.min),
				max: scale_meta_point(c.meta.bounds.max),
			},
			None => self.template.bounds,
		}
	}

	/// Port layout in grid cells relative to the local origin.
	pub fn layout_ports(&self) -> Vec<TemplatePort> {
		match &self.custom {
			Some(c) => c
				.meta
				.ports
				.iter()
				.map(|p| TemplatePort {
					name: p.name.clone(),
					dir: p.dir,
					pos: scale_meta_point(p.pos),
				})
				.collect(),
			None => self.template.ports.clone(),
		}
	}

	pub fn port_position(&self, port: &str) -> Result<crate::library::Point> {
		match &self.custom {
			Some(c) => c
				.meta
				.port(port)
				.map(|p| scale_meta_point(p.pos))
				.ok_or_else(|| Error::UnknownPort(self.template.name.clone(), port.to_owned())),
			None => Ok(self.template.port(port)?.pos),
		}
	}

	pub fn port_width(&self, port: &str) -> Width {
		match &self.custom {
			Some(c) => c.meta.port(port).map(|p| p.width).unwrap_or(Width::W1),
			None => self.template.port_width(port),
		}
	}
}

fn scale_meta_point(p: crate::library::Point) -> crate::library::Point {
	crate::library::Point::new(
		(p.x + CUSTOM_META_OFFSET) * CUSTOM_UNIT,
		(p.y + CUSTOM_META_OFFSET) * CUSTOM_UNIT,
	)
}

pub struct LogicalDesign {
	components: Vec<Option<Component>>,
	nets: BTreeMap<NetId, Net>,
	next_fresh: u64,
}

impl Default for LogicalDesign {
	fn default() -> Self {
		Self::new()
	}
}

impl LogicalDesign {
	pub fn new() -> Self {
		LogicalDesign {
			components: vec![],
			nets: BTreeMap::new(),
			next_fresh: 0,
		}
	}

	pub fn add_component(&mut self, template: &'static Template) -> ComponentId {
		let id = ComponentId(self.components.len());
		self.components.push(Some(Component {
			id,
			template,
			label: None,
			io: None,
			setting: None,
			custom: None,
		}));
		id
	}

	pub fn component(&self, id: ComponentId) -> &Component {
		self.components[id.0]
			.as_ref()
			.unwrap_or_else(|| panic!("component {} was deleted", id.0))
	}

	pub fn component_mut(&mut self, id: ComponentId) -> &mut Component {
		self.components[id.0]
			.as_mut()
			.unwrap_or_else(|| panic!("component {} was deleted", id.0))
	}

	pub fn is_live(&self, id: ComponentId) -> bool {
		self.components[id.0].is_some()
	}

	/// Live components in insertion order. The position in this iteration
	/// (1-based) becomes the permanent id in the save payload.
	pub fn iter_live(&self) -> impl Iterator<Item = &Component> {
		self.components.iter().filter_map(Option::as_ref)
	}

	pub fn live_ids(&self) -> Vec<ComponentId> {
		self.iter_live().map(|c| c.id).collect()
	}

	pub fn live_count(&self) -> usize {
		self.iter_live().count()
	}

	/// Mint an id for an internal wire.
	pub fn fresh_net(&mut self) -> NetId {
		let id = NetId(format!("w{}", self.next_fresh));
		self.next_fresh += 1;
		id
	}

	pub fn net(&self, id: &NetId) -> Option<&Net> {
		self.nets.get(id)
	}

	fn net_entry(&mut self, id: &NetId) -> &mut Net {
		self.nets.entry(id.clone()).or_default()
	}

	pub fn iter_nets(&self) -> impl Iterator<Item = (&NetId, &Net)> {
		self.nets.iter()
	}

	/// Register `component.port` as the unique driver of `net`.
	pub fn connect_source(&mut self, net: &NetId, component: ComponentId, port: &str) -> Result<()> {
		let entry = self.net_entry(net);
		if let Some(existing) = &entry.source {
			return Err(Error::TwoDrivers(
				net.clone(),
				existing.clone(),
				PortRef::new(component, port),
			));
		}
		entry.source = Some(PortRef::new(component, port));
		Ok(())
	}

	pub fn connect_sink(&mut self, net: &NetId, component: ComponentId, port: &str) {
		self.net_entry(net).sinks.push(PortRef::new(component, port));
	}

	pub fn source_of(&self, net: &NetId) -> Option<&PortRef> {
		self.nets.get(net).and_then(|n| n.source.as_ref())
	}

	pub fn sink_count(&self, net: &NetId) -> usize {
		self.nets.get(net).map(|n| n.sinks.len()).unwrap_or(0)
	}

	/// The net attached to a specific sink port of `component`, if any.
	pub fn net_of_sink(&self, component: ComponentId, port: &str) -> Option<NetId> {
		self.nets
			.iter()
			.find(|(_, net)| {
				net.sinks
					.iter()
					.any(|s| s.component == component && s.port == port)
			})
			.map(|(id, _)| id.clone())
	}

	/// Nets driven by any port of `component`, with the driving port name.
	pub fn nets_driven_by(&self, component: ComponentId) -> Vec<(NetId, String)> {
		self.nets
			.iter()
			.filter_map(|(id, net)| {
				net.source
					.as_ref()
					.filter(|src| src.component == component)
					.map(|src| (id.clone(), src.port.clone()))
			})
			.collect()
	}

	/// Delete a component and sever every net reference to it.
	pub fn remove_component(&mut self, id: ComponentId) {
		for net in self.nets.values_mut() {
			if net.source.as_ref().is_some_and(|s| s.component == id) {
				net.source = None;
			}
			net.sinks.retain(|s| s.component != id);
		}
		self.components[id.0] = None;
	}

	/// Move every sink of `from` onto `to`. Used when a pack/unpack round
	/// trip collapses and the intermediate bus disappears.
	pub fn rewire_sinks(&mut self, from: &NetId, to: &NetId) {
		let moved = match self.nets.get_mut(from) {
			Some(net) => std::mem::take(&mut net.sinks),
			None => return,
		};
		self.net_entry(to).sinks.extend(moved);
	}

	/// Drop nets that no longer reference anything.
	pub fn prune_empty_nets(&mut self) {
		self.nets
			.retain(|_, net| net.source.is_some() || !net.sinks.is_empty());
	}

	/// Final structural check: every net that still has sinks must have
	/// exactly one driver, and every port reference must point at a live
	/// component.
	pub fn validate(&self) -> Result<()> {
		for (id, net) in &self.nets {
			if !net.sinks.is_empty() && net.source.is_none() {
				return Err(Error::UndrivenNet(id.clone()));
			}
			for port_ref in net.source.iter().chain(net.sinks.iter()) {
				if !self.is_live(port_ref.component) {
					return Err(Error::DanglingPortRef(id.clone()));
				}
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::library::{Library, TemplateOp};

	#[test]
	fn single_driver_is_enforced() {
		let lib = Library::get();
		let mut d = LogicalDesign::new();
		let a = d.add_component(lib.template(TemplateOp::And, Width::W1).unwrap());
		let b = d.add_component(lib.template(TemplateOp::Or, Width::W1).unwrap());
		let net = d.fresh_net();
		d.connect_source(&net, a, "out").unwrap();
		assert!(d.connect_source(&net, b, "out").is_err());
	}

	#[test]
	fn removal_severs_references() {
		let lib = Library::get();
		let mut d = LogicalDesign::new();
		let a = d.add_component(lib.template(TemplateOp::And, Width::W1).unwrap());
		let b = d.add_component(lib.template(TemplateOp::Not, Width::W1).unwrap());
		let net = d.fresh_net();
		d.connect_source(&net, a, "out").unwrap();
		d.connect_sink(&net, b, "A");
		d.remove_component(a);
		assert!(d.source_of(&net).is_none());
		assert!(d.validate().is_err());
		d.remove_component(b);
		d.prune_empty_nets();
		assert!(d.validate().is_ok());
		assert_eq!(d.live_count(), 0);
	}

	#[test]
	fn permanent_order_skips_tombstones() {
		let lib = Library::get();
		let mut d = LogicalDesign::new();
		let a = d.add_component(lib.off());
		let b = d.add_component(lib.on());
		let c = d.add_component(lib.off());
		d.remove_component(b);
		let order: Vec<ComponentId> = d.iter_live().map(|c| c.id).collect();
		assert_eq!(order, vec![a, c]);
	}
}
