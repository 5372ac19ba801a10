//! Bit-exact binary save encoding.
//!
//! Everything is little-endian. The file is one format-version byte
//! followed by the Snappy-compressed payload: header, component block,
//! wire block. All bytes are produced in memory before anything is written
//! out, so a failing encode never leaves a truncated file behind.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use log::info;

use crate::cfg::CFG;
use crate::layout::PhysicalDesign;
use crate::library::{ComponentKind, Point};
use crate::logical_design::LogicalDesign;
use crate::wires::{SaveWire, TELEPORT};
use crate::{Error, Result};

pub const SAVE_VERSION: u8 = 6;

/// Extra origin shift the host applies to placed custom components.
const CUSTOM_POSITION_OFFSET: i32 = 32;

#[derive(Debug, Clone)]
pub struct SaveComponent {
	pub kind: ComponentKind,
	pub position: Point,
	pub rotation: u8,
	pub permanent_id: u64,
	pub label: String,
	pub setting1: u64,
	pub setting2: u64,
	pub ui_order: i16,
	/// Custom components carry the child schematic id and a displacement.
	pub custom: Option<(u64, Point)>,
	/// (program id, name) entries for program kinds, written sorted by id.
	pub selected_programs: Vec<(u64, String)>,
}

#[derive(Debug, Clone)]
pub struct SaveDesign {
	pub save_id: u64,
	pub hub_id: u32,
	pub gate: u64,
	pub delay: u64,
	pub menu_visible: bool,
	pub clock_speed: u32,
	pub dependencies: Vec<u64>,
	pub description: String,
	pub camera: Point,
	pub synced: u8,
	pub campaign_bound: bool,
	pub player_data: Vec<u8>,
	pub hub_description: String,
	pub components: Vec<SaveComponent>,
	pub wires: Vec<SaveWire>,
}

impl SaveDesign {
	/// Assemble the final record set from the placed design. Permanent ids
	/// are 1-based positions in component insertion order.
	pub fn build_from(
		design: &LogicalDesign,
		phy: &PhysicalDesign,
		wires: Vec<SaveWire>,
		save_id: u64,
		dependencies: Vec<u64>,
	) -> Result<SaveDesign> {
		let mut components = vec![];
		for (index, comp) in design.iter_live().enumerate() {
			let placement = phy.layout.placement(comp.id)?;
			let bounds = comp.bounds();
			let mut position = placement.pos - bounds.min;
			let custom = comp.custom.as_ref().map(|c| (c.id, Point::new(0, 0)));
			if custom.is_some() {
				position = position.offset(-CUSTOM_POSITION_OFFSET, -CUSTOM_POSITION_OFFSET);
			}
			components.push(SaveComponent {
				kind: comp.template.kind,
				position,
				rotation: comp.template.rotation,
				permanent_id: index as u64 + 1,
				label: comp.label.clone().unwrap_or_default(),
				setting1: comp.setting.unwrap_or(0),
				setting2: 0,
				ui_order: 0,
				custom,
				selected_programs: vec![],
			});
		}
		info!(
			"save: {} components, {} wires, {} dependencies",
			components.len(),
			wires.len(),
			dependencies.len()
		);
		Ok(SaveDesign {
			save_id,
			hub_id: 0,
			gate: 0,
			delay: 0,
			menu_visible: CFG.save.menu_visible,
			clock_speed: CFG.save.clock_speed,
			dependencies,
			description: String::new(),
			camera: Point::new(0, 0),
			synced: 0,
			campaign_bound: false,
			player_data: vec![],
			hub_description: String::new(),
			components,
			wires,
		})
	}

	/// Version byte, then the Snappy-compressed payload.
	pub fn to_bytes(&self) -> Result<Vec<u8>> {
		let payload = self.payload()?;
		let compressed = snap::raw::Encoder::new()
			.compress_vec(&payload)
			.map_err(Error::Compress)?;
		let mut out = Vec::with_capacity(compressed.len() + 1);
		out.push(SAVE_VERSION);
		out.extend_from_slice(&compressed);
		Ok(out)
	}

	pub fn payload(&self) -> Result<Vec<u8>> {
		let mut w = Vec::new();
		self.write_header(&mut w)?;
		self.write_components(&mut w)?;
		self.write_wires(&mut w)?;
		Ok(w)
	}

	fn write_header(&self, w: &mut Vec<u8>) -> Result<()> {
		w.write_u64::<LittleEndian>(self.save_id)?;
		w.write_u32::<LittleEndian>(self.hub_id)?;
		w.write_u64::<LittleEndian>(self.gate)?;
		w.write_u64::<LittleEndian>(self.delay)?;
		w.write_u8(self.menu_visible as u8)?;
		w.write_u32::<LittleEndian>(self.clock_speed)?;
		write_len16(w, self.dependencies.len(), "dependency count")?;
		for dep in &self.dependencies {
			w.write_u64::<LittleEndian>(*dep)?;
		}
		write_string(w, &self.description)?;
		write_point(w, self.camera)?;
		w.write_u8(self.synced)?;
		w.write_u8(self.campaign_bound as u8)?;
		w.write_u16::<LittleEndian>(0)?;
		write_len16(w, self.player_data.len(), "player data")?;
		w.write_all(&self.player_data)?;
		write_string(w, &self.hub_description)?;
		Ok(())
	}

	fn write_components(&self, w: &mut Vec<u8>) -> Result<()> {
		w.write_u64::<LittleEndian>(self.components.len() as u64)?;
		for comp in &self.components {
			w.write_u16::<LittleEndian>(comp.kind.as_u16())?;
			write_point(w, comp.position)?;
			w.write_u8(comp.rotation)?;
			w.write_u64::<LittleEndian>(comp.permanent_id)?;
			write_string(w, &comp.label)?;
			w.write_u64::<LittleEndian>(comp.setting1)?;
			w.write_u64::<LittleEndian>(comp.setting2)?;
			w.write_i16::<LittleEndian>(comp.ui_order)?;
			if comp.kind == ComponentKind::Custom {
				let (id, displacement) = comp
					.custom
					.ok_or(Error::ValueOutOfRange("custom component without an id"))?;
				w.write_u64::<LittleEndian>(id)?;
				write_point(w, displacement)?;
			}
			if comp.kind.is_program_kind() {
				let mut programs = comp.selected_programs.clone();
				programs.sort_by_key(|(id, _)| *id);
				write_len16(w, programs.len(), "selected programs")?;
				for (id, name) in &programs {
					w.write_u64::<LittleEndian>(*id)?;
					write_string(w, name)?;
				}
			}
		}
		Ok(())
	}

	fn write_wires(&self, w: &mut Vec<u8>) -> Result<()> {
		w.write_u64::<LittleEndian>(self.wires.len() as u64)?;
		for wire in &self.wires {
			w.write_u8(wire.kind as u8)?;
			w.write_u8(wire.color)?;
			write_string(w, &wire.comment)?;
			write_point(w, wire.start)?;
			debug_assert!(!wire.body.is_empty());
			w.write_all(&wire.body)?;
			let teleport = wire.body.last() == Some(&TELEPORT);
			match (teleport, wire.end) {
				(true, Some(end)) => write_point(w, end)?,
				(false, None) => {}
				_ => return Err(Error::ValueOutOfRange("teleport marker and end point disagree")),
			}
		}
		Ok(())
	}
}

/// 16-bit length-prefixed UTF-8.
fn write_string(w: &mut Vec<u8>, s: &str) -> Result<()> {
	write_len16(w, s.len(), "string")?;
	w.write_all(s.as_bytes())?;
	Ok(())
}

fn write_len16(w: &mut Vec<u8>, len: usize, what: &'static str) -> Result<()> {
	let len = u16::try_from(len).map_err(|_| Error::TooLong(what, len))?;
	w.write_u16::<LittleEndian>(len)?;
	Ok(())
}

/// Signed 16-bit x then y.
fn write_point(w: &mut Vec<u8>, p: Point) -> Result<()> {
	let x = i16::try_from(p.x).map_err(|_| Error::ValueOutOfRange("point x"))?;
	let y = i16::try_from(p.y).map_err(|_| Error::ValueOutOfRange("point y"))?;
	w.write_i16::<LittleEndian>(x)?;
	w.write_i16::<LittleEndian>(y)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::wires::WireKind;
	use byteorder::ReadBytesExt;
	use std::io::{Cursor, Read};

	fn empty_save() -> SaveDesign {
		SaveDesign {
			save_id: 0x0123_4567_89ab_cdef,
			hub_id: 7,
			gate: 0,
			delay: 0,
			menu_visible: false,
			clock_speed: 100_000,
			dependencies: vec![11, 22],
			description: "ab".to_owned(),
			camera: Point::new(-3, 4),
			synced: 0,
			campaign_bound: false,
			player_data: vec![],
			hub_description: String::new(),
			components: vec![],
			wires: vec![],
		}
	}

	#[test]
	fn header_layout_is_byte_exact() {
		let payload = empty_save().payload().unwrap();
		let mut r = Cursor::new(&payload);
		assert_eq!(r.read_u64::<LittleEndian>().unwrap(), 0x0123_4567_89ab_cdef);
		assert_eq!(r.read_u32::<LittleEndian>().unwrap(), 7);
		assert_eq!(r.read_u64::<LittleEndian>().unwrap(), 0); // gate
		assert_eq!(r.read_u64::<LittleEndian>().unwrap(), 0); // delay
		assert_eq!(r.read_u8().unwrap(), 0); // menu visible
		assert_eq!(r.read_u32::<LittleEndian>().unwrap(), 100_000);
		assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 2);
		assert_eq!(r.read_u64::<LittleEndian>().unwrap(), 11);
		assert_eq!(r.read_u64::<LittleEndian>().unwrap(), 22);
		assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 2);
		let mut desc = [0u8; 2];
		r.read_exact(&mut desc).unwrap();
		assert_eq!(&desc, b"ab");
		assert_eq!(r.read_i16::<LittleEndian>().unwrap(), -3);
		assert_eq!(r.read_i16::<LittleEndian>().unwrap(), 4);
		assert_eq!(r.read_u8().unwrap(), 0); // synced
		assert_eq!(r.read_u8().unwrap(), 0); // campaign bound
		assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 0); // reserved
		assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 0); // player data
		assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 0); // hub description
		assert_eq!(r.read_u64::<LittleEndian>().unwrap(), 0); // components
		assert_eq!(r.read_u64::<LittleEndian>().unwrap(), 0); // wires
		assert_eq!(r.position() as usize, payload.len());
	}

	#[test]
	fn container_round_trips_through_snappy() {
		let save = empty_save();
		let bytes = save.to_bytes().unwrap();
		assert_eq!(bytes[0], SAVE_VERSION);
		let decompressed = snap::raw::Decoder::new()
			.decompress_vec(&bytes[1..])
			.unwrap();
		assert_eq!(decompressed, save.payload().unwrap());
	}

	#[test]
	fn teleport_wires_carry_an_end_point() {
		let mut save = empty_save();
		save.dependencies.clear();
		save.description.clear();
		save.wires.push(SaveWire {
			kind: WireKind::Wk8,
			color: 0,
			comment: String::new(),
			start: Point::new(1, 2),
			body: vec![TELEPORT],
			end: Some(Point::new(-5, 9)),
		});
		let payload = save.payload().unwrap();
		// kind, color, comment len, start, marker, end
		let tail = &payload[payload.len() - 13..];
		assert_eq!(
			tail,
			[1, 0, 0, 0, 1, 0, 2, 0, TELEPORT, 0xfb, 0xff, 9, 0]
		);
	}

	#[test]
	fn mismatched_teleport_end_is_an_error() {
		let mut save = empty_save();
		save.wires.push(SaveWire {
			kind: WireKind::Wk1,
			color: 0,
			comment: String::new(),
			start: Point::new(0, 0),
			body: vec![0],
			end: Some(Point::new(1, 1)),
		});
		assert!(save.payload().is_err());
	}

	#[test]
	fn oversized_strings_are_rejected() {
		let mut save = empty_save();
		save.description = "x".repeat(70_000);
		assert!(matches!(save.payload(), Err(Error::TooLong(_, 70_000))));
	}

	#[test]
	fn out_of_range_positions_are_rejected() {
		let mut save = empty_save();
		save.camera = Point::new(40_000, 0);
		assert!(save.payload().is_err());
	}
}
