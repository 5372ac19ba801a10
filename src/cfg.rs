use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigLayout {
	/// Horizontal margin between the IO columns and the logic block.
	pub io_margin: i32,
	/// Vertical cells reserved per IO component in compact mode. Chosen so
	/// that bus pins on adjacent IO components line up; visual, not load
	/// bearing.
	pub compact_io_slot: i32,
	/// Vertical gap between stacked components.
	pub node_gap: i32,
	/// Horizontal gap between layers / packed columns.
	pub layer_gap: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSave {
	pub clock_speed: u32,
	pub menu_visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
	pub layout: ConfigLayout,
	pub save: ConfigSave,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			layout: ConfigLayout {
				io_margin: 10,
				compact_io_slot: 10,
				node_gap: 3,
				layer_gap: 6,
			},
			save: ConfigSave {
				clock_speed: 100_000,
				menu_visible: false,
			},
		}
	}
}

pub static CFG: LazyLock<Config> = LazyLock::new(|| {
	std::fs::read("cfg/v2s.toml")
		.map(|bytes| toml::from_str::<Config>(&String::from_utf8_lossy(&bytes)))
		.unwrap_or_else(|_| Ok(Config::default()))
		.unwrap_or_else(|_| Config::default())
});

pub(crate) fn dump_cfg() {
	let cfg = Config::default();
	let cfg = toml::to_string(&cfg).unwrap();
	std::fs::create_dir_all("cfg").unwrap();
	std::fs::write("cfg/v2s_template.toml", cfg).unwrap();
}
