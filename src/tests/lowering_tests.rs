use crate::library::{ComponentKind, TemplateOp, Width};
use crate::logical_design::NetId;
use crate::tests::{edge_count, lower_top, op_count, try_lower_top};
use crate::Error;

use TemplateOp as Op;

#[test]
fn buffer_is_two_components_and_one_wire() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"a": {"direction": "input", "bits": [2]},
			"y": {"direction": "output", "bits": [2]}
		}, "cells": {}}}}"#,
	);
	assert_eq!(design.live_count(), 2);
	assert_eq!(op_count(&design, Op::Input), 1);
	assert_eq!(op_count(&design, Op::Output), 1);
	assert_eq!(edge_count(&design), 1);
	let net = NetId::bit(2);
	let source = design.source_of(&net).unwrap();
	assert_eq!(design.component(source.component).template.kind, ComponentKind::Input1);
	assert_eq!(design.component(source.component).port_width("out"), Width::W1);
}

#[test]
fn single_bit_and_gate() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"a": {"direction": "input", "bits": [2]},
			"b": {"direction": "input", "bits": [3]},
			"y": {"direction": "output", "bits": [4]}
		}, "cells": {
			"g": {"type": "$and", "connections": {"A": [2], "B": [3], "Y": [4]}}
		}}}}"#,
	);
	assert_eq!(design.live_count(), 4);
	assert_eq!(op_count(&design, Op::And), 1);
	assert_eq!(edge_count(&design), 3);
}

#[test]
fn byte_and_packs_buses_without_leftover_splitters() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"a": {"direction": "input", "bits": [2, 3, 4, 5, 6, 7, 8, 9]},
			"b": {"direction": "input", "bits": [10, 11, 12, 13, 14, 15, 16, 17]},
			"y": {"direction": "output", "bits": [18, 19, 20, 21, 22, 23, 24, 25]}
		}, "cells": {
			"g": {"type": "$and", "connections": {
				"A": [2, 3, 4, 5, 6, 7, 8, 9],
				"B": [10, 11, 12, 13, 14, 15, 16, 17],
				"Y": [18, 19, 20, 21, 22, 23, 24, 25]
			}}
		}}}}"#,
	);
	assert_eq!(design.live_count(), 4);
	assert_eq!(op_count(&design, Op::Splitter), 0);
	assert_eq!(op_count(&design, Op::Maker), 0);
	assert_eq!(edge_count(&design), 3);
	let and = design
		.iter_live()
		.find(|c| c.template.op == Op::And)
		.unwrap();
	assert_eq!(and.template.kind, ComponentKind::And8);
	assert_eq!(and.port_width("out"), Width::W8);
}

#[test]
fn single_bit_mux_decomposes_to_gates() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"a": {"direction": "input", "bits": [2]},
			"b": {"direction": "input", "bits": [3]},
			"s": {"direction": "input", "bits": [4]},
			"y": {"direction": "output", "bits": [5]}
		}, "cells": {
			"m": {"type": "$mux", "connections": {"A": [2], "B": [3], "S": [4], "Y": [5]}}
		}}}}"#,
	);
	// (a & ¬s) | (b & s)
	assert_eq!(op_count(&design, Op::Not), 1);
	assert_eq!(op_count(&design, Op::And), 2);
	assert_eq!(op_count(&design, Op::Or), 1);
	assert_eq!(op_count(&design, Op::Input), 3);
	assert_eq!(op_count(&design, Op::Output), 1);
	assert_eq!(design.live_count(), 8);
}

#[test]
fn mux_with_constant_one_arm_short_circuits() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"b": {"direction": "input", "bits": [2]},
			"s": {"direction": "input", "bits": [3]},
			"y": {"direction": "output", "bits": [4]}
		}, "cells": {
			"m": {"type": "$mux", "connections": {"A": ["1"], "B": [2], "S": [3], "Y": [4]}}
		}}}}"#,
	);
	// A = 1 makes the first term ¬s; only one AND remains for the B term.
	assert_eq!(op_count(&design, Op::Not), 1);
	assert_eq!(op_count(&design, Op::And), 1);
	assert_eq!(op_count(&design, Op::Or), 1);
}

#[test]
fn eight_bit_adder_exposes_carry_on_the_ninth_bit() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"a": {"direction": "input", "bits": [2, 3, 4, 5, 6, 7, 8, 9]},
			"b": {"direction": "input", "bits": [10, 11, 12, 13, 14, 15, 16, 17]},
			"sum": {"direction": "output", "bits": [18, 19, 20, 21, 22, 23, 24, 25]},
			"cout": {"direction": "output", "bits": [26]}
		}, "cells": {
			"add": {"type": "$add", "connections": {
				"A": [2, 3, 4, 5, 6, 7, 8, 9],
				"B": [10, 11, 12, 13, 14, 15, 16, 17],
				"Y": [18, 19, 20, 21, 22, 23, 24, 25, 26]
			}}
		}}}}"#,
	);
	assert_eq!(op_count(&design, Op::Add), 1);
	let adder = design
		.iter_live()
		.find(|c| c.template.op == Op::Add)
		.unwrap();
	assert_eq!(adder.template.kind, ComponentKind::Add8);
	let carry = design.source_of(&NetId::bit(26)).unwrap();
	assert_eq!(carry.component, adder.id);
	assert_eq!(carry.port, "carry_out");
	// Input8 x2, Add8, Output8, Output1.
	assert_eq!(design.live_count(), 5);
}

#[test]
fn single_bit_dff_becomes_a_flip_flop() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"clk": {"direction": "input", "bits": [2]},
			"d": {"direction": "input", "bits": [3]},
			"q": {"direction": "output", "bits": [4]}
		}, "cells": {
			"ff": {"type": "$dff", "parameters": {"CLK_POLARITY": 1},
				"connections": {"CLK": [2], "D": [3], "Q": [4]}}
		}}}}"#,
	);
	assert_eq!(design.live_count(), 4);
	assert_eq!(op_count(&design, Op::FlipFlop), 1);
	let ff = design
		.iter_live()
		.find(|c| c.template.op == Op::FlipFlop)
		.unwrap();
	let clk_sinks = &design.net(&NetId::bit(2)).unwrap().sinks;
	assert!(clk_sinks.iter().any(|s| s.component == ff.id && s.port == "save"));
	let d_sinks = &design.net(&NetId::bit(3)).unwrap().sinks;
	assert!(d_sinks.iter().any(|s| s.component == ff.id && s.port == "value"));
	let q = design.source_of(&NetId::bit(4)).unwrap();
	assert_eq!(q.component, ff.id);
}

#[test]
fn negative_clock_polarity_inverts_the_clock() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"clk": {"direction": "input", "bits": [2]},
			"d": {"direction": "input", "bits": [3]},
			"q": {"direction": "output", "bits": [4]}
		}, "cells": {
			"ff": {"type": "$dff", "parameters": {"CLK_POLARITY": 0},
				"connections": {"CLK": [2], "D": [3], "Q": [4]}}
		}}}}"#,
	);
	assert_eq!(op_count(&design, Op::Not), 1);
}

#[test]
fn wide_dff_ties_load_high() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"clk": {"direction": "input", "bits": [2]},
			"d": {"direction": "input", "bits": [3, 4, 5, 6, 7, 8, 9, 10]},
			"q": {"direction": "output", "bits": [11, 12, 13, 14, 15, 16, 17, 18]}
		}, "cells": {
			"ff": {"type": "$dff", "connections": {
				"CLK": [2],
				"D": [3, 4, 5, 6, 7, 8, 9, 10],
				"Q": [11, 12, 13, 14, 15, 16, 17, 18]
			}}
		}}}}"#,
	);
	let reg = design
		.iter_live()
		.find(|c| c.template.op == Op::Reg)
		.unwrap();
	assert_eq!(reg.template.kind, ComponentKind::Reg8);
	let load_net = design.net_of_sink(reg.id, "load").unwrap();
	let load_src = design.source_of(&load_net).unwrap();
	assert_eq!(
		design.component(load_src.component).template.kind,
		ComponentKind::On
	);
}

#[test]
fn dffe_feeds_its_own_output_back_through_a_mux() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"clk": {"direction": "input", "bits": [2]},
			"en": {"direction": "input", "bits": [3]},
			"d": {"direction": "input", "bits": [4, 5, 6, 7, 8, 9, 10, 11]},
			"q": {"direction": "output", "bits": [12, 13, 14, 15, 16, 17, 18, 19]}
		}, "cells": {
			"ff": {"type": "$dffe", "connections": {
				"CLK": [2], "EN": [3],
				"D": [4, 5, 6, 7, 8, 9, 10, 11],
				"Q": [12, 13, 14, 15, 16, 17, 18, 19]
			}}
		}}}}"#,
	);
	assert_eq!(op_count(&design, Op::Reg), 1);
	assert_eq!(op_count(&design, Op::Mux), 1);
	let reg = design.iter_live().find(|c| c.template.op == Op::Reg).unwrap();
	let mux = design.iter_live().find(|c| c.template.op == Op::Mux).unwrap();
	// Register output loops into the mux's kept arm.
	let reg_out: Vec<_> = design.nets_driven_by(reg.id);
	assert!(reg_out.iter().any(|(net, _)| {
		design
			.net(net)
			.unwrap()
			.sinks
			.iter()
			.any(|s| s.component == mux.id && s.port == "A")
	}));
	// Mux output is what the register stores.
	let value_net = design.net_of_sink(reg.id, "value").unwrap();
	assert_eq!(design.source_of(&value_net).unwrap().component, mux.id);
}

#[test]
fn sdffe_nests_reset_outside_enable() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"clk": {"direction": "input", "bits": [2]},
			"en": {"direction": "input", "bits": [3]},
			"rst": {"direction": "input", "bits": [4]},
			"d": {"direction": "input", "bits": [5, 6, 7, 8, 9, 10, 11, 12]},
			"q": {"direction": "output", "bits": [13, 14, 15, 16, 17, 18, 19, 20]}
		}, "cells": {
			"ff": {"type": "$sdffe", "parameters": {"SRST_VALUE": "00000101"},
				"connections": {
				"CLK": [2], "EN": [3], "SRST": [4],
				"D": [5, 6, 7, 8, 9, 10, 11, 12],
				"Q": [13, 14, 15, 16, 17, 18, 19, 20]
			}}
		}}}}"#,
	);
	assert_eq!(op_count(&design, Op::Mux), 2);
	assert_eq!(op_count(&design, Op::Reg), 1);
	// The reset value constant survives as a per-width constant component.
	let constant = design
		.iter_live()
		.find(|c| c.template.op == Op::Constant)
		.unwrap();
	assert_eq!(constant.setting, Some(5));
	let reg = design.iter_live().find(|c| c.template.op == Op::Reg).unwrap();
	// value comes from the outer (reset) mux, which selects the constant.
	let value_net = design.net_of_sink(reg.id, "value").unwrap();
	let outer = design.source_of(&value_net).unwrap().component;
	let outer_b = design.net_of_sink(outer, "B").unwrap();
	assert_eq!(
		design.source_of(&outer_b).unwrap().component,
		constant.id
	);
}

#[test]
fn pmux_chains_one_mux_per_select_bit() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"a": {"direction": "input", "bits": [2, 3]},
			"b": {"direction": "input", "bits": [4, 5, 6, 7]},
			"s": {"direction": "input", "bits": [8, 9]},
			"y": {"direction": "output", "bits": [10, 11]}
		}, "cells": {
			"p": {"type": "$pmux", "connections": {
				"A": [2, 3], "B": [4, 5, 6, 7], "S": [8, 9], "Y": [10, 11]
			}}
		}}}}"#,
	);
	assert_eq!(op_count(&design, Op::Mux), 2);
	design.validate().unwrap();
}

#[test]
fn not_equal_is_equal_then_not() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"a": {"direction": "input", "bits": [2, 3, 4, 5, 6, 7, 8, 9]},
			"b": {"direction": "input", "bits": [10, 11, 12, 13, 14, 15, 16, 17]},
			"y": {"direction": "output", "bits": [18]}
		}, "cells": {
			"ne": {"type": "$ne", "connections": {
				"A": [2, 3, 4, 5, 6, 7, 8, 9],
				"B": [10, 11, 12, 13, 14, 15, 16, 17],
				"Y": [18]
			}}
		}}}}"#,
	);
	assert_eq!(op_count(&design, Op::Equal), 1);
	assert_eq!(op_count(&design, Op::Not), 1);
	let not = design.iter_live().find(|c| c.template.op == Op::Not).unwrap();
	assert_eq!(not.template.kind, ComponentKind::Not);
	assert_eq!(design.source_of(&NetId::bit(18)).unwrap().component, not.id);
}

#[test]
fn reduce_and_compares_against_the_ones_mask() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"a": {"direction": "input", "bits": [2, 3, 4, 5]},
			"y": {"direction": "output", "bits": [6]}
		}, "cells": {
			"r": {"type": "$reduce_and", "connections": {"A": [2, 3, 4, 5], "Y": [6]}}
		}}}}"#,
	);
	assert_eq!(op_count(&design, Op::Equal), 1);
	// Four original bits: mask is 0b1111, not the full padded width.
	let constant = design
		.iter_live()
		.find(|c| c.template.op == Op::Constant)
		.unwrap();
	assert_eq!(constant.setting, Some(0b1111));
}

#[test]
fn greater_equal_swaps_and_inverts() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"a": {"direction": "input", "bits": [2, 3, 4, 5, 6, 7, 8, 9]},
			"b": {"direction": "input", "bits": [10, 11, 12, 13, 14, 15, 16, 17]},
			"y": {"direction": "output", "bits": [18]}
		}, "cells": {
			"cmp": {"type": "$ge", "parameters": {"A_SIGNED": 0}, "connections": {
				"A": [2, 3, 4, 5, 6, 7, 8, 9],
				"B": [10, 11, 12, 13, 14, 15, 16, 17],
				"Y": [18]
			}}
		}}}}"#,
	);
	// a >= b lowers to ¬(a < b).
	assert_eq!(op_count(&design, Op::LessU), 1);
	assert_eq!(op_count(&design, Op::Not), 1);
	assert_eq!(op_count(&design, Op::LessS), 0);
}

#[test]
fn signed_compare_picks_the_signed_template() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"a": {"direction": "input", "bits": [2, 3, 4, 5, 6, 7, 8, 9]},
			"b": {"direction": "input", "bits": [10, 11, 12, 13, 14, 15, 16, 17]},
			"y": {"direction": "output", "bits": [18]}
		}, "cells": {
			"cmp": {"type": "$lt", "parameters": {"A_SIGNED": 1}, "connections": {
				"A": [2, 3, 4, 5, 6, 7, 8, 9],
				"B": [10, 11, 12, 13, 14, 15, 16, 17],
				"Y": [18]
			}}
		}}}}"#,
	);
	assert_eq!(op_count(&design, Op::LessS), 1);
	assert_eq!(op_count(&design, Op::Not), 0);
}

#[test]
fn subtract_negates_then_adds() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"a": {"direction": "input", "bits": [2, 3, 4, 5, 6, 7, 8, 9]},
			"b": {"direction": "input", "bits": [10, 11, 12, 13, 14, 15, 16, 17]},
			"y": {"direction": "output", "bits": [18, 19, 20, 21, 22, 23, 24, 25]}
		}, "cells": {
			"sub": {"type": "$sub", "connections": {
				"A": [2, 3, 4, 5, 6, 7, 8, 9],
				"B": [10, 11, 12, 13, 14, 15, 16, 17],
				"Y": [18, 19, 20, 21, 22, 23, 24, 25]
			}}
		}}}}"#,
	);
	assert_eq!(op_count(&design, Op::Neg), 1);
	assert_eq!(op_count(&design, Op::Add), 1);
	let add = design.iter_live().find(|c| c.template.op == Op::Add).unwrap();
	let neg = design.iter_live().find(|c| c.template.op == Op::Neg).unwrap();
	let b_net = design.net_of_sink(add.id, "B").unwrap();
	assert_eq!(design.source_of(&b_net).unwrap().component, neg.id);
}

#[test]
fn arithmetic_shift_builds_the_sign_mask() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"a": {"direction": "input", "bits": [2, 3, 4, 5, 6, 7, 8, 9]},
			"n": {"direction": "input", "bits": [10, 11, 12]},
			"y": {"direction": "output", "bits": [13, 14, 15, 16, 17, 18, 19, 20]}
		}, "cells": {
			"sr": {"type": "$sshr", "connections": {
				"A": [2, 3, 4, 5, 6, 7, 8, 9],
				"B": [10, 11, 12],
				"Y": [13, 14, 15, 16, 17, 18, 19, 20]
			}}
		}}}}"#,
	);
	// Two logical shifts (value and all-ones), the mask inverter, the
	// sign-selected fill mux, and the final OR.
	assert_eq!(op_count(&design, Op::Shr), 2);
	assert_eq!(op_count(&design, Op::Not), 1);
	assert_eq!(op_count(&design, Op::Mux), 1);
	assert_eq!(op_count(&design, Op::Or), 1);
	design.validate().unwrap();
}

#[test]
fn wide_passthrough_collapses_hierarchical_splitters() {
	let bits: Vec<u64> = (2..34).collect();
	let json = format!(
		r#"{{"modules": {{"top": {{"ports": {{
			"a": {{"direction": "input", "bits": {bits:?}}},
			"y": {{"direction": "output", "bits": {bits:?}}}
		}}, "cells": {{}}}}}}}}"#
	);
	let design = lower_top(&json);
	assert_eq!(design.live_count(), 2);
	assert_eq!(op_count(&design, Op::Splitter), 0);
	assert_eq!(edge_count(&design), 1);
	let input = design.iter_live().find(|c| c.template.op == Op::Input).unwrap();
	assert_eq!(input.template.kind, ComponentKind::Input32);
}

#[test]
fn maker_after_splitter_merges_even_across_cell_order() {
	// Cell "a" consumes bits that cell "b" only produces later, so packing
	// cannot see their origin and has to emit a maker; the merge pass then
	// collapses it against b's splitter.
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"x": {"direction": "input", "bits": [2, 3, 4, 5, 6, 7, 8, 9]},
			"y": {"direction": "output", "bits": [30, 31, 32, 33, 34, 35, 36, 37]}
		}, "cells": {
			"a": {"type": "$not", "connections": {
				"A": [10, 11, 12, 13, 14, 15, 16, 17],
				"Y": [30, 31, 32, 33, 34, 35, 36, 37]
			}},
			"b": {"type": "$not", "connections": {
				"A": [2, 3, 4, 5, 6, 7, 8, 9],
				"Y": [10, 11, 12, 13, 14, 15, 16, 17]
			}}
		}}}}"#,
	);
	assert_eq!(op_count(&design, Op::Maker), 0);
	assert_eq!(op_count(&design, Op::Splitter), 0);
	assert_eq!(op_count(&design, Op::Not), 2);
	assert_eq!(design.live_count(), 4);
	design.validate().unwrap();
}

#[test]
fn zero_constant_kills_the_and_gate() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"a": {"direction": "input", "bits": [2]},
			"y": {"direction": "output", "bits": [3]}
		}, "cells": {
			"g": {"type": "$and", "connections": {"A": [2], "B": ["0"], "Y": [3]}}
		}}}}"#,
	);
	// The gate is gone; the output is re-driven by a constant zero.
	assert_eq!(op_count(&design, Op::And), 0);
	assert_eq!(op_count(&design, Op::Off), 1);
	let y = design.source_of(&NetId::bit(3)).unwrap();
	assert_eq!(design.component(y.component).template.op, Op::Off);
	design.validate().unwrap();
}

#[test]
fn literal_constants_fold_into_bus_constants() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"y": {"direction": "output", "bits": [2, 3, 4, 5, 6, 7, 8, 9]}
		}, "cells": {
			"c": {"type": "$not", "connections": {
				"A": ["1", "0", "1", "0", "0", "0", "0", "0"],
				"Y": [2, 3, 4, 5, 6, 7, 8, 9]
			}}
		}}}}"#,
	);
	let constant = design
		.iter_live()
		.find(|c| c.template.op == Op::Constant)
		.unwrap();
	assert_eq!(constant.setting, Some(0b101));
	// The per-bit literal drivers all folded away.
	assert_eq!(op_count(&design, Op::On), 0);
	assert_eq!(op_count(&design, Op::Off), 0);
}

#[test]
fn mapped_nand_folds_the_inverter_in() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"a": {"direction": "input", "bits": [2]},
			"b": {"direction": "input", "bits": [3]},
			"y": {"direction": "output", "bits": [4]}
		}, "cells": {
			"g": {"type": "$_NAND_", "connections": {"A": [2], "B": [3], "Y": [4]}}
		}}}}"#,
	);
	assert_eq!(op_count(&design, Op::And), 1);
	assert_eq!(op_count(&design, Op::Not), 1);
	let not = design.iter_live().find(|c| c.template.op == Op::Not).unwrap();
	assert_eq!(design.source_of(&NetId::bit(4)).unwrap().component, not.id);
}

#[test]
fn andnot_inverts_only_the_second_operand() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"a": {"direction": "input", "bits": [2]},
			"b": {"direction": "input", "bits": [3]},
			"y": {"direction": "output", "bits": [4]}
		}, "cells": {
			"g": {"type": "$_ANDNOT_", "connections": {"A": [2], "B": [3], "Y": [4]}}
		}}}}"#,
	);
	let not = design.iter_live().find(|c| c.template.op == Op::Not).unwrap();
	let and = design.iter_live().find(|c| c.template.op == Op::And).unwrap();
	// b feeds the inverter, the inverter feeds the AND.
	assert!(design
		.net(&NetId::bit(3))
		.unwrap()
		.sinks
		.iter()
		.any(|s| s.component == not.id));
	assert_eq!(design.source_of(&NetId::bit(4)).unwrap().component, and.id);
}

#[test]
fn buffers_vanish_entirely() {
	let design = lower_top(
		r#"{"modules": {"top": {"ports": {
			"a": {"direction": "input", "bits": [2]},
			"y": {"direction": "output", "bits": [3]}
		}, "cells": {
			"g": {"type": "$buf", "connections": {"A": [2], "Y": [3]}}
		}}}}"#,
	);
	assert_eq!(design.live_count(), 2);
	let y = design.source_of(&NetId::bit(3)).unwrap();
	assert_eq!(design.component(y.component).template.op, Op::Input);
}

#[test]
fn two_drivers_abort_the_compile() {
	let result = try_lower_top(
		r#"{"modules": {"top": {"ports": {
			"a": {"direction": "input", "bits": [2]},
			"b": {"direction": "input", "bits": [3]},
			"y": {"direction": "output", "bits": [4]}
		}, "cells": {
			"g1": {"type": "$not", "connections": {"A": [2], "Y": [4]}},
			"g2": {"type": "$not", "connections": {"A": [3], "Y": [4]}}
		}}}}"#,
	);
	assert!(matches!(result, Err(Error::TwoDrivers(..))));
}

#[test]
fn unknown_cell_types_abort_the_compile() {
	let result = try_lower_top(
		r#"{"modules": {"top": {"ports": {
			"a": {"direction": "input", "bits": [2]},
			"y": {"direction": "output", "bits": [3]}
		}, "cells": {
			"g": {"type": "$frobnicate", "connections": {"A": [2], "Y": [3]}}
		}}}}"#,
	);
	assert!(matches!(result, Err(Error::UnknownCellType(_))));
}

#[test]
fn undriven_output_aborts_the_compile() {
	let result = try_lower_top(
		r#"{"modules": {"top": {"ports": {
			"y": {"direction": "output", "bits": [2]}
		}, "cells": {}}}}"#,
	);
	assert!(matches!(result, Err(Error::UndrivenNet(_))));
}

#[test]
fn widths_beyond_64_abort_the_compile() {
	let bits: Vec<u64> = (2..67).collect();
	let json = format!(
		r#"{{"modules": {{"top": {{"ports": {{
			"a": {{"direction": "input", "bits": {bits:?}}}
		}}, "cells": {{}}}}}}}}"#
	);
	assert!(matches!(
		try_lower_top(&json),
		Err(Error::UnsupportedWidth(65))
	));
}
