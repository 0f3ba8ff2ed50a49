use forge_psd::{LayerBounds, LayerNode};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FrameStyle {
	Classic,
	Foil,
	Holographic,
	Prismatic,
}

#[derive(
	Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Rarity {
	Common,
	Rare,
	Epic,
	Legendary,
}

/// How a region chooses its layer among the candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerPick {
	/// Biggest area.
	Largest,
	/// Smallest non empty area.
	Smallest,
	/// Highest in the stack.
	Topmost,
	/// Lowest in the stack.
	Bottommost,
	Widest,
	Tallest,
	/// Closest to the center of everything that was handed in.
	Centermost,
}

impl LayerPick {
	/// Picks one of `candidates`, which are in stacking order, bottom first.
	///
	/// Ties go to the layer lowest in the stack, except for [`LayerPick::Topmost`].
	pub(crate) fn pick<'node>(
		self,
		candidates: &[&'node LayerNode],
		center: (f64, f64),
	) -> Option<&'node LayerNode> {
		let first_max_by_key = |key: fn(&LayerBounds) -> u64| {
			candidates.iter().copied().reduce(|best, node| {
				if key(&node.bounds) > key(&best.bounds) {
					node
				} else {
					best
				}
			})
		};

		match self {
			Self::Largest => first_max_by_key(LayerBounds::area),
			Self::Widest => first_max_by_key(|bounds| u64::from(bounds.width)),
			Self::Tallest => first_max_by_key(|bounds| u64::from(bounds.height)),

			Self::Smallest => candidates
				.iter()
				.copied()
				.filter(|node| !node.bounds.is_empty())
				.reduce(|best, node| {
					if node.bounds.area() < best.bounds.area() {
						node
					} else {
						best
					}
				})
				.or_else(|| candidates.first().copied()),

			Self::Topmost => candidates.last().copied(),
			Self::Bottommost => candidates.first().copied(),

			Self::Centermost => {
				let distance = |node: &LayerNode| {
					let (x, y) = node.bounds.center();
					(x - center.0).hypot(y - center.1)
				};

				candidates.iter().copied().reduce(|best, node| {
					if distance(node) < distance(best) {
						node
					} else {
						best
					}
				})
			}
		}
	}
}

/// A named slot of a frame, filled with one of the active layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionTemplate {
	pub name: String,
	pub pick: LayerPick,
	/// Pixels added around the picked layer's bounds on every side.
	#[serde(default)]
	pub padding: u32,
}

impl RegionTemplate {
	#[must_use]
	pub fn new(name: &str, pick: LayerPick, padding: u32) -> Self {
		Self {
			name: name.to_string(),
			pick,
			padding,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameVariant {
	pub name: String,
	pub style: FrameStyle,
	pub rarity: Rarity,
	pub regions: Vec<RegionTemplate>,
}

/// The set of variants produced on every synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameCatalog {
	pub variants: Vec<FrameVariant>,
}

impl FrameCatalog {
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.variants.is_empty()
	}

	/// Variant names that can't produce a frame, because they declare no region.
	pub fn regionless_variants(&self) -> impl Iterator<Item = &str> + '_ {
		self.variants
			.iter()
			.filter(|variant| variant.regions.is_empty())
			.map(|variant| variant.name.as_str())
	}
}

impl Default for FrameCatalog {
	fn default() -> Self {
		use LayerPick::{Bottommost, Centermost, Largest, Smallest, Tallest, Topmost, Widest};

		Self {
			variants: vec![
				FrameVariant {
					name: "Classic".to_string(),
					style: FrameStyle::Classic,
					rarity: Rarity::Common,
					regions: vec![
						RegionTemplate::new("background", Largest, 0),
						RegionTemplate::new("artwork", Centermost, 0),
						RegionTemplate::new("title", Widest, 0),
					],
				},
				FrameVariant {
					name: "Foil".to_string(),
					style: FrameStyle::Foil,
					rarity: Rarity::Rare,
					regions: vec![
						RegionTemplate::new("background", Largest, 0),
						RegionTemplate::new("artwork", Centermost, 8),
						RegionTemplate::new("border", Bottommost, 16),
						RegionTemplate::new("title", Topmost, 0),
					],
				},
				FrameVariant {
					name: "Holographic".to_string(),
					style: FrameStyle::Holographic,
					rarity: Rarity::Epic,
					regions: vec![
						RegionTemplate::new("background", Largest, 0),
						RegionTemplate::new("artwork", Tallest, 12),
						RegionTemplate::new("overlay", Topmost, 0),
						RegionTemplate::new("badge", Smallest, 0),
						RegionTemplate::new("title", Widest, 0),
					],
				},
				FrameVariant {
					name: "Prismatic".to_string(),
					style: FrameStyle::Prismatic,
					rarity: Rarity::Legendary,
					regions: vec![
						RegionTemplate::new("background", Bottommost, 24),
						RegionTemplate::new("artwork", Largest, 16),
						RegionTemplate::new("accent", Smallest, 4),
						RegionTemplate::new("border", Widest, 32),
						RegionTemplate::new("overlay", Topmost, 0),
						RegionTemplate::new("title", Centermost, 0),
					],
				},
			],
		}
	}
}
