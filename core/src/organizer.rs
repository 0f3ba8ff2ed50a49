//! Splitting top level layers between the active composition and the elements bucket.

use forge_psd::{LayerId, LayerNode, LayerTree};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OrganizerError {
	#[error("layer {0} is not a top level layer of this document")]
	UnknownLayer(LayerId),
}

impl OrganizerError {
	#[must_use]
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::UnknownLayer(_) => "unknown_layer",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
	Active,
	Bucket,
}

/// Operator actions, as they come from an interactive surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "layerId", rename_all = "snake_case")]
pub enum OrganizerCommand {
	MoveToActive(LayerId),
	MoveToBucket(LayerId),
	SelectAll,
	ClearAll,
}

/// Partition of a fixed set of top level layers.
///
/// Placements live in a single map, so a layer is always in exactly one of the two sets.
/// Every layer starts in the bucket.
#[derive(Debug, Clone)]
pub struct LayerOrganizer {
	universe: Vec<LayerId>,
	placements: HashMap<LayerId, Placement>,
}

impl LayerOrganizer {
	pub fn new(ids: impl IntoIterator<Item = LayerId>) -> Self {
		let mut placements = HashMap::new();

		let universe = ids
			.into_iter()
			.filter(|id| placements.insert(*id, Placement::Bucket).is_none())
			.collect();

		Self {
			universe,
			placements,
		}
	}

	/// Organizer over the top level layers of a tree.
	#[must_use]
	pub fn from_tree(tree: &LayerTree) -> Self {
		Self::new(tree.roots().iter().copied())
	}

	fn place(&mut self, id: LayerId, placement: Placement) -> Result<bool, OrganizerError> {
		let current = self
			.placements
			.get_mut(&id)
			.ok_or(OrganizerError::UnknownLayer(id))?;

		if *current == placement {
			return Ok(false);
		}

		trace!(%id, ?placement, "Moving layer");
		*current = placement;

		Ok(true)
	}

	/// Returns whether anything changed.
	pub fn move_to_active(&mut self, id: LayerId) -> Result<bool, OrganizerError> {
		self.place(id, Placement::Active)
	}

	/// Returns whether anything changed.
	pub fn move_to_bucket(&mut self, id: LayerId) -> Result<bool, OrganizerError> {
		self.place(id, Placement::Bucket)
	}

	pub fn select_all(&mut self) {
		self.placements
			.values_mut()
			.for_each(|placement| *placement = Placement::Active);
	}

	pub fn clear_all(&mut self) {
		self.placements
			.values_mut()
			.for_each(|placement| *placement = Placement::Bucket);
	}

	pub fn apply(&mut self, command: OrganizerCommand) -> Result<bool, OrganizerError> {
		match command {
			OrganizerCommand::MoveToActive(id) => self.move_to_active(id),
			OrganizerCommand::MoveToBucket(id) => self.move_to_bucket(id),
			OrganizerCommand::SelectAll => {
				let changed = self.bucket().next().is_some();
				self.select_all();
				Ok(changed)
			}
			OrganizerCommand::ClearAll => {
				let changed = self.active().next().is_some();
				self.clear_all();
				Ok(changed)
			}
		}
	}

	fn with_placement(&self, placement: Placement) -> impl Iterator<Item = LayerId> + '_ {
		self.universe
			.iter()
			.copied()
			.filter(move |id| self.placements.get(id) == Some(&placement))
	}

	/// Active layers in stacking order.
	pub fn active(&self) -> impl Iterator<Item = LayerId> + '_ {
		self.with_placement(Placement::Active)
	}

	/// Bucket layers in stacking order.
	pub fn bucket(&self) -> impl Iterator<Item = LayerId> + '_ {
		self.with_placement(Placement::Bucket)
	}

	#[must_use]
	pub fn placement(&self, id: LayerId) -> Option<Placement> {
		self.placements.get(&id).copied()
	}

	#[must_use]
	pub fn is_active(&self, id: LayerId) -> bool {
		self.placement(id) == Some(Placement::Active)
	}

	#[must_use]
	pub fn universe(&self) -> &[LayerId] {
		&self.universe
	}

	/// Active nodes looked up in `tree`, ready to hand to the synthesizer.
	#[must_use]
	pub fn active_layers<'tree>(&self, tree: &'tree LayerTree) -> Vec<&'tree LayerNode> {
		self.active().filter_map(|id| tree.get(id)).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn organizer() -> LayerOrganizer {
		LayerOrganizer::new([LayerId(0), LayerId(3), LayerId(5), LayerId(3)])
	}

	#[test]
	fn starts_with_everything_in_the_bucket() {
		let organizer = organizer();

		assert_eq!(organizer.universe(), [LayerId(0), LayerId(3), LayerId(5)]);
		assert_eq!(organizer.active().count(), 0);
		assert_eq!(organizer.bucket().count(), 3);
	}

	#[test]
	fn moves_are_idempotent() {
		let mut organizer = organizer();

		assert_eq!(organizer.move_to_active(LayerId(5)), Ok(true));
		assert_eq!(organizer.move_to_active(LayerId(5)), Ok(false));
		assert_eq!(organizer.move_to_active(LayerId(0)), Ok(true));

		assert_eq!(
			organizer.active().collect::<Vec<_>>(),
			[LayerId(0), LayerId(5)]
		);
		assert_eq!(organizer.bucket().collect::<Vec<_>>(), [LayerId(3)]);
	}

	#[test]
	fn unknown_layers_are_rejected() {
		let mut organizer = organizer();

		assert_eq!(
			organizer.move_to_bucket(LayerId(1)),
			Err(OrganizerError::UnknownLayer(LayerId(1)))
		);
		assert_eq!(organizer.placement(LayerId(1)), None);
	}

	#[test]
	fn bulk_commands() {
		let mut organizer = organizer();

		assert_eq!(organizer.apply(OrganizerCommand::SelectAll), Ok(true));
		assert_eq!(organizer.apply(OrganizerCommand::SelectAll), Ok(false));
		assert!(organizer.is_active(LayerId(3)));

		assert_eq!(organizer.apply(OrganizerCommand::ClearAll), Ok(true));
		assert_eq!(organizer.active().count(), 0);
	}

	#[test]
	fn commands_deserialize() {
		let command = serde_json::from_str::<OrganizerCommand>(
			r#"{"type":"move_to_active","layerId":4}"#,
		)
		.unwrap();

		assert_eq!(command, OrganizerCommand::MoveToActive(LayerId(4)));
	}
}
