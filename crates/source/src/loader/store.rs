use shellbay_proto::ItemComponentData;

/// Items tracked by one loader, in registration order.
#[derive(Debug, Default)]
pub struct ItemStore {
	items: Vec<ItemComponentData>,
}

impl ItemStore {
	pub fn get(&self, id: &str) -> Option<&ItemComponentData> {
		self.items.iter().find(|item| item.id == id)
	}

	pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut ItemComponentData> {
		self.items.iter_mut().find(|item| item.id == id)
	}

	pub fn contains(&self, id: &str) -> bool {
		self.get(id).is_some()
	}

	/// Stores `item`, replacing in place any item with the same id.
	pub fn insert(&mut self, item: ItemComponentData) -> Option<ItemComponentData> {
		match self.get_mut(&item.id) {
			Some(slot) => Some(std::mem::replace(slot, item)),
			None => {
				self.items.push(item);
				None
			}
		}
	}

	pub fn remove(&mut self, id: &str) -> Option<ItemComponentData> {
		let idx = self.items.iter().position(|item| item.id == id)?;
		Some(self.items.remove(idx))
	}

	/// Removes every item of `bundle`, walking indices from the back.
	pub fn drain_bundle(&mut self, bundle: &str) -> Vec<ItemComponentData> {
		let mut removed = Vec::new();
		for idx in (0..self.items.len()).rev() {
			if self.items[idx].bundle_name == bundle {
				removed.push(self.items.remove(idx));
			}
		}
		removed
	}

	pub fn drain_all(&mut self) -> Vec<ItemComponentData> {
		std::mem::take(&mut self.items)
	}

	pub fn iter(&self) -> impl Iterator<Item = &ItemComponentData> {
		self.items.iter()
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}
}
