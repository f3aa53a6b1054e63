use crate::ConfigSet;

/// The keys that differ between two configuration sets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigDiff {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
}

impl ConfigDiff {
    pub fn between(from: &ConfigSet, to: &ConfigSet) -> Self {
        let mut diff = Self::default();
        for (key, value) in to {
            match from.get(key) {
                None => diff.created.push(key.clone()),
                Some(prior) if prior != value => diff.updated.push(key.clone()),
                Some(_) => {}
            }
        }
        diff.deleted = from
            .keys()
            .filter(|key| !to.contains_key(*key))
            .cloned()
            .collect();
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}
