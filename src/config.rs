/// Settings of an [EntitiesDb](crate::EntitiesDb).
///
/// The configuration is passed explicitly to [EntitiesDb::with_config](crate::EntitiesDb::with_config);
/// nothing is read from process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EntitiesDbConfig {
    /// Capacity reserved for a new dense array when its group has no capacity hint.
    pub default_array_capacity: usize,
    /// First identifier handed out by [GroupRegistry::allocate](crate::GroupRegistry::allocate).
    pub first_group_id: u32,
    /// Maximum number of live entities a single group may hold.
    pub max_entities_per_group: u32,
}

impl EntitiesDbConfig {
    pub fn with_default_array_capacity(mut self, capacity: usize) -> Self {
        self.default_array_capacity = capacity;
        self
    }

    pub fn with_first_group_id(mut self, id: u32) -> Self {
        self.first_group_id = id;
        self
    }

    pub fn with_max_entities_per_group(mut self, max: u32) -> Self {
        self.max_entities_per_group = max;
        self
    }
}

impl Default for EntitiesDbConfig {
    fn default() -> Self {
        Self {
            default_array_capacity: 0,
            first_group_id: 0,
            max_entities_per_group: u32::MAX - 1,
        }
    }
}
