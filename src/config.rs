//! Container configuration

/// Default cap on suppressed errors retained during one singleton creation.
pub const DEFAULT_MAX_SUPPRESSED_ERRORS: usize = 100;

/// Behavioral switches of a [`Container`](crate::Container).
///
/// ```rust
/// use bean_container::{Container, ContainerConfig};
///
/// let container = Container::with_config(
///     ContainerConfig::default()
///         .allow_circular_references(false)
///         .allow_bean_definition_overriding(false),
/// );
/// assert!(!container.config().allow_circular_references);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Re-registering a definition name replaces the old definition
    pub allow_bean_definition_overriding: bool,
    /// Singletons may be exposed early to break property-based cycles
    pub allow_circular_references: bool,
    /// Dependents may keep a raw early reference even if the final bean got wrapped
    pub allow_raw_injection_despite_wrapping: bool,
    /// Merged definitions are cached (and reused) per name
    pub cache_bean_metadata: bool,
    /// Upper bound on suppressed errors attached to a creation failure
    pub max_suppressed_errors: usize,
    /// Pre-sized capacity for the name-keyed registries
    pub initial_capacity: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            allow_bean_definition_overriding: true,
            allow_circular_references: true,
            allow_raw_injection_despite_wrapping: false,
            cache_bean_metadata: true,
            max_suppressed_errors: DEFAULT_MAX_SUPPRESSED_ERRORS,
            initial_capacity: 0,
        }
    }
}

impl ContainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_bean_definition_overriding(mut self, allow: bool) -> Self {
        self.allow_bean_definition_overriding = allow;
        self
    }

    pub fn allow_circular_references(mut self, allow: bool) -> Self {
        self.allow_circular_references = allow;
        self
    }

    pub fn allow_raw_injection_despite_wrapping(mut self, allow: bool) -> Self {
        self.allow_raw_injection_despite_wrapping = allow;
        self
    }

    pub fn cache_bean_metadata(mut self, cache: bool) -> Self {
        self.cache_bean_metadata = cache;
        self
    }

    pub fn max_suppressed_errors(mut self, max: usize) -> Self {
        self.max_suppressed_errors = max;
        self
    }

    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}
