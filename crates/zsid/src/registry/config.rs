use std::collections::BTreeMap;

use crate::{BufferConfig, Error, GeneratorVariant, Result, UidLayout};

/// Domain served by a buffered generator in [`RegistryConfig::default`].
pub const CACHE_USER_DOMAIN: &str = "CacheUser";

/// Domain served by a direct generator in [`RegistryConfig::default`].
pub const DEFAULT_USER_DOMAIN: &str = "DefaultUser";

/// The closed set of domains a [`Registry`] serves, and how.
///
/// Loaded once when the registry is created; changing it requires a new
/// registry.
///
/// # Example
///
/// ```
/// use zsid::{GeneratorVariant, RegistryConfig};
///
/// let config = RegistryConfig::new()
///     .with_domain("Order", GeneratorVariant::Buffered)
///     .with_domain("Invoice", GeneratorVariant::Direct);
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.variant("Order"), Some(GeneratorVariant::Buffered));
/// assert_eq!(config.variant("Refund"), None);
/// ```
///
/// [`Registry`]: crate::Registry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryConfig {
    domains: BTreeMap<String, GeneratorVariant>,
    layout: UidLayout,
    buffer: BufferConfig,
}

impl Default for RegistryConfig {
    /// `CacheUser` on a buffered generator and `DefaultUser` on a direct one.
    fn default() -> Self {
        Self::new()
            .with_domain(CACHE_USER_DOMAIN, GeneratorVariant::Buffered)
            .with_domain(DEFAULT_USER_DOMAIN, GeneratorVariant::Direct)
    }
}

impl RegistryConfig {
    /// An empty configuration with the default layout and buffer settings.
    pub fn new() -> Self {
        Self {
            domains: BTreeMap::new(),
            layout: UidLayout::DEFAULT,
            buffer: BufferConfig::default(),
        }
    }

    /// Adds (or re-declares) a domain.
    #[must_use]
    pub fn with_domain(mut self, key: impl Into<String>, variant: GeneratorVariant) -> Self {
        self.domains.insert(key.into(), variant);
        self
    }

    #[must_use]
    pub fn with_layout(mut self, layout: UidLayout) -> Self {
        self.layout = layout;
        self
    }

    #[must_use]
    pub fn with_buffer(mut self, buffer: BufferConfig) -> Self {
        self.buffer = buffer;
        self
    }

    /// Configured domains in lexical order.
    pub fn domains(&self) -> impl Iterator<Item = (&str, GeneratorVariant)> {
        self.domains.iter().map(|(key, variant)| (key.as_str(), *variant))
    }

    pub fn variant(&self, key: &str) -> Option<GeneratorVariant> {
        self.domains.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.domains.contains_key(key)
    }

    pub const fn layout(&self) -> UidLayout {
        self.layout
    }

    pub const fn buffer(&self) -> &BufferConfig {
        &self.buffer
    }

    /// Checks the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if no domain is configured, a domain
    /// key is blank, or a buffered domain is configured with a padding factor
    /// outside `1..=100` or a buffer that would exceed
    /// [`MAX_BUFFER_CAPACITY`].
    ///
    /// [`MAX_BUFFER_CAPACITY`]: crate::MAX_BUFFER_CAPACITY
    pub fn validate(&self) -> Result<()> {
        if self.domains.is_empty() {
            return Err(Error::invalid_config("at least one domain must be configured"));
        }

        if let Some(key) = self.domains.keys().find(|key| key.trim().is_empty()) {
            return Err(Error::invalid_config(format!(
                "domain keys must not be blank (got {key:?})"
            )));
        }

        let buffered = self
            .domains
            .values()
            .any(|variant| *variant == GeneratorVariant::Buffered);
        if !buffered {
            return Ok(());
        }

        if !(1..=100).contains(&self.buffer.padding_factor) {
            return Err(Error::invalid_config(format!(
                "padding factor must be within 1..=100, got {}",
                self.buffer.padding_factor
            )));
        }

        if self.buffer.capacity(&self.layout).is_none() {
            return Err(Error::invalid_config(format!(
                "buffer of {} sequence bits boosted by 2^{} exceeds the maximum capacity",
                self.layout.sequence_bits(),
                self.buffer.boost_power
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_serves_two_user_domains() {
        let config = RegistryConfig::default();
        let domains: Vec<_> = config.domains().collect();
        assert_eq!(
            domains,
            vec![
                (CACHE_USER_DOMAIN, GeneratorVariant::Buffered),
                (DEFAULT_USER_DOMAIN, GeneratorVariant::Direct),
            ]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_config_is_rejected() {
        assert!(matches!(
            RegistryConfig::new().validate(),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn blank_key_is_rejected() {
        let config = RegistryConfig::new().with_domain("  ", GeneratorVariant::Direct);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn buffer_settings_only_matter_for_buffered_domains() {
        let buffer = BufferConfig {
            padding_factor: 0,
            ..BufferConfig::default()
        };

        let direct_only = RegistryConfig::new()
            .with_domain("Invoice", GeneratorVariant::Direct)
            .with_buffer(buffer);
        assert!(direct_only.validate().is_ok());

        let buffered = direct_only.with_domain("Order", GeneratorVariant::Buffered);
        assert!(matches!(buffered.validate(), Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn oversized_buffer_is_rejected() {
        let config = RegistryConfig::default()
            .with_layout(UidLayout::new(22, 10, 31).unwrap())
            .with_buffer(BufferConfig {
                boost_power: 3,
                ..BufferConfig::default()
            });
        assert!(matches!(config.validate(), Err(Error::InvalidConfig { .. })));
    }
}
