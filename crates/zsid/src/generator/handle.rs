use core::{fmt, str::FromStr};

use crate::{
    BufferConfig, BufferedUidGenerator, DirectUidGenerator, GenerateError, TimeSource, UidFields,
    UidGenerator, UidLayout, WorkerToken,
};

/// Which generator implementation a domain is served by.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum GeneratorVariant {
    /// Computes every UID on demand ([`DirectUidGenerator`]).
    #[default]
    Direct,
    /// Serves UIDs from a pre-filled buffer ([`BufferedUidGenerator`]).
    Buffered,
}

impl fmt::Display for GeneratorVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Buffered => f.write_str("buffered"),
        }
    }
}

impl FromStr for GeneratorVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" | "default" => Ok(Self::Direct),
            "buffered" | "cached" => Ok(Self::Buffered),
            other => Err(format!("unknown generator variant `{other}`")),
        }
    }
}

enum Generator<T> {
    Direct(DirectUidGenerator<T>),
    Buffered(BufferedUidGenerator<T>),
}

/// A live generator bound to one domain and one worker token.
///
/// Handles are built by the [`Registry`] and owned by its entry for the
/// domain. A handle is dropped once the registry replaces it during a refresh
/// or a rebuild, which for the buffered variant also stops its padding
/// thread.
///
/// [`Registry`]: crate::Registry
pub struct GeneratorHandle<T> {
    domain: String,
    token: WorkerToken,
    generation: u64,
    generator: Generator<T>,
}

impl<T> GeneratorHandle<T>
where
    T: TimeSource + Send + Sync + 'static,
{
    pub(crate) fn build(
        domain: &str,
        token: WorkerToken,
        generation: u64,
        variant: GeneratorVariant,
        layout: UidLayout,
        time: T,
        buffer: &BufferConfig,
    ) -> Result<Self, GenerateError> {
        let generator = match variant {
            GeneratorVariant::Direct => {
                Generator::Direct(DirectUidGenerator::new(token.get(), layout, time))
            }
            GeneratorVariant::Buffered => Generator::Buffered(BufferedUidGenerator::new(
                token.get(),
                layout,
                time,
                buffer,
            )?),
        };

        Ok(Self {
            domain: domain.to_owned(),
            token,
            generation,
            generator,
        })
    }

    fn generator(&self) -> &dyn UidGenerator {
        match &self.generator {
            Generator::Direct(generator) => generator,
            Generator::Buffered(generator) => generator,
        }
    }

    /// Produces the next UID.
    ///
    /// # Errors
    ///
    /// Propagates the generator's [`GenerateError`].
    pub fn produce(&self) -> Result<u64, GenerateError> {
        self.generator().try_next_id()
    }

    /// Decodes `uid` into its fields.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::MalformedUid`] for UIDs this layout cannot
    /// produce.
    pub fn decode(&self, uid: u64) -> Result<UidFields, GenerateError> {
        self.generator().decode(uid)
    }
}

impl<T> GeneratorHandle<T> {
    /// The domain this handle serves.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The worker token the handle was built with.
    pub const fn token(&self) -> WorkerToken {
        self.token
    }

    /// Shorthand for `self.token().get()`.
    pub const fn worker_id(&self) -> u64 {
        self.token.get()
    }

    /// The registry generation this handle was built in. Every
    /// [`Registry::refresh_all`] starts a new generation.
    ///
    /// [`Registry::refresh_all`]: crate::Registry::refresh_all
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub fn variant(&self) -> GeneratorVariant {
        match &self.generator {
            Generator::Direct(_) => GeneratorVariant::Direct,
            Generator::Buffered(_) => GeneratorVariant::Buffered,
        }
    }
}

impl<T> fmt::Debug for GeneratorHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorHandle")
            .field("domain", &self.domain)
            .field("token", &self.token)
            .field("generation", &self.generation)
            .field("variant", &self.variant())
            .finish()
    }
}
